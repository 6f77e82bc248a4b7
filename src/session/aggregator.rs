use crate::event::{CounterRecord, LogEvent};
use crate::session::window::{OpenWindow, Transition};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Count the events buffered in a window.
///
/// In debug mode every event is logged with its content as it is counted.
pub fn count_window(window: &OpenWindow, debug_mode: bool) -> u64 {
    let mut count = 0u64;
    for event in &window.events {
        if debug_mode {
            info!(
                event_type = event.event_type,
                application_id = %event.application_id,
                content = %event.content,
                "Counting event"
            );
        }
        count += 1;
    }
    count
}

/// Per-type session window aggregator.
///
/// Each event type owns an independent sequence of processing-time session
/// windows. A window stays open while events of its type keep arriving less
/// than `gap` apart and closes when its inactivity timer fires. Only one timer
/// is registered per open window; extending the window re-registers it.
///
/// The aggregator is owned by a single partition worker, so it holds no locks.
pub struct SessionAggregator {
    gap: Duration,
    debug_mode: bool,
    /// Open windows by event type. A missing entry means no window.
    windows: HashMap<i32, OpenWindow>,
    /// Pending close timers ordered by deadline
    timers: BTreeSet<(DateTime<Utc>, i32)>,
    windows_emitted: u64,
}

impl SessionAggregator {
    pub fn new(gap: Duration, debug_mode: bool) -> Self {
        Self {
            gap,
            debug_mode,
            windows: HashMap::new(),
            timers: BTreeSet::new(),
            windows_emitted: 0,
        }
    }

    /// Record an event that arrived at `arrival`.
    ///
    /// Returns the record of the key's previous window when that window had
    /// already expired but its timer had not been fired yet.
    pub fn observe(&mut self, event: LogEvent, arrival: DateTime<Utc>) -> Option<CounterRecord> {
        let key = event.event_type;
        match self.transition(event, arrival) {
            Transition::Opened => {
                debug!(event_type = key, "Opened session window");
                None
            }
            Transition::Extended => None,
            Transition::Rolled(closed) => {
                debug!(event_type = key, "Expired window closed by new arrival");
                Some(self.emit(closed))
            }
        }
    }

    fn transition(&mut self, event: LogEvent, arrival: DateTime<Utc>) -> Transition {
        let key = event.event_type;
        let gap = self.gap;

        let Some(mut window) = self.windows.remove(&key) else {
            self.insert_window(OpenWindow::open(event, arrival));
            return Transition::Opened;
        };

        self.timers.remove(&(window.deadline(gap), key));

        if window.accepts(arrival, gap) {
            window.extend(event, arrival);
            self.insert_window(window);
            Transition::Extended
        } else {
            self.insert_window(OpenWindow::open(event, arrival));
            Transition::Rolled(window)
        }
    }

    fn insert_window(&mut self, window: OpenWindow) {
        let key = window.event_type;
        self.timers.insert((window.deadline(self.gap), key));
        self.windows.insert(key, window);
    }

    /// Earliest pending timer, if any window is open
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.first().map(|(deadline, _)| *deadline)
    }

    /// Fire every timer whose deadline is at or before `now`, closing the
    /// corresponding windows in deadline order.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<CounterRecord> {
        let mut records = Vec::new();

        while let Some(&(deadline, key)) = self.timers.first() {
            if deadline > now {
                break;
            }
            self.timers.remove(&(deadline, key));

            if let Some(window) = self.windows.remove(&key) {
                records.push(self.emit(window));
            }
        }

        records
    }

    fn emit(&mut self, window: OpenWindow) -> CounterRecord {
        let count = count_window(&window, self.debug_mode);
        self.windows_emitted += 1;

        let record = CounterRecord {
            event_type: window.event_type,
            window_start: window.first_arrival,
            window_end: window.deadline(self.gap),
            count,
        };

        debug!(
            event_type = record.event_type,
            count = record.count,
            window_start = %record.window_start,
            window_end = %record.window_end,
            "Session window closed"
        );

        record
    }

    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    /// Drop every open window without emitting it, returning how many were lost
    pub fn discard_open(&mut self) -> usize {
        let discarded = self.windows.len();
        self.windows.clear();
        self.timers.clear();
        discarded
    }
}
