use crate::event::LogEvent;
use chrono::{DateTime, Duration, Utc};

/// An open session window for a single event type
#[derive(Debug, Clone)]
pub struct OpenWindow {
    /// Event type this window belongs to
    pub event_type: i32,
    /// Arrival time of the earliest event in the window
    pub first_arrival: DateTime<Utc>,
    /// Arrival time of the most recent event in the window
    pub last_arrival: DateTime<Utc>,
    /// Events buffered until the window closes
    pub events: Vec<LogEvent>,
}

impl OpenWindow {
    /// Open a window with its first event
    pub fn open(event: LogEvent, arrival: DateTime<Utc>) -> Self {
        Self {
            event_type: event.event_type,
            first_arrival: arrival,
            last_arrival: arrival,
            events: vec![event],
        }
    }

    /// Add an event that arrived within the gap
    pub fn extend(&mut self, event: LogEvent, arrival: DateTime<Utc>) {
        if arrival < self.first_arrival {
            self.first_arrival = arrival;
        }
        if arrival > self.last_arrival {
            self.last_arrival = arrival;
        }
        self.events.push(event);
    }

    /// Instant at which the window closes if nothing else arrives
    pub fn deadline(&self, gap: Duration) -> DateTime<Utc> {
        self.last_arrival
            .checked_add_signed(gap)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether an arrival at `at` still falls inside this window
    pub fn accepts(&self, at: DateTime<Utc>, gap: Duration) -> bool {
        at < self.deadline(gap)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// What happened to a key's window when an event was observed
#[derive(Debug)]
pub enum Transition {
    /// No window was open; a new one was started
    Opened,
    /// The open window absorbed the event
    Extended,
    /// The open window had already expired; it was closed and a new one opened
    Rolled(OpenWindow),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_open_window() {
        let window = OpenWindow::open(LogEvent::new(20, 0, "app", "a"), at(5));
        assert_eq!(window.event_type, 20);
        assert_eq!(window.first_arrival, at(5));
        assert_eq!(window.last_arrival, at(5));
        assert_eq!(window.event_count(), 1);
    }

    #[test]
    fn test_extend_moves_deadline() {
        let gap = Duration::seconds(60);
        let mut window = OpenWindow::open(LogEvent::new(20, 0, "app", "a"), at(0));
        assert_eq!(window.deadline(gap), at(60));

        window.extend(LogEvent::new(20, 0, "app", "b"), at(30));
        assert_eq!(window.deadline(gap), at(90));
        assert_eq!(window.first_arrival, at(0));
        assert_eq!(window.event_count(), 2);
    }

    #[test]
    fn test_out_of_order_arrival_keeps_bounds() {
        let gap = Duration::seconds(60);
        let mut window = OpenWindow::open(LogEvent::new(20, 0, "app", "a"), at(30));
        window.extend(LogEvent::new(20, 0, "app", "b"), at(10));

        assert_eq!(window.first_arrival, at(10));
        assert_eq!(window.last_arrival, at(30));
        assert_eq!(window.deadline(gap), at(90));
    }

    #[test]
    fn test_accepts_is_strict() {
        let gap = Duration::seconds(60);
        let window = OpenWindow::open(LogEvent::new(20, 0, "app", "a"), at(0));
        assert!(window.accepts(at(59), gap));
        assert!(!window.accepts(at(60), gap));
    }
}
