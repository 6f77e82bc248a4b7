use crate::config::types::DEFAULT_COUNTABLE_TYPE_THRESHOLD;
use crate::event::LogEvent;

/// The channel an event is routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Aggregated into per-type session counts
    Countable(LogEvent),
    /// Stored as-is
    Informational(LogEvent),
}

/// Routes events by type: types above the threshold are countable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    threshold: i32,
}

impl Classifier {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn is_countable(&self, event: &LogEvent) -> bool {
        event.event_type > self.threshold
    }

    pub fn classify(&self, event: LogEvent) -> Routed {
        if self.is_countable(&event) {
            Routed::Countable(event)
        } else {
            Routed::Informational(event)
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTABLE_TYPE_THRESHOLD)
    }
}
