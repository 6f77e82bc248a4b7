use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar rendering used by both output record types.
pub const CALENDAR_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

/// Render a point in time the way output records expect it
pub fn render_calendar(at: &DateTime<Utc>) -> String {
    at.format(CALENDAR_FORMAT).to_string()
}

/// A decoded application log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Free-text payload
    #[serde(default)]
    pub content: String,
    /// Event-type discriminator
    #[serde(rename = "type")]
    pub event_type: i32,
    /// Originating application
    #[serde(rename = "applicationid", default)]
    pub application_id: String,
    /// Event time in whole seconds since epoch
    pub timestamp: i64,
}

impl LogEvent {
    pub fn new(
        event_type: i32,
        timestamp: i64,
        application_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            event_type,
            application_id: application_id.into(),
            timestamp,
        }
    }

    /// Event time as a calendar value, if representable
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .checked_mul(1000)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event_time() {
            Some(at) => write!(
                f,
                "({}, {}, {})",
                self.event_type,
                render_calendar(&at),
                self.content
            ),
            None => write!(
                f,
                "({}, {}, {})",
                self.event_type, self.timestamp, self.content
            ),
        }
    }
}

/// Occurrence count of one event type over one closed session window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub event_type: i32,
    /// Inclusive start of the window
    pub window_start: DateTime<Utc>,
    /// Exclusive end of the window
    pub window_end: DateTime<Utc>,
    pub count: u64,
}

impl fmt::Display for CounterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {} {}, {})",
            self.event_type,
            render_calendar(&self.window_start),
            render_calendar(&self.window_end),
            self.count
        )
    }
}
