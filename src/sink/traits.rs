use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Destination for formatted output lines
#[async_trait]
pub trait LineSink: Send {
    async fn write_line(&mut self, line: &str) -> Result<(), SinkError>;

    /// Apply time-based rollover rules as of `now`
    async fn check_rollover(&mut self, now: DateTime<Utc>) -> Result<(), SinkError>;

    /// Finalize any in-progress output
    async fn close(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink is closed")]
    Closed,
}
