use crate::event::model::LogEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one raw record into a `LogEvent`.
///
/// Fields are `content`, `type`, `applicationid` and `timestamp`. `type` and
/// `timestamp` are required; unknown fields are ignored.
pub fn decode_event(raw: &str) -> Result<LogEvent, DecodeError> {
    Ok(serde_json::from_str(raw.trim())?)
}
