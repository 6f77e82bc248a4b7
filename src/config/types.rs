use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// Flat runtime parameters, name -> raw value
pub type Properties = BTreeMap<String, String>;

pub const DEBUG_MODE: &str = "debug_mode";
pub const REGION: &str = "region";
pub const STREAM_INIT_POSITION: &str = "stream_init_position";
pub const STREAM_INITIAL_TIMESTAMP: &str = "stream_initial_timestamp";
pub const INPUT_STREAM_NAME: &str = "input_stream_name";
pub const SESSION_TIME_OUT_IN_MINUTES: &str = "session_time_out_in_minutes";
pub const S3_OUTPUT_PATH: &str = "s3_output_path";
pub const BUCKET_CHECK_INTERVAL_IN_SECONDS: &str = "bucket_check_interval_in_seconds";
pub const ROLLING_INTERVAL_IN_SECONDS: &str = "rolling_interval_in_seconds";
pub const INACTIVITY_INTERVAL_IN_SECONDS: &str = "inactivity_interval_in_seconds";
pub const COUNTABLE_TYPE_THRESHOLD: &str = "countable_type_threshold";
pub const PARALLELISM: &str = "parallelism";
pub const CHANNEL_BUFFER_SIZE: &str = "channel_buffer_size";

/// Event types above this value are countable. Agreed with the producers of
/// the event stream; override with `countable_type_threshold`.
pub const DEFAULT_COUNTABLE_TYPE_THRESHOLD: i32 = 15;

pub const DEFAULT_PARALLELISM: usize = 4;

pub const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 10000;

/// Where to start reading the input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    Latest,
    TrimHorizon,
    AtTimestamp,
}

impl StreamPosition {
    pub const ALL: [StreamPosition; 3] = [
        StreamPosition::Latest,
        StreamPosition::TrimHorizon,
        StreamPosition::AtTimestamp,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamPosition::Latest => "LATEST",
            StreamPosition::TrimHorizon => "TRIM_HORIZON",
            StreamPosition::AtTimestamp => "AT_TIMESTAMP",
        }
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "invalid stream position '{}', expected one of LATEST, TRIM_HORIZON, AT_TIMESTAMP",
                    s
                )
            })
    }
}

/// Input stream settings
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub stream_name: String,
    pub region: String,
    pub position: StreamPosition,
    /// Only set for `AT_TIMESTAMP`
    pub initial_timestamp: Option<DateTime<Utc>>,
}

/// Output sink settings shared by both channels
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub output_path: PathBuf,
    pub bucket_check_interval: StdDuration,
    pub rolling_interval: StdDuration,
    pub inactivity_interval: StdDuration,
}

/// Typed view of validated runtime parameters
#[derive(Debug, Clone)]
pub struct RuntimeProperties {
    pub debug_mode: bool,
    pub source: SourceSettings,
    pub session_gap: Duration,
    pub sink: SinkSettings,
    pub countable_type_threshold: i32,
    pub parallelism: usize,
    pub channel_buffer_size: usize,
}
