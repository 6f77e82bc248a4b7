pub mod rolling;
pub mod traits;

pub use rolling::{RollingFileSink, RollingPolicy, DEFAULT_MAX_PART_SIZE};
pub use traits::{LineSink, SinkError};

/// Subfolder receiving aggregated counter records
pub const COUNTERS_SUBFOLDER: &str = "counters";

/// Subfolder receiving informational events
pub const MESSAGES_SUBFOLDER: &str = "messages";
