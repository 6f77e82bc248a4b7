pub mod decode;
pub mod model;

pub use decode::{decode_event, DecodeError};
pub use model::{render_calendar, CounterRecord, LogEvent, CALENDAR_FORMAT};
