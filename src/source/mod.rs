pub mod reader;

pub use reader::{run_reader, ReaderError, StreamReader};
