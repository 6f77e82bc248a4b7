pub mod aggregator;
pub mod window;

pub use aggregator::{count_window, SessionAggregator};
pub use window::{OpenWindow, Transition};
