pub mod cli;
pub mod config;
pub mod event;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod source;
