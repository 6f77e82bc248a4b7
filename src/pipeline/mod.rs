pub mod channel;
pub mod partition;
pub mod route;
pub mod runner;
pub mod writer;

pub use channel::{create_channel, Receiver, Sender};
pub use partition::partition_for;
pub use route::{Classifier, Routed};
pub use runner::{
    run_partition_worker, run_pipeline, PipelineError, PipelineOutputs, PipelineSettings,
    PipelineStats, WorkerStats,
};
pub use writer::run_sink;
