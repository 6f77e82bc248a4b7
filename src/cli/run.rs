use crate::config::parse::{apply_overrides, load_properties, ConfigError};
use crate::config::{
    resolve_config_path, FilesystemProbe, Properties, PropertyValidator, ResourceProbe,
    RuntimeProperties,
};
use crate::pipeline::{
    create_channel, run_pipeline, run_sink, PipelineError, PipelineOutputs, PipelineSettings,
    PipelineStats,
};
use crate::sink::{RollingFileSink, RollingPolicy, COUNTERS_SUBFOLDER, MESSAGES_SUBFOLDER};
use crate::source::{run_reader, ReaderError, StreamReader};
use std::path::PathBuf;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("properties file not found; searched ~/.config/eventcount/properties.yml and /etc/eventcount/properties.yml (use --config <path> or run 'eventcount config init')")]
    ConfigNotFound,

    #[error("runtime properties are invalid:\n{}", .0.join("\n"))]
    InvalidProperties(Vec<String>),

    #[error("not configured to run in local execution mode; refusing to start (use --execution-mode distributed on a managed deployment)")]
    LocalExecution,

    #[error("source reader error: {0}")]
    SourceReader(#[from] ReaderError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Execution context the job was launched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutionMode {
    Local,
    Distributed,
}

/// Refuse to start outside a distributed deployment
pub fn ensure_distributed(mode: ExecutionMode) -> Result<(), RunError> {
    match mode {
        ExecutionMode::Distributed => Ok(()),
        ExecutionMode::Local => Err(RunError::LocalExecution),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub execution_mode: ExecutionMode,
    /// Keep waiting for new input at end of stream
    pub follow: bool,
}

/// Load the properties file and apply command-line overrides
pub fn load_runtime_properties(
    config_path: Option<PathBuf>,
    overrides: &[String],
) -> Result<Properties, RunError> {
    let path = resolve_config_path(config_path.as_deref()).ok_or(RunError::ConfigNotFound)?;
    info!(config_path = %path.display(), "Loading runtime properties");

    let mut properties = load_properties(&path)?;
    apply_overrides(&mut properties, overrides)?;
    Ok(properties)
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: &[String],
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_distributed(options.execution_mode)?;

    let properties = load_runtime_properties(config_path, overrides)?;

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    run_job(&properties, options, &FilesystemProbe, shutdown).await?;
    Ok(())
}

/// Validate the properties and run the job until the input ends or `shutdown`
/// is cancelled.
pub async fn run_job(
    properties: &Properties,
    options: RunOptions,
    probe: &dyn ResourceProbe,
    shutdown: CancellationToken,
) -> Result<PipelineStats, RunError> {
    ensure_distributed(options.execution_mode)?;

    let report = PropertyValidator::new(probe).validate(properties).await;
    if !report.is_valid() {
        return Err(RunError::InvalidProperties(report.failures));
    }
    let runtime = RuntimeProperties::from_properties(properties)?;

    let buffer_size = runtime.channel_buffer_size;
    let (raw_tx, raw_rx) = create_channel::<String>(buffer_size);
    let (counters_tx, counters_rx) = create_channel::<String>(buffer_size);
    let (messages_tx, messages_rx) = create_channel::<String>(buffer_size);

    let reader = StreamReader::open(&runtime.source, options.follow).await?;
    info!("Input stream source created");

    let policy = RollingPolicy::from_settings(&runtime.sink);
    let check_interval = runtime.sink.bucket_check_interval;

    let counters_sink = RollingFileSink::new(&runtime.sink.output_path, COUNTERS_SUBFOLDER, policy);
    let counters_handle = tokio::spawn(run_sink("counters", counters_rx, counters_sink, check_interval));
    info!("Counters sink added");

    let messages_sink = RollingFileSink::new(&runtime.sink.output_path, MESSAGES_SUBFOLDER, policy);
    let messages_handle = tokio::spawn(run_sink("messages", messages_rx, messages_sink, check_interval));
    info!("Messages sink added");

    let reader_handle = tokio::spawn(run_reader(reader, raw_tx, shutdown.clone()));

    let outputs = PipelineOutputs {
        counters: counters_tx,
        messages: messages_tx,
    };
    let pipeline_result = run_pipeline(raw_rx, outputs, PipelineSettings::from(&runtime), shutdown.clone()).await;
    if let Err(e) = &pipeline_result {
        error!(error = %e, "Pipeline failed, stopping");
        shutdown.cancel();
    }

    let reader_result = reader_handle.await?;
    if let Err(e) = &reader_result {
        error!(error = %e, "Reader task error");
    }

    let counters_written = counters_handle.await??;
    let messages_written = messages_handle.await??;

    let records = reader_result?;
    let stats = pipeline_result?;
    info!(
        records,
        counters = counters_written,
        messages = messages_written,
        "Job shutdown complete"
    );

    Ok(stats)
}
