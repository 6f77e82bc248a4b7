use crate::config::types::RuntimeProperties;
use crate::event::{decode_event, LogEvent};
use crate::pipeline::channel::create_channel;
use crate::pipeline::partition::partition_for;
use crate::pipeline::route::{Classifier, Routed};
use crate::session::SessionAggregator;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur during pipeline operation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("output channel '{0}' closed")]
    ChannelSend(&'static str),

    #[error("sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Settings for the classify/aggregate stages
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub debug_mode: bool,
    pub classifier: Classifier,
    pub session_gap: Duration,
    pub parallelism: usize,
    pub buffer_size: usize,
    /// Events whose own timestamp is earlier than this are skipped
    pub start_after: Option<DateTime<Utc>>,
}

impl From<&RuntimeProperties> for PipelineSettings {
    fn from(properties: &RuntimeProperties) -> Self {
        Self {
            debug_mode: properties.debug_mode,
            classifier: Classifier::new(properties.countable_type_threshold),
            session_gap: properties.session_gap,
            parallelism: properties.parallelism,
            buffer_size: properties.channel_buffer_size,
            start_after: properties.source.initial_timestamp,
        }
    }
}

/// Formatted output lines for the two sinks
pub struct PipelineOutputs {
    pub counters: mpsc::Sender<String>,
    pub messages: mpsc::Sender<String>,
}

/// Counters reported when the pipeline stops
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_received: u64,
    pub decode_failures: u64,
    pub skipped_before_start: u64,
    pub informational: u64,
    pub countable: u64,
    pub windows_emitted: u64,
    pub windows_discarded: u64,
}

/// Counters reported by one partition worker
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub windows_emitted: u64,
    pub windows_discarded: u64,
}

/// Run the decode, classify and aggregate stages.
///
/// Raw records are decoded (undecodable records are dropped), routed by the
/// classifier, and either rendered onto the messages output or handed to the
/// partition worker owning their type. Runs until the input closes or
/// `shutdown` is cancelled. Windows still open at that point are discarded.
pub async fn run_pipeline(
    mut input: mpsc::Receiver<String>,
    outputs: PipelineOutputs,
    settings: PipelineSettings,
    shutdown: CancellationToken,
) -> Result<PipelineStats, PipelineError> {
    let partitions = settings.parallelism.max(1);
    let mut stats = PipelineStats::default();

    let mut workers = Vec::with_capacity(partitions);
    let mut handles = Vec::with_capacity(partitions);
    for partition in 0..partitions {
        let (tx, rx) = create_channel::<LogEvent>(settings.buffer_size);
        let aggregator = SessionAggregator::new(settings.session_gap, settings.debug_mode);
        let output = outputs.counters.clone();
        let worker_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            run_partition_worker(partition, rx, output, aggregator, worker_shutdown).await
        }));
        workers.push(tx);
    }
    drop(outputs.counters);

    info!(
        partitions,
        threshold = settings.classifier.threshold(),
        gap_seconds = settings.session_gap.num_seconds(),
        "Pipeline started"
    );

    let routed = route_records(&mut input, &workers, &outputs.messages, &settings, &mut stats, &shutdown).await;

    // Closing the worker channels stops the workers
    drop(workers);

    for handle in join_all(handles).await {
        let worker_stats = handle??;
        stats.windows_emitted += worker_stats.windows_emitted;
        stats.windows_discarded += worker_stats.windows_discarded;
    }

    routed?;

    info!(
        records_received = stats.records_received,
        decode_failures = stats.decode_failures,
        skipped_before_start = stats.skipped_before_start,
        informational = stats.informational,
        countable = stats.countable,
        windows_emitted = stats.windows_emitted,
        windows_discarded = stats.windows_discarded,
        "Pipeline shutdown complete"
    );

    Ok(stats)
}

async fn route_records(
    input: &mut mpsc::Receiver<String>,
    workers: &[mpsc::Sender<LogEvent>],
    messages: &mpsc::Sender<String>,
    settings: &PipelineSettings,
    stats: &mut PipelineStats,
    shutdown: &CancellationToken,
) -> Result<(), PipelineError> {
    loop {
        let raw = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, stopping router");
                break;
            }
            raw = input.recv() => match raw {
                Some(raw) => raw,
                None => {
                    info!("Input channel closed");
                    break;
                }
            },
        };
        stats.records_received += 1;

        if settings.debug_mode {
            info!(record = %raw, "Parsing record");
        }

        let event = match decode_event(&raw) {
            Ok(event) => event,
            Err(e) => {
                stats.decode_failures += 1;
                if settings.debug_mode {
                    info!(record = %raw, error = %e, "Parsing error, dropping record");
                }
                continue;
            }
        };

        if let Some(start) = settings.start_after {
            if event.event_time().map_or(true, |at| at < start) {
                stats.skipped_before_start += 1;
                continue;
            }
        }

        match settings.classifier.classify(event) {
            Routed::Informational(event) => {
                stats.informational += 1;
                if messages.send(event.to_string()).await.is_err() {
                    return Err(PipelineError::ChannelSend("messages"));
                }
            }
            Routed::Countable(event) => {
                stats.countable += 1;
                let partition = partition_for(event.event_type, workers.len());
                if workers[partition].send(event).await.is_err() {
                    return Err(PipelineError::ChannelSend("partition"));
                }
            }
        }
    }

    Ok(())
}

/// Run one partition worker.
///
/// The worker exclusively owns the session windows of every type routed to
/// it. Arrival time is taken when an event is received, and each open window's
/// inactivity timer is armed from the aggregator's earliest deadline.
pub async fn run_partition_worker(
    partition: usize,
    mut input: mpsc::Receiver<LogEvent>,
    output: mpsc::Sender<String>,
    mut aggregator: SessionAggregator,
    shutdown: CancellationToken,
) -> Result<WorkerStats, PipelineError> {
    debug!(partition, "Partition worker started");

    loop {
        let timer = sleep_until(aggregator.next_deadline());

        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = input.recv() => {
                let Some(event) = event else {
                    break;
                };
                let now = Utc::now();
                let mut closed = aggregator.fire_due(now);
                closed.extend(aggregator.observe(event, now));
                emit(&output, closed).await?;
            }
            _ = timer => {
                let closed = aggregator.fire_due(Utc::now());
                emit(&output, closed).await?;
            }
        }
    }

    let windows_discarded = aggregator.discard_open() as u64;
    if windows_discarded > 0 {
        warn!(partition, windows_discarded, "Discarding open session windows at shutdown");
    }
    debug!(partition, "Partition worker stopped");

    Ok(WorkerStats {
        windows_emitted: aggregator.windows_emitted(),
        windows_discarded,
    })
}

async fn emit(
    output: &mpsc::Sender<String>,
    records: Vec<crate::event::CounterRecord>,
) -> Result<(), PipelineError> {
    for record in records {
        if output.send(record.to_string()).await.is_err() {
            return Err(PipelineError::ChannelSend("counters"));
        }
    }
    Ok(())
}

/// Sleep until a wall-clock deadline, or forever when there is none
async fn sleep_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(deadline) => {
            let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending::<()>().await,
    }
}
