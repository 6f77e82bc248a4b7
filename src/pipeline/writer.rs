use crate::pipeline::runner::PipelineError;
use crate::sink::LineSink;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Run a sink writer task.
///
/// Writes every received line and checks the sink's rollover rules every
/// `check_interval`. The sink is closed once the input channel closes.
/// Returns the number of lines written.
pub async fn run_sink<S: LineSink>(
    name: &'static str,
    mut input: mpsc::Receiver<String>,
    mut sink: S,
    check_interval: Duration,
) -> Result<u64, PipelineError> {
    let mut written = 0u64;
    let mut check = tokio::time::interval(check_interval);

    info!(sink = name, "Sink writer started");

    loop {
        tokio::select! {
            line = input.recv() => {
                match line {
                    Some(line) => {
                        sink.write_line(&line).await?;
                        written += 1;
                    }
                    None => {
                        info!(sink = name, "Input channel closed, finalizing output");
                        break;
                    }
                }
            }

            _ = check.tick() => {
                sink.check_rollover(Utc::now()).await?;
                debug!(sink = name, "Checked rollover");
            }
        }
    }

    sink.close().await?;
    info!(sink = name, lines = written, "Sink writer shutdown complete");

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        lines: Vec<String>,
        checks: usize,
        closed: bool,
    }

    struct RecordingSink(Arc<Mutex<Recorded>>);

    #[async_trait]
    impl LineSink for RecordingSink {
        async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
            self.0.lock().unwrap().lines.push(line.to_string());
            Ok(())
        }

        async fn check_rollover(&mut self, _now: DateTime<Utc>) -> Result<(), SinkError> {
            self.0.lock().unwrap().checks += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LineSink for FailingSink {
        async fn write_line(&mut self, _line: &str) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }

        async fn check_rollover(&mut self, _now: DateTime<Utc>) -> Result<(), SinkError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_lines_and_closes() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (tx, rx) = mpsc::channel(10);

        let handle = tokio::spawn(run_sink(
            "messages",
            rx,
            RecordingSink(recorded.clone()),
            Duration::from_millis(10),
        ));

        tx.send("one".to_string()).await.unwrap();
        tx.send("two".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap().unwrap(), 2);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.lines, vec!["one", "two"]);
        assert!(recorded.checks >= 1);
        assert!(recorded.closed);
    }

    #[tokio::test]
    async fn test_sink_failure_stops_writer() {
        let (tx, rx) = mpsc::channel(10);
        tx.send("one".to_string()).await.unwrap();

        let result = run_sink("counters", rx, FailingSink, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(PipelineError::Sink(SinkError::Closed))));
    }
}
