use crate::config::expand_tilde;
use crate::config::types::{SourceSettings, StreamPosition};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Records longer than this are dropped
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads newline-delimited raw records from the input stream.
///
/// The stream is a file path, or `-` for stdin. In follow mode the reader
/// waits for appended lines at end of input instead of finishing.
pub struct StreamReader {
    stream_name: String,
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    follow: bool,
    /// Bytes of a line whose newline has not been read yet
    partial: Vec<u8>,
    max_record_len: usize,
    /// Skipping the rest of an oversized record
    discarding: bool,
    dropped: u64,
}

impl StreamReader {
    /// Open the stream and position it according to the settings
    pub async fn open(settings: &SourceSettings, follow: bool) -> Result<Self, ReaderError> {
        let input: Box<dyn AsyncBufRead + Unpin + Send> = if settings.stream_name == "-" {
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let path = expand_tilde(Path::new(&settings.stream_name));
            let mut file = tokio::fs::File::open(&path).await?;
            match settings.position {
                StreamPosition::Latest => {
                    let end = file.seek(SeekFrom::End(0)).await?;
                    debug!(offset = end, "Positioned at end of stream");
                }
                StreamPosition::TrimHorizon | StreamPosition::AtTimestamp => {}
            }
            Box::new(BufReader::new(file))
        };

        info!(
            stream = %settings.stream_name,
            region = %settings.region,
            position = %settings.position,
            follow,
            "Opened input stream"
        );

        Ok(Self {
            stream_name: settings.stream_name.clone(),
            input,
            follow,
            partial: Vec::new(),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            discarding: false,
            dropped: 0,
        })
    }

    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len.max(1);
        self
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Records dropped for being oversized or not valid UTF-8
    pub fn dropped_records(&self) -> u64 {
        self.dropped
    }

    /// Read the next non-blank record, or `None` at end of input.
    ///
    /// Malformed records are dropped and counted rather than failing the stream.
    pub async fn next_record(&mut self) -> Result<Option<String>, ReaderError> {
        loop {
            let available = self.input.fill_buf().await?;

            if available.is_empty() {
                if self.follow {
                    sleep(FOLLOW_POLL_INTERVAL).await;
                    continue;
                }
                if std::mem::take(&mut self.discarding) {
                    return Ok(None);
                }
                let tail = std::mem::take(&mut self.partial);
                return Ok(self.finish_record(tail));
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let taken = newline.map_or(available.len(), |i| i + 1);
            if !self.discarding {
                self.partial.extend_from_slice(&available[..taken]);
            }
            self.input.consume(taken);

            let terminator = usize::from(newline.is_some());
            if self.partial.len() > self.max_record_len + terminator {
                warn!(
                    stream = %self.stream_name,
                    max_bytes = self.max_record_len,
                    "Dropping oversized record"
                );
                self.partial.clear();
                self.discarding = true;
                self.dropped += 1;
            }

            if newline.is_none() {
                // Incomplete line; wait for the rest of it
                continue;
            }
            if std::mem::take(&mut self.discarding) {
                continue;
            }

            let record = std::mem::take(&mut self.partial);
            if let Some(record) = self.finish_record(record) {
                return Ok(Some(record));
            }
        }
    }

    fn finish_record(&mut self, bytes: Vec<u8>) -> Option<String> {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(stream = %self.stream_name, error = %e, "Dropping record that is not valid UTF-8");
                self.dropped += 1;
                return None;
            }
        };

        let record = text.trim_end_matches(&['\n', '\r'][..]);
        if record.trim().is_empty() {
            return None;
        }
        Some(record.to_string())
    }
}

/// Run the reader task, forwarding raw records until end of input or shutdown.
///
/// Returns the number of records forwarded.
pub async fn run_reader(
    mut reader: StreamReader,
    output: mpsc::Sender<String>,
    shutdown: CancellationToken,
) -> Result<u64, ReaderError> {
    let mut forwarded = 0u64;

    loop {
        let record = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, stopping reader");
                break;
            }
            record = reader.next_record() => record?,
        };

        let Some(record) = record else {
            info!(stream = %reader.stream_name(), "End of input stream");
            break;
        };

        if output.send(record).await.is_err() {
            warn!("Record channel closed");
            break;
        }
        forwarded += 1;
    }

    info!(
        records = forwarded,
        dropped = reader.dropped_records(),
        "Reader shutdown complete"
    );
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings(path: &Path, position: StreamPosition) -> SourceSettings {
        SourceSettings {
            stream_name: path.to_string_lossy().to_string(),
            region: "local".to_string(),
            position,
            initial_timestamp: None,
        }
    }

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    async fn read_all(reader: &mut StreamReader) -> Vec<String> {
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn test_trim_horizon_reads_everything() {
        let file = write_lines(&["first", "", "second\r", "  "]);
        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap();
        assert_eq!(read_all(&mut reader).await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_latest_skips_existing_records() {
        let file = write_lines(&["old-1", "old-2"]);
        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::Latest), false)
            .await
            .unwrap();
        assert!(read_all(&mut reader).await.is_empty());
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_emitted_at_eof() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "complete\nunterminated").unwrap();
        file.flush().unwrap();

        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap();
        assert_eq!(read_all(&mut reader).await, vec!["complete", "unterminated"]);
    }

    #[tokio::test]
    async fn test_follow_picks_up_appended_lines() {
        let file = write_lines(&["existing"]);
        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::Latest), true)
            .await
            .unwrap();

        let mut appender = std::fs::OpenOptions::new().append(true).open(file.path()).unwrap();
        writeln!(appender, "appended").unwrap();
        appender.flush().unwrap();

        let record = tokio::time::timeout(Duration::from_secs(5), reader.next_record())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record, Some("appended".to_string()));
    }

    #[tokio::test]
    async fn test_run_reader_forwards_and_stops_at_eof() {
        let file = write_lines(&["a", "b", "c"]);
        let reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(10);
        let forwarded = run_reader(reader, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(forwarded, 3);

        let mut received = Vec::new();
        while let Some(record) = rx.recv().await {
            received.push(record);
        }
        assert_eq!(received, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_run_reader_stops_on_shutdown() {
        let file = write_lines(&[]);
        let reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), true)
            .await
            .unwrap();

        let (tx, _rx) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_reader(reader, tx, shutdown.clone()));

        shutdown.cancel();
        let forwarded = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(forwarded, 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_record_is_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"type\":1,\"timestamp\":0}\n\xff\xfe bad\n{\"type\":2,\"timestamp\":1}\n")
            .unwrap();
        file.flush().unwrap();

        let reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::channel(10);
        let forwarded = run_reader(reader, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(forwarded, 2);

        let mut received = Vec::new();
        while let Some(record) = rx.recv().await {
            received.push(record);
        }
        assert_eq!(
            received,
            vec![r#"{"type":1,"timestamp":0}"#, r#"{"type":2,"timestamp":1}"#]
        );
    }

    #[tokio::test]
    async fn test_oversized_record_is_dropped() {
        let long = "x".repeat(64);
        let file = write_lines(&["short", &long, "after"]);
        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap()
            .with_max_record_len(16);

        assert_eq!(read_all(&mut reader).await, vec!["short", "after"]);
        assert_eq!(reader.dropped_records(), 1);
    }

    #[tokio::test]
    async fn test_unterminated_oversized_tail_is_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "ok\n{}", "y".repeat(64)).unwrap();
        file.flush().unwrap();

        let mut reader = StreamReader::open(&settings(file.path(), StreamPosition::TrimHorizon), false)
            .await
            .unwrap()
            .with_max_record_len(16);

        assert_eq!(read_all(&mut reader).await, vec!["ok"]);
        assert_eq!(reader.dropped_records(), 1);
    }

    #[tokio::test]
    async fn test_missing_stream_is_error() {
        let result = StreamReader::open(
            &settings(Path::new("/nonexistent/events.jsonl"), StreamPosition::TrimHorizon),
            false,
        )
        .await;
        assert!(matches!(result, Err(ReaderError::Io(_))));
    }
}
