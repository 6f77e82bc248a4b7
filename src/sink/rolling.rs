use crate::config::types::SinkSettings;
use crate::sink::traits::{LineSink, SinkError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Parts are rolled once they reach this many bytes
pub const DEFAULT_MAX_PART_SIZE: u64 = 128 * 1024 * 1024;

const BUCKET_FORMAT: &str = "%Y-%m-%d--%H";

/// When an in-progress part file is finalized
#[derive(Debug, Clone, Copy)]
pub struct RollingPolicy {
    /// Maximum age of a part
    pub rollover_interval: Duration,
    /// Maximum time without writes
    pub inactivity_interval: Duration,
    /// Maximum part size in bytes
    pub max_part_size: u64,
}

impl RollingPolicy {
    pub fn from_settings(settings: &SinkSettings) -> Self {
        Self {
            rollover_interval: settings.rolling_interval,
            inactivity_interval: settings.inactivity_interval,
            max_part_size: DEFAULT_MAX_PART_SIZE,
        }
    }

    fn expired(&self, part: &InProgressPart, now: DateTime<Utc>) -> bool {
        let elapsed = |since: DateTime<Utc>| (now - since).to_std().unwrap_or(Duration::ZERO);
        elapsed(part.opened_at) >= self.rollover_interval
            || elapsed(part.last_write) >= self.inactivity_interval
    }
}

struct InProgressPart {
    bucket: String,
    in_progress_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<File>,
    opened_at: DateTime<Utc>,
    last_write: DateTime<Utc>,
    size: u64,
}

/// Writes lines into hourly bucket directories under a base path.
///
/// Lines go to a hidden `.inprogress` part file that is renamed to its final
/// name when the policy rolls it, when the hour bucket changes, or on close.
pub struct RollingFileSink {
    base_path: PathBuf,
    policy: RollingPolicy,
    part_prefix: String,
    part_counter: u64,
    current: Option<InProgressPart>,
    finalized_parts: Vec<PathBuf>,
    closed: bool,
}

impl RollingFileSink {
    /// Create a sink writing under `<output_path>/<subfolder>`
    pub fn new(output_path: &Path, subfolder: &str, policy: RollingPolicy) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        let instance = Uuid::new_v4().simple().to_string();

        let base_path = output_path.join(subfolder);
        info!(path = %base_path.display(), "Creating rolling file sink");

        Self {
            base_path,
            policy,
            part_prefix: format!("part-{}-{}", host, &instance[..8]),
            part_counter: 0,
            current: None,
            finalized_parts: Vec::new(),
            closed: false,
        }
    }

    /// Paths of every part finalized so far
    pub fn finalized_parts(&self) -> &[PathBuf] {
        &self.finalized_parts
    }

    /// Write a line as of `now`
    pub async fn write_line_at(&mut self, line: &str, now: DateTime<Utc>) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }

        let bucket = now.format(BUCKET_FORMAT).to_string();
        let must_roll = self.current.as_ref().is_some_and(|part| {
            part.bucket != bucket || part.size >= self.policy.max_part_size
        });
        if must_roll {
            self.roll().await?;
        }

        if self.current.is_none() {
            self.current = Some(self.open_part(bucket, now).await?);
        }

        if let Some(part) = self.current.as_mut() {
            part.writer.write_all(line.as_bytes()).await?;
            part.writer.write_all(b"\n").await?;
            part.size += line.len() as u64 + 1;
            part.last_write = now;
        }

        Ok(())
    }

    /// Roll the current part if its age or inactivity exceeds the policy
    pub async fn check_rollover_at(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|part| self.policy.expired(part, now));
        if expired {
            self.roll().await?;
        } else if let Some(part) = self.current.as_mut() {
            part.writer.flush().await?;
        }
        Ok(())
    }

    async fn open_part(&mut self, bucket: String, now: DateTime<Utc>) -> Result<InProgressPart, SinkError> {
        let dir = self.base_path.join(&bucket);
        fs::create_dir_all(&dir).await?;

        let name = format!("{}-{}", self.part_prefix, self.part_counter);
        self.part_counter += 1;

        let in_progress_path = dir.join(format!(".{}.inprogress", name));
        let final_path = dir.join(name);
        let file = File::create(&in_progress_path).await?;

        debug!(path = %in_progress_path.display(), "Opened part file");

        Ok(InProgressPart {
            bucket,
            in_progress_path,
            final_path,
            writer: BufWriter::new(file),
            opened_at: now,
            last_write: now,
            size: 0,
        })
    }

    async fn roll(&mut self) -> Result<(), SinkError> {
        let Some(mut part) = self.current.take() else {
            return Ok(());
        };

        part.writer.flush().await?;
        drop(part.writer);
        fs::rename(&part.in_progress_path, &part.final_path).await?;

        debug!(path = %part.final_path.display(), bytes = part.size, "Finalized part file");
        self.finalized_parts.push(part.final_path);
        Ok(())
    }
}

#[async_trait]
impl LineSink for RollingFileSink {
    async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.write_line_at(line, Utc::now()).await
    }

    async fn check_rollover(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        self.check_rollover_at(now).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.roll().await?;
        self.closed = true;
        Ok(())
    }
}
