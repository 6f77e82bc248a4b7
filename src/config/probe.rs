use crate::config::expand_tilde;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Existence and access checks against the pipeline's external resources.
///
/// Implementations may fail with connectivity or permission errors; callers
/// treat any error as "does not exist or is inaccessible".
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// The output location exists and can be written to
    async fn destination_writable(&self, region: &str, path: &str) -> Result<bool, ProbeError>;

    /// The input stream exists and can be read from
    async fn source_readable(&self, region: &str, stream_name: &str) -> Result<bool, ProbeError>;
}

/// Probe for the local file-backed source and sink.
///
/// The destination must be an existing directory that accepts a new file. The
/// source must be `-` (stdin) or an existing readable file. Region is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemProbe;

#[async_trait]
impl ResourceProbe for FilesystemProbe {
    async fn destination_writable(&self, _region: &str, path: &str) -> Result<bool, ProbeError> {
        let dir = expand_tilde(Path::new(path));
        let metadata = match tokio::fs::metadata(&dir).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Ok(false);
        }

        let probe_file = dir.join(format!(".eventcount-probe-{}", Uuid::new_v4()));
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe_file)
            .await?;
        tokio::fs::remove_file(&probe_file).await?;

        Ok(true)
    }

    async fn source_readable(&self, _region: &str, stream_name: &str) -> Result<bool, ProbeError> {
        if stream_name == "-" {
            return Ok(true);
        }

        let path = expand_tilde(Path::new(stream_name));
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(file.metadata().await?.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
