//! Remote storage collaborator.
//!
//! Finalized archive files may be uploaded to an object store by an
//! external worker. This crate only ever deletes prefixes and streams files
//! back; the client itself is supplied by the embedding application.

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::Result;

/// A readable file with a known length.
pub struct Download {
    /// Length in bytes.
    pub length: u64,
    /// File contents.
    pub stream: Box<dyn AsyncRead + Send + Unpin>,
}

impl Download {
    /// Wrap a stream of known length.
    pub fn new(length: u64, stream: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            length,
            stream: Box::new(stream),
        }
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Object storage operations.
///
/// Prefixes are relative to the storage root and end with `/`
/// (e.g. `alice/web/`). Failures propagate unchanged; no retries.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Delete every object under `prefix`.
    async fn delete_dir(&self, prefix: &str) -> Result<()>;

    /// Stream the object at `location` (a URL such as `s3://bucket/key`).
    ///
    /// Returns `None` if the object does not exist.
    async fn download_stream(&self, location: &str) -> Result<Option<Download>>;
}

/// Remote storage for deployments without an object store.
///
/// Deletions are no-ops and downloads are never found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemoteStorage;

#[async_trait]
impl RemoteStorage for NoRemoteStorage {
    async fn delete_dir(&self, prefix: &str) -> Result<()> {
        debug!(prefix, "Remote storage disabled, skipping delete");
        Ok(())
    }

    async fn download_stream(&self, location: &str) -> Result<Option<Download>> {
        debug!(location, "Remote storage disabled, download not available");
        Ok(None)
    }
}
