//! Object store client for raw PDFs and derived markdown
//!
//! Implementations:
//! - `LocalObjectStore`: directory tree on disk, presigned links served by the API
//! - `GcsObjectStore`: Google Cloud Storage (feature `gcp`)

mod local;
mod signer;

#[cfg(feature = "gcp")]
mod gcs;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub use local::LocalObjectStore;
pub use signer::UrlSigner;

#[cfg(feature = "gcp")]
pub use gcs::GcsObjectStore;

/// Trait for bucket-style object storage
///
/// Every call is a remote operation in production; no retries are layered on top
/// of whatever the provider SDK already does.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object is stored at `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read an object, failing with `NotFound` if it is absent
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Copy an object into `dir` and return the local path
    async fn download(&self, key: &str, dir: &Path) -> Result<PathBuf> {
        let data = self.get(key).await?;
        let filename = key.rsplit('/').next().unwrap_or(key);
        let path = dir.join(filename);
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Downloaded {} to {}", key, path.display());
        Ok(path)
    }

    /// Store an object, silently replacing any previous one
    async fn put(&self, data: Vec<u8>, key: &str) -> Result<()>;

    /// Names of the immediate "directories" below `prefix`
    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>>;

    /// All object keys below `prefix`, sorted
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Time-limited download URL
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Serve an object through a presigned link handed out by `presign`
    ///
    /// Only stores whose links point back at this service implement it.
    async fn open_presigned(&self, _key: &str, _expires: i64, _signature: &str) -> Result<Vec<u8>> {
        Err(Error::not_found(format!(
            "Presigned downloads are served directly by the {} store",
            self.name()
        )))
    }

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Reject keys that would escape the bucket layout
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(Error::validation(format!("Invalid object key '{}'", key)));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(Error::validation(format!("Invalid object key '{}'", key)));
    }
    Ok(())
}

/// Like `validate_key`, but allows the empty prefix and a trailing slash
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    if trimmed.is_empty() {
        return Ok(());
    }
    validate_key(trimmed)
}
