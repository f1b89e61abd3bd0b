//! Filesystem-backed object store
//!
//! A directory tree stands in for the bucket. Presigned links point at the API's
//! `/objects/{key}` route and are checked with an HMAC signature.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use super::signer::UrlSigner;
use super::{validate_key, validate_prefix, ObjectStore};
use crate::error::{Error, Result};

/// Local object store rooted at a directory
pub struct LocalObjectStore {
    root: PathBuf,
    /// Base URL of the API serving `/objects`
    public_url: String,
    signer: UrlSigner,
}

impl LocalObjectStore {
    /// Create a store, creating the root directory if needed
    pub fn new(root: PathBuf, public_url: impl Into<String>, secret: &[u8]) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signer: UrlSigner::new(secret),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Presign relative to an explicit clock (unix seconds)
    pub fn presign_at(&self, key: &str, ttl: Duration, now: i64) -> Result<String> {
        validate_key(key)?;
        let expires = now + ttl.as_secs() as i64;
        let signature = self.signer.sign(key, expires);
        Ok(format!(
            "{}/objects/{}?expires={}&signature={}",
            self.public_url, key, expires, signature
        ))
    }

    /// Check a presigned link against an explicit clock (unix seconds)
    pub fn verify_at(&self, key: &str, expires: i64, signature: &str, now: i64) -> Result<()> {
        validate_key(key)?;
        self.signer.verify(key, expires, signature, now)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("Object not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, data: Vec<u8>, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Stored {}", key);
        Ok(())
    }

    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>> {
        validate_prefix(prefix)?;
        let dir = self.root.join(prefix);
        let mut names = BTreeSet::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.insert(entry.file_name().to_string_lossy().to_string());
            }
        }

        Ok(names)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let root = self.root.clone();
        let prefix = prefix.to_string();

        // Walk the deepest directory the prefix names, then filter on the full prefix
        let base = match prefix.rfind('/') {
            Some(pos) => root.join(&prefix[..pos]),
            None => root.clone(),
        };

        tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            if !base.is_dir() {
                return Ok(keys);
            }
            for entry in WalkDir::new(&base).into_iter() {
                let entry = entry.map_err(|e| Error::internal(format!("Walk failed: {}", e)))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        self.presign_at(key, ttl, Utc::now().timestamp())
    }

    async fn open_presigned(&self, key: &str, expires: i64, signature: &str) -> Result<Vec<u8>> {
        self.verify_at(key, expires, signature, Utc::now().timestamp())?;
        self.get(key).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.is_dir())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}
