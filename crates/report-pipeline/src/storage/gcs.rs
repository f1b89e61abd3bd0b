//! Google Cloud Storage object store
//!
//! Keeps the bucket layout of the local store; presigned links are V4 signed URLs
//! produced by the SDK from the service account credentials.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::sign::{SignedURLMethod, SignedURLOptions};

use super::{validate_key, validate_prefix, ObjectStore};
use crate::error::{Error, Result};

/// Google Cloud Storage bucket
pub struct GcsObjectStore {
    client: GcsClient,
    bucket: String,
}

impl GcsObjectStore {
    /// Connect using application default credentials
    pub async fn new(bucket: String) -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| Error::Config(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
            bucket,
        })
    }

    fn is_not_found(err: &GcsError) -> bool {
        matches!(err, GcsError::Response(resp) if resp.code == 404)
    }

    fn upstream(action: &str, err: GcsError) -> Error {
        Error::upstream("Cloud Storage", format!("{}: {}", action, err))
    }

    /// Page through a listing, collecting prefixes and object names
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<(Vec<String>, Vec<String>)> {
        let mut prefixes = Vec::new();
        let mut names = Vec::new();
        let mut page_token = None;

        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: Some(prefix.to_string()),
                delimiter: delimiter.map(str::to_string),
                page_token: page_token.take(),
                ..Default::default()
            };

            let response = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| Self::upstream("list objects", e))?;

            prefixes.extend(response.prefixes.unwrap_or_default());
            names.extend(response.items.unwrap_or_default().into_iter().map(|o| o.name));

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok((prefixes, names))
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(Self::upstream("head object", e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: key.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    Error::not_found(format!("Object not found: gs://{}/{}", self.bucket, key))
                } else {
                    Self::upstream("download object", e)
                }
            })
    }

    async fn put(&self, data: Vec<u8>, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut media = Media::new(key.to_string());
        media.content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string()
            .into();

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| Self::upstream("upload object", e))?;

        tracing::debug!("Uploaded gs://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn list_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>> {
        validate_prefix(prefix)?;
        let (prefixes, _) = self.list(prefix, Some("/")).await?;

        Ok(prefixes
            .into_iter()
            .filter_map(|p| {
                p.strip_prefix(prefix)
                    .map(|rest| rest.trim_end_matches('/').to_string())
            })
            .filter(|name| !name.is_empty())
            .collect())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let (_, mut names) = self.list(prefix, None).await?;
        names.sort();
        Ok(names)
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        validate_key(key)?;
        self.client
            .signed_url(
                &self.bucket,
                key,
                None,
                None,
                SignedURLOptions {
                    method: SignedURLMethod::GET,
                    expires: ttl,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Error::upstream("Cloud Storage", format!("sign URL: {}", e)))
    }

    async fn health_check(&self) -> Result<bool> {
        let request = ListObjectsRequest {
            bucket: self.bucket.clone(),
            max_results: Some(1),
            ..Default::default()
        };

        self.client
            .list_objects(&request)
            .await
            .map(|_| true)
            .map_err(|e| Self::upstream("health check", e))
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
