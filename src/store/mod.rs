//! Presigned-URL provisioning against the remote object store.
//!
//! URL generation sits behind the [`UrlProvisioner`] trait so stages can be
//! driven by a stub in tests. The production implementation asks S3 for a
//! time-bounded GET URL per object key; a failed provisioning attempt only
//! affects that key, never the batch.

use crate::config::StoreConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::debug;

/// Provisioning errors
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Requested URL lifetime could not be expressed
    #[error("presigning configuration error: {0}")]
    ConfigurationError(String),

    /// Store rejected or failed the presigning request
    #[error("store error: {0}")]
    StoreError(String),
}

/// Source of time-bounded fetch URLs, one per object key
#[async_trait]
pub trait UrlProvisioner: Send + Sync {
    /// Obtain a presigned GET URL for `key`.
    ///
    /// The returned URL must be consumed before the configured expiry or
    /// the subsequent fetch fails.
    async fn provision(&self, key: &str) -> Result<String, ProvisionError>;
}

/// Presigned-URL provisioner backed by an S3 bucket
pub struct S3UrlProvisioner {
    client: Client,
    bucket: String,
    expiry: Duration,
}

impl S3UrlProvisioner {
    /// Build a provisioner from store configuration
    pub fn new(store: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            store.access_key.clone(),
            store.secret_key.clone(),
            None,
            None,
            "pipeline-config",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(store.region.clone()))
            .credentials_provider(credentials)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: store.bucket.clone(),
            expiry: store.url_expiry(),
        }
    }
}

#[async_trait]
impl UrlProvisioner for S3UrlProvisioner {
    async fn provision(&self, key: &str) -> Result<String, ProvisionError> {
        let presigning = PresigningConfig::expires_in(self.expiry)
            .map_err(|e| ProvisionError::ConfigurationError(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| ProvisionError::StoreError(e.to_string()))?;

        debug!(key, "Generated presigned URL");
        Ok(request.uri().to_string())
    }
}
