use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid presigning configuration: {0}")]
    Config(String),
    #[error("failed to presign upload for {bucket}/{key}: {message}")]
    Presign {
        bucket: String,
        key: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    pub url: String,
    pub method: String,
    pub expires_in: Duration,
    pub headers: BTreeMap<String, String>,
}

/// Hands out time-limited URLs a client can upload an object to directly.
#[async_trait]
pub trait UploadUrlSigner: Send + Sync {
    async fn presign_put(&self, bucket: &str, key: &str) -> Result<PresignedUpload, StorageError>;
}

pub struct S3Presigner {
    client: aws_sdk_s3::Client,
    expires_in: Duration,
}

impl S3Presigner {
    pub fn new(client: aws_sdk_s3::Client, expires_in: Duration) -> Self {
        Self { client, expires_in }
    }
}

// Single PUT uploads only. Large objects need the multipart API, which has no
// presigned form.
#[async_trait]
impl UploadUrlSigner for S3Presigner {
    async fn presign_put(&self, bucket: &str, key: &str) -> Result<PresignedUpload, StorageError> {
        let presigning = PresigningConfig::expires_in(self.expires_in)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: e.into_service_error().to_string(),
            })?;

        Ok(PresignedUpload {
            url: request.uri().to_string(),
            method: request.method().to_string(),
            expires_in: self.expires_in,
            headers: request
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })
    }
}
