use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;

use crate::errors::AppError;

/// Exchanges a storage key for a short-lived download link. Links are never persisted.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign_download(&self, key: &str) -> Result<String, AppError>;
}

/// Presigns `GetObject` requests against the resource bucket.
#[derive(Clone)]
pub struct S3UrlSigner {
    client: S3Client,
    bucket: String,
    ttl: Duration,
}

impl S3UrlSigner {
    pub fn new(client: S3Client, bucket: String, ttl: Duration) -> Self {
        Self { client, bucket, ttl }
    }
}

#[async_trait]
impl UrlSigner for S3UrlSigner {
    async fn sign_download(&self, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(self.ttl)
            .map_err(|e| AppError::Storage(format!("invalid presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::Storage(format!("failed to presign s3://{}/{key}: {e}", self.bucket))
            })?;

        Ok(request.uri().to_string())
    }
}
