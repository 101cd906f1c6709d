use crate::errors::LogoStorageError;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

const UPLOAD_URL_TTL_SECS: u64 = 900;

/// Object storage for branding logos.
#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait LogoStorage: Send + Sync {
    /// Presigned PUT URL for `key`.
    async fn presign_upload(&self, key: &str, content_type: &str)
        -> Result<String, LogoStorageError>;
    async fn delete(&self, key: &str) -> Result<(), LogoStorageError>;
}

pub struct S3LogoStorage {
    client: S3Client,
    bucket: String,
}

impl S3LogoStorage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl LogoStorage for S3LogoStorage {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, LogoStorageError> {
        let presigning = aws_sdk_s3::presigning::PresigningConfig::expires_in(Duration::from_secs(
            UPLOAD_URL_TTL_SECS,
        ))
        .map_err(|e| LogoStorageError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| LogoStorageError::Presign(format!("{:?}", e)))?;

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), LogoStorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 delete_object failed for {}: {:?}", key, e);
                LogoStorageError::Delete(key.to_string())
            })?;
        Ok(())
    }
}
