use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use bytes::Bytes;
use common::{Error, Result};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::storage::S3Manager;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    fn bucket(&self) -> &str;

    fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket(), key.trim_start_matches('/'))
    }
}

fn storage_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    match err {
        SdkError::ServiceError(err) => Error::Storage(err.into_err().to_string()),
        other => Error::Storage(other.to_string()),
    }
}

fn content_type(key: &str) -> &'static str {
    if key.ends_with(".parquet") {
        "application/vnd.apache.parquet"
    } else if key.ends_with(".json") || key.ends_with("_SUCCESS") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

/// Single-bucket [`ObjectStorage`] on top of the AWS SDK.
pub struct S3Storage {
    bucket: String,
    client: Arc<S3Client>,
}

impl S3Storage {
    pub async fn new(s3_manager: Arc<S3Manager>, bucket: &str) -> Result<Self> {
        let client = s3_manager.get_client(bucket).await?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        debug!(bucket = %self.bucket, key, bytes = data.len(), "Uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type(key))
            .body(Bytes::copy_from_slice(data).into())
            .send()
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) if err.err().is_no_such_key() => Error::Storage(
                    format!("Object {} not found in bucket {}", key, self.bucket),
                ),
                other => storage_error(other),
            })?;

        let data = response.body.collect().await?.into_bytes().to_vec();
        debug!(bucket = %self.bucket, key, bytes = data.len(), "Downloaded object");

        Ok(data)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
