pub mod s3;

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use common::config::MinioConfig;
use common::{Error, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

pub use s3::{ObjectStorage, S3Storage};

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Config {
    /// Empty keys mean "use the default AWS credential chain".
    fn has_static_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl TryFrom<&MinioConfig> for S3Config {
    type Error = Error;

    fn try_from(minio: &MinioConfig) -> Result<Self> {
        let endpoint = Url::parse(&minio.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::InvalidUri(format!(
                "Endpoint '{}' must use http or https",
                minio.endpoint
            )));
        }

        Ok(Self {
            endpoint: minio.endpoint.clone(),
            region: minio.region.clone(),
            access_key: minio.access_key.clone(),
            secret_key: minio.secret_key.clone(),
        })
    }
}

/// Builds and caches one path-style client per bucket.
#[derive(Clone)]
pub struct S3Manager {
    pub config: S3Config,
    client_cache: Arc<dashmap::DashMap<String, Arc<S3Client>>>,
}

impl S3Manager {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client_cache: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub async fn get_client(&self, bucket: &str) -> Result<Arc<S3Client>> {
        if let Some(client) = self.client_cache.get(bucket) {
            return Ok(client.clone());
        }

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&self.config.endpoint)
            .region(Region::new(self.config.region.clone()))
            .force_path_style(true);

        if self.config.has_static_credentials() {
            builder = builder.credentials_provider(Credentials::new(
                &self.config.access_key,
                &self.config.secret_key,
                None,
                None,
                "static",
            ));
        } else {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(self.config.region.clone()))
                .load()
                .await;
            if let Some(provider) = shared.credentials_provider() {
                builder = builder.credentials_provider(provider);
            }
        }

        let client = Arc::new(aws_sdk_s3::Client::from_conf(builder.build()));
        self.client_cache.insert(bucket.to_string(), client.clone());
        Ok(client)
    }

    /// Verifies that a bucket exists and is accessible
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        let client = self.get_client(bucket).await?;

        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, endpoint = %self.config.endpoint, "Bucket is reachable");
                Ok(())
            }
            Err(e) => Err(Error::Storage(format!(
                "Cannot access bucket '{}': {}",
                bucket, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minio(endpoint: &str) -> MinioConfig {
        MinioConfig {
            endpoint: endpoint.to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".to_string(),
            bucket: "spotify".to_string(),
            tracks_key: "spotify/tracks.parquet".to_string(),
            artists_key: "spotify/artists.parquet".to_string(),
            marker_key: "spotify/_SUCCESS".to_string(),
        }
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(S3Config::try_from(&minio("http://localhost:9000")).is_ok());
        assert!(matches!(
            S3Config::try_from(&minio("localhost:9000")),
            Err(Error::InvalidUri(_))
        ));
        assert!(matches!(
            S3Config::try_from(&minio("not a url")),
            Err(Error::InvalidUri(_))
        ));
    }

    #[test]
    fn test_static_credentials_detection() {
        let mut config = S3Config::try_from(&minio("http://localhost:9000")).unwrap();
        assert!(!config.has_static_credentials());
        config.access_key = "minio".to_string();
        config.secret_key = "minio123".to_string();
        assert!(config.has_static_credentials());
    }
}
