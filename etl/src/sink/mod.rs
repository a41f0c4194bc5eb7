pub mod encoding;

use crate::models::{Artist, TrackRow};
use crate::storage::ObjectStorage;
use crate::transform::{TransformOutput, TransformReport};
use crate::utils::retry::retry_with_backoff;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::MinioConfig;
use common::{Error, Result};
use encoding::{ParquetRecord, decode_parquet, encode_parquet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const UPLOAD_RETRIES: u32 = 3;
const UPLOAD_BASE_DELAY_MS: u64 = 500;

/// Destination for the two output streams of a transform run.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write_artists(&self, artists: &[Artist]) -> Result<()>;
    async fn write_tracks(&self, tracks: &[TrackRow]) -> Result<()>;

    /// Called once both streams were written.
    async fn finish(&self, _report: &TransformReport) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OutputKeys {
    pub tracks: String,
    pub artists: String,
    pub marker: String,
}

impl From<&MinioConfig> for OutputKeys {
    fn from(minio: &MinioConfig) -> Self {
        Self {
            tracks: minio.tracks_key.clone(),
            artists: minio.artists_key.clone(),
            marker: minio.marker_key.clone(),
        }
    }
}

/// Written after both datasets so readers can tell a finished upload from
/// a partial one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMarker {
    pub created_at: DateTime<Utc>,
    pub tracks_key: String,
    pub artists_key: String,
    pub report: TransformReport,
}

/// Stores each output stream as one Parquet object.
pub struct ObjectSink {
    storage: Arc<dyn ObjectStorage>,
    keys: OutputKeys,
}

impl ObjectSink {
    pub fn new(storage: Arc<dyn ObjectStorage>, keys: OutputKeys) -> Self {
        Self { storage, keys }
    }

    async fn put_with_retry(&self, key: &str, data: &[u8]) -> Result<()> {
        retry_with_backoff(UPLOAD_RETRIES, UPLOAD_BASE_DELAY_MS, || {
            self.storage.put_object(key, data)
        })
        .await
    }

    pub async fn write_records<R: ParquetRecord>(&self, key: &str, records: &[R]) -> Result<()> {
        let buffer = encode_parquet(records)?;
        self.put_with_retry(key, &buffer).await?;
        info!(
            uri = %self.storage.object_uri(key),
            records = records.len(),
            bytes = buffer.len(),
            "Uploaded dataset"
        );
        Ok(())
    }

    pub async fn read_records<R: ParquetRecord>(&self, key: &str) -> Result<Vec<R>> {
        let data = self.storage.get_object(key).await?;
        let records = decode_parquet(data)?;
        info!(
            uri = %self.storage.object_uri(key),
            records = records.len(),
            "Downloaded dataset"
        );
        Ok(records)
    }

    pub async fn read_marker(&self) -> Result<RunMarker> {
        if !self.storage.check_file_exists(&self.keys.marker).await? {
            return Err(Error::Storage(format!(
                "No completed upload found at {}",
                self.storage.object_uri(&self.keys.marker)
            )));
        }
        let data = self.storage.get_object(&self.keys.marker).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Reads back both datasets of the last completed upload.
    pub async fn read_output(&self) -> Result<TransformOutput> {
        let marker = self.read_marker().await?;
        info!(created_at = %marker.created_at, "Found completed upload");

        let (tracks, artists) = futures::try_join!(
            self.read_records::<TrackRow>(&marker.tracks_key),
            self.read_records::<Artist>(&marker.artists_key),
        )?;
        Ok(TransformOutput {
            tracks,
            artists,
            report: marker.report,
        })
    }
}

#[async_trait]
impl RecordSink for ObjectSink {
    async fn write_artists(&self, artists: &[Artist]) -> Result<()> {
        self.write_records(&self.keys.artists, artists).await
    }

    async fn write_tracks(&self, tracks: &[TrackRow]) -> Result<()> {
        self.write_records(&self.keys.tracks, tracks).await
    }

    async fn finish(&self, report: &TransformReport) -> Result<()> {
        let marker = RunMarker {
            created_at: Utc::now(),
            tracks_key: self.keys.tracks.clone(),
            artists_key: self.keys.artists.clone(),
            report: report.clone(),
        };
        let marker_json = serde_json::to_vec_pretty(&marker)?;
        self.put_with_retry(&self.keys.marker, &marker_json).await?;
        info!(uri = %self.storage.object_uri(&self.keys.marker), "Marker file written");
        Ok(())
    }
}
