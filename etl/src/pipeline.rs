use crate::acquire::KaggleDownloader;
use crate::load::PostgresLoader;
use crate::sink::{ObjectSink, OutputKeys, RecordSink};
use crate::source::CsvLoader;
use crate::storage::{S3Config, S3Manager, S3Storage};
use crate::transform::{ParseOptions, TransformOutput, TransformReport, Transformer};
use common::Result;
use common::config::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Stages to leave out of a full run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_download: bool,
    pub skip_upload: bool,
    pub skip_load: bool,
}

/// Writes both streams to `sink`: artists first so track rows never point
/// at an artist the target has not seen.
pub async fn deliver(sink: &dyn RecordSink, output: &TransformOutput) -> Result<()> {
    sink.write_artists(&output.artists).await?;
    sink.write_tracks(&output.tracks).await?;
    sink.finish(&output.report).await
}

pub struct EtlPipeline {
    settings: Settings,
}

impl EtlPipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub async fn download(&self) -> Result<Vec<PathBuf>> {
        KaggleDownloader::new(self.settings.dataset.clone())
            .download()
            .await
    }

    /// Reads both CSV exports and runs the transform off the async runtime.
    pub async fn transform(&self) -> Result<TransformOutput> {
        let tracks_path = self.settings.dataset.tracks_path();
        let artists_path = self.settings.dataset.artists_path();
        let options = ParseOptions::from(&self.settings.transform);

        tokio::task::spawn_blocking(move || -> Result<TransformOutput> {
            let loader = CsvLoader::new();
            let track_rows = loader.load_all_rows(&tracks_path)?;
            let artist_rows = loader.load_all_rows(&artists_path)?;
            Ok(Transformer::new(options).run(&track_rows, &artist_rows))
        })
        .await?
    }

    pub async fn object_sink(&self) -> Result<ObjectSink> {
        let minio = &self.settings.minio;
        let manager = Arc::new(S3Manager::new(S3Config::try_from(minio)?));
        manager.verify_bucket_exists(&minio.bucket).await?;
        let storage = S3Storage::new(manager, &minio.bucket).await?;
        Ok(ObjectSink::new(Arc::new(storage), OutputKeys::from(minio)))
    }

    pub async fn upload(&self, output: &TransformOutput) -> Result<()> {
        let sink = self.object_sink().await?;
        deliver(&sink, output).await
    }

    pub async fn load(&self, output: &TransformOutput) -> Result<()> {
        let loader = PostgresLoader::connect(&self.settings.database).await?;
        loader.create_schema().await?;
        deliver(&loader, output).await
    }

    /// Loads the last completed upload from object storage into Postgres.
    pub async fn load_from_storage(&self) -> Result<()> {
        let output = self.object_sink().await?.read_output().await?;
        info!(
            tracks = output.tracks.len(),
            artists = output.artists.len(),
            "Loading stored output"
        );
        self.load(&output).await
    }
}

/// Runs download, transform, upload and load in order.
pub async fn run_etl_pipeline(settings: &Settings, options: RunOptions) -> Result<TransformReport> {
    let started = Instant::now();
    let pipeline = EtlPipeline::new(settings.clone());

    if options.skip_download {
        info!("Skipping download, using files in {}", settings.dataset.artifacts_dir);
    } else {
        pipeline.download().await?;
    }

    let output = pipeline.transform().await?;

    if !options.skip_upload {
        pipeline.upload(&output).await?;
    }
    if !options.skip_load {
        pipeline.load(&output).await?;
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        track_rows = output.tracks.len(),
        artists = output.artists.len(),
        "ETL pipeline finished"
    );
    Ok(output.report)
}
