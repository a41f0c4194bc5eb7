pub mod schema;

use crate::models::{Artist, TrackRow};
use crate::sink::RecordSink;
use crate::transform::TransformReport;
use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::{Error, Result};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, Postgres};
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A record that maps onto one row of a relational table.
pub trait SqlRow {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn push_binds(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>);
}

impl SqlRow for Artist {
    const TABLE: &'static str = "artists";
    const COLUMNS: &'static [&'static str] = &["id", "followers", "genres", "name", "popularity"];

    fn push_binds(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.followers)
            .push_bind(self.genres.clone())
            .push_bind(self.name.clone())
            .push_bind(self.popularity);
    }
}

impl SqlRow for TrackRow {
    const TABLE: &'static str = "tracks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "popularity",
        "duration",
        "explicit",
        "energy",
        "key",
        "loudness",
        "mode",
        "speechiness",
        "acousticness",
        "instrumentalness",
        "liveness",
        "valence",
        "tempo",
        "time_signature",
        "year",
        "month",
        "day",
        "danceability",
        "artist_id",
    ];

    fn push_binds(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.popularity)
            .push_bind(self.duration)
            .push_bind(self.explicit)
            .push_bind(self.energy)
            .push_bind(self.key)
            .push_bind(self.loudness)
            .push_bind(self.mode)
            .push_bind(self.speechiness)
            .push_bind(self.acousticness)
            .push_bind(self.instrumentalness)
            .push_bind(self.liveness)
            .push_bind(self.valence)
            .push_bind(self.tempo)
            .push_bind(self.time_signature)
            .push_bind(self.year)
            .push_bind(self.month)
            .push_bind(self.day)
            .push_bind(self.danceability.as_str())
            .push_bind(self.artist_id.clone());
    }
}

/// `INSERT ... VALUES (...), (...) ON CONFLICT DO NOTHING` for one batch.
pub fn insert_ignore_query<R: SqlRow>(rows: &[R]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        R::TABLE,
        R::COLUMNS.join(", ")
    ));
    builder.push_values(rows, |mut row, record| record.push_binds(&mut row));
    builder.push(" ON CONFLICT DO NOTHING");
    builder
}

/// Postgres accepts at most this many bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows of `R` per INSERT: `batch_size`, capped so a statement stays within
/// [`MAX_BIND_PARAMS`].
pub fn rows_per_statement<R: SqlRow>(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BIND_PARAMS / R::COLUMNS.len())
}

/// Inserts `rows` in statements of `rows_per_statement` rows on `conn`,
/// skipping rows whose primary key already exists. Returns the number of
/// rows actually inserted.
pub async fn insert_ignore<R: SqlRow + Sync>(
    conn: &mut PgConnection,
    rows: &[R],
    rows_per_statement: usize,
) -> Result<u64> {
    let mut inserted = 0;
    for (index, batch) in rows.chunks(rows_per_statement.max(1)).enumerate() {
        let result = insert_ignore_query(batch).build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
        debug!(table = R::TABLE, batch = index, rows = batch.len(), "Inserted batch");
    }
    info!(
        table = R::TABLE,
        rows = rows.len(),
        inserted,
        skipped = rows.len() as u64 - inserted,
        "Table loaded"
    );
    Ok(inserted)
}

/// Idempotent batch writer for the relational target.
///
/// As a [`RecordSink`] one transaction spans both streams: it is opened by
/// the first write and committed by `finish`. A failed write rolls back
/// everything written so far.
pub struct PostgresLoader {
    pool: PgPool,
    batch_size: usize,
    transaction: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PostgresLoader {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        let track_rows = rows_per_statement::<TrackRow>(batch_size);
        if track_rows < batch_size {
            warn!(
                batch_size,
                track_rows,
                "batch_size exceeds the Postgres bind limit, capping track statements"
            );
        }
        Self {
            pool,
            batch_size,
            transaction: Mutex::new(None),
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self::new(pool, config.batch_size))
    }

    pub async fn create_schema(&self) -> Result<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn insert_artists(&self, conn: &mut PgConnection, artists: &[Artist]) -> Result<u64> {
        insert_ignore(conn, artists, rows_per_statement::<Artist>(self.batch_size)).await
    }

    /// Artists must be loaded first; `tracks.artist_id` references them.
    pub async fn insert_tracks(&self, conn: &mut PgConnection, tracks: &[TrackRow]) -> Result<u64> {
        insert_ignore(conn, tracks, rows_per_statement::<TrackRow>(self.batch_size)).await
    }

    async fn take_transaction(&self) -> Result<Transaction<'static, Postgres>> {
        if let Some(tx) = self.transaction.lock().await.take() {
            return Ok(tx);
        }
        debug!("Opening load transaction");
        Ok(self.pool.begin().await?)
    }

    async fn keep_transaction(&self, tx: Transaction<'static, Postgres>) {
        *self.transaction.lock().await = Some(tx);
    }
}

#[async_trait]
impl RecordSink for PostgresLoader {
    async fn write_artists(&self, artists: &[Artist]) -> Result<()> {
        let mut tx = self.take_transaction().await?;
        self.insert_artists(&mut tx, artists).await?;
        self.keep_transaction(tx).await;
        Ok(())
    }

    async fn write_tracks(&self, tracks: &[TrackRow]) -> Result<()> {
        let mut tx = self.take_transaction().await?;
        self.insert_tracks(&mut tx, tracks).await?;
        self.keep_transaction(tx).await;
        Ok(())
    }

    async fn finish(&self, _report: &TransformReport) -> Result<()> {
        let tx = self.transaction.lock().await.take().ok_or_else(|| {
            Error::InvalidInput("No load transaction to commit".to_string())
        })?;
        tx.commit().await?;
        info!("Load transaction committed");
        Ok(())
    }
}
