//! DDL for the relational target. Every statement is safe to re-run.

pub const CREATE_ARTISTS: &str = r#"
CREATE TABLE IF NOT EXISTS artists (
    id TEXT PRIMARY KEY,
    followers BIGINT NOT NULL,
    genres TEXT[] NOT NULL DEFAULT '{}',
    name TEXT NOT NULL,
    popularity INTEGER NOT NULL
)
"#;

pub const CREATE_TRACKS: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    popularity INTEGER NOT NULL,
    duration BIGINT NOT NULL,
    explicit BOOLEAN NOT NULL,
    energy DOUBLE PRECISION NOT NULL,
    key INTEGER NOT NULL,
    loudness DOUBLE PRECISION NOT NULL,
    mode INTEGER NOT NULL,
    speechiness DOUBLE PRECISION NOT NULL,
    acousticness DOUBLE PRECISION NOT NULL,
    instrumentalness DOUBLE PRECISION NOT NULL,
    liveness DOUBLE PRECISION NOT NULL,
    valence DOUBLE PRECISION NOT NULL,
    tempo DOUBLE PRECISION NOT NULL,
    time_signature INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER,
    day INTEGER,
    danceability TEXT NOT NULL CHECK (danceability IN ('Low', 'Medium', 'High')),
    artist_id TEXT NOT NULL REFERENCES artists (id),
    PRIMARY KEY (id, artist_id)
)
"#;

pub const CREATE_TRACKS_ARTIST_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS tracks_artist_id_idx ON tracks (artist_id)";

pub const CREATE_TRACKS_PER_YEAR_VIEW: &str = r#"
CREATE OR REPLACE VIEW tracks_per_year AS
SELECT
    year,
    COUNT(DISTINCT id) AS track_count,
    AVG(popularity)::DOUBLE PRECISION AS avg_popularity,
    AVG(energy) FILTER (WHERE energy <> 'NaN') AS avg_energy
FROM tracks
GROUP BY year
"#;

pub const CREATE_ARTIST_TRACK_SUMMARY_VIEW: &str = r#"
CREATE OR REPLACE VIEW artist_track_summary AS
SELECT
    a.id AS artist_id,
    a.name,
    a.followers,
    a.popularity,
    COUNT(DISTINCT t.id) AS track_count,
    MIN(t.year) AS first_release_year,
    MAX(t.year) AS last_release_year
FROM artists a
JOIN tracks t ON t.artist_id = a.id
GROUP BY a.id, a.name, a.followers, a.popularity
"#;

pub const CREATE_DANCEABILITY_BY_YEAR_VIEW: &str = r#"
CREATE OR REPLACE VIEW danceability_by_year AS
SELECT
    year,
    danceability,
    COUNT(DISTINCT id) AS track_count
FROM tracks
GROUP BY year, danceability
"#;

/// Tables before views, artists before tracks.
pub const STATEMENTS: &[&str] = &[
    CREATE_ARTISTS,
    CREATE_TRACKS,
    CREATE_TRACKS_ARTIST_INDEX,
    CREATE_TRACKS_PER_YEAR_VIEW,
    CREATE_ARTIST_TRACK_SUMMARY_VIEW,
    CREATE_DANCEABILITY_BY_YEAR_VIEW,
];
