use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A track row as parsed from `tracks.csv`, before any business rule runs.
///
/// `artists` and `id_artists` keep the raw pseudo-list text; only the
/// transform decodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub popularity: i32,
    pub duration: i64,
    pub explicit: bool,
    pub artists: String,
    pub id_artists: String,
    pub release_date: String,
    pub danceability: f64,
    pub energy: f64,
    pub key: i32,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Danceability {
    Low,
    Medium,
    High,
}

impl Danceability {
    pub const MEDIUM_LOWER: f64 = 0.5;
    pub const MEDIUM_UPPER: f64 = 0.6;

    /// Buckets a 0.0..=1.0 danceability score.
    ///
    /// NaN fails both comparisons and lands in `High`, same as any score
    /// above the medium band.
    pub fn from_score(score: f64) -> Self {
        if score < Self::MEDIUM_LOWER {
            Danceability::Low
        } else if score <= Self::MEDIUM_UPPER {
            Danceability::Medium
        } else {
            Danceability::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Danceability::Low => "Low",
            Danceability::Medium => "Medium",
            Danceability::High => "High",
        }
    }
}

impl fmt::Display for Danceability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Danceability {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Danceability::Low),
            "Medium" => Ok(Danceability::Medium),
            "High" => Ok(Danceability::High),
            other => Err(common::Error::InvalidInput(format!(
                "Unknown danceability bucket '{}'",
                other
            ))),
        }
    }
}

/// A retained track after date explosion and danceability bucketing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedTrack {
    pub id: String,
    pub name: String,
    pub popularity: i32,
    pub duration: i64,
    pub explicit: bool,
    pub energy: f64,
    pub key: i32,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i32,
    pub year: i32,
    pub month: Option<i32>,
    pub day: Option<i32>,
    pub danceability: Danceability,
    pub id_artists: Vec<String>,
}

/// One output row of the `tracks` table: a track paired with a single
/// artist it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: String,
    pub name: String,
    pub popularity: i32,
    pub duration: i64,
    pub explicit: bool,
    pub energy: f64,
    pub key: i32,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i32,
    pub year: i32,
    pub month: Option<i32>,
    pub day: Option<i32>,
    pub danceability: Danceability,
    pub artist_id: String,
}

impl TrackRow {
    pub fn new(track: &TransformedTrack, artist_id: &str) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            popularity: track.popularity,
            duration: track.duration,
            explicit: track.explicit,
            energy: track.energy,
            key: track.key,
            loudness: track.loudness,
            mode: track.mode,
            speechiness: track.speechiness,
            acousticness: track.acousticness,
            instrumentalness: track.instrumentalness,
            liveness: track.liveness,
            valence: track.valence,
            tempo: track.tempo,
            time_signature: track.time_signature,
            year: track.year,
            month: track.month,
            day: track.day,
            danceability: track.danceability,
            artist_id: artist_id.to_string(),
        }
    }
}
