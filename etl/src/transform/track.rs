use super::row::{CoercionWarning, Parsed};
use super::string_array::try_parse_string_array;
use crate::models::{Danceability, Track, TransformedTrack};

/// Tracks shorter than one minute are dropped.
pub const MIN_DURATION_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyName,
    TooShort,
    /// `release_date` had no usable year component.
    MissingYear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackDecision {
    Retained(Parsed<TransformedTrack>),
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseDate {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

/// Splits `yyyy[-mm[-dd]]` into its parts. Absent, non-numeric and zero
/// components all come back as `None`.
pub fn explode_release_date(release_date: &str) -> ReleaseDate {
    let mut parts = release_date.split('-').map(date_component);
    ReleaseDate {
        year: parts.next().flatten(),
        month: parts.next().flatten(),
        day: parts.next().flatten(),
    }
}

fn date_component(part: &str) -> Option<i32> {
    part.trim().parse::<i32>().ok().filter(|value| *value != 0)
}

pub fn retention_check(track: &Track) -> Result<(), DropReason> {
    if track.name.is_empty() {
        return Err(DropReason::EmptyName);
    }
    if track.duration < MIN_DURATION_MS {
        return Err(DropReason::TooShort);
    }
    Ok(())
}

/// Applies the track business rules: retention, date explosion and
/// danceability bucketing. `id_artists` is decoded only for retained
/// tracks.
pub fn transform_track(track: &Track) -> TrackDecision {
    if let Err(reason) = retention_check(track) {
        return TrackDecision::Dropped(reason);
    }

    let date = explode_release_date(&track.release_date);
    let Some(year) = date.year else {
        return TrackDecision::Dropped(DropReason::MissingYear);
    };

    let mut warnings = Vec::new();
    let id_artists = try_parse_string_array(&track.id_artists).unwrap_or_else(|err| {
        warnings.push(CoercionWarning::MalformedList {
            field: "id_artists",
            raw: err.raw,
        });
        Vec::new()
    });

    let transformed = TransformedTrack {
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
        year,
        month: date.month,
        day: date.day,
        danceability: Danceability::from_score(track.danceability),
        id_artists,
    };

    TrackDecision::Retained(Parsed {
        record: transformed,
        warnings,
    })
}
