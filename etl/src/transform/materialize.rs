use super::fanout::ArtistTrackMap;
use crate::models::TrackRow;
use std::collections::HashSet;

/// Expands every retained track into one row per referenced artist.
///
/// The fan-out map is keyed by every artist id a retained track mentions,
/// including ids missing from `artists.csv`, so membership is checked
/// against the retained artist set to keep the `artist_id` foreign key
/// valid. A repeated artist id within one track yields a single row.
pub fn materialize_track_rows(
    fan_out: &ArtistTrackMap,
    retained_artists: &HashSet<String>,
) -> Vec<TrackRow> {
    let mut rows = Vec::new();
    for track in fan_out.tracks() {
        let mut emitted = HashSet::new();
        for artist_id in &track.id_artists {
            if retained_artists.contains(artist_id) && emitted.insert(artist_id.as_str()) {
                rows.push(TrackRow::new(track, artist_id));
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Danceability, TransformedTrack};

    fn track(id: &str, artists: &[&str]) -> TransformedTrack {
        TransformedTrack {
            id: id.to_string(),
            name: "Song".to_string(),
            popularity: 50,
            duration: 200_000,
            explicit: true,
            energy: 0.7,
            key: 5,
            loudness: -6.5,
            mode: 0,
            speechiness: 0.05,
            acousticness: 0.3,
            instrumentalness: 0.0,
            liveness: 0.2,
            valence: 0.6,
            tempo: 128.0,
            time_signature: 128,
            year: 2015,
            month: Some(7),
            day: Some(4),
            danceability: Danceability::High,
            id_artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn retained(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_one_row_per_retained_artist() {
        let mut map = ArtistTrackMap::new();
        map.insert(track("t1", &["A", "B", "C"]));

        let rows = materialize_track_rows(&map, &retained(&["A", "C"]));
        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.id.as_str(), r.artist_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("t1", "A"), ("t1", "C")]);
        assert!(rows.iter().all(|r| r.year == 2015 && r.day == Some(4)));
    }

    #[test]
    fn test_unknown_artist_excluded_even_though_in_fan_out() {
        let mut map = ArtistTrackMap::new();
        map.insert(track("t1", &["ghost"]));

        assert!(map.contains("ghost"));
        assert!(materialize_track_rows(&map, &retained(&[])).is_empty());
    }

    #[test]
    fn test_repeated_artist_emitted_once() {
        let mut map = ArtistTrackMap::new();
        map.insert(track("t1", &["A", "A"]));

        assert_eq!(materialize_track_rows(&map, &retained(&["A"])).len(), 1);
    }
}
