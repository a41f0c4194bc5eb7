pub mod artist;
pub mod fanout;
pub mod materialize;
pub mod row;
pub mod string_array;
pub mod track;

pub use artist::retain_artist;
pub use fanout::ArtistTrackMap;
pub use materialize::materialize_track_rows;
pub use row::{CoercionWarning, Fallback, ParseOptions, Parsed, RowParser};
pub use track::{DropReason, TrackDecision, transform_track};

use crate::models::{Artist, TrackRow};
use crate::source::RawRow;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counters collected over one transform run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    pub track_rows: usize,
    pub skipped_track_rows: usize,
    pub dropped_empty_name: usize,
    pub dropped_too_short: usize,
    pub dropped_missing_year: usize,
    pub retained_tracks: usize,
    pub artist_rows: usize,
    pub skipped_artist_rows: usize,
    pub retained_artists: usize,
    pub track_artist_rows: usize,
    pub coercion_warnings: usize,
    pub malformed_lists: usize,
}

impl TransformReport {
    fn record_warnings(&mut self, row_id: &str, warnings: &[CoercionWarning]) {
        for warning in warnings {
            match warning {
                CoercionWarning::Field {
                    field,
                    raw,
                    fallback,
                } => {
                    self.coercion_warnings += 1;
                    warn!(
                        row_id,
                        field,
                        raw = %raw,
                        ?fallback,
                        "Unable to coerce field, using fallback value"
                    );
                }
                CoercionWarning::MalformedList { field, raw } => {
                    self.malformed_lists += 1;
                    warn!(row_id, field, raw = %raw, "Unable to parse pseudo-list, using empty list");
                }
            }
        }
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::EmptyName => self.dropped_empty_name += 1,
            DropReason::TooShort => self.dropped_too_short += 1,
            DropReason::MissingYear => self.dropped_missing_year += 1,
        }
    }

    pub fn dropped_tracks(&self) -> usize {
        self.dropped_empty_name + self.dropped_too_short + self.dropped_missing_year
    }
}

/// Result of the track phase. The fan-out map is complete and read-only
/// from here on.
#[derive(Debug, Clone)]
pub struct TrackPass {
    pub fan_out: ArtistTrackMap,
    pub report: TransformReport,
}

/// Both output streams of a run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub tracks: Vec<TrackRow>,
    pub artists: Vec<Artist>,
    pub report: TransformReport,
}

/// Two-phase transform: tracks first, then artists filtered against the
/// finished fan-out map. Holds no state between runs.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    parser: RowParser,
}

impl Transformer {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            parser: RowParser::new(options),
        }
    }

    pub fn run(&self, track_rows: &[RawRow], artist_rows: &[RawRow]) -> TransformOutput {
        let TrackPass {
            fan_out,
            mut report,
        } = self.track_pass(track_rows);

        let artists = self.artist_pass(artist_rows, &fan_out, &mut report);
        let retained: HashSet<String> = artists.iter().map(|a| a.id.clone()).collect();

        let tracks = materialize_track_rows(&fan_out, &retained);
        report.track_artist_rows = tracks.len();

        info!(
            retained_tracks = report.retained_tracks,
            dropped_tracks = report.dropped_tracks(),
            retained_artists = report.retained_artists,
            track_artist_rows = report.track_artist_rows,
            warnings = report.coercion_warnings + report.malformed_lists,
            "Transform complete"
        );

        TransformOutput {
            tracks,
            artists,
            report,
        }
    }

    pub fn track_pass(&self, rows: &[RawRow]) -> TrackPass {
        info!(rows = rows.len(), "Transforming tracks");
        let mut report = TransformReport::default();
        let mut fan_out = ArtistTrackMap::new();

        for row in rows {
            report.track_rows += 1;
            let Some(parsed) = self.parser.parse_track(row) else {
                report.skipped_track_rows += 1;
                continue;
            };
            let track = parsed.record;
            report.record_warnings(&track.id, &parsed.warnings);

            match transform_track(&track) {
                TrackDecision::Retained(transformed) => {
                    report.record_warnings(&track.id, &transformed.warnings);
                    fan_out.insert(transformed.record);
                    report.retained_tracks += 1;
                }
                TrackDecision::Dropped(reason) => {
                    if reason == DropReason::MissingYear {
                        warn!(
                            track_id = %track.id,
                            release_date = %track.release_date,
                            "Dropping track without a release year"
                        );
                    } else {
                        debug!(track_id = %track.id, ?reason, "Dropping track");
                    }
                    report.record_drop(reason);
                }
            }
        }

        info!(
            retained = report.retained_tracks,
            artists_referenced = fan_out.artist_count(),
            "Track pass complete"
        );

        TrackPass { fan_out, report }
    }

    /// Keeps artists referenced by the fan-out map. A repeated artist id
    /// keeps its first row.
    pub fn artist_pass(
        &self,
        rows: &[RawRow],
        fan_out: &ArtistTrackMap,
        report: &mut TransformReport,
    ) -> Vec<Artist> {
        info!(rows = rows.len(), "Transforming artists");
        let mut seen = HashSet::new();
        let mut artists = Vec::new();

        for row in rows {
            report.artist_rows += 1;
            let Some(parsed) = self.parser.parse_artist(row) else {
                report.skipped_artist_rows += 1;
                continue;
            };
            report.record_warnings(&parsed.record.id, &parsed.warnings);

            let artist = parsed.record;
            if retain_artist(&artist, fan_out) && seen.insert(artist.id.clone()) {
                artists.push(artist);
            }
        }

        report.retained_artists = artists.len();
        artists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Danceability;

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn track_row(id: &str, name: &str, duration: &str, id_artists: &str) -> RawRow {
        row(&[
            id, name, "80", duration, "1", "['Someone']", id_artists, "2020-05-15", "0.55", "0.8",
            "2", "-5", "1", "0.1", "0.2", "0.3", "0.4", "0.5", "120", "4",
        ])
    }

    fn artist_row(id: &str) -> RawRow {
        row(&[id, "1000", "['pop']", "Name", "70"])
    }

    fn header_rows() -> (RawRow, RawRow) {
        (
            row(&[
                "id", "name", "popularity", "duration_ms", "explicit", "artists", "id_artists",
                "release_date", "danceability", "energy", "key", "loudness", "mode", "speechiness",
                "acousticness", "instrumentalness", "liveness", "valence", "tempo", "time_signature",
            ]),
            row(&["id", "followers", "genres", "name", "popularity"]),
        )
    }

    #[test]
    fn test_scenario_song_x() {
        let tracks = vec![track_row("1", "Song X", "65000", "['A1']")];
        let artists = vec![artist_row("A1")];

        let output = Transformer::default().run(&tracks, &artists);

        assert_eq!(output.tracks.len(), 1);
        let t = &output.tracks[0];
        assert_eq!(t.danceability, Danceability::Medium);
        assert_eq!((t.year, t.month, t.day), (2020, Some(5), Some(15)));
        assert_eq!(t.artist_id, "A1");
        assert_eq!(output.artists.len(), 1);
    }

    #[test]
    fn test_short_track_never_enters_fan_out() {
        let pass = Transformer::default().track_pass(&[track_row("1", "Short", "59000", "['A1']")]);
        assert!(pass.fan_out.is_empty());
        assert!(!pass.fan_out.contains("A1"));
        assert_eq!(pass.report.dropped_too_short, 1);
    }

    #[test]
    fn test_unreferenced_artists_dropped() {
        let tracks = vec![track_row("1", "Song", "120000", "['A']")];
        let artists = vec![artist_row("A"), artist_row("B"), artist_row("C")];

        let output = Transformer::default().run(&tracks, &artists);
        let ids: Vec<&str> = output.artists.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
    }

    #[test]
    fn test_headers_and_placeholders_skipped() {
        let (track_header, artist_header) = header_rows();
        let tracks = vec![
            track_header,
            track_row("x", "0", "120000", "['A']"),
            track_row("1", "Song", "120000", "['A']"),
        ];
        let artists = vec![artist_header, artist_row("A")];

        let output = Transformer::default().run(&tracks, &artists);
        assert_eq!(output.report.skipped_track_rows, 2);
        assert_eq!(output.report.skipped_artist_rows, 1);
        assert_eq!(output.report.retained_tracks, 1);
        assert_eq!(output.artists.len(), 1);
    }

    #[test]
    fn test_rows_reference_only_retained_artists() {
        let tracks = vec![track_row("1", "Song", "120000", "['A', 'missing']")];
        let artists = vec![artist_row("A")];

        let output = Transformer::default().run(&tracks, &artists);
        let pairs: Vec<(&str, &str)> = output
            .tracks
            .iter()
            .map(|t| (t.id.as_str(), t.artist_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("1", "A")]);
    }

    #[test]
    fn test_duplicate_artist_keeps_first() {
        let tracks = vec![track_row("1", "Song", "120000", "['A']")];
        let mut second = artist_row("A");
        second[3] = "Later".to_string();
        let artists = vec![artist_row("A"), second];

        let output = Transformer::default().run(&tracks, &artists);
        assert_eq!(output.artists.len(), 1);
        assert_eq!(output.artists[0].name, "Name");
    }

    #[test]
    fn test_report_counts_warnings() {
        let mut bad = track_row("1", "Song", "120000", "A");
        bad[9] = "loud".to_string();
        let output = Transformer::default().run(&[bad], &[]);

        assert_eq!(output.report.coercion_warnings, 1);
        assert_eq!(output.report.malformed_lists, 1);
        assert_eq!(output.report.retained_tracks, 1);
        assert!(output.tracks.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let tracks = vec![
            track_row("1", "Song", "120000", "['A', 'B']"),
            track_row("2", "Other", "90000", "['B']"),
        ];
        let artists = vec![artist_row("B"), artist_row("A")];
        let transformer = Transformer::default();

        let first = transformer.run(&tracks, &artists);
        let second = transformer.run(&tracks, &artists);
        assert_eq!(first.tracks, second.tracks);
        assert_eq!(first.artists, second.artists);
        assert_eq!(first.report, second.report);
    }
}
