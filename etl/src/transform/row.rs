use super::string_array::try_parse_string_array;
use crate::models::{Artist, Track};
use crate::source::RawRow;
use common::config::{TimeSignatureColumn, TransformConfig};
use std::str::FromStr;

/// Column positions in `tracks.csv`.
pub mod track_columns {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const POPULARITY: usize = 2;
    pub const DURATION: usize = 3;
    pub const EXPLICIT: usize = 4;
    pub const ARTISTS: usize = 5;
    pub const ID_ARTISTS: usize = 6;
    pub const RELEASE_DATE: usize = 7;
    pub const DANCEABILITY: usize = 8;
    pub const ENERGY: usize = 9;
    pub const KEY: usize = 10;
    pub const LOUDNESS: usize = 11;
    pub const MODE: usize = 12;
    pub const SPEECHINESS: usize = 13;
    pub const ACOUSTICNESS: usize = 14;
    pub const INSTRUMENTALNESS: usize = 15;
    pub const LIVENESS: usize = 16;
    pub const VALENCE: usize = 17;
    pub const TEMPO: usize = 18;
    pub const TIME_SIGNATURE: usize = 19;
}

/// Column positions in `artists.csv`.
pub mod artist_columns {
    pub const ID: usize = 0;
    pub const FOLLOWERS: usize = 1;
    pub const GENRES: usize = 2;
    pub const NAME: usize = 3;
    pub const POPULARITY: usize = 4;
}

/// What a cell degraded to when it could not be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Zero,
    NaN,
    EmptyList,
}

/// Non-fatal coercion problem; the row keeps processing with a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionWarning {
    Field {
        field: &'static str,
        raw: String,
        fallback: Fallback,
    },
    MalformedList {
        field: &'static str,
        raw: String,
    },
}

/// A parsed record together with the warnings produced while coercing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub record: T,
    pub warnings: Vec<CoercionWarning>,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// First-cell literal identifying a header row. `None` or empty disables it.
    pub header_token: Option<String>,
    pub time_signature_column: TimeSignatureColumn,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&TransformConfig::default())
    }
}

impl From<&TransformConfig> for ParseOptions {
    fn from(config: &TransformConfig) -> Self {
        Self {
            header_token: config.header_token.clone(),
            time_signature_column: config.time_signature_column,
        }
    }
}

impl ParseOptions {
    fn time_signature_index(&self) -> usize {
        match self.time_signature_column {
            TimeSignatureColumn::Tempo => track_columns::TEMPO,
            TimeSignatureColumn::TimeSignature => track_columns::TIME_SIGNATURE,
        }
    }
}

/// Reads the leading `[+-]digits` of the trimmed cell, so `"44.0"` is 44.
/// `None` when there are no digits or the value overflows `T`.
pub fn leading_int<T: FromStr>(cell: &str) -> Option<T> {
    let s = cell.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = ascii_digits(&bytes[end..]);
    if digits == 0 {
        return None;
    }
    end += digits;
    s[..end].parse().ok()
}

/// Reads the longest decimal prefix of the trimmed cell (`"0.5abc"` is 0.5),
/// including an exponent and a leading `Infinity`. `None` when the cell
/// does not start with a number.
pub fn leading_float(cell: &str) -> Option<f64> {
    let s = cell.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    if s[end..].starts_with("Infinity") {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_digits = ascii_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = ascii_digits(&bytes[end + 1..]);
        if frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = ascii_digits(&bytes[exp.min(bytes.len())..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse().ok()
}

pub fn parse_bool(cell: &str) -> bool {
    cell == "1"
}

fn ascii_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Positional cell reader collecting coercion warnings for one row.
struct Cells<'a> {
    row: &'a [String],
    warnings: Vec<CoercionWarning>,
}

impl<'a> Cells<'a> {
    fn new(row: &'a [String]) -> Self {
        Self {
            row,
            warnings: Vec::new(),
        }
    }

    fn text(&self, index: usize) -> &'a str {
        self.row.get(index).map(String::as_str).unwrap_or("")
    }

    fn int<T: FromStr + Default>(&mut self, index: usize, field: &'static str) -> T {
        let raw = self.text(index);
        match leading_int(raw) {
            Some(value) => value,
            None => {
                self.warnings.push(CoercionWarning::Field {
                    field,
                    raw: raw.to_string(),
                    fallback: Fallback::Zero,
                });
                T::default()
            }
        }
    }

    /// Unparsable cells become NaN; they are not zeroed the way integers are.
    fn float(&mut self, index: usize, field: &'static str) -> f64 {
        let raw = self.text(index);
        if let Some(value) = leading_float(raw) {
            return value;
        }
        if !raw.trim().eq_ignore_ascii_case("nan") {
            self.warnings.push(CoercionWarning::Field {
                field,
                raw: raw.to_string(),
                fallback: Fallback::NaN,
            });
        }
        f64::NAN
    }

    fn flag(&self, index: usize) -> bool {
        parse_bool(self.text(index))
    }

    fn list(&mut self, index: usize, field: &'static str) -> Vec<String> {
        let raw = self.text(index);
        try_parse_string_array(raw).unwrap_or_else(|err| {
            self.warnings.push(CoercionWarning::MalformedList {
                field,
                raw: err.raw,
            });
            Vec::new()
        })
    }

    fn finish<T>(self, record: T) -> Parsed<T> {
        Parsed {
            record,
            warnings: self.warnings,
        }
    }
}

/// Turns raw CSV rows into typed records. Pure: never fails and never logs,
/// problems are returned as [`CoercionWarning`]s.
#[derive(Debug, Clone, Default)]
pub struct RowParser {
    options: ParseOptions,
}

impl RowParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    fn is_header(&self, first: &str) -> bool {
        match self.options.header_token.as_deref() {
            Some(token) if !token.is_empty() => first == token,
            _ => false,
        }
    }

    /// Returns `None` for rows without an id, header rows, and the
    /// placeholder rows whose name cell is the literal `"0"`.
    pub fn parse_track(&self, row: &RawRow) -> Option<Parsed<Track>> {
        use track_columns::*;

        let first = row.first().map(String::as_str).unwrap_or("");
        if first.is_empty() || self.is_header(first) {
            return None;
        }
        if row.get(NAME).map(String::as_str) == Some("0") {
            return None;
        }

        let mut cells = Cells::new(row);
        let track = Track {
            id: cells.text(ID).to_string(),
            name: cells.text(NAME).to_string(),
            popularity: cells.int(POPULARITY, "popularity"),
            duration: cells.int(DURATION, "duration"),
            explicit: cells.flag(EXPLICIT),
            artists: cells.text(ARTISTS).to_string(),
            id_artists: cells.text(ID_ARTISTS).to_string(),
            release_date: cells.text(RELEASE_DATE).to_string(),
            danceability: cells.float(DANCEABILITY, "danceability"),
            energy: cells.float(ENERGY, "energy"),
            key: cells.int(KEY, "key"),
            loudness: cells.float(LOUDNESS, "loudness"),
            mode: cells.int(MODE, "mode"),
            speechiness: cells.float(SPEECHINESS, "speechiness"),
            acousticness: cells.float(ACOUSTICNESS, "acousticness"),
            instrumentalness: cells.float(INSTRUMENTALNESS, "instrumentalness"),
            liveness: cells.float(LIVENESS, "liveness"),
            valence: cells.float(VALENCE, "valence"),
            tempo: cells.float(TEMPO, "tempo"),
            time_signature: cells.int(self.options.time_signature_index(), "time_signature"),
        };

        Some(cells.finish(track))
    }

    /// Returns `None` for rows without an id and header rows. The track
    /// placeholder rule does not apply: a `"0"` follower count is real data.
    pub fn parse_artist(&self, row: &RawRow) -> Option<Parsed<Artist>> {
        use artist_columns::*;

        let first = row.first().map(String::as_str).unwrap_or("");
        if first.is_empty() || self.is_header(first) {
            return None;
        }

        let mut cells = Cells::new(row);
        let artist = Artist {
            id: cells.text(ID).to_string(),
            followers: cells.int(FOLLOWERS, "followers"),
            genres: cells.list(GENRES, "genres"),
            name: cells.text(NAME).to_string(),
            popularity: cells.int(POPULARITY, "popularity"),
        };

        Some(cells.finish(artist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn track_row() -> RawRow {
        row(&[
            "1", "Song X", "80", "65000", "1", "['A1']", "['A1']", "2020-05-15", "0.55", "0.8",
            "2", "-5", "1", "0.1", "0.2", "0.3", "0.4", "0.5", "120.7", "4",
        ])
    }

    #[test]
    fn test_parse_track_columns() {
        let parsed = RowParser::default().parse_track(&track_row()).unwrap();
        let track = parsed.record;

        assert!(parsed.warnings.is_empty());
        assert_eq!(track.id, "1");
        assert_eq!(track.name, "Song X");
        assert_eq!(track.popularity, 80);
        assert_eq!(track.duration, 65000);
        assert!(track.explicit);
        assert_eq!(track.id_artists, "['A1']");
        assert_eq!(track.release_date, "2020-05-15");
        assert_eq!(track.danceability, 0.55);
        assert_eq!(track.loudness, -5.0);
        assert_eq!(track.tempo, 120.7);
    }

    #[test]
    fn test_time_signature_reads_tempo_column_by_default() {
        let track = RowParser::default().parse_track(&track_row()).unwrap().record;
        assert_eq!(track.time_signature, 120);
    }

    #[test]
    fn test_time_signature_column_toggle() {
        let parser = RowParser::new(ParseOptions {
            time_signature_column: TimeSignatureColumn::TimeSignature,
            ..ParseOptions::default()
        });
        let track = parser.parse_track(&track_row()).unwrap().record;
        assert_eq!(track.time_signature, 4);
    }

    #[test]
    fn test_skip_rules() {
        let parser = RowParser::default();

        let mut no_id = track_row();
        no_id[0] = String::new();
        assert!(parser.parse_track(&no_id).is_none());

        let mut header = track_row();
        header[0] = "id".to_string();
        assert!(parser.parse_track(&header).is_none());

        let mut placeholder = track_row();
        placeholder[1] = "0".to_string();
        assert!(parser.parse_track(&placeholder).is_none());

        assert!(parser.parse_track(&Vec::new()).is_none());
    }

    #[test]
    fn test_header_token_can_be_disabled() {
        let parser = RowParser::new(ParseOptions {
            header_token: None,
            ..ParseOptions::default()
        });
        let mut header = track_row();
        header[0] = "id".to_string();
        assert!(parser.parse_track(&header).is_some());
    }

    #[test]
    fn test_explicit_only_for_literal_one() {
        let parser = RowParser::default();
        for (cell, expected) in [("1", true), ("0", false), ("true", false), (" 1", false)] {
            let mut r = track_row();
            r[4] = cell.to_string();
            assert_eq!(parser.parse_track(&r).unwrap().record.explicit, expected);
        }
    }

    #[test]
    fn test_int_and_float_coercion_asymmetry() {
        // Integers degrade to 0, floats degrade to NaN.
        let mut r = track_row();
        r[2] = "n/a".to_string();
        r[9] = "n/a".to_string();
        let parsed = RowParser::default().parse_track(&r).unwrap();

        assert_eq!(parsed.record.popularity, 0);
        assert!(parsed.record.energy.is_nan());
        assert_eq!(
            parsed.warnings,
            vec![
                CoercionWarning::Field {
                    field: "popularity",
                    raw: "n/a".to_string(),
                    fallback: Fallback::Zero,
                },
                CoercionWarning::Field {
                    field: "energy",
                    raw: "n/a".to_string(),
                    fallback: Fallback::NaN,
                },
            ]
        );
    }

    #[test]
    fn test_leading_int_reads_prefix() {
        assert_eq!(leading_int::<i64>("44.0"), Some(44));
        assert_eq!(leading_int::<i64>(" -7"), Some(-7));
        assert_eq!(leading_int::<i64>("+12abc"), Some(12));
        assert_eq!(leading_int::<i32>("99999999999"), None);
        assert_eq!(leading_int::<i32>("-"), None);
        assert_eq!(leading_int::<i32>("abc"), None);
        assert_eq!(leading_int::<i32>(""), None);
    }

    #[test]
    fn test_leading_float_reads_prefix() {
        assert_eq!(leading_float("0.5abc"), Some(0.5));
        assert_eq!(leading_float(" -5.25"), Some(-5.25));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("7."), Some(7.0));
        assert_eq!(leading_float("1e3x"), Some(1000.0));
        assert_eq!(leading_float("2e"), Some(2.0));
        assert_eq!(leading_float("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(leading_float("abc"), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float(""), None);
    }

    #[test]
    fn test_float_cell_with_trailing_text_keeps_prefix() {
        let mut r = track_row();
        r[9] = "0.8dB".to_string();
        let parsed = RowParser::default().parse_track(&r).unwrap();

        assert_eq!(parsed.record.energy, 0.8);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_short_row_degrades() {
        let parsed = RowParser::default()
            .parse_track(&row(&["7", "Short"]))
            .unwrap();
        assert_eq!(parsed.record.duration, 0);
        assert!(parsed.record.tempo.is_nan());
        assert_eq!(parsed.record.release_date, "");
        assert!(!parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_artist() {
        let parsed = RowParser::default()
            .parse_artist(&row(&["A1", "44.0", "['pop', 'dance pop']", "Artist", "61"]))
            .unwrap();
        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.record,
            Artist {
                id: "A1".to_string(),
                followers: 44,
                genres: vec!["pop".to_string(), "dance pop".to_string()],
                name: "Artist".to_string(),
                popularity: 61,
            }
        );
    }

    #[test]
    fn test_artist_with_zero_followers_is_kept() {
        let parsed = RowParser::default().parse_artist(&row(&["A1", "0", "[]", "Quiet", "3"]));
        assert_eq!(parsed.unwrap().record.followers, 0);
    }

    #[test]
    fn test_artist_malformed_fields() {
        let parsed = RowParser::default()
            .parse_artist(&row(&["A1", "many", "pop", "Artist", ""]))
            .unwrap();
        assert_eq!(parsed.record.followers, 0);
        assert_eq!(parsed.record.popularity, 0);
        assert!(parsed.record.genres.is_empty());
        assert_eq!(parsed.warnings.len(), 3);
        assert!(matches!(
            parsed.warnings[1],
            CoercionWarning::MalformedList { field: "genres", .. }
        ));
    }

    #[test]
    fn test_artist_header_skipped() {
        let parser = RowParser::default();
        assert!(parser
            .parse_artist(&row(&["id", "followers", "genres", "name", "popularity"]))
            .is_none());
        assert!(parser.parse_artist(&row(&["", "1", "[]", "x", "1"])).is_none());
    }
}
