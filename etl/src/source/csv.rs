use super::RawRow;
use ::csv::{ReaderBuilder, StringRecord};
use common::Result;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Reads whole CSV files into memory as [`RawRow`]s.
///
/// Headers are not consumed: the first row comes back like any other and
/// the row parser decides whether to skip it. Rows may have differing
/// lengths.
#[derive(Debug, Clone, Default)]
pub struct CsvLoader;

impl CsvLoader {
    pub fn new() -> Self {
        Self
    }

    fn builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder.has_headers(false).flexible(true);
        builder
    }

    /// Fails with `Error::Io` when the file cannot be read and
    /// `Error::Parse` when a record is structurally invalid.
    pub fn load_all_rows(&self, path: &Path) -> Result<Vec<RawRow>> {
        let reader = self.builder().from_path(path)?;
        let rows = collect_rows(reader.into_records())?;
        info!(path = %path.display(), rows = rows.len(), "Loaded CSV dataset");
        Ok(rows)
    }

    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Vec<RawRow>> {
        collect_rows(self.builder().from_reader(reader).into_records())
    }
}

fn collect_rows<I>(records: I) -> Result<Vec<RawRow>>
where
    I: Iterator<Item = std::result::Result<StringRecord, ::csv::Error>>,
{
    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
