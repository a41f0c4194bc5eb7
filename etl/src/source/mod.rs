mod csv;

pub use self::csv::CsvLoader;

/// One CSV record as positional string cells.
pub type RawRow = Vec<String>;
