use serde::{Deserialize, Serialize};

/// An artist row as parsed from `artists.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub followers: i64,
    pub genres: Vec<String>,
    pub name: String,
    pub popularity: i32,
}
