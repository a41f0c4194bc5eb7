mod kaggle;

pub use kaggle::{KaggleDownloader, extract_archive};
