mod artist;
mod track;

pub use artist::Artist;
pub use track::{Danceability, Track, TrackRow, TransformedTrack};
