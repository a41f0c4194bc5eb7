use super::fanout::ArtistTrackMap;
use crate::models::Artist;

/// An artist is kept only when at least one retained track references it.
pub fn retain_artist(artist: &Artist, fan_out: &ArtistTrackMap) -> bool {
    fan_out.contains(&artist.id)
}
