use crate::models::TransformedTrack;
use std::collections::HashMap;
use std::sync::Arc;

/// Artist id -> retained tracks referencing that artist.
///
/// Each track is stored once and shared by every artist bucket it belongs
/// to. Artist ids iterate in first-seen order and each bucket keeps track
/// insertion order.
#[derive(Debug, Default, Clone)]
pub struct ArtistTrackMap {
    tracks: Vec<Arc<TransformedTrack>>,
    artist_order: Vec<String>,
    buckets: HashMap<String, Vec<Arc<TransformedTrack>>>,
}

impl ArtistTrackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a retained track under each of its `id_artists`.
    pub fn insert(&mut self, track: TransformedTrack) -> Arc<TransformedTrack> {
        let track = Arc::new(track);
        for artist_id in &track.id_artists {
            match self.buckets.get_mut(artist_id) {
                Some(bucket) => bucket.push(Arc::clone(&track)),
                None => {
                    self.artist_order.push(artist_id.clone());
                    self.buckets
                        .insert(artist_id.clone(), vec![Arc::clone(&track)]);
                }
            }
        }
        self.tracks.push(Arc::clone(&track));
        track
    }

    pub fn contains(&self, artist_id: &str) -> bool {
        self.buckets.contains_key(artist_id)
    }

    pub fn get(&self, artist_id: &str) -> Option<&[Arc<TransformedTrack>]> {
        self.buckets.get(artist_id).map(Vec::as_slice)
    }

    pub fn artist_ids(&self) -> impl Iterator<Item = &str> {
        self.artist_order.iter().map(String::as_str)
    }

    /// Retained tracks in input order, including those with no artist ids.
    pub fn tracks(&self) -> &[Arc<TransformedTrack>] {
        &self.tracks
    }

    pub fn artist_count(&self) -> usize {
        self.artist_order.len()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
