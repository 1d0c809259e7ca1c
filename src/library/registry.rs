use std::sync::Arc;

use super::model::Track;
use crate::error::{Error, Result};

/// Ordered, immutable catalog of tracks.
///
/// Cloning is cheap: the tracks live behind an `Arc` so the engine thread and
/// the terminal front-end can both hold the registry.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    tracks: Arc<[Track]>,
}

impl TrackRegistry {
    /// Build a registry, assigning each track its index.
    ///
    /// An empty list is rejected so `next`/`previous` never divide by zero.
    pub fn new(mut tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        for (i, t) in tracks.iter_mut().enumerate() {
            t.index = i;
        }
        Ok(Self {
            tracks: tracks.into(),
        })
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn count(&self) -> usize {
        self.tracks.len()
    }

    pub fn next(&self, index: usize) -> usize {
        (index + 1) % self.count()
    }

    pub fn previous(&self, index: usize) -> usize {
        (index + self.count() - 1) % self.count()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}
