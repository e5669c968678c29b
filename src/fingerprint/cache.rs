use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::Fingerprint;
use crate::store::CacheStore;

/// Identified-song record. Opaque to this crate: fields are carried for the
/// host UI, only (title, artist) participates in deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub mood: String,
    pub source: String,
}

impl SongMetadata {
    fn same_song(&self, other: &SongMetadata) -> bool {
        self.title.eq_ignore_ascii_case(&other.title)
            && self.artist.eq_ignore_ascii_case(&other.artist)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub song: SongMetadata,
    /// Unix milliseconds at insertion.
    pub inserted_at: u64,
}

/// Bounded, persisted, most-recent-first store of identified fingerprints.
pub struct FingerprintCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    store: Box<dyn CacheStore>,
}

impl FingerprintCache {
    /// Load whatever the store holds; a failed load starts empty rather than
    /// failing the host.
    pub fn load(store: Box<dyn CacheStore>, capacity: usize) -> Self {
        let mut entries = match store.load() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Failed to load fingerprint cache: {:#}", err);
                Vec::new()
            }
        };
        entries.truncate(capacity);
        log::info!("Fingerprint cache loaded: {} entries", entries.len());
        Self {
            entries,
            capacity,
            store,
        }
    }

    /// Insert an identified fingerprint at the front. Unusable fingerprints
    /// are rejected; a new match for a known (title, artist) replaces the old
    /// entry. Returns whether the cache changed.
    pub fn insert(&mut self, fingerprint: Fingerprint, song: SongMetadata) -> bool {
        if !fingerprint.is_usable() {
            log::debug!(
                "Rejecting unusable fingerprint ({} bins) for {:?}",
                fingerprint.len(),
                song.title
            );
            return false;
        }

        self.entries.retain(|e| !e.song.same_song(&song));
        self.entries.insert(
            0,
            CacheEntry {
                fingerprint,
                song,
                inserted_at: now_millis(),
            },
        );
        self.entries.truncate(self.capacity);
        self.persist();
        true
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.entries) {
            // Losing persistence degrades to a session-local cache.
            log::warn!("Failed to persist fingerprint cache: {:#}", err);
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
