use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fingerprint::cache::CacheEntry;

/// Durable storage seam for the fingerprint cache. Injected so hosts and
/// tests can swap the JSON file for an in-memory store.
pub trait CacheStore: Send {
    fn load(&self) -> Result<Vec<CacheEntry>>;
    fn save(&self, entries: &[CacheEntry]) -> Result<()>;
}

/// JSON-file-backed store; one array of entries under a fixed path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform data directory, e.g.
    /// `~/.local/share/resona/fingerprints.json`.
    pub fn at_default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .context("Cannot determine data directory")?;
        let dir = base.join("resona");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
        Ok(Self::new(dir.join("fingerprints.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    /// A missing file is an empty cache; unparsable contents are treated the
    /// same, with a warning, never an error.
    fn load(&self) -> Result<Vec<CacheEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                log::warn!(
                    "Discarding malformed fingerprint store {}: {}",
                    self.path.display(),
                    err
                );
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        let json = serde_json::to_string(entries).context("Failed to serialize cache")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// In-memory store for tests and hosts without durable storage.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::cache::SongMetadata;
    use crate::fingerprint::Fingerprint;

    fn entry(title: &str) -> CacheEntry {
        CacheEntry {
            fingerprint: [3u32, 9, 14, 27, 51].into_iter().collect::<Fingerprint>(),
            song: SongMetadata {
                title: title.into(),
                artist: "Artist".into(),
                mood: "calm".into(),
                source: "test".into(),
            },
            inserted_at: 1_700_000_000_000,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("resona-store-{}-{}", std::process::id(), name))
    }

    #[test]
    fn round_trips_entries() {
        let path = temp_path("roundtrip.json");
        let store = JsonFileStore::new(&path);
        store.save(&[entry("A"), entry("B")]).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].song.title, "A");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = JsonFileStore::new(temp_path("missing.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_json_loads_empty() {
        let path = temp_path("malformed.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.save(&[entry("A")]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
