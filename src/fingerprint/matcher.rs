use super::cache::{FingerprintCache, SongMetadata};
use super::Fingerprint;

/// Set-similarity search over the fingerprint cache.
pub struct FingerprintMatcher {
    threshold: f32,
}

impl FingerprintMatcher {
    /// `threshold` is the minimum Jaccard similarity accepted as a match.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Best cache entry for the query, or `None` below the threshold. An
    /// unusable query is a miss, not an error. Ties resolve to the
    /// most-recently-inserted entry (the cache is most-recent-first and the
    /// scan only accepts strictly better scores).
    pub fn find_best_match<'a>(
        &self,
        query: &Fingerprint,
        cache: &'a FingerprintCache,
    ) -> Option<&'a SongMetadata> {
        if !query.is_usable() {
            return None;
        }

        let mut best: Option<(&SongMetadata, f32)> = None;
        for entry in cache.entries() {
            let score = query.jaccard(&entry.fingerprint);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((&entry.song, score));
            }
        }

        match best {
            Some((song, score)) if score >= self.threshold => {
                log::debug!(
                    "Cache match: {:?} by {:?} (similarity {:.3})",
                    song.title,
                    song.artist,
                    score
                );
                Some(song)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::cache::test_util::{fp, song};
    use crate::store::MemoryStore;

    fn cache() -> FingerprintCache {
        FingerprintCache::load(Box::new(MemoryStore::new()), 50)
    }

    fn matcher() -> FingerprintMatcher {
        FingerprintMatcher::new(0.25)
    }

    #[test]
    fn near_identical_fingerprint_matches() {
        let mut c = cache();
        c.insert(
            [3u32, 10, 15, 22, 30].into_iter().collect(),
            song("Known", "Artist"),
        );
        // 4 shared of 6 total: similarity 0.667.
        let query: Fingerprint = [3u32, 10, 15, 22, 31].into_iter().collect();
        let hit = matcher().find_best_match(&query, &c);
        assert_eq!(hit.map(|s| s.title.as_str()), Some("Known"));
    }

    #[test]
    fn disjoint_fingerprint_misses() {
        let mut c = cache();
        c.insert(
            [3u32, 10, 15, 22, 30].into_iter().collect(),
            song("Known", "Artist"),
        );
        let query: Fingerprint = [50u32, 60, 70, 80, 90].into_iter().collect();
        assert!(matcher().find_best_match(&query, &c).is_none());
    }

    #[test]
    fn below_threshold_misses() {
        let mut c = cache();
        c.insert(
            [1u32, 2, 3, 4, 5].into_iter().collect(),
            song("Known", "Artist"),
        );
        // 1 of 9: similarity ~0.111 < 0.25.
        let query: Fingerprint = [5u32, 20, 21, 22, 23].into_iter().collect();
        assert!(matcher().find_best_match(&query, &c).is_none());
    }

    #[test]
    fn unusable_query_misses_immediately() {
        let mut c = cache();
        c.insert(fp(0), song("Known", "Artist"));
        let query: Fingerprint = [0u32, 1, 2].into_iter().collect();
        assert!(matcher().find_best_match(&query, &c).is_none());
    }

    #[test]
    fn tie_breaks_to_most_recent_entry() {
        let mut c = cache();
        // Two entries with identical fingerprints; the later insert sits at
        // the front and must win the tie.
        let shared: Fingerprint = [2u32, 4, 6, 8, 10].into_iter().collect();
        c.insert(shared.clone(), song("Older", "A"));
        c.insert(shared.clone(), song("Newer", "B"));
        let hit = matcher().find_best_match(&shared, &c);
        assert_eq!(hit.map(|s| s.title.as_str()), Some("Newer"));
    }

    #[test]
    fn best_of_many_wins() {
        let mut c = cache();
        c.insert(
            [1u32, 2, 3, 4, 5].into_iter().collect(),
            song("Weak", "A"),
        );
        c.insert(
            [1u32, 2, 3, 4, 50].into_iter().collect(),
            song("Strong", "B"),
        );
        let query: Fingerprint = [1u32, 2, 3, 4, 50].into_iter().collect();
        let hit = matcher().find_best_match(&query, &c);
        assert_eq!(hit.map(|s| s.title.as_str()), Some("Strong"));
    }
}
