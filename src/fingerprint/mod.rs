pub mod cache;
pub mod generate;
pub mod matcher;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fewer distinct bins than this and a fingerprint carries too little
/// information to match or persist.
pub const MIN_USABLE_BINS: usize = 5;

/// Compact content fingerprint: the set of dominant low-frequency FFT bins
/// observed across a short clip. Ordered storage keeps serialization
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(BTreeSet<u32>);

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this fingerprint has enough distinct bins to be matched
    /// against or written to the cache.
    pub fn is_usable(&self) -> bool {
        self.0.len() >= MIN_USABLE_BINS
    }

    /// Jaccard similarity `|A ∩ B| / |A ∪ B|`. Two empty sets score 0.0.
    pub fn jaccard(&self, other: &Fingerprint) -> f32 {
        let intersection = self.0.intersection(&other.0).count();
        let union = self.0.len() + other.0.len() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }
}

impl FromIterator<u32> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_overlapping_sets() {
        let a: Fingerprint = [3u32, 10, 15, 22, 30].into_iter().collect();
        let b: Fingerprint = [3u32, 10, 15, 22, 31].into_iter().collect();
        // |A ∩ B| = 4, |A ∪ B| = 6
        assert!((a.jaccard(&b) - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn jaccard_disjoint_and_empty() {
        let a: Fingerprint = [1u32, 2, 3].into_iter().collect();
        let b: Fingerprint = [7u32, 8, 9].into_iter().collect();
        assert_eq!(a.jaccard(&b), 0.0);
        assert_eq!(Fingerprint::new().jaccard(&Fingerprint::new()), 0.0);
    }

    #[test]
    fn jaccard_identical_sets() {
        let a: Fingerprint = [4u32, 9, 12, 40, 77].into_iter().collect();
        assert_eq!(a.jaccard(&a.clone()), 1.0);
    }

    #[test]
    fn usability_threshold() {
        let four: Fingerprint = [1u32, 2, 3, 4].into_iter().collect();
        let five: Fingerprint = [1u32, 2, 3, 4, 5].into_iter().collect();
        assert!(!four.is_usable());
        assert!(five.is_usable());
    }

    #[test]
    fn duplicate_bins_collapse() {
        let fp: Fingerprint = [7u32, 7, 7, 8].into_iter().collect();
        assert_eq!(fp.len(), 2);
    }
}
