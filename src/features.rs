use crate::config::BeatSignal;

/// RGB color, components in 0.0-1.0.
pub type Color = [f32; 3];

/// Normalized band energies for one analyser snapshot.
///
/// Each value lies in `[0, sensitivity]`: the mean byte magnitude of the
/// band's bin window, rescaled from 0-255 and multiplied by the user's
/// sensitivity setting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergy {
    pub bass: f32,
    pub mids: f32,
    pub treble: f32,
    pub volume: f32,
}

impl BandEnergy {
    /// Energy value driving the beat detector, per configuration.
    pub fn signal(&self, signal: BeatSignal) -> f32 {
        match signal {
            BeatSignal::Bass => self.bass,
            BeatSignal::Volume => self.volume,
        }
    }
}

// Bin windows of the live analyser spectrum. Fixed by design: at the usual
// 44.1/48 kHz capture rates these cover the perceptual bass/mid/treble
// ranges across every supported FFT size.
const BASS_BINS: (usize, usize) = (0, 16);
const MID_BINS: (usize, usize) = (20, 81);
const TREBLE_BINS: (usize, usize) = (100, 161);

/// Per-frame feature extraction: band energies plus a smoothly interpolated
/// color palette.
///
/// Runs synchronously on the render tick; no I/O, no allocation beyond
/// palette resizes.
pub struct SpectralFeatureExtractor {
    palette: Vec<Color>,
    /// EMA step per call. 0.08 at 60 calls/sec spans a full color
    /// transition in roughly a second.
    palette_step: f32,
}

impl Default for SpectralFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralFeatureExtractor {
    pub fn new() -> Self {
        Self {
            palette: Vec::new(),
            palette_step: 0.08,
        }
    }

    /// Process one frequency snapshot.
    ///
    /// Returns the sensitivity-scaled band energies and advances the smoothed
    /// palette one step toward `target_palette`. An empty snapshot yields
    /// zero energies; the palette still interpolates.
    pub fn process(
        &mut self,
        snapshot: &[u8],
        sensitivity: f32,
        target_palette: &[Color],
    ) -> BandEnergy {
        let sensitivity = sensitivity.max(0.0);
        self.update_palette(target_palette);

        if snapshot.is_empty() {
            return BandEnergy::default();
        }

        let scale = sensitivity / 255.0;
        BandEnergy {
            bass: window_mean(snapshot, BASS_BINS) * scale,
            mids: window_mean(snapshot, MID_BINS) * scale,
            treble: window_mean(snapshot, TREBLE_BINS) * scale,
            volume: window_mean(snapshot, (0, snapshot.len())) * scale,
        }
    }

    /// Current smoothed palette, same length as the last target palette.
    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    fn update_palette(&mut self, target: &[Color]) {
        // Grow: seed new slots at their target color so a palette switch
        // never flashes from black. Shrink: drop from the tail.
        if self.palette.len() < target.len() {
            self.palette.extend_from_slice(&target[self.palette.len()..]);
        } else if self.palette.len() > target.len() {
            self.palette.truncate(target.len());
        }

        for (current, goal) in self.palette.iter_mut().zip(target) {
            for c in 0..3 {
                current[c] += (goal[c] - current[c]) * self.palette_step;
            }
        }
    }
}

fn window_mean(snapshot: &[u8], (start, end): (usize, usize)) -> f32 {
    let start = start.min(snapshot.len());
    let end = end.min(snapshot.len());
    if start >= end {
        return 0.0;
    }
    let sum: u32 = snapshot[start..end].iter().map(|&m| m as u32).sum();
    sum as f32 / (end - start) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energies_bounded_by_sensitivity() {
        let mut extractor = SpectralFeatureExtractor::new();
        for sensitivity in [0.0f32, 0.5, 1.0, 4.0] {
            let snapshot = vec![255u8; 1024];
            let energy = extractor.process(&snapshot, sensitivity, &[]);
            for v in [energy.bass, energy.mids, energy.treble, energy.volume] {
                assert!(v >= 0.0);
                assert!(v <= sensitivity + 1e-6);
            }
        }
    }

    #[test]
    fn full_scale_snapshot_saturates_at_sensitivity() {
        let mut extractor = SpectralFeatureExtractor::new();
        let snapshot = vec![255u8; 1024];
        let energy = extractor.process(&snapshot, 2.0, &[]);
        assert!((energy.bass - 2.0).abs() < 1e-5);
        assert!((energy.volume - 2.0).abs() < 1e-5);
    }

    #[test]
    fn empty_snapshot_yields_zero_energies() {
        let mut extractor = SpectralFeatureExtractor::new();
        let energy = extractor.process(&[], 1.0, &[]);
        assert_eq!(energy, BandEnergy::default());
    }

    #[test]
    fn short_snapshot_does_not_panic() {
        // 512-point FFT: only 256 bins, treble window partly out of range.
        let mut extractor = SpectralFeatureExtractor::new();
        let snapshot = vec![100u8; 256];
        let energy = extractor.process(&snapshot, 1.0, &[]);
        assert!(energy.treble > 0.0);
    }

    #[test]
    fn palette_grows_seeded_at_target() {
        let mut extractor = SpectralFeatureExtractor::new();
        let target = [[1.0, 0.5, 0.0], [0.0, 1.0, 0.2]];
        extractor.process(&[], 1.0, &target);
        assert_eq!(extractor.palette().len(), 2);
        // New entries start exactly at the target: no flash from black.
        assert_eq!(extractor.palette()[1], [0.0, 1.0, 0.2]);
    }

    #[test]
    fn palette_shrink_then_grow_never_flashes() {
        let mut extractor = SpectralFeatureExtractor::new();
        let three = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let one = [[1.0, 0.0, 0.0]];

        for _ in 0..10 {
            extractor.process(&[], 1.0, &three);
        }
        extractor.process(&[], 1.0, &one);
        assert_eq!(extractor.palette().len(), 1);
        extractor.process(&[], 1.0, &three);
        assert_eq!(extractor.palette().len(), 3);
        // Regrown entries sit at their targets, not at black.
        assert_eq!(extractor.palette()[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn palette_converges_monotonically() {
        let mut extractor = SpectralFeatureExtractor::new();
        extractor.process(&[], 1.0, &[[0.0, 0.0, 0.0]]);
        let target = [[1.0, 1.0, 1.0]];
        let mut prev = extractor.palette()[0][0];
        for _ in 0..120 {
            extractor.process(&[], 1.0, &target);
            let cur = extractor.palette()[0][0];
            assert!(cur >= prev);
            prev = cur;
        }
        // ~2 seconds at 60 Hz: effectively converged.
        assert!(prev > 0.99);
    }
}
