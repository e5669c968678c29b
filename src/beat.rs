use crate::config::BeatConfig;

/// Adaptive onset detector driving beat-reactive visuals.
///
/// Tracks an exponentially-weighted mean and variance of the incoming energy
/// signal and flags a beat when the current sample rises `threshold_k`
/// standard deviations above the mean. A refractory interval suppresses
/// double triggers; a warm-up count suppresses the spurious beat a
/// silence-to-sound transient would otherwise fire on startup.
pub struct BeatDetector {
    config: BeatConfig,
    mean: f32,
    variance: f32,
    samples_seen: u32,
    last_beat_at: Option<f64>,
}

impl BeatDetector {
    pub fn new(config: BeatConfig) -> Self {
        Self {
            config,
            mean: 0.0,
            variance: 0.0,
            samples_seen: 0,
            last_beat_at: None,
        }
    }

    /// Feed one energy sample. `now_secs` is the caller's monotonic clock;
    /// returns true on at most one frame per physical onset.
    pub fn process(&mut self, energy: f32, now_secs: f64) -> bool {
        let threshold = self.mean + self.config.threshold_k * self.variance.sqrt();

        let warmed_up = self.samples_seen >= self.config.warmup_samples;
        let refractory = self.config.refractory_ms as f64 / 1000.0;
        let out_of_refractory = self
            .last_beat_at
            .map_or(true, |last| now_secs - last >= refractory);

        let beat = warmed_up && out_of_refractory && energy > threshold;
        if beat {
            self.last_beat_at = Some(now_secs);
        }

        // Statistics keep adapting through beats so sustained loud or quiet
        // passages re-center the threshold instead of pinning it.
        let alpha = self.config.alpha;
        let diff = energy - self.mean;
        let incr = alpha * diff;
        self.mean += incr;
        self.variance = (1.0 - alpha) * (self.variance + diff * incr);
        self.samples_seen = self.samples_seen.saturating_add(1);

        beat
    }

    /// Forget all rolling state, e.g. when the audio source changes.
    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.variance = 0.0;
        self.samples_seen = 0;
        self.last_beat_at = None;
    }
}
