use serde::Deserialize;
use std::path::PathBuf;

/// Which energy signal drives the beat detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatSignal {
    Bass,
    Volume,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub identify: IdentifyConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// FFT size of the live analyser feeding snapshots (512/1024/2048/4096).
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default)]
    pub beat: BeatConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BeatConfig {
    #[serde(default = "default_beat_signal")]
    pub signal: BeatSignal,
    /// Threshold multiplier: beat when sample > mean + k * sigma.
    #[serde(default = "default_threshold_k")]
    pub threshold_k: f32,
    /// Minimum interval between beats.
    #[serde(default = "default_refractory_ms")]
    pub refractory_ms: u64,
    /// Samples required before the detector may fire at all.
    #[serde(default = "default_warmup_samples")]
    pub warmup_samples: u32,
    /// Weight of the newest sample in the rolling mean/variance.
    #[serde(default = "default_stats_alpha")]
    pub alpha: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyConfig {
    /// Byte-scale magnitude a block peak must exceed to contribute a bin.
    #[serde(default = "default_noise_floor")]
    pub noise_floor: u8,
    /// Minimum Jaccard similarity for a cache match.
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Bound on the external lookup, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Credential for the external identification service.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            beat: BeatConfig::default(),
        }
    }
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            signal: default_beat_signal(),
            threshold_k: default_threshold_k(),
            refractory_ms: default_refractory_ms(),
            warmup_samples: default_warmup_samples(),
            alpha: default_stats_alpha(),
        }
    }
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            noise_floor: default_noise_floor(),
            jaccard_threshold: default_jaccard_threshold(),
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_timeout_secs(),
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

impl AnalysisConfig {
    /// Clamp `fft_size` to the supported analyser sizes.
    pub fn validated(mut self) -> Self {
        if !matches!(self.fft_size, 512 | 1024 | 2048 | 4096) {
            log::warn!(
                "Unsupported fft_size {}, falling back to {}",
                self.fft_size,
                default_fft_size()
            );
            self.fft_size = default_fft_size();
        }
        self
    }

    /// Expected snapshot length for the configured FFT size.
    pub fn snapshot_len(&self) -> usize {
        self.fft_size / 2
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_beat_signal() -> BeatSignal { BeatSignal::Bass }
fn default_threshold_k() -> f32 { 1.8 }
fn default_refractory_ms() -> u64 { 120 }
fn default_warmup_samples() -> u32 { 20 }
fn default_stats_alpha() -> f32 { 0.06 }
fn default_noise_floor() -> u8 { 50 }
fn default_jaccard_threshold() -> f32 { 0.25 }
fn default_cache_capacity() -> usize { 50 }
fn default_timeout_secs() -> u64 { 25 }
fn default_endpoint() -> String { "https://api.resona.app/v1/identify".into() }

pub fn load_config(path: &PathBuf) -> Option<CoreConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
