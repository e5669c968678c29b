//! resona - real-time audio analysis and song-identification core.
//!
//! Two paths with very different cadences:
//!
//! - **Per-frame**: [`SpectralFeatureExtractor`] and [`BeatDetector`] turn
//!   each analyser snapshot into band energies, a smoothed color palette,
//!   and beat events. Synchronous, allocation-light, called from the render
//!   tick.
//! - **Identification**: [`IdentificationOrchestrator`] fingerprints a short
//!   clip, matches it against the persisted [`FingerprintCache`], and only
//!   on a miss escalates to an external service. Newer requests supersede
//!   older ones by generation number.

pub mod beat;
pub mod config;
pub mod features;
pub mod fingerprint;
pub mod identify;
pub mod store;

pub use beat::BeatDetector;
pub use config::{load_config, AnalysisConfig, BeatConfig, BeatSignal, CoreConfig, IdentifyConfig};
pub use features::{BandEnergy, Color, SpectralFeatureExtractor};
pub use fingerprint::cache::{CacheEntry, FingerprintCache, SongMetadata};
pub use fingerprint::generate::FingerprintGenerator;
pub use fingerprint::matcher::FingerprintMatcher;
pub use fingerprint::Fingerprint;
pub use identify::{
    HttpIdentificationService, IdentificationOrchestrator, IdentificationService, IdentifyError,
    IdentifyOutcome, Phase, ServiceError,
};
pub use store::{CacheStore, JsonFileStore, MemoryStore};
