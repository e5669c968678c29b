use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::config::IdentifyConfig;
use crate::fingerprint::cache::{FingerprintCache, SongMetadata};
use crate::fingerprint::generate::FingerprintGenerator;
use crate::fingerprint::matcher::FingerprintMatcher;
use crate::fingerprint::Fingerprint;
use crate::store::CacheStore;

/// Failure modes of the external identification service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Surfaced separately so the host can show a user-actionable message
    /// instead of a generic network failure.
    #[error("identification service credentials are missing or invalid")]
    MissingCredentials,
    #[error("identification service timed out")]
    Timeout,
    #[error("identification service error: {0}")]
    Http(String),
}

/// External song-identification fallback, consulted only on a cache miss.
pub trait IdentificationService: Send + Sync {
    /// Identify a clip, bounded by `timeout`. `Ok(None)` means the service
    /// answered but did not recognize the clip.
    fn lookup(&self, clip: &[u8], timeout: Duration)
        -> Result<Option<SongMetadata>, ServiceError>;
}

/// Typed failure returned to the host; never a panic or propagated error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifyError {
    #[error("clip could not be fingerprinted")]
    UnusableClip,
    #[error("identification service credentials are missing or invalid")]
    MissingCredentials,
    #[error("identification timed out")]
    Timeout,
    #[error("identification service failed: {0}")]
    Service(String),
}

impl From<ServiceError> for IdentifyError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingCredentials => IdentifyError::MissingCredentials,
            ServiceError::Timeout => IdentifyError::Timeout,
            ServiceError::Http(msg) => IdentifyError::Service(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    Identified { song: SongMetadata, from_cache: bool },
    /// The service answered but did not recognize the clip.
    NoMatch,
    /// A newer request started while this one ran; its result was dropped.
    Superseded,
    Failed(IdentifyError),
}

/// Progress of the latest identification attempt, for host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fingerprinting,
    Matching,
    Lookup,
    Done,
    Failed,
}

/// Ties fingerprinting, cache lookup, and the network fallback together
/// under a supersession discipline: every request gets a monotonic
/// generation number and only the newest generation may publish its result.
/// Superseded lookups run to completion so their cache writes are kept, but
/// their results are dropped silently.
pub struct IdentificationOrchestrator {
    generator: FingerprintGenerator,
    matcher: FingerprintMatcher,
    cache: Mutex<FingerprintCache>,
    service: Box<dyn IdentificationService>,
    timeout: Duration,
    generation: AtomicU64,
    phase: Mutex<Phase>,
    last_identified: Mutex<Option<SongMetadata>>,
}

impl IdentificationOrchestrator {
    pub fn new(
        config: &IdentifyConfig,
        store: Box<dyn CacheStore>,
        service: Box<dyn IdentificationService>,
    ) -> Self {
        Self {
            generator: FingerprintGenerator::new(config.noise_floor),
            matcher: FingerprintMatcher::new(config.jaccard_threshold),
            cache: Mutex::new(FingerprintCache::load(store, config.cache_capacity)),
            service,
            timeout: Duration::from_secs(config.timeout_secs),
            generation: AtomicU64::new(0),
            phase: Mutex::new(Phase::Idle),
            last_identified: Mutex::new(None),
        }
    }

    /// Orchestrator wired to the HTTP identification service from config.
    pub fn with_http_service(config: &IdentifyConfig, store: Box<dyn CacheStore>) -> Self {
        let service = HttpIdentificationService::new(&config.endpoint, config.api_key.clone());
        Self::new(config, store, Box::new(service))
    }

    /// Identify a short audio clip. Blocking: fingerprinting is CPU-heavy
    /// and the fallback does network I/O, so call this off the render
    /// thread, or use [`spawn_identify`](Self::spawn_identify).
    pub fn identify(&self, clip: &[u8]) -> IdentifyOutcome {
        let generation = self.next_generation();
        self.run(generation, clip)
    }

    /// Run `identify` on a worker thread. The generation number is taken
    /// here, synchronously, so call order decides which request wins.
    pub fn spawn_identify(
        self: &Arc<Self>,
        clip: Vec<u8>,
    ) -> std::thread::JoinHandle<IdentifyOutcome> {
        let generation = self.next_generation();
        let this = Arc::clone(self);
        std::thread::Builder::new()
            .name("resona-identify".into())
            .spawn(move || this.run(generation, &clip))
            .expect("failed to spawn identification worker")
    }

    /// Latest attempt's progress.
    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    /// Most recently published identification, if any.
    pub fn last_identified(&self) -> Option<SongMetadata> {
        self.last_identified.lock().unwrap().clone()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    pub fn cached_songs(&self) -> Vec<SongMetadata> {
        self.cache
            .lock()
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.song.clone())
            .collect()
    }

    fn run(&self, generation: u64, clip: &[u8]) -> IdentifyOutcome {
        self.set_phase(generation, Phase::Fingerprinting);
        let fingerprint = self.generator.generate(clip);
        self.resolve(generation, fingerprint, clip)
    }

    fn resolve(&self, generation: u64, fingerprint: Fingerprint, clip: &[u8]) -> IdentifyOutcome {
        if self.is_stale(generation) {
            return IdentifyOutcome::Superseded;
        }
        if !fingerprint.is_usable() {
            return self.fail(generation, IdentifyError::UnusableClip);
        }

        self.set_phase(generation, Phase::Matching);
        let cached = {
            let cache = self.cache.lock().unwrap();
            self.matcher.find_best_match(&fingerprint, &cache).cloned()
        };
        if let Some(song) = cached {
            if self.is_stale(generation) {
                return IdentifyOutcome::Superseded;
            }
            log::info!("Identified from cache: {} - {}", song.artist, song.title);
            self.publish(generation, &song);
            return IdentifyOutcome::Identified {
                song,
                from_cache: true,
            };
        }

        self.set_phase(generation, Phase::Lookup);
        match self.service.lookup(clip, self.timeout) {
            Ok(Some(song)) => {
                // Cache first: a superseded lookup keeps its cache write even
                // though its result is dropped.
                self.cache.lock().unwrap().insert(fingerprint, song.clone());
                if self.is_stale(generation) {
                    return IdentifyOutcome::Superseded;
                }
                log::info!("Identified via service: {} - {}", song.artist, song.title);
                self.publish(generation, &song);
                IdentifyOutcome::Identified {
                    song,
                    from_cache: false,
                }
            }
            Ok(None) => {
                if self.is_stale(generation) {
                    return IdentifyOutcome::Superseded;
                }
                log::info!("Identification service found no match");
                self.set_phase(generation, Phase::Done);
                IdentifyOutcome::NoMatch
            }
            Err(err) => {
                if self.is_stale(generation) {
                    return IdentifyOutcome::Superseded;
                }
                log::warn!("Identification lookup failed: {}", err);
                self.fail(generation, err.into())
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn set_phase(&self, generation: u64, phase: Phase) {
        if !self.is_stale(generation) {
            *self.phase.lock().unwrap() = phase;
        }
    }

    fn publish(&self, generation: u64, song: &SongMetadata) {
        let mut last = self.last_identified.lock().unwrap();
        if !self.is_stale(generation) {
            *last = Some(song.clone());
            *self.phase.lock().unwrap() = Phase::Done;
        }
    }

    fn fail(&self, generation: u64, err: IdentifyError) -> IdentifyOutcome {
        self.set_phase(generation, Phase::Failed);
        IdentifyOutcome::Failed(err)
    }
}

/// Identification over HTTP: POSTs the raw clip bytes and expects a JSON
/// [`SongMetadata`] body on success.
pub struct HttpIdentificationService {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpIdentificationService {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl IdentificationService for HttpIdentificationService {
    fn lookup(
        &self,
        clip: &[u8],
        timeout: Duration,
    ) -> Result<Option<SongMetadata>, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ServiceError::MissingCredentials)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(clip.to_vec())
            .timeout(timeout)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    ServiceError::Timeout
                } else {
                    ServiceError::Http(err.to_string())
                }
            })?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(ServiceError::MissingCredentials)
            }
            status if status.is_success() => response
                .json::<SongMetadata>()
                .map(Some)
                .map_err(|err| ServiceError::Http(err.to_string())),
            status => Err(ServiceError::Http(format!("unexpected status {}", status))),
        }
    }
}
