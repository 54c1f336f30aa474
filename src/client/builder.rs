use crate::client::core::SpeechRelay;
use crate::config::RelayConfig;
use crate::planner::ChunkPlanner;
use crate::session::{Session, SessionManager};
use crate::storage::{AudioLibrary, KvStore};
use crate::stream::StreamAssembler;
use crate::synth::{ChunkSynthesizer, SegmentSynthesizer};
use crate::transport::HttpTransport;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Builder for [`SpeechRelay`].
///
/// Starts from [`RelayConfig::default`]; every knob can also come from a YAML
/// file or `SPEECH_RELAY_*` environment variables.
pub struct SpeechRelayBuilder {
    config: RelayConfig,
    synthesizer: Option<Arc<dyn SegmentSynthesizer>>,
    store: Option<Arc<dyn KvStore>>,
    seed: Option<Session>,
}

impl SpeechRelayBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            synthesizer: None,
            store: None,
            seed: None,
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Load YAML configuration, then overlay the environment.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = RelayConfig::from_yaml_file(path)?.apply_env_overrides();
        Ok(self)
    }

    pub fn from_env(mut self) -> Self {
        self.config = self.config.apply_env_overrides();
        self
    }

    /// Replace the upstream synthesizer, e.g. with a scripted fake.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SegmentSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Enable the audio library on top of `store`.
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start with a known session instead of a cold cache.
    pub fn seed_session(mut self, session: Session) -> Self {
        self.seed = Some(session);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.stream.concurrency = n.max(1);
        self
    }

    pub fn sync_segments(mut self, n: usize) -> Self {
        self.config.stream.sync_segments = n;
        self
    }

    pub fn client_host(mut self, host: impl Into<String>) -> Self {
        self.config.session.client_host = Some(host.into());
        self
    }

    pub fn build(self) -> Result<SpeechRelay> {
        let config = self.config;
        config.validate()?;

        let transport = HttpTransport::new(&config.http, config.synthesis.user_agent.clone())?;
        let sessions = Arc::new(SessionManager::new(
            config.session.clone(),
            transport.clone(),
        ));
        if let Some(session) = self.seed {
            sessions.seed(session);
        }

        let synthesizer: Arc<dyn SegmentSynthesizer> = match self.synthesizer {
            Some(synthesizer) => synthesizer,
            None => Arc::new(ChunkSynthesizer::new(
                sessions.clone(),
                transport,
                config.synthesis.clone(),
            )),
        };

        Ok(SpeechRelay {
            sessions,
            planner: ChunkPlanner::new(config.planner),
            assembler: StreamAssembler::new(synthesizer, config.stream),
            library: self
                .store
                .map(|store| Arc::new(AudioLibrary::new(store, config.storage.budget_bytes))),
        })
    }
}

impl Default for SpeechRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
