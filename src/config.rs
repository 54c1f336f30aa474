//! Relay configuration.
//!
//! Every field has a production default, so an empty YAML document is a valid
//! configuration. Values can be overridden from `SPEECH_RELAY_*` environment
//! variables after loading.

use crate::resilience::RetryConfig;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DISCOVERY_URL: &str =
    "https://dev.microsofttranslator.com/apps/endpoint?api-version=1.0";
pub const DEFAULT_SYNTHESIS_URL_TEMPLATE: &str =
    "https://{region}.tts.speech.microsoft.com/cognitiveservices/v1";
pub const DEFAULT_USER_AGENT: &str = "okhttp/4.5.0";
pub const DEFAULT_STORAGE_BUDGET_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub session: SessionConfig,
    pub synthesis: SynthesisConfig,
    pub planner: PlannerConfig,
    pub stream: StreamConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub discovery_url: String,
    /// Renew this many seconds before the token's expiry claim.
    pub refresh_skew_secs: i64,
    /// Public host of this relay; seeds the stable client user id.
    pub client_host: Option<String>,
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            refresh_skew_secs: 300,
            client_host: None,
            retry: RetryConfig {
                max_attempts: 5,
                step: Duration::from_millis(500),
                max_delay: Some(Duration::from_millis(4000)),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// `{region}` is replaced with the session's regional host prefix.
    pub url_template: String,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_SYNTHESIS_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig {
                max_attempts: 4,
                step: Duration::from_millis(400),
                max_delay: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub fixed_max_len: usize,
    pub sentence_max_len: usize,
    pub first_max_len: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            fixed_max_len: 2000,
            sentence_max_len: 300,
            first_max_len: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Segments synthesized strictly in order before the concurrent phase.
    pub sync_segments: usize,
    /// Upper bound on outstanding synthesis calls in the concurrent phase.
    pub concurrency: usize,
    /// Bounded channel depth between the assembler and the consumer.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sync_segments: 1,
            concurrency: 2,
            channel_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub budget_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_STORAGE_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            pool_max_idle_per_host: 32,
            proxy_url: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl RelayConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid relay configuration: {}", e),
                ErrorContext::new().with_source("config"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_details(path.display().to_string()),
            },
            other => other,
        })
    }

    /// Overlay `SPEECH_RELAY_*` environment variables onto the loaded values.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("SPEECH_RELAY_DISCOVERY_URL") {
            self.session.discovery_url = url;
        }
        if let Some(skew) = env_parse("SPEECH_RELAY_REFRESH_SKEW_SECS") {
            self.session.refresh_skew_secs = skew;
        }
        if let Ok(host) = env::var("SPEECH_RELAY_CLIENT_HOST") {
            self.session.client_host = Some(host);
        }
        if let Ok(template) = env::var("SPEECH_RELAY_SYNTHESIS_URL_TEMPLATE") {
            self.synthesis.url_template = template;
        }
        if let Some(n) = env_parse("SPEECH_RELAY_SYNC_SEGMENTS") {
            self.stream.sync_segments = n;
        }
        if let Some(n) = env_parse("SPEECH_RELAY_CONCURRENCY") {
            self.stream.concurrency = n;
        }
        if let Some(n) = env_parse("SPEECH_RELAY_STORAGE_BUDGET_BYTES") {
            self.storage.budget_bytes = n;
        }
        if let Some(n) = env_parse("SPEECH_RELAY_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = n;
        }
        if let Ok(proxy) = env::var("SPEECH_RELAY_PROXY_URL") {
            self.http.proxy_url = Some(proxy);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 8] = [
            ("planner.fixed_max_len", self.planner.fixed_max_len > 0),
            ("planner.sentence_max_len", self.planner.sentence_max_len > 0),
            ("planner.first_max_len", self.planner.first_max_len > 0),
            ("stream.concurrency", self.stream.concurrency > 0),
            ("stream.channel_capacity", self.stream.channel_capacity > 0),
            ("session.retry.max_attempts", self.session.retry.max_attempts > 0),
            ("synthesis.retry.max_attempts", self.synthesis.retry.max_attempts > 0),
            ("http.timeout_secs", self.http.timeout_secs > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(Error::configuration_with_context(
                    "value must be greater than zero",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("config"),
                ));
            }
        }
        match url::Url::parse(&self.session.discovery_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => {}
            _ => {
                return Err(Error::configuration_with_context(
                    format!("discovery url is not an http(s) URL: {}", self.session.discovery_url),
                    ErrorContext::new()
                        .with_field_path("session.discovery_url")
                        .with_source("config"),
                ));
            }
        }
        if !self.synthesis.url_template.contains("{region}") {
            return Err(Error::configuration_with_context(
                "synthesis url template has no {region} placeholder",
                ErrorContext::new()
                    .with_field_path("synthesis.url_template")
                    .with_source("config"),
            ));
        }
        Ok(())
    }
}
