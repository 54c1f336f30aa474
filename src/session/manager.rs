use super::signer::{self, ClientVariant};
use super::{EndpointDescriptor, Session};
use crate::config::SessionConfig;
use crate::transport::{HttpTransport, TransportError};
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use chrono::Utc;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Counters for observing renewal behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub discovery_calls: u64,
    pub renewals: u64,
    pub fallbacks: u64,
}

/// Result of the most recent renewal, handed to callers that queued behind it.
#[derive(Debug, Clone)]
enum RenewalOutcome {
    Session(Arc<Session>),
    Failed { attempts: u32, message: String },
}

impl RenewalOutcome {
    fn from_result(result: &Result<Arc<Session>>, attempts: u32) -> Self {
        match result {
            Ok(session) => Self::Session(session.clone()),
            Err(Error::SessionAcquisition { attempts, message }) => Self::Failed {
                attempts: *attempts,
                message: message.clone(),
            },
            Err(e) => Self::Failed {
                attempts,
                message: e.to_string(),
            },
        }
    }

    fn into_result(self) -> Result<Arc<Session>> {
        match self {
            Self::Session(session) => Ok(session),
            Self::Failed { attempts, message } => {
                Err(Error::SessionAcquisition { attempts, message })
            }
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    discovery_calls: AtomicU64,
    renewals: AtomicU64,
    fallbacks: AtomicU64,
}

/// Owns the process-lifetime upstream session.
///
/// Built once and shared by handle (`Arc<SessionManager>`). Reads go through a
/// lock-free snapshot; the renewal gate is only taken when the snapshot is stale.
/// Callers that queue on the gate while a renewal runs receive that renewal's
/// outcome, including a stale fallback or an acquisition error.
pub struct SessionManager {
    config: SessionConfig,
    transport: HttpTransport,
    user_id: String,
    cached: ArcSwapOption<Session>,
    renewal_gate: Mutex<Option<RenewalOutcome>>,
    // Bumped under the gate each time a renewal finishes.
    renewal_epoch: AtomicU64,
    stats: AtomicStats,
}

impl SessionManager {
    pub fn new(config: SessionConfig, transport: HttpTransport) -> Self {
        let user_id = signer::user_id_for_host(config.client_host.as_deref());
        Self {
            config,
            transport,
            user_id,
            cached: ArcSwapOption::empty(),
            renewal_gate: Mutex::new(None),
            renewal_epoch: AtomicU64::new(0),
            stats: AtomicStats::default(),
        }
    }

    /// Install a known session, e.g. one persisted before a restart.
    pub fn seed(&self, session: Session) {
        self.cached.store(Some(Arc::new(session)));
    }

    /// Current cached session, fresh or not.
    pub fn cached(&self) -> Option<Arc<Session>> {
        self.cached.load_full()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            discovery_calls: self.stats.discovery_calls.load(Ordering::Relaxed),
            renewals: self.stats.renewals.load(Ordering::Relaxed),
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn get_valid_session(&self) -> Result<Arc<Session>> {
        self.get_valid_session_at(Utc::now().timestamp()).await
    }

    /// Session usable at `now` (Unix seconds), renewing first if needed.
    pub async fn get_valid_session_at(&self, now: i64) -> Result<Arc<Session>> {
        if let Some(session) = self.fresh_at(now) {
            return Ok(session);
        }

        let seen_epoch = self.renewal_epoch.load(Ordering::Acquire);
        let mut last_outcome = self.renewal_gate.lock().await;
        // Whoever held the gate before us may already have renewed.
        if let Some(session) = self.fresh_at(now) {
            debug!("session renewed by a concurrent caller");
            return Ok(session);
        }
        if self.renewal_epoch.load(Ordering::Acquire) != seen_epoch {
            if let Some(outcome) = last_outcome.clone() {
                debug!("reusing outcome of the renewal that ran while waiting");
                return outcome.into_result();
            }
        }

        let result = self.renew().await;
        *last_outcome = Some(RenewalOutcome::from_result(
            &result,
            self.config.retry.max_attempts,
        ));
        self.renewal_epoch.fetch_add(1, Ordering::Release);
        result
    }

    fn fresh_at(&self, now: i64) -> Option<Arc<Session>> {
        self.cached
            .load_full()
            .filter(|s| s.is_fresh(now, self.config.refresh_skew_secs))
    }

    async fn renew(&self) -> Result<Arc<Session>> {
        let retry = &self.config.retry;
        let mut last_error: Option<Error> = None;

        for attempt in 0..retry.max_attempts {
            let variant = signer::variant_for_attempt(attempt);
            match self.discover(variant).await {
                Ok(session) => {
                    info!(
                        region = %session.region(),
                        expires_at = session.expires_at,
                        attempt = attempt + 1,
                        "upstream session renewed"
                    );
                    let session = Arc::new(session);
                    self.cached.store(Some(session.clone()));
                    self.stats.renewals.fetch_add(1, Ordering::Relaxed);
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "endpoint discovery failed");
                    last_error = Some(e);
                    if retry.has_next(attempt) {
                        tokio::time::sleep(retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        if let Some(stale) = self.cached.load_full() {
            warn!(
                expires_at = stale.expires_at,
                "using cached session after discovery failures"
            );
            self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
            return Ok(stale);
        }

        Err(Error::SessionAcquisition {
            attempts: retry.max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no discovery attempt was made".to_string()),
        })
    }

    async fn discover(&self, variant: &ClientVariant) -> Result<Session> {
        self.stats.discovery_calls.fetch_add(1, Ordering::Relaxed);

        let url = self.config.discovery_url.as_str();
        let signature = signer::sign(url, Utc::now(), &signer::correlation_id())?;

        let response = self
            .transport
            .post(url)
            .header("Accept-Language", variant.accept_language)
            .header("X-ClientVersion", variant.client_version)
            .header("X-UserId", &self.user_id)
            .header("X-HomeGeographicRegion", variant.home_region)
            .header("X-ClientTraceId", signer::correlation_id())
            .header("X-MT-Signature", signature)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(CONTENT_LENGTH, "0")
            .body(Vec::new())
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::remote(
                status.as_u16(),
                format!("discovery rejected: {}", body.trim()),
            ));
        }

        let endpoint: EndpointDescriptor = response
            .json()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Session::from_endpoint(endpoint)
    }
}
