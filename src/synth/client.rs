use super::{ssml, OutputFormat, SegmentSynthesizer};
use crate::config::SynthesisConfig;
use crate::planner::Segment;
use crate::session::{Session, SessionManager};
use crate::transport::{HttpTransport, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tracing::{debug, warn};

/// Synthesizes segments against the regional upstream endpoint.
///
/// Every attempt asks the [`SessionManager`] for a valid session first, so a
/// token that expires in the middle of a retry loop is renewed transparently.
#[derive(Clone)]
pub struct ChunkSynthesizer {
    sessions: Arc<SessionManager>,
    transport: HttpTransport,
    config: SynthesisConfig,
}

impl ChunkSynthesizer {
    pub fn new(
        sessions: Arc<SessionManager>,
        transport: HttpTransport,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            sessions,
            transport,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Synthesis URL for the session's region.
    pub fn endpoint_for(&self, session: &Session) -> String {
        self.config
            .url_template
            .replace("{region}", session.region())
    }

    async fn attempt(&self, payload: &str, format: &OutputFormat) -> Result<Bytes> {
        let session = self.sessions.get_valid_session().await?;
        let url = self.endpoint_for(&session);

        let response = self
            .transport
            .post(&url)
            .header(AUTHORIZATION, session.token.as_str())
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", format.as_str())
            .body(payload.to_owned())
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no reason").to_string()
            } else {
                body.trim().to_string()
            };
            return Err(Error::remote(status.as_u16(), message));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}

#[async_trait]
impl SegmentSynthesizer for ChunkSynthesizer {
    async fn synthesize(&self, segment: &Segment, format: &OutputFormat) -> Result<Bytes> {
        let payload = ssml::build_ssml(&segment.text, &segment.voice);
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.attempt(&payload, format).await {
                Ok(bytes) => {
                    debug!(
                        index = segment.index,
                        attempt = attempt + 1,
                        bytes = bytes.len(),
                        "segment synthesized"
                    );
                    return Ok(bytes);
                }
                // Discovery already retried.
                Err(e @ Error::SessionAcquisition { .. }) => return Err(e),
                Err(e) if e.is_transient() && retry.has_next(attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        index = segment.index,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient synthesis failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(index = segment.index, attempt = attempt + 1, error = %e, "synthesis failed");
                    return Err(e);
                }
            }
        }
    }
}
