use crate::config::HttpConfig;
use crate::Result;
use reqwest::Proxy;
use std::time::Duration;
use tracing::debug;

/// Pooled HTTP client used for every upstream call.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, user_agent: impl Into<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = config.proxy_url.as_deref() {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => debug!(proxy_url, error = %e, "ignoring unparsable proxy url"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }

    /// POST builder with the relay's User-Agent already applied.
    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
