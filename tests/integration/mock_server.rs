//! Mock HTTP server setup for integration tests

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mockito::{Matcher, Mock, Server, ServerGuard};
use speech_relay::config::{HttpConfig, SessionConfig, SynthesisConfig};
use speech_relay::resilience::RetryConfig;
use speech_relay::session::{EndpointDescriptor, Session, SessionManager};
use speech_relay::transport::HttpTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DISCOVERY_PATH: &str = "/apps/endpoint";
pub const REGION: &str = "testregion";
pub const SYNTHESIS_PATH: &str = "/testregion/cognitiveservices/v1";
/// 2100-01-01T00:00:00Z
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Three-part token whose middle part carries `exp`.
pub fn token_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"region":"{REGION}","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

pub fn session_expiring_at(exp: i64) -> Session {
    let token = token_with_exp(exp);
    Session {
        endpoint: EndpointDescriptor {
            region: REGION.to_string(),
            token: token.clone(),
            extra: HashMap::new(),
        },
        token,
        expires_at: exp,
    }
}

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.base_url, DISCOVERY_PATH)
    }

    pub fn synthesis_template(&self) -> String {
        format!("{}/{{region}}/cognitiveservices/v1", self.base_url)
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(&HttpConfig::default(), "okhttp/4.5.0").expect("transport")
    }

    /// Session settings pointed at the mock server, retrying without delay.
    pub fn session_config(&self, attempts: u32) -> SessionConfig {
        SessionConfig {
            discovery_url: self.discovery_url(),
            retry: RetryConfig::immediate(attempts),
            ..Default::default()
        }
    }

    pub fn synthesis_config(&self, attempts: u32) -> SynthesisConfig {
        SynthesisConfig {
            url_template: self.synthesis_template(),
            retry: RetryConfig::immediate(attempts),
            ..Default::default()
        }
    }

    pub fn session_manager(&self, attempts: u32) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            self.session_config(attempts),
            self.transport(),
        ))
    }

    /// Discovery answering with a token that expires at `exp`.
    pub async fn mock_discovery(&self, exp: i64, hits: usize) -> Mock {
        let body = serde_json::json!({
            "r": REGION,
            "t": token_with_exp(exp),
            "u": format!("https://{REGION}.example"),
        });
        let mut server = self.server.lock().await;
        server
            .mock("POST", DISCOVERY_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_discovery_error(&self, status: usize, hits: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", DISCOVERY_PATH)
            .with_status(status)
            .with_body("discovery unavailable")
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_synthesis(&self, audio: &'static [u8], hits: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", SYNTHESIS_PATH)
            .match_header("content-type", "application/ssml+xml")
            .match_header(
                "x-microsoft-outputformat",
                "audio-24khz-48kbitrate-mono-mp3",
            )
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body(audio)
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_synthesis_error(&self, status: usize, body: &str, hits: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", SYNTHESIS_PATH)
            .match_header("content-type", Matcher::Any)
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}
