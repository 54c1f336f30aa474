//! 会话管理模块：获取并续期上游访问令牌与区域端点。
//!
//! # Upstream Session Management
//!
//! The synthesis endpoint only accepts short-lived bearer tokens issued by a
//! discovery endpoint. [`SessionManager`] owns the cached [`Session`] and
//! renews it when it comes within `refresh_skew_secs` of its expiry claim.
//!
//! ## Renewal protocol
//!
//! 1. Sign the discovery URL with HMAC-SHA256 ([`signer::sign`]).
//! 2. POST with rotating locale/client-version header variants.
//! 3. Decode the middle part of the returned token and trust its `exp` claim.
//!
//! Renewal is single-flight: concurrent callers that observe a stale session
//! wait for the one renewal in progress instead of issuing their own.
//! When every attempt fails, a stale cached session is still returned; only a
//! cold manager surfaces [`Error::SessionAcquisition`](crate::Error::SessionAcquisition).

mod manager;
pub mod signer;
mod token;

pub use manager::{SessionManager, SessionStats};
pub use token::expiry_claim;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Endpoint descriptor returned by the discovery call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Regional host prefix of the synthesis endpoint.
    #[serde(rename = "r")]
    pub region: String,
    /// Opaque three-part token.
    #[serde(rename = "t")]
    pub token: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Cached upstream credential.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub endpoint: EndpointDescriptor,
    pub token: String,
    /// Expiry claim of the token, seconds since the Unix epoch.
    pub expires_at: i64,
}

impl Session {
    pub fn from_endpoint(endpoint: EndpointDescriptor) -> crate::Result<Self> {
        let expires_at = expiry_claim(&endpoint.token)?;
        Ok(Self {
            token: endpoint.token.clone(),
            endpoint,
            expires_at,
        })
    }

    /// Usable without renewal at `now`.
    pub fn is_fresh(&self, now: i64, skew_secs: i64) -> bool {
        now < self.expires_at.saturating_sub(skew_secs)
    }

    pub fn region(&self) -> &str {
        &self.endpoint.region
    }
}
