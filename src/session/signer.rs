//! Discovery request signing and client identity headers.

use crate::{Error, ErrorContext, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const APP_ID: &str = "MSTranslatorAndroidApp";

const SIGNING_KEY_B64: &str =
    "oik6PdDdMnOXemTbwvMn9de/h9lFnfBaCWbGMMZqqoSaQaqUOqjVGm5NqsmjcBI1x+sS9ugjB55HEJWRiFXYFw==";

/// Used when no relay host is configured.
pub const DEFAULT_USER_ID: &str = "0f04d16a175c411e";

/// Locale/client-version header set sent with a discovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientVariant {
    pub accept_language: &'static str,
    pub home_region: &'static str,
    pub client_version: &'static str,
}

/// Rotated per attempt so consecutive retries do not look identical upstream.
pub const CLIENT_VARIANTS: [ClientVariant; 3] = [
    ClientVariant {
        accept_language: "zh-Hans",
        home_region: "zh-Hans-CN",
        client_version: "4.0.530a 5fe1dc6c",
    },
    ClientVariant {
        accept_language: "en-US",
        home_region: "en-US",
        client_version: "4.0.530a 5fe1dc6c",
    },
    ClientVariant {
        accept_language: "en-US",
        home_region: "en-US",
        client_version: "4.0.531a 5fe1dc6c",
    },
];

pub fn variant_for_attempt(attempt: u32) -> &'static ClientVariant {
    &CLIENT_VARIANTS[attempt as usize % CLIENT_VARIANTS.len()]
}

/// Random 32-hex-digit correlation id.
pub fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `Mon, 19 Oct 2026 04:46:00 GMT`
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The lowercased string that gets signed.
pub fn signing_payload(url: &str, date: &str, nonce: &str) -> String {
    let target = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let encoded = encode_uri_component(target);
    format!("{APP_ID}{encoded}{date}{nonce}").to_lowercase()
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
/// Space becomes `%20`, never `+`.
fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Build the `X-MT-Signature` header value for `url`.
pub fn sign(url: &str, now: DateTime<Utc>, nonce: &str) -> Result<String> {
    let date = http_date(now);
    let payload = signing_payload(url, &date, nonce);

    let key = STANDARD.decode(SIGNING_KEY_B64).map_err(|e| {
        Error::configuration_with_context(
            format!("signing key is not valid base64: {}", e),
            ErrorContext::new().with_source("signer"),
        )
    })?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|e| {
        Error::configuration_with_context(
            format!("signing key rejected: {}", e),
            ErrorContext::new().with_source("signer"),
        )
    })?;
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("{APP_ID}::{signature}::{date}::{nonce}"))
}

/// Stable per-deployment user id derived from the relay's public host.
///
/// 32-bit rolling hash (`h = h * 31 + unit` over UTF-16 units), rendered as
/// `|h|` and `|h * 31|` in zero-padded hex. The second product is not wrapped,
/// so it can exceed eight digits.
pub fn user_id_for_host(host: Option<&str>) -> String {
    let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) else {
        return DEFAULT_USER_ID.to_string();
    };

    let mut hash: i32 = 0;
    for unit in host.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }

    let first = (hash as i64).abs();
    let second = (hash as i64 * 31).abs();
    format!("{:08x}{:08x}", first, second)
}
