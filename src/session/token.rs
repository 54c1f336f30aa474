use crate::{Error, ErrorContext, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;

/// Read the `exp` claim from a three-part dot-separated token.
///
/// The payload may use either base64 alphabet, padded or not.
pub fn expiry_claim(token: &str) -> Result<i64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(malformed(format!(
            "expected 3 dot-separated parts, found {}",
            parts.len()
        )));
    }

    let normalized: String = parts[1]
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let payload = STANDARD_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| malformed(format!("payload is not base64: {}", e)))?;
    let claims: serde_json::Value = serde_json::from_slice(&payload)?;

    let exp = &claims["exp"];
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or_else(|| malformed("payload has no numeric exp claim".to_string()))
}

fn malformed(details: String) -> Error {
    Error::validation_with_context(
        "Malformed session token",
        ErrorContext::new()
            .with_details(details)
            .with_source("session"),
    )
}
