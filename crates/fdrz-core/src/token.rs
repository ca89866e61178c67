//! Bearer token inspection.
//!
//! Claims are decoded without signature verification; the backend remains the
//! authority on validity. Absent or malformed tokens read as expired and
//! never surface an error.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Default safety margin applied by [`is_token_expired`].
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 600;

/// Decodes the claims segment of a JWT.
///
/// Returns `None` unless the token has three dot-separated parts and the
/// middle one is base64url-encoded JSON object.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = parts[1].trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    match serde_json::from_slice(&decoded).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// Reads the `exp` claim (seconds since epoch).
fn expiry_secs(token: &str) -> Option<f64> {
    let claims = decode_claims(token)?;
    claims.get("exp").and_then(Value::as_f64)
}

/// Returns true if the token is absent, malformed, lacks an `exp` claim, or
/// expires within `buffer_secs` of now.
pub fn is_token_expired(token: Option<&str>, buffer_secs: i64) -> bool {
    is_token_expired_at(token, buffer_secs, Utc::now())
}

/// [`is_token_expired`] against an explicit clock.
pub fn is_token_expired_at(token: Option<&str>, buffer_secs: i64, now: DateTime<Utc>) -> bool {
    let Some(token) = token else {
        return true;
    };
    let Some(exp) = expiry_secs(token) else {
        tracing::debug!("token has no readable expiry claim; treating as expired");
        return true;
    };
    exp < now.timestamp().saturating_add(buffer_secs) as f64
}

/// Returns the token's expiry as an absolute time, or `None` if absent/malformed.
pub fn get_token_expiration(token: Option<&str>) -> Option<DateTime<Utc>> {
    let exp = expiry_secs(token?)?;
    DateTime::from_timestamp_millis((exp * 1000.0) as i64)
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}
