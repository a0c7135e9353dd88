//! Slack request signing verification.

use crate::config::SIGNATURE_MAX_AGE_SECS;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
/// Header carrying the request timestamp (unix seconds).
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

const VERSION: &str = "v0";

/// Why a request failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Signature or timestamp header absent
    #[error("Missing signature header: {0}")]
    MissingHeader(&'static str),
    /// Timestamp is not an integer
    #[error("Invalid request timestamp: {0}")]
    InvalidTimestamp(String),
    /// Timestamp is outside the accepted window
    #[error("Request timestamp is {age_secs}s away from now")]
    Stale {
        /// Absolute distance from the current time
        age_secs: u64,
    },
    /// Signature is not `v0=<hex>`
    #[error("Malformed signature")]
    Malformed,
    /// Signature does not match the body
    #[error("Signature mismatch")]
    Mismatch,
    /// Signing secret rejected by the MAC
    #[error("Invalid signing key")]
    InvalidKey,
}

/// Verify a Slack request signature.
///
/// `now` is the current unix time in seconds. Comparison is constant-time.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first failed check.
pub fn verify(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;
    let age_secs = now.abs_diff(ts);
    if age_secs > SIGNATURE_MAX_AGE_SECS {
        return Err(SignatureError::Stale { age_secs });
    }

    let expected = signature
        .strip_prefix("v0=")
        .and_then(|h| hex::decode(h).ok())
        .ok_or(SignatureError::Malformed)?;

    signing_mac(secret, ts, body)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compute the `v0=<hex>` signature for `body` sent at `timestamp`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the MAC rejects the secret.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let digest = signing_mac(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("{VERSION}={}", hex::encode(digest)))
}

fn signing_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(format!("{VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(mac)
}
