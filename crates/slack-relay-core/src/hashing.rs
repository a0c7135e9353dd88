//! Content fingerprints
//!
//! A truncated SHA-256 is plenty for cache keys: a collision only costs one
//! extra suppressed send.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in a fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Truncated SHA-256 digest of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; FINGERPRINT_LEN]);

impl ContentDigest {
    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fingerprint arbitrary bytes.
///
/// # Examples
///
/// ```
/// use slack_relay_core::hashing::fingerprint;
///
/// assert_eq!(fingerprint(b"Booked."), fingerprint(b"Booked."));
/// assert_ne!(fingerprint(b"Booked."), fingerprint(b"Booked!"));
/// ```
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> ContentDigest {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&digest[..FINGERPRINT_LEN]);
    ContentDigest(out)
}

/// Fingerprint an ordered list of fields.
///
/// Each field is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
#[must_use]
pub fn fingerprint_fields(fields: &[&str]) -> ContentDigest {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&digest[..FINGERPRINT_LEN]);
    ContentDigest(out)
}
