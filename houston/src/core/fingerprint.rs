//! Deterministic fingerprints used as cache keys and per-entry secrets.

use sha2::{Digest, Sha256};

/// Number of hex characters in a default fingerprint (128 bits).
pub const DEFAULT_FINGERPRINT_LEN: usize = 32;

/// Fingerprint raw bytes, rendered as [`DEFAULT_FINGERPRINT_LEN`] lowercase hex chars.
pub fn fingerprint(bytes: impl AsRef<[u8]>) -> String {
    fingerprint_with_len(bytes, DEFAULT_FINGERPRINT_LEN)
}

/// Fingerprint raw bytes, rendered as exactly `len` lowercase hex chars.
///
/// The digest is left-padded with `0` when `len` exceeds its natural width and
/// truncated from the right otherwise.
pub fn fingerprint_with_len(bytes: impl AsRef<[u8]>, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    let digest = hex::encode(hasher.finalize());
    let mut padded = format!("{digest:0>len$}");
    padded.truncate(len);
    padded
}
