//! Derives a request's `unique_key` from `method|url|payload` (spec.md §3).
//!
//! SHA-256 the pipe-joined normalized triple, base64url-encode the digest,
//! and truncate to 15 characters — short enough to key storage-client
//! records cheaply while keeping collision probability negligible for any
//! realistically sized crawl.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

const MAX_LEN: usize = 15;

pub fn unique_key_for(method: &str, normalized_url: &str, payload: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"|");
    if let Some(payload) = payload {
        hasher.update(payload);
    }
    let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
    encoded[..MAX_LEN.min(encoded.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(
            unique_key_for("GET", "https://example.com/", None),
            unique_key_for("GET", "https://example.com/", None)
        );
    }

    #[test]
    fn is_at_most_15_chars() {
        assert!(unique_key_for("GET", "https://example.com/a/very/long/path?q=1&r=2", None).len() <= MAX_LEN);
    }

    #[test]
    fn differs_for_different_input() {
        assert_ne!(
            unique_key_for("GET", "https://example.com/a", None),
            unique_key_for("GET", "https://example.com/b", None)
        );
    }

    #[test]
    fn differs_by_method() {
        assert_ne!(
            unique_key_for("GET", "https://example.com/a", None),
            unique_key_for("POST", "https://example.com/a", None)
        );
    }

    #[test]
    fn differs_by_payload() {
        assert_ne!(
            unique_key_for("POST", "https://example.com/a", Some(b"one")),
            unique_key_for("POST", "https://example.com/a", Some(b"two"))
        );
    }
}
