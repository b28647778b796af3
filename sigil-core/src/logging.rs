//! Security-conscious logging utilities.
//!
//! Structured logging with `tracing` while ensuring no key material,
//! shared secret, or embedding ever reaches a log line. Byte fields are
//! logged through [`sanitize_bytes`], which renders a length and a short
//! digest prefix — enough to correlate records across log lines, never
//! enough to reconstruct the input.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use sha2::{Digest, Sha256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber from `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; only the first call installs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_e| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Render a byte field for logging: `len=<n> digest=<8 hex chars>`.
///
/// The digest prefix identifies the value across log lines without
/// revealing it; eight hex characters keep accidental offline guessing of
/// low-entropy inputs impractical to confirm.
#[must_use]
pub fn sanitize_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let prefix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("len={} digest={prefix}", data.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_bytes_hides_content() {
        let rendered = sanitize_bytes(b"super-secret-key-material");
        assert!(rendered.starts_with("len=25 digest="));
        assert!(!rendered.contains("super"), "raw bytes must not appear in the output");
    }

    #[test]
    fn test_sanitize_bytes_is_stable_per_input() {
        assert_eq!(sanitize_bytes(b"a"), sanitize_bytes(b"a"));
        assert_ne!(sanitize_bytes(b"a"), sanitize_bytes(b"b"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
