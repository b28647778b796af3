#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! HKDF-SHA256 (RFC 5869) via aws-lc-rs.
//!
//! Stretches a KEM shared secret into a fixed-length symmetric key with
//! domain separation through the `info` parameter. The recovery core always
//! derives 256-bit AEAD keys; [`derive_key`] is fixed to that length.

use aws_lc_rs::hkdf::{KeyType, Salt, HKDF_SHA256};
use tracing::instrument;
use zeroize::Zeroizing;

use super::KdfError;

/// Derived AEAD key length in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

/// Maximum HKDF-SHA256 output length (255 × 32 bytes, RFC 5869 §2.3).
const MAX_OUTPUT_LEN: usize = 255 * 32;

struct OkmLen(usize);

impl KeyType for OkmLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// Derive a 256-bit key from `input_keying_material`.
///
/// `salt` and `info` follow RFC 5869: the salt normalizes the input entropy
/// and the info string provides domain separation between callers.
///
/// # Errors
///
/// Returns [`KdfError::Derivation`] if the expand step fails.
#[instrument(level = "debug", skip_all, fields(ikm_len = input_keying_material.len()))]
pub fn derive_key(
    input_keying_material: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, KdfError> {
    let mut okm = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    expand_into(input_keying_material, salt, info, okm.as_mut())?;
    Ok(okm)
}

/// Derive `output.len()` bytes of keying material into `output`.
///
/// # Errors
///
/// Returns [`KdfError::InvalidOutputLength`] if `output` is empty or longer
/// than the RFC 5869 maximum, or [`KdfError::Derivation`] if the expand
/// step fails.
pub fn expand_into(
    input_keying_material: &[u8],
    salt: &[u8],
    info: &[u8],
    output: &mut [u8],
) -> Result<(), KdfError> {
    if output.is_empty() || output.len() > MAX_OUTPUT_LEN {
        return Err(KdfError::InvalidOutputLength(output.len()));
    }

    let salt = Salt::new(HKDF_SHA256, salt);
    let prk = salt.extract(input_keying_material);
    let info_refs: [&[u8]; 1] = [info];
    let okm = prk
        .expand(&info_refs, OkmLen(output.len()))
        .map_err(|_e| KdfError::Derivation("HKDF expand failed".to_string()))?;
    okm.fill(output).map_err(|_e| KdfError::Derivation("HKDF fill failed".to_string()))?;
    Ok(())
}
