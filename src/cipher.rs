//! The post-handshake demonstration cipher.
//!
//! A length-preserving stream transform used only to show that both
//! sides hold the same session key. Not security-grade; see the crate
//! docs.

use crate::errors::{ErrorKind, Result};
use error_chain::ensure;

/// A symmetric, self-inverse stream transform.
///
/// Like [`Mac`](crate::Mac), this is a seam for substituting a real
/// cipher; the engine never names a concrete implementation.
pub trait SymmetricCipher: Send + Sync {
    /// Applies the keystream to `data`. Applying it twice with the
    /// same key returns the original input.
    fn apply(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>>;
}

/// Default transform: `out[i] = data[i] XOR key[i mod key.len()]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorCipher;

impl SymmetricCipher for XorCipher {
    fn apply(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        ensure!(
            !key.is_empty(),
            ErrorKind::Validation("cipher key must not be empty".into())
        );
        Ok(data
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()])
            .collect())
    }
}
