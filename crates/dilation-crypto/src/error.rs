//! Error taxonomy for the cryptographic primitives this crate supplies.

use thiserror::Error;

/// Failures from Noise session setup, the transport AEAD, or the phase-key
/// AEAD.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ephemeral keypair generation failed.
    #[error("ephemeral keypair generation failed: {0}")]
    KeypairGeneration(String),

    /// A ciphertext failed to authenticate.
    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    /// A ciphertext was shorter than the minimum nonce-plus-tag length.
    #[error("ciphertext too short: {len} bytes")]
    CiphertextTooShort {
        /// The ciphertext length that was rejected.
        len: usize,
    },

    /// A key was not the expected length for the underlying primitive.
    #[error("invalid key length: expected {expected}, found {found}")]
    InvalidKeyLength {
        /// The length the primitive requires.
        expected: usize,
        /// The length actually supplied.
        found: usize,
    },
}

impl CryptoError {
    /// Whether a retry with the same inputs could plausibly succeed.
    /// Every variant here stems from a malformed message, a failed
    /// authentication, or a programmer error — none are transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        false
    }
}
