//! Phase-key derivation and phase-message AEAD for the outer wormhole's
//! [`dilation_core::receive::Receive`] machine.
//!
//! `derive_phase_key` and `decrypt_data`/`encrypt_data` are pure functions
//! — callers provide the nonce — mirroring the sibling `*-crypto` crate's
//! "pure functions, caller supplies randomness" convention so both are
//! deterministically testable.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use dilation_core::receive::{PhaseCrypto, PhaseDecryptFailed};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Label distinguishing phase-key derivation from the Noise transport key
/// schedule, so the two never collide even if ever run over the same
/// session key by mistake.
const PHASE_KEY_LABEL: &[u8] = b"dilation-phase-key-v1";

/// Size of the random nonce prefix carried with each phase ciphertext.
pub const NONCE_LEN: usize = 24;

/// Derive the data key for one phase message.
///
/// `side` identifies the side that sent (and therefore encrypted) the
/// message; per the outer-wormhole protocol this is always the *peer's*
/// side identifier from the local machine's point of view.
#[must_use]
pub fn derive_phase_key(session_key: &[u8], side: &str, phase: &str) -> Vec<u8> {
    let hkdf = Hkdf::<Sha256>::new(None, session_key);

    let mut info = Vec::with_capacity(PHASE_KEY_LABEL.len() + side.len() + phase.len() + 2);
    info.extend_from_slice(PHASE_KEY_LABEL);
    info.push(0);
    info.extend_from_slice(side.as_bytes());
    info.push(0);
    info.extend_from_slice(phase.as_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key.to_vec()
}

/// Encrypt `plaintext` under `data_key` with the given 24-byte nonce,
/// producing `nonce || ciphertext` ready to hand to [`decrypt_data`].
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if `data_key` is not 32
/// bytes.
pub fn encrypt_data(data_key: &[u8], plaintext: &[u8], nonce: [u8; NONCE_LEN]) -> Result<Vec<u8>, CryptoError> {
    if data_key.len() != 32 {
        return Err(CryptoError::InvalidKeyLength { expected: 32, found: data_key.len() });
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(data_key);
    let cipher = XChaCha20Poly1305::new(&key_bytes.into());
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::DecryptFailed("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a phase message body produced by [`encrypt_data`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if `ciphertext` is shorter
/// than the nonce prefix, and [`CryptoError::DecryptFailed`] if
/// authentication fails.
pub fn decrypt_data(data_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data_key.len() != 32 {
        return Err(CryptoError::InvalidKeyLength { expected: 32, found: data_key.len() });
    }
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::CiphertextTooShort { len: ciphertext.len() });
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(data_key);
    let cipher = XChaCha20Poly1305::new(&key_bytes.into());
    cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::DecryptFailed("authentication failed".to_string()))
}

/// [`PhaseCrypto`] adapter wiring the free functions above into
/// `dilation-core::receive::Receive`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseCipher;

impl PhaseCrypto for PhaseCipher {
    fn derive_phase_key(&self, session_key: &[u8], side: &str, phase: &str) -> Vec<u8> {
        derive_phase_key(session_key, side, phase)
    }

    fn decrypt_data(&self, data_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, PhaseDecryptFailed> {
        decrypt_data(data_key, ciphertext).map_err(|_| PhaseDecryptFailed)
    }
}
