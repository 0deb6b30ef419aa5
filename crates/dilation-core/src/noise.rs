//! The minimal Noise capability surface the Record codec depends on.
//!
//! `dilation-core` never touches a concrete Noise implementation directly;
//! it is generic over this trait so unit tests can drive the Record codec
//! with a deterministic stub instead of a real handshake.
//! `dilation-crypto::NoiseNNpsk0Session` is the production implementation,
//! built on `snow`.

use thiserror::Error;

/// A failure from the underlying Noise implementation: a malformed
/// handshake message, or a ciphertext that failed authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NoiseSessionError(pub String);

impl NoiseSessionError {
    /// Build an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The Noise session operations the Record codec drives.
///
/// Implementations own exactly one handshake's worth of state: one
/// `write_handshake_message`/`read_handshake_message` pair, after which
/// every subsequent call is `encrypt`/`decrypt`.
pub trait NoiseSession: Send {
    /// Produce this side's handshake message (the Noise ephemeral key,
    /// carrying the PSK-derived binding). Called exactly once, at
    /// construction of the owning [`crate::record_codec::RecordCodec`].
    fn write_handshake_message(&mut self) -> Vec<u8>;

    /// Consume the peer's handshake message. Called exactly once, upon
    /// receipt of the first inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseSessionError`] if the message is malformed or fails
    /// to authenticate under the shared pre-shared key.
    fn read_handshake_message(&mut self, message: &[u8]) -> Result<(), NoiseSessionError>;

    /// Encrypt a plaintext record into a ciphertext frame payload. Only
    /// valid after `read_handshake_message` has succeeded.
    fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8>;

    /// Decrypt a ciphertext frame payload into a plaintext record. Only
    /// valid after `read_handshake_message` has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseSessionError`] if authentication fails.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseSessionError>;
}

/// A deterministic Noise stand-in for tests: "encrypts" by prepending a
/// fixed tag byte and "decrypts" by checking for and stripping it. Never
/// touches real cryptography. Matches the approach the specification's
/// design notes recommend for testing the Record codec in isolation.
#[derive(Debug, Clone)]
pub struct StubNoiseSession {
    tag: u8,
    peer_tag: u8,
    handshake_sent: bool,
    handshake_received: bool,
}

impl StubNoiseSession {
    /// Build a stub where this side tags its ciphertexts with `tag` and
    /// expects the peer's ciphertexts to be tagged with `peer_tag`. Using
    /// distinct tags per side in tests catches accidental self-decryption
    /// bugs that a symmetric stub would hide.
    #[must_use]
    pub const fn new(tag: u8, peer_tag: u8) -> Self {
        Self { tag, peer_tag, handshake_sent: false, handshake_received: false }
    }
}

impl NoiseSession for StubNoiseSession {
    fn write_handshake_message(&mut self) -> Vec<u8> {
        self.handshake_sent = true;
        vec![self.tag]
    }

    fn read_handshake_message(&mut self, message: &[u8]) -> Result<(), NoiseSessionError> {
        if message != [self.peer_tag] {
            return Err(NoiseSessionError::new("stub handshake tag mismatch"));
        }
        self.handshake_received = true;
        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(plaintext.len() + 1);
        out.push(self.tag);
        out.extend_from_slice(plaintext);
        out
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseSessionError> {
        match ciphertext.split_first() {
            Some((&tag, rest)) if tag == self.peer_tag => Ok(rest.to_vec()),
            _ => Err(NoiseSessionError::new("stub ciphertext tag mismatch")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_round_trips_a_loopback_pair() {
        let mut leader = StubNoiseSession::new(0xAA, 0xBB);
        let mut follower = StubNoiseSession::new(0xBB, 0xAA);

        let leader_hs = leader.write_handshake_message();
        let follower_hs = follower.write_handshake_message();
        follower.read_handshake_message(&leader_hs).unwrap();
        leader.read_handshake_message(&follower_hs).unwrap();

        let ciphertext = leader.encrypt(b"hello");
        assert_eq!(follower.decrypt(&ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn stub_rejects_mismatched_tag() {
        let mut a = StubNoiseSession::new(0xAA, 0xBB);
        let ciphertext = a.encrypt(b"hi");
        let mut wrong = StubNoiseSession::new(0x01, 0x02);
        assert!(wrong.decrypt(&ciphertext).is_err());
    }
}
