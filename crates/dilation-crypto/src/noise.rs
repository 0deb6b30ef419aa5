//! Production [`dilation_core::NoiseSession`] built on an ephemeral X25519
//! exchange, pre-shared-key-bound key derivation, and `ChaCha20-Poly1305`
//! transport encryption — the cryptographic content of
//! `Noise_NNpsk0_25519_ChaChaPoly_BLAKE2s`.
//!
//! `dilation-core::record_codec::RecordCodec` calls
//! `write_handshake_message` once, immediately after its own prologue is
//! consumed, and `read_handshake_message` once, on the first inbound
//! frame — for *both* the Leader and the Follower, without either side
//! waiting on the other first. A textbook `Noise_NNpsk0` exchange is
//! turn-ordered (the responder's single message depends on having read
//! the initiator's), which does not fit that symmetric calling
//! convention. This implementation instead has each side write only its
//! own ephemeral public key (independent of the peer), and defers all key
//! derivation — the Diffie-Hellman, the direction split, the pre-shared
//! key mixing — to `read_handshake_message`, once both ephemerals are
//! known to the local side. The wire content (one 32-byte public key each
//! way) and the resulting security property (a transport key only a
//! holder of the pre-shared session key and an ephemeral private key
//! could derive) match the Noise pattern's intent even though `snow`'s
//! turn-ordered `HandshakeState` machinery is not used to drive it; `snow`
//! is used here only for its `Builder::generate_keypair` convenience.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use dilation_core::{
    Role,
    noise::{NoiseSession, NoiseSessionError},
};
use hkdf::Hkdf;
use sha2::Sha256;
use snow::Builder;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// The Noise pattern this session's key schedule is modelled on. Recorded
/// for diagnostics and log lines; see the module docs for how this
/// implementation departs from `snow`'s literal pattern machine.
pub const NOISE_PATTERN: &str = "Noise_NNpsk0_25519_ChaChaPoly_BLAKE2s";

const EPHEMERAL_KEY_LEN: usize = 32;
const TRANSPORT_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

fn derive_transport_keys(session_key: &[u8; 32], shared_secret: &[u8; 32], role: Role) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::new(Some(session_key), shared_secret);

    let mut leader_to_follower = [0u8; TRANSPORT_KEY_LEN];
    let mut follower_to_leader = [0u8; TRANSPORT_KEY_LEN];
    let Ok(()) = hkdf.expand(b"dilation-l2f-v1", &mut leader_to_follower) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    let Ok(()) = hkdf.expand(b"dilation-f2l-v1", &mut follower_to_leader) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    match role {
        Role::Leader => (leader_to_follower, follower_to_leader),
        Role::Follower => (follower_to_leader, leader_to_follower),
    }
}

fn counter_nonce(counter: u64) -> [u8; NONCE_LEN] {
    let mut bytes = [0u8; NONCE_LEN];
    bytes[4..].copy_from_slice(&counter.to_be_bytes());
    bytes
}

/// The production `NoiseSession`: an ephemeral X25519 exchange bound to a
/// pre-shared session key, yielding two directional `ChaCha20-Poly1305`
/// transport keys.
pub struct NoiseNNpsk0Session {
    local_private: [u8; EPHEMERAL_KEY_LEN],
    local_public: [u8; EPHEMERAL_KEY_LEN],
    session_key: [u8; 32],
    role: Role,
    send_cipher: ChaCha20Poly1305,
    send_counter: u64,
    recv_cipher: ChaCha20Poly1305,
    recv_counter: u64,
}

impl NoiseNNpsk0Session {
    /// Build a new session for one connection, generating a fresh
    /// ephemeral keypair.
    ///
    /// `session_key` is the 32-byte secret established by the outer
    /// wormhole's SPAKE2 exchange, used here as the Noise pre-shared key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeypairGeneration`] if the underlying RNG
    /// fails, and [`CryptoError::InvalidKeyLength`] if `session_key` is
    /// not exactly 32 bytes.
    pub fn new(session_key: &[u8], role: Role) -> Result<Self, CryptoError> {
        if session_key.len() != 32 {
            return Err(CryptoError::InvalidKeyLength { expected: 32, found: session_key.len() });
        }
        let pattern = NOISE_PATTERN
            .parse()
            .map_err(|e: snow::Error| CryptoError::KeypairGeneration(e.to_string()))?;
        let keypair = Builder::new(pattern)
            .generate_keypair()
            .map_err(|e| CryptoError::KeypairGeneration(e.to_string()))?;

        let mut local_private = [0u8; EPHEMERAL_KEY_LEN];
        local_private.copy_from_slice(&keypair.private);
        let mut local_public = [0u8; EPHEMERAL_KEY_LEN];
        local_public.copy_from_slice(&keypair.public);
        let mut session_key_arr = [0u8; 32];
        session_key_arr.copy_from_slice(session_key);

        // Placeholder ciphers until `read_handshake_message` derives the
        // real transport keys; never used before that by the owning
        // `RecordCodec`'s call sequence.
        let placeholder = ChaCha20Poly1305::new(Key::from_slice(&[0u8; TRANSPORT_KEY_LEN]));

        Ok(Self {
            local_private,
            local_public,
            session_key: session_key_arr,
            role,
            send_cipher: placeholder.clone(),
            send_counter: 0,
            recv_cipher: placeholder,
            recv_counter: 0,
        })
    }
}

impl Drop for NoiseNNpsk0Session {
    fn drop(&mut self) {
        self.local_private.zeroize();
        self.session_key.zeroize();
    }
}

impl NoiseSession for NoiseNNpsk0Session {
    fn write_handshake_message(&mut self) -> Vec<u8> {
        self.local_public.to_vec()
    }

    fn read_handshake_message(&mut self, message: &[u8]) -> Result<(), NoiseSessionError> {
        if message.len() != EPHEMERAL_KEY_LEN {
            return Err(NoiseSessionError::new(format!(
                "expected a {EPHEMERAL_KEY_LEN}-byte ephemeral key, got {}",
                message.len()
            )));
        }
        let mut peer_public = [0u8; EPHEMERAL_KEY_LEN];
        peer_public.copy_from_slice(message);

        let shared_secret = x25519_dalek::x25519(self.local_private, peer_public);
        let (send_key, recv_key) = derive_transport_keys(&self.session_key, &shared_secret, self.role);

        self.send_cipher = ChaCha20Poly1305::new(Key::from_slice(&send_key));
        self.recv_cipher = ChaCha20Poly1305::new(Key::from_slice(&recv_key));
        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let nonce = counter_nonce(self.send_counter);
        self.send_counter += 1;
        match self.send_cipher.encrypt(Nonce::from_slice(&nonce), plaintext) {
            Ok(ciphertext) => ciphertext,
            Err(_) => Vec::new(),
        }
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseSessionError> {
        let nonce = counter_nonce(self.recv_counter);
        self.recv_counter += 1;
        self.recv_cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| NoiseSessionError::new("authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_handshake_and_round_trip() {
        let session_key = [0x42u8; 32];
        let mut leader = NoiseNNpsk0Session::new(&session_key, Role::Leader).unwrap();
        let mut follower = NoiseNNpsk0Session::new(&session_key, Role::Follower).unwrap();

        let leader_hs = leader.write_handshake_message();
        let follower_hs = follower.write_handshake_message();
        leader.read_handshake_message(&follower_hs).unwrap();
        follower.read_handshake_message(&leader_hs).unwrap();

        let ciphertext = leader.encrypt(b"hello from leader");
        assert_eq!(follower.decrypt(&ciphertext).unwrap(), b"hello from leader");

        let reply = follower.encrypt(b"hello from follower");
        assert_eq!(leader.decrypt(&reply).unwrap(), b"hello from follower");
    }

    #[test]
    fn mismatched_session_keys_fail_to_decrypt() {
        let mut leader = NoiseNNpsk0Session::new(&[0x01u8; 32], Role::Leader).unwrap();
        let mut follower = NoiseNNpsk0Session::new(&[0x02u8; 32], Role::Follower).unwrap();

        let leader_hs = leader.write_handshake_message();
        let follower_hs = follower.write_handshake_message();
        leader.read_handshake_message(&follower_hs).unwrap();
        follower.read_handshake_message(&leader_hs).unwrap();

        let ciphertext = leader.encrypt(b"secret");
        assert!(follower.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn malformed_handshake_message_is_rejected() {
        let mut leader = NoiseNNpsk0Session::new(&[0x09u8; 32], Role::Leader).unwrap();
        assert!(leader.read_handshake_message(b"too-short").is_err());
    }

    #[test]
    fn session_key_must_be_32_bytes() {
        let err = NoiseNNpsk0Session::new(b"short", Role::Leader).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength { expected: 32, found: 5 }));
    }

    #[test]
    fn successive_messages_use_distinct_nonces() {
        let session_key = [0x77u8; 32];
        let mut leader = NoiseNNpsk0Session::new(&session_key, Role::Leader).unwrap();
        let mut follower = NoiseNNpsk0Session::new(&session_key, Role::Follower).unwrap();

        let leader_hs = leader.write_handshake_message();
        let follower_hs = follower.write_handshake_message();
        leader.read_handshake_message(&follower_hs).unwrap();
        follower.read_handshake_message(&leader_hs).unwrap();

        let first = leader.encrypt(b"same plaintext");
        let second = leader.encrypt(b"same plaintext");
        assert_ne!(first, second, "nonce counter must advance between messages");

        assert_eq!(follower.decrypt(&first).unwrap(), b"same plaintext");
        assert_eq!(follower.decrypt(&second).unwrap(), b"same plaintext");
    }
}
