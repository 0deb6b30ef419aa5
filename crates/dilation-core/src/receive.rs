//! The outer (non-Dilation) wormhole's phase-keyed mailbox decryption
//! machine.
//!
//! Independent of and parallel to the L2 connection core: this machine
//! never sees a Dilation frame, Noise handshake or `Record`. It verifies
//! and decrypts phase messages from the rendezvous mailbox, using the
//! first successfully-decrypted message as the key-verification event
//! (peers authenticate by producing the first correctly-encrypted message
//! under a key derived from the shared SPAKE2-established secret).
//!
//! `got_key` and `got_message` are the only two inputs; `Boss` and the
//! Send-side (named [`SendSide`] here — `Send` is a reserved trait in the
//! prelude) are the only two collaborators notified.

use thiserror::Error;

use crate::error::ReceiveError;

/// A session key derived by the outer wormhole's SPAKE2 exchange, recorded
/// by [`Receive::got_key`].
pub type SessionKey = Vec<u8>;

/// Failure signal from [`PhaseCrypto::decrypt_data`]. Carries no detail:
/// `Receive` only distinguishes success from failure, and never surfaces
/// the underlying AEAD error to its caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("phase message failed to decrypt")]
pub struct PhaseDecryptFailed;

/// The phase-key derivation and AEAD surface `Receive` depends on.
/// `dilation-crypto::PhaseCipher` is the production implementation
/// (HKDF-SHA256 + `XChaCha20-Poly1305`); tests drive `Receive` with a
/// deterministic stub.
pub trait PhaseCrypto: Send {
    /// Derive the data key for one phase message, keyed on the session key,
    /// the sending side's identifier, and the phase name.
    fn derive_phase_key(&self, session_key: &[u8], side: &str, phase: &str) -> Vec<u8>;

    /// Decrypt one phase message body under `data_key`.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseDecryptFailed`] if the ciphertext fails to
    /// authenticate under `data_key`.
    fn decrypt_data(&self, data_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, PhaseDecryptFailed>;
}

/// Notified of verification outcome and delivered plaintext messages.
/// Implemented outside this crate (the outer wormhole's Boss actor).
pub trait Boss: Send {
    /// The first phase message decrypted successfully: the peer has proven
    /// possession of the session key.
    fn happy(&mut self);

    /// A phase message failed to decrypt, at any point: the peer could not
    /// prove possession of the session key (or is actively hostile). No
    /// further messages will be processed.
    fn scared(&mut self);

    /// Deliver a successfully decrypted phase message, in the order
    /// `got_message` was called.
    fn got_message(&mut self, phase: &str, plaintext: &[u8]);
}

/// Notified once, the moment the session key is verified. Implemented
/// outside this crate (the outer wormhole's Send actor, which unblocks its
/// own outbound phase messages once it knows the peer is listening).
pub trait SendSide: Send {
    /// The session key has been verified by a successfully decrypted first
    /// message.
    fn got_verified_key(&mut self, key: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    S0UnknownKey,
    S1UnverifiedKey,
    S2VerifiedKey,
    S3Scared,
}

/// The outer wormhole's phase-message verification state machine:
/// `S0_unknown_key -> S1_unverified_key -> {S2_verified_key | S3_scared}`.
///
/// Generic over [`PhaseCrypto`], [`Boss`] and [`SendSide`] so it is
/// testable against deterministic stubs independent of
/// `dilation-crypto`'s real HKDF/AEAD implementation.
pub struct Receive<P: PhaseCrypto, B: Boss, S: SendSide> {
    crypto: P,
    boss: B,
    send_side: S,
    peer_side: String,
    state: State,
    session_key: Option<SessionKey>,
}

impl<P: PhaseCrypto, B: Boss, S: SendSide> Receive<P, B, S> {
    /// Build a new machine in the initial `S0_unknown_key` state.
    ///
    /// `peer_side` is the peer's side identifier, as established by the
    /// outer wormhole's mailbox handshake; every phase message this machine
    /// decrypts comes from the peer, so `derive_phase_key` is always keyed
    /// on `peer_side` rather than our own.
    pub fn new(crypto: P, boss: B, send_side: S, peer_side: impl Into<String>) -> Self {
        Self {
            crypto,
            boss,
            send_side,
            peer_side: peer_side.into(),
            state: State::S0UnknownKey,
            session_key: None,
        }
    }

    /// Record the SPAKE2-derived session key: `S0_unknown_key ->
    /// S1_unverified_key`. A key recorded while already past `S0` is
    /// ignored rather than overwriting an in-progress or completed
    /// verification.
    #[tracing::instrument(skip(self, key))]
    pub fn got_key(&mut self, key: impl Into<SessionKey>) {
        if self.state != State::S0UnknownKey {
            tracing::debug!("got_key called after the session key was already established; ignoring");
            return;
        }
        self.session_key = Some(key.into());
        self.state = State::S1UnverifiedKey;
    }

    /// Derive the phase key for `(phase, body)` and attempt decryption,
    /// driving the `S1 -> {S2 | S3}` and `S2 -> {S2 | S3}` transitions.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::KeyNotYetEstablished`] if called before
    /// [`Receive::got_key`]. This is a caller sequencing error, distinct
    /// from a failed decryption (which is a normal, non-error protocol
    /// outcome: the peer misbehaved, not the caller).
    #[tracing::instrument(skip(self, body), fields(phase, len = body.len()))]
    pub fn got_message(&mut self, phase: &str, body: &[u8]) -> Result<(), ReceiveError> {
        match self.state {
            State::S0UnknownKey => Err(ReceiveError::KeyNotYetEstablished),
            State::S1UnverifiedKey => {
                self.try_decrypt(phase, body, true);
                Ok(())
            },
            State::S2VerifiedKey => {
                self.try_decrypt(phase, body, false);
                Ok(())
            },
            State::S3Scared => {
                tracing::debug!("got_message called after scared; ignoring");
                Ok(())
            },
        }
    }

    fn try_decrypt(&mut self, phase: &str, body: &[u8], is_first: bool) {
        let Some(session_key) = self.session_key.clone() else {
            // S1/S2 are only reachable after `got_key` records a session
            // key; reaching here without one is a bug elsewhere in this
            // module, not a peer-triggerable condition. Scare rather than
            // panic so a mistake here still fails the connection cleanly.
            tracing::error!("try_decrypt reached without a session key");
            self.state = State::S3Scared;
            self.boss.scared();
            return;
        };
        let data_key = self.crypto.derive_phase_key(&session_key, &self.peer_side, phase);

        match self.crypto.decrypt_data(&data_key, body) {
            Ok(plaintext) => {
                if is_first {
                    self.state = State::S2VerifiedKey;
                    self.send_side.got_verified_key(&session_key);
                    self.boss.happy();
                }
                self.boss.got_message(phase, &plaintext);
            },
            Err(PhaseDecryptFailed) => {
                tracing::warn!(phase, "phase message failed to decrypt, scaring the boss");
                self.state = State::S3Scared;
                self.boss.scared();
            },
        }
    }

    /// The machine's current state, for diagnostics and tests.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self.state, State::S2VerifiedKey)
    }

    /// Whether the machine has transitioned to the terminal scared state.
    #[must_use]
    pub const fn is_scared(&self) -> bool {
        matches!(self.state, State::S3Scared)
    }
}
