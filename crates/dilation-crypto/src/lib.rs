//! Cryptographic primitives for the Dilation L2 connection core.
//!
//! Two independent surfaces, both consumed by `dilation-core` through its
//! trait abstractions rather than directly:
//!
//! - [`noise::NoiseNNpsk0Session`] implements
//!   `dilation_core::NoiseSession` for the per-connection transport
//!   handshake and encrypted record stream.
//! - [`phase::PhaseCipher`] implements
//!   `dilation_core::receive::PhaseCrypto` for the outer wormhole's
//!   phase-message verification.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod noise;
pub mod phase;

pub use error::CryptoError;
pub use noise::{NOISE_PATTERN, NoiseNNpsk0Session};
pub use phase::{NONCE_LEN, PhaseCipher, decrypt_data, derive_phase_key, encrypt_data};
