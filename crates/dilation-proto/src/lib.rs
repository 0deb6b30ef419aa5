//! Wire format for the Dilation L2 connection core.
//!
//! This crate knows nothing about state machines, sockets or cryptography —
//! it only encodes and decodes the two binary shapes that travel on the
//! wire once a connection has passed its prologue:
//!
//! - a length-prefixed **frame** (`frame` module): `length(4 BE) ||
//!   payload`. The payload of the first frame is a Noise handshake message;
//!   every subsequent frame's payload is Noise ciphertext.
//! - the **record** tagged union (`record` module) carried as the decrypted
//!   plaintext of every frame after the first.
//!
//! See `dilation-core` for the stateful Framer / Record codec / L2 Protocol
//! machines built on top of this wire format.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod frame;
pub mod record;

pub use error::ProtoError;
pub use frame::{encode_frame, encode_frame_to_vec, peek_frame, LENGTH_PREFIX_SIZE};
pub use record::{Record, Scid, SeqNum};
