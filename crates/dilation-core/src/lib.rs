//! Sans-IO state machines for the Dilation L2 connection core.
//!
//! Three layered machines drive one another as bytes arrive from a
//! transport: [`framer::Framer`] turns a fragmented byte stream into
//! length-prefixed frames, [`record_codec::RecordCodec`] layers a Noise
//! handshake and encrypted [`dilation_proto::Record`] stream on top of
//! that, and [`l2::L2Protocol`] gates each connection through the
//! unselected → selecting → selected candidate lifecycle. [`receive`] is
//! an independent, parallel machine for the outer (non-Dilation) wormhole's
//! phase-keyed mailbox messages.
//!
//! None of these machines touch a socket or a cryptographic library
//! directly; they are generic over the [`transport::TransportWriter`] and
//! [`noise::NoiseSession`] traits so they can be driven in tests by
//! deterministic fakes. `dilation-transport` supplies the real socket,
//! `dilation-crypto` the real Noise session and phase-key primitives.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod framer;
pub mod l2;
pub mod noise;
pub mod receive;
pub mod record_codec;
pub mod role;
pub mod transport;

pub use error::{FramerError, L2Error, ReceiveError, RecordError};
pub use framer::{Framer, FramerConfig, FramerToken};
pub use l2::{L2Action, L2Config, L2Protocol, Manager};
pub use noise::NoiseSession;
pub use receive::{Boss, PhaseCrypto, PhaseDecryptFailed, Receive, SendSide};
pub use record_codec::{RecordCodec, RecordCodecToken};
pub use role::Role;
pub use transport::TransportWriter;
