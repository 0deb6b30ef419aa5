//! Byte-stream framing: relay handshake, prologue exchange, and
//! length-prefixed frame parsing.
//!
//! The Framer has no cryptographic responsibility; it only turns an
//! arbitrarily fragmented inbound byte stream into a typed sequence of
//! tokens ([`FramerToken::Prologue`], [`FramerToken::Frame`]), consuming
//! the internal `RelayOk` token itself. See `dilation-core::record_codec`
//! for the layer built on top that drives the Noise handshake.

use bytes::Bytes;
use dilation_proto::frame;

use crate::{error::FramerError, transport::TransportWriter};

/// The literal reply a relay sends once it has paired this connection with
/// its buddy. Never configurable; this is a wire-format constant of the
/// relay protocol, not a per-session negotiated value.
const RELAY_OK: &[u8] = b"ok\n";

/// Configuration for a [`Framer`].
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Maximum frame payload size this Framer will accept from the peer.
    /// The specification's Open Question on frame size limits is resolved
    /// in favour of a configurable cap, defaulting to 2²⁰ bytes, enforced
    /// as soon as the length prefix is visible (before the payload itself
    /// is buffered).
    pub max_frame_size: u32,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self { max_frame_size: 1 << 20 }
    }
}

/// Tokens the Framer yields to its caller as bytes are parsed.
///
/// `RelayOk` is deliberately not a variant here: it is consumed internally
/// by the Framer (it triggers sending the prologue) and never surfaces to
/// the Record codec above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerToken {
    /// The configured inbound prologue was matched byte-for-byte. The
    /// Record codec reacts to this by sending its Noise handshake message.
    Prologue,
    /// A complete length-prefixed frame. Its payload is either the Noise
    /// handshake message (the first frame) or Noise ciphertext (every
    /// frame after).
    Frame(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    WantRelay { outbound_relay_handshake: Vec<u8> },
    WantPrologue,
    WantFrame,
}

/// The result of comparing the front of a buffer against a known constant
/// (either the relay reply or the inbound prologue), shared between the two
/// call sites so both exhibit the same "wait for full length or a newline,
/// whichever comes first" behaviour before declaring a mismatch.
enum PrefixMatch {
    /// The buffer begins with the full expected constant.
    Matched {
        /// Bytes to drop from the front of the buffer.
        consumed: usize,
    },
    /// Still a valid prefix of `expected`; wait for more bytes.
    Waiting,
    /// Diverged from `expected`, and we've accumulated enough to be sure
    /// (either a newline appeared, or the buffer is now as long as
    /// `expected`).
    Mismatch {
        /// The offending bytes observed so far, for logging.
        offending: Vec<u8>,
    },
}

fn match_prefix(buffer: &[u8], expected: &[u8]) -> PrefixMatch {
    if buffer.starts_with(expected) {
        return PrefixMatch::Matched { consumed: expected.len() };
    }
    let lb = buffer.len();
    let le = expected.len();
    let expected_so_far = if lb <= le { &expected[..lb] } else { expected };
    if buffer != expected_so_far {
        if buffer.contains(&b'\n') || lb >= le {
            return PrefixMatch::Mismatch { offending: buffer.to_vec() };
        }
        return PrefixMatch::Waiting;
    }
    PrefixMatch::Waiting
}

/// Translates a fragmented inbound byte stream into [`FramerToken`]s and
/// serialises outbound frames. Owns the transport it writes to.
pub struct Framer<T: TransportWriter> {
    transport: T,
    buffer: Vec<u8>,
    state: State,
    outbound_prologue: Vec<u8>,
    inbound_prologue: Vec<u8>,
    config: FramerConfig,
    can_send_frames: bool,
}

impl<T: TransportWriter> Framer<T> {
    /// Build a Framer that, absent [`Framer::use_relay`], sends
    /// `outbound_prologue` immediately on [`Framer::connection_made`] and
    /// expects `inbound_prologue` byte-for-byte before any frames.
    pub fn new(
        transport: T,
        outbound_prologue: impl Into<Vec<u8>>,
        inbound_prologue: impl Into<Vec<u8>>,
        config: FramerConfig,
    ) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
            state: State::WantPrologue,
            outbound_prologue: outbound_prologue.into(),
            inbound_prologue: inbound_prologue.into(),
            config,
            can_send_frames: false,
        }
    }

    /// Opt into relay traversal: on [`Framer::connection_made`],
    /// `relay_handshake` is written first, and the Framer waits for the
    /// literal `ok\n` reply before sending the prologue. Must be called
    /// before `connection_made`.
    pub fn use_relay(&mut self, relay_handshake: impl Into<Vec<u8>>) {
        self.state = State::WantRelay { outbound_relay_handshake: relay_handshake.into() };
    }

    /// Write the first outbound bytes for this connection: the relay
    /// handshake if configured, otherwise the prologue directly.
    pub fn connection_made(&mut self) {
        match &self.state {
            State::WantRelay { outbound_relay_handshake } => {
                let handshake = outbound_relay_handshake.clone();
                self.transport.write(&handshake);
            },
            State::WantPrologue | State::WantFrame => {
                let prologue = self.outbound_prologue.clone();
                self.transport.write(&prologue);
            },
        }
    }

    /// Append `data` to the internal buffer and return every token now
    /// parseable, in order.
    ///
    /// # Errors
    ///
    /// Returns [`FramerError::BadRelayReply`] or [`FramerError::BadPrologue`]
    /// if the peer's bytes diverge from the expected constant, and
    /// [`FramerError::FrameTooLarge`] if a frame's declared length exceeds
    /// `config.max_frame_size`.
    #[tracing::instrument(skip(self, data), fields(len = data.len()))]
    pub fn add_and_parse(&mut self, data: &[u8]) -> Result<Vec<FramerToken>, FramerError> {
        self.buffer.extend_from_slice(data);
        let mut tokens = Vec::new();
        loop {
            match &self.state {
                State::WantRelay { .. } => match match_prefix(&self.buffer, RELAY_OK) {
                    PrefixMatch::Matched { consumed } => {
                        self.buffer.drain(..consumed);
                        let prologue = self.outbound_prologue.clone();
                        self.transport.write(&prologue);
                        self.state = State::WantPrologue;
                    },
                    PrefixMatch::Waiting => break,
                    PrefixMatch::Mismatch { offending } => {
                        tracing::warn!(?offending, "bad relay reply");
                        return Err(FramerError::BadRelayReply { offending });
                    },
                },
                State::WantPrologue => {
                    let inbound_prologue = self.inbound_prologue.clone();
                    match match_prefix(&self.buffer, &inbound_prologue) {
                        PrefixMatch::Matched { consumed } => {
                            self.buffer.drain(..consumed);
                            self.can_send_frames = true;
                            self.state = State::WantFrame;
                            tokens.push(FramerToken::Prologue);
                        },
                        PrefixMatch::Waiting => break,
                        PrefixMatch::Mismatch { offending } => {
                            tracing::warn!(?offending, "bad prologue");
                            return Err(FramerError::BadPrologue { offending });
                        },
                    }
                },
                State::WantFrame => {
                    if self.buffer.len() < frame::LENGTH_PREFIX_SIZE {
                        break;
                    }
                    let mut len_bytes = [0u8; 4];
                    len_bytes.copy_from_slice(&self.buffer[..frame::LENGTH_PREFIX_SIZE]);
                    let declared_len = u32::from_be_bytes(len_bytes);
                    if declared_len > self.config.max_frame_size {
                        tracing::warn!(declared_len, max = self.config.max_frame_size, "oversized frame");
                        return Err(FramerError::FrameTooLarge {
                            size: declared_len,
                            max: self.config.max_frame_size,
                        });
                    }
                    match frame::peek_frame(&self.buffer) {
                        Some((payload, consumed)) => {
                            let payload = Bytes::copy_from_slice(payload);
                            self.buffer.drain(..consumed);
                            tokens.push(FramerToken::Frame(payload));
                        },
                        None => break,
                    }
                },
            }
        }
        Ok(tokens)
    }

    /// Write `len_be4 ‖ frame` to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`FramerError::SendBeforeReady`] if called before a
    /// [`FramerToken::Prologue`] has been emitted.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<(), FramerError> {
        if !self.can_send_frames {
            return Err(FramerError::SendBeforeReady);
        }
        let encoded = dilation_proto::encode_frame_to_vec(frame)
            .map_err(|_| FramerError::FrameTooLarge { size: u32::MAX, max: u32::MAX })?;
        self.transport.write(&encoded);
        Ok(())
    }

    /// Close the underlying transport.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Whether the prologue handshake has completed and frames may be sent.
    #[must_use]
    pub const fn can_send_frames(&self) -> bool {
        self.can_send_frames
    }
}

#[cfg(test)]
impl<T: TransportWriter> Framer<T> {
    /// Test-only accessor so sibling modules (`record_codec`, `l2`) can
    /// assert on what was written to the transport without a public API
    /// surface for it.
    pub(crate) const fn transport(&self) -> &T {
        &self.transport
    }
}
