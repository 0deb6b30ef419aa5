//! Error taxonomy for the Dilation L2 connection core.
//!
//! Each layer has its own error enum so a caller can match at the
//! granularity it cares about; lower-layer errors convert into higher-layer
//! ones via `From` at the points where one machine drives another (Framer →
//! Record codec → L2 Protocol).

use dilation_proto::ProtoError;
use thiserror::Error;

/// Errors raised by the [`crate::framer::Framer`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramerError {
    /// The relay did not reply with the expected `ok\n` banner.
    #[error("bad relay reply, offending prefix: {offending:?}")]
    BadRelayReply {
        /// The bytes observed so far that diverged from the expected reply.
        offending: Vec<u8>,
    },

    /// The peer's prologue did not byte-exact match the configured inbound
    /// prologue.
    #[error("bad prologue, offending prefix: {offending:?}")]
    BadPrologue {
        /// The bytes observed so far that diverged from the expected
        /// prologue.
        offending: Vec<u8>,
    },

    /// A frame's declared length exceeded the configured maximum.
    #[error("frame of {size} bytes exceeds the configured maximum of {max} bytes")]
    FrameTooLarge {
        /// The length the peer advertised.
        size: u32,
        /// The configured `FramerConfig::max_frame_size`.
        max: u32,
    },

    /// `send_frame` was called before the `Prologue` token had been
    /// observed.
    #[error("send_frame called before the prologue handshake completed")]
    SendBeforeReady,
}

impl FramerError {
    /// All `FramerError` variants are fatal to the connection; none are
    /// transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        false
    }
}

/// Errors raised by the [`crate::record_codec::RecordCodec`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Propagated from the underlying [`crate::framer::Framer`].
    #[error(transparent)]
    Framer(#[from] FramerError),

    /// The Noise handshake message failed to parse or authenticate.
    #[error("noise handshake failed: {0}")]
    HandshakeFailed(String),

    /// A ciphertext frame failed authentication or decryption.
    #[error("noise decryption failed: {0}")]
    DecryptFailed(String),

    /// The first byte of a decrypted message did not match a known record
    /// tag. Per the resolved Open Question in the specification, this is
    /// treated as a framing violation rather than silently dropped.
    #[error("unrecognised record tag: {0:#04x}")]
    UnknownRecordTag(u8),

    /// A decrypted message was empty or shorter than its tag's fixed
    /// fields required. Distinct from [`Self::UnknownRecordTag`] because
    /// `0x00` is itself a valid tag (KCM); collapsing the two would report
    /// a truncated buffer as a bogus KCM record.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// `send_record` was called before the Noise handshake completed.
    #[error("send_record called before the noise handshake completed")]
    SendBeforeReady,

    /// A frame arrived before the prologue was consumed. The Framer's own
    /// state machine never emits a `Frame` token before `Prologue`, so this
    /// indicates the Framer and Record codec have fallen out of sync.
    #[error("frame received before the prologue completed")]
    FrameBeforeHandshake,
}

impl RecordError {
    /// All `RecordError` variants are fatal to the connection; none are
    /// transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        false
    }
}

impl From<ProtoError> for RecordError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::UnknownTag(tag) => Self::UnknownRecordTag(tag),
            ProtoError::EmptyRecord | ProtoError::RecordTruncated { .. } => {
                Self::MalformedRecord(err.to_string())
            },
            ProtoError::FrameTooLarge(size) => {
                Self::Framer(FramerError::FrameTooLarge { size: size as u32, max: u32::MAX })
            },
        }
    }
}

/// Errors raised by the [`crate::l2::L2Protocol`] candidate lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum L2Error {
    /// Propagated from the underlying [`crate::record_codec::RecordCodec`].
    #[error(transparent)]
    Record(#[from] RecordError),

    /// `select()` was called more than once on the same instance.
    #[error("select() called on an already-selected connection")]
    AlreadySelected,

    /// `select()` was called before this connection had received a peer
    /// KCM and registered itself as a candidate.
    #[error("select() called before this connection became a candidate")]
    NotYetCandidate,

    /// `send_record` was called before this connection was selected.
    #[error("send_record called before this candidate was selected")]
    NotSelected,
}

impl L2Error {
    /// All `L2Error` variants are fatal to the connection; none are
    /// transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        false
    }
}

/// Errors raised by the [`crate::receive::Receive`] outer-wormhole
/// phase-decryption machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// `got_message` was called before `got_key` established a session
    /// key.
    #[error("got_message called before a session key was established")]
    KeyNotYetEstablished,
}

impl ReceiveError {
    /// None of the `ReceiveError` variants are transient: a caller that
    /// hits this has a sequencing bug, not a network hiccup.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_unknown_tag_maps_to_unknown_record_tag() {
        let err: RecordError = ProtoError::UnknownTag(0x7F).into();
        assert_eq!(err, RecordError::UnknownRecordTag(0x7F));
    }

    #[test]
    fn proto_empty_and_truncated_map_to_malformed_record_not_tag_zero() {
        let empty: RecordError = ProtoError::EmptyRecord.into();
        let truncated: RecordError = ProtoError::RecordTruncated { expected: 4, found: 1 }.into();

        assert!(matches!(empty, RecordError::MalformedRecord(_)));
        assert!(matches!(truncated, RecordError::MalformedRecord(_)));
        assert_ne!(empty, RecordError::UnknownRecordTag(0));
        assert_ne!(truncated, RecordError::UnknownRecordTag(0));
    }

    #[test]
    fn none_of_these_errors_are_transient() {
        assert!(!FramerError::SendBeforeReady.is_transient());
        assert!(!RecordError::SendBeforeReady.is_transient());
        assert!(!RecordError::MalformedRecord(String::new()).is_transient());
        assert!(!L2Error::AlreadySelected.is_transient());
        assert!(!ReceiveError::KeyNotYetEstablished.is_transient());
    }
}
