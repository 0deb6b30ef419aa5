//! Error types for the wire format.

use thiserror::Error;

/// Errors raised while encoding or decoding the wire format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// A record buffer was empty; there is no tag byte to read.
    #[error("empty record buffer")]
    EmptyRecord,

    /// The first byte of a record buffer did not match any known tag.
    #[error("unrecognised record tag: {0:#04x}")]
    UnknownTag(u8),

    /// A record's fixed-size fields did not fit in the remaining buffer.
    #[error("record truncated: expected at least {expected} bytes, found {found}")]
    RecordTruncated {
        /// Minimum number of bytes the tagged variant requires.
        expected: usize,
        /// Bytes actually available.
        found: usize,
    },

    /// A frame's declared length exceeds `u32::MAX`.
    #[error("frame payload too large: {0} bytes")]
    FrameTooLarge(usize),
}
