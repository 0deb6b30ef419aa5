//! The Record tagged union: the plaintext that travels inside each
//! Noise-encrypted frame (the first frame, the handshake message, is not a
//! `Record` at all — see `dilation-core::record_codec`).

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtoError;

/// Key Confirmation Message: empty payload, tag `0x00`.
pub const TAG_KCM: u8 = 0x00;
/// Heartbeat request: 4-byte `ping_id`, tag `0x01`.
pub const TAG_PING: u8 = 0x01;
/// Heartbeat reply: 4-byte `ping_id`, tag `0x02`.
pub const TAG_PONG: u8 = 0x02;
/// Open a sub-channel: 4-byte `scid` then 4-byte `seqnum`, tag `0x03`.
pub const TAG_OPEN: u8 = 0x03;
/// Sub-channel data: 4-byte `scid`, 4-byte `seqnum`, then opaque payload, tag `0x04`.
pub const TAG_DATA: u8 = 0x04;
/// Close a sub-channel: 4-byte `scid` then 4-byte `seqnum`, tag `0x05`.
pub const TAG_CLOSE: u8 = 0x05;
/// Acknowledge a sequence number: 4-byte `resp_seqnum`, tag `0x06`.
pub const TAG_ACK: u8 = 0x06;

/// A 4-byte sub-channel id. Opaque to this crate; interpreted by the Manager.
pub type Scid = [u8; 4];
/// A 4-byte sequence number. Opaque to this crate; interpreted by the Manager.
pub type SeqNum = [u8; 4];

/// The decrypted plaintext record carried by a Dilation L2 connection,
/// once the Noise handshake has completed.
///
/// First byte on the wire is the tag; see the `TAG_*` constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Key Confirmation Message. Proves possession of the session key.
    /// Exactly one is sent per direction per connection.
    Kcm,
    /// Heartbeat request.
    Ping {
        /// Caller-chosen identifier echoed back in the matching `Pong`.
        ping_id: [u8; 4],
    },
    /// Heartbeat reply.
    Pong {
        /// Echoes the `ping_id` of the `Ping` being answered.
        ping_id: [u8; 4],
    },
    /// Open a new sub-channel.
    Open {
        /// Sub-channel id being opened.
        scid: Scid,
        /// Sequence number of this control message within the sub-channel.
        seqnum: SeqNum,
    },
    /// Data carried within a sub-channel.
    Data {
        /// Sub-channel id the data belongs to.
        scid: Scid,
        /// Sequence number of this data chunk within the sub-channel.
        seqnum: SeqNum,
        /// Opaque payload bytes.
        data: Bytes,
    },
    /// Close a sub-channel.
    Close {
        /// Sub-channel id being closed.
        scid: Scid,
        /// Sequence number of this control message within the sub-channel.
        seqnum: SeqNum,
    },
    /// Acknowledge receipt up to (and including) a sequence number.
    Ack {
        /// Sequence number being acknowledged.
        resp_seqnum: SeqNum,
    },
}

impl Record {
    /// The tag byte this record encodes as.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Kcm => TAG_KCM,
            Self::Ping { .. } => TAG_PING,
            Self::Pong { .. } => TAG_PONG,
            Self::Open { .. } => TAG_OPEN,
            Self::Data { .. } => TAG_DATA,
            Self::Close { .. } => TAG_CLOSE,
            Self::Ack { .. } => TAG_ACK,
        }
    }

    /// Encode this record as `tag ‖ body` into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.tag());
        match self {
            Self::Kcm => {},
            Self::Ping { ping_id } | Self::Pong { ping_id } => dst.put_slice(ping_id),
            Self::Open { scid, seqnum } | Self::Close { scid, seqnum } => {
                dst.put_slice(scid);
                dst.put_slice(seqnum);
            },
            Self::Data { scid, seqnum, data } => {
                dst.put_slice(scid);
                dst.put_slice(seqnum);
                dst.put_slice(data);
            },
            Self::Ack { resp_seqnum } => dst.put_slice(resp_seqnum),
        }
    }

    /// Encode this record into a freshly allocated buffer.
    #[must_use]
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Decode a record from `bytes`, validating length before parsing any
    /// field (so a truncated buffer never causes an out-of-bounds slice).
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::EmptyRecord`] if `bytes` is empty,
    /// [`ProtoError::UnknownTag`] if the tag byte is not recognised, and
    /// [`ProtoError::RecordTruncated`] if the fixed-size fields for the
    /// given tag do not fit.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut cursor = bytes;
        if cursor.is_empty() {
            return Err(ProtoError::EmptyRecord);
        }
        let tag = cursor.get_u8();

        const fn require(buf: &[u8], min: usize) -> Result<(), ProtoError> {
            if buf.len() < min {
                return Err(ProtoError::RecordTruncated { expected: min, found: buf.len() });
            }
            Ok(())
        }

        match tag {
            TAG_KCM => Ok(Self::Kcm),
            TAG_PING => {
                require(cursor, 4)?;
                Ok(Self::Ping { ping_id: read4(&mut cursor) })
            },
            TAG_PONG => {
                require(cursor, 4)?;
                Ok(Self::Pong { ping_id: read4(&mut cursor) })
            },
            TAG_OPEN => {
                require(cursor, 8)?;
                let scid = read4(&mut cursor);
                let seqnum = read4(&mut cursor);
                Ok(Self::Open { scid, seqnum })
            },
            TAG_DATA => {
                require(cursor, 8)?;
                let scid = read4(&mut cursor);
                let seqnum = read4(&mut cursor);
                let data = Bytes::copy_from_slice(cursor);
                Ok(Self::Data { scid, seqnum, data })
            },
            TAG_CLOSE => {
                require(cursor, 8)?;
                let scid = read4(&mut cursor);
                let seqnum = read4(&mut cursor);
                Ok(Self::Close { scid, seqnum })
            },
            TAG_ACK => {
                require(cursor, 4)?;
                Ok(Self::Ack { resp_seqnum: read4(&mut cursor) })
            },
            other => Err(ProtoError::UnknownTag(other)),
        }
    }
}

/// Read exactly 4 bytes and advance the cursor. Caller must have already
/// validated `cursor.len() >= 4`.
fn read4(cursor: &mut &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&cursor[..4]);
    cursor.advance(4);
    out
}
