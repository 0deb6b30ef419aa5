//! Pure, stateless helpers for the length-prefixed frame wire format:
//! `length(4 BE) || payload(length bytes)`.
//!
//! The stateful buffering needed to assemble frames out of an arbitrarily
//! fragmented byte stream lives in `dilation-core::framer`; this module only
//! knows how to encode one frame and how to recognise one complete frame at
//! the front of an already-buffered slice.

use bytes::BufMut;

use crate::error::ProtoError;

/// Length of the big-endian frame length prefix, in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode `payload` as `len_be4 ‖ payload` into `dst`.
///
/// # Errors
///
/// Returns [`ProtoError::FrameTooLarge`] if `payload.len()` does not fit in
/// a `u32`.
pub fn encode_frame(payload: &[u8], dst: &mut impl BufMut) -> Result<(), ProtoError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtoError::FrameTooLarge(payload.len()))?;
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Encode `payload` into a freshly allocated buffer.
///
/// # Errors
///
/// Returns [`ProtoError::FrameTooLarge`] if `payload.len()` does not fit in
/// a `u32`.
pub fn encode_frame_to_vec(payload: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    encode_frame(payload, &mut buf)?;
    Ok(buf)
}

/// If `buf` begins with a complete length-prefixed frame, return the frame's
/// payload slice and the total number of bytes (prefix + payload) it
/// occupies. Returns `None` if `buf` does not yet hold a complete frame
/// (caller should wait for more bytes).
#[must_use]
pub fn peek_frame(buf: &[u8]) -> Option<(&[u8], usize)> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return None;
    }
    let mut len_bytes = [0u8; LENGTH_PREFIX_SIZE];
    len_bytes.copy_from_slice(&buf[..LENGTH_PREFIX_SIZE]);
    let payload_len = u32::from_be_bytes(len_bytes) as usize;
    let total = LENGTH_PREFIX_SIZE.checked_add(payload_len)?;
    if buf.len() < total {
        return None;
    }
    Some((&buf[LENGTH_PREFIX_SIZE..total], total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_peek_round_trips() {
        let payload = b"hello world";
        let encoded = encode_frame_to_vec(payload).unwrap();
        let (peeked, consumed) = peek_frame(&encoded).unwrap();
        assert_eq!(peeked, payload);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn peek_waits_for_length_prefix() {
        assert_eq!(peek_frame(&[0, 0]), None);
    }

    #[test]
    fn peek_waits_for_full_payload() {
        let mut buf = vec![0, 0, 0, 5];
        buf.extend_from_slice(b"ab"); // only 2 of the promised 5 bytes
        assert_eq!(peek_frame(&buf), None);
    }

    #[test]
    fn peek_big_endian_exact() {
        // E9: length-prefix decoding is big-endian and exact.
        let mut buf = vec![0, 0, 0, 3];
        buf.extend_from_slice(b"xyz");
        buf.extend_from_slice(b"trailing");
        let (payload, consumed) = peek_frame(&buf).unwrap();
        assert_eq!(payload, b"xyz");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn empty_payload_frame() {
        let encoded = encode_frame_to_vec(b"").unwrap();
        assert_eq!(encoded, vec![0, 0, 0, 0]);
        let (payload, consumed) = peek_frame(&encoded).unwrap();
        assert!(payload.is_empty());
        assert_eq!(consumed, 4);
    }
}
