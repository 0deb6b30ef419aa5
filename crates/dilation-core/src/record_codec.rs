//! Layers the Noise handshake and encrypted record stream on top of the
//! [`crate::framer::Framer`], producing a typed token stream of
//! [`RecordCodecToken::Handshake`] and [`RecordCodecToken::Record`].

use dilation_proto::Record;

use crate::{
    error::RecordError,
    framer::{Framer, FramerToken},
    noise::NoiseSession,
    transport::TransportWriter,
};

/// Tokens the Record codec yields as frames are decrypted and parsed.
///
/// `Handshake` is kept as a separate variant from `Record` (rather than a
/// pseudo-record with its own tag) because the Noise handshake message
/// never carries a record tag byte on the wire; collapsing the two would
/// blur a real type-level distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCodecToken {
    /// The Noise handshake completed; the caller may now send a KCM.
    Handshake,
    /// A decrypted, tag-parsed record.
    Record(Record),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WantPrologue,
    WantHandshake,
    WantMessage,
}

/// Drives a [`Framer`] and a [`NoiseSession`] together: the first frame is
/// the Noise handshake message, every frame after is Noise ciphertext whose
/// plaintext first byte is a record tag.
pub struct RecordCodec<T: TransportWriter, N: NoiseSession> {
    framer: Framer<T>,
    noise: N,
    state: State,
}

impl<T: TransportWriter, N: NoiseSession> RecordCodec<T, N> {
    /// Build a Record codec on top of an already-constructed Framer and
    /// Noise session. The Noise session's own handshake initialisation
    /// (e.g. `snow`'s `HandshakeState::new`) is expected to have already
    /// happened by the time it is passed in here; this codec only calls
    /// `write_handshake_message`/`read_handshake_message`.
    pub fn new(framer: Framer<T>, noise: N) -> Self {
        Self { framer, noise, state: State::WantPrologue }
    }

    /// Forwards to the underlying Framer.
    pub fn connection_made(&mut self) {
        self.framer.connection_made();
    }

    /// Drive the Framer with `data`, then the Noise session with every
    /// resulting frame, yielding a [`RecordCodecToken`] for each Handshake
    /// completion and each decrypted record.
    ///
    /// # Errors
    ///
    /// Propagates [`FramerError`](crate::error::FramerError) via
    /// [`RecordError::Framer`], and returns
    /// [`RecordError::HandshakeFailed`], [`RecordError::DecryptFailed`],
    /// [`RecordError::UnknownRecordTag`] or [`RecordError::MalformedRecord`]
    /// on Noise or record-parsing failures.
    #[tracing::instrument(skip(self, data), fields(len = data.len()))]
    pub fn data_received(&mut self, data: &[u8]) -> Result<Vec<RecordCodecToken>, RecordError> {
        let frame_tokens = self.framer.add_and_parse(data)?;
        let mut tokens = Vec::with_capacity(frame_tokens.len());
        for token in frame_tokens {
            match token {
                FramerToken::Prologue => {
                    let handshake = self.noise.write_handshake_message();
                    self.framer.send_frame(&handshake)?;
                    self.state = State::WantHandshake;
                },
                FramerToken::Frame(frame) => match self.state {
                    State::WantPrologue => return Err(RecordError::FrameBeforeHandshake),
                    State::WantHandshake => {
                        self.noise
                            .read_handshake_message(&frame)
                            .map_err(|e| RecordError::HandshakeFailed(e.0))?;
                        self.state = State::WantMessage;
                        tokens.push(RecordCodecToken::Handshake);
                    },
                    State::WantMessage => {
                        let plaintext =
                            self.noise.decrypt(&frame).map_err(|e| RecordError::DecryptFailed(e.0))?;
                        let record = Record::decode(&plaintext)?;
                        tokens.push(RecordCodecToken::Record(record));
                    },
                },
            }
        }
        Ok(tokens)
    }

    /// Encode, encrypt and send `record`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SendBeforeReady`] if the Noise handshake has
    /// not yet completed.
    pub fn send_record(&mut self, record: &Record) -> Result<(), RecordError> {
        if self.state != State::WantMessage {
            return Err(RecordError::SendBeforeReady);
        }
        let plaintext = record.encode_to_vec();
        let ciphertext = self.noise.encrypt(&plaintext);
        self.framer.send_frame(&ciphertext)?;
        Ok(())
    }

    /// Close the underlying transport.
    pub fn close(&mut self) {
        self.framer.close();
    }
}

#[cfg(test)]
impl<N: NoiseSession> RecordCodec<crate::transport::RecordingTransport, N> {
    pub(crate) fn written_bytes(&self) -> Vec<u8> {
        self.framer.transport().written_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        noise::StubNoiseSession,
        transport::RecordingTransport,
    };

    fn codec(tag: u8, peer_tag: u8) -> RecordCodec<RecordingTransport, StubNoiseSession> {
        let framer = Framer::new(
            RecordingTransport::new(),
            b"out".to_vec(),
            b"in".to_vec(),
            crate::framer::FramerConfig::default(),
        );
        RecordCodec::new(framer, StubNoiseSession::new(tag, peer_tag))
    }

    #[test]
    fn prologue_triggers_handshake_send() {
        let mut c = codec(0xAA, 0xBB);
        let tokens = c.data_received(b"in").unwrap();
        assert!(tokens.is_empty());
        assert_eq!(c.framer.transport().written_bytes(), b"\x00\x00\x00\x01\xAA");
    }

    #[test]
    fn handshake_frame_yields_handshake_token() {
        let mut c = codec(0xAA, 0xBB);
        c.data_received(b"in").unwrap();
        let handshake_frame = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        let tokens = c.data_received(&handshake_frame).unwrap();
        assert_eq!(tokens, vec![RecordCodecToken::Handshake]);
    }

    #[test]
    fn malformed_handshake_disconnects_without_further_writes() {
        // Testable property #6.
        let mut c = codec(0xAA, 0xBB);
        c.data_received(b"in").unwrap();
        let before = c.framer.transport().written_bytes();
        let bad_handshake = dilation_proto::encode_frame_to_vec(&[0xFF]).unwrap();
        let err = c.data_received(&bad_handshake).unwrap_err();
        assert!(matches!(err, RecordError::HandshakeFailed(_)));
        assert_eq!(c.framer.transport().written_bytes(), before);
    }

    #[test]
    fn record_round_trip_after_handshake() {
        let mut c = codec(0xAA, 0xBB);
        c.data_received(b"in").unwrap();
        let handshake_frame = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        c.data_received(&handshake_frame).unwrap();

        let open = dilation_proto::Record::Open { scid: [0, 0, 0, 1], seqnum: [0, 0, 0, 2] };
        let ciphertext = {
            let mut stub = StubNoiseSession::new(0xBB, 0xAA);
            stub.write_handshake_message();
            stub.read_handshake_message(&[0xAA]).unwrap();
            stub.encrypt(&open.encode_to_vec())
        };
        let frame = dilation_proto::encode_frame_to_vec(&ciphertext).unwrap();
        let tokens = c.data_received(&frame).unwrap();
        assert_eq!(tokens, vec![RecordCodecToken::Record(open)]);
    }

    #[test]
    fn send_before_handshake_is_rejected() {
        let mut c = codec(0xAA, 0xBB);
        let err = c.send_record(&dilation_proto::Record::Kcm).unwrap_err();
        assert_eq!(err, RecordError::SendBeforeReady);
    }

    #[test]
    fn send_kcm_after_handshake_produces_one_encrypted_frame() {
        let mut c = codec(0xAA, 0xBB);
        c.data_received(b"in").unwrap();
        let handshake_frame = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        c.data_received(&handshake_frame).unwrap();
        let before = c.framer.transport().writes.len();
        c.send_record(&dilation_proto::Record::Kcm).unwrap();
        assert_eq!(c.framer.transport().writes.len(), before + 1);
        let last = c.framer.transport().writes.last().unwrap();
        // 4-byte length prefix + 1-byte stub tag + 1-byte record tag (Kcm = 0x00).
        assert_eq!(last, &vec![0, 0, 0, 2, 0xAA, 0x00]);
    }

    #[test]
    fn unknown_record_tag_disconnects() {
        let mut c = codec(0xAA, 0xBB);
        c.data_received(b"in").unwrap();
        let handshake_frame = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        c.data_received(&handshake_frame).unwrap();

        let mut peer = StubNoiseSession::new(0xBB, 0xAA);
        peer.write_handshake_message();
        peer.read_handshake_message(&[0xAA]).unwrap();
        let ciphertext = peer.encrypt(&[0xFE]); // unrecognised tag
        let frame = dilation_proto::encode_frame_to_vec(&ciphertext).unwrap();

        let err = c.data_received(&frame).unwrap_err();
        assert_eq!(err, RecordError::UnknownRecordTag(0xFE));
    }
}
