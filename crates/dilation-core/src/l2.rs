//! The candidate lifecycle that gates each negotiated connection through
//! selection and, once selected, forwards decrypted records to the
//! Manager: `Unselected -> Selecting -> Selected`.
//!
//! Registration with the Connector (`got_kcm`, the `Unselected ->
//! Selecting` transition) is modelled as an emitted [`L2Action`] rather
//! than a stored `Box<dyn Connector>` the protocol calls into directly:
//! the original source has the connection register *itself* with the
//! Connector, which in Rust would require the connection to hold a
//! self-reference at construction time. Returning an action for the
//! owner (whatever structure is keeping this `L2Protocol` alive, e.g. a
//! `HashMap<ConnId, L2Protocol<_, _>>` next to the Connector's own
//! bookkeeping) to react to avoids that, following the same action-return
//! shape this workspace already uses for its other session state machines.
//! The Manager reference, by contrast, is a straightforward owning handle
//! installed by `select()` and used only for upward `got_record` calls, so
//! it is stored directly as `Box<dyn Manager>`.

use dilation_proto::Record;
use tokio::sync::oneshot;

use crate::{
    error::L2Error,
    noise::NoiseSession,
    record_codec::{RecordCodec, RecordCodecToken},
    role::Role,
    transport::TransportWriter,
};

/// Configuration for an [`L2Protocol`].
#[derive(Debug, Clone, Copy)]
pub struct L2Config {
    /// Which side of the session this connection's peer is playing.
    pub role: Role,
}

/// Consumes decrypted records (Open/Data/Close/Ack/Ping/Pong) in delivery
/// order, once this connection has been selected. Implemented outside this
/// crate; installed via [`L2Protocol::select`].
pub trait Manager: Send {
    /// Deliver one record, in the order it was decrypted.
    fn got_record(&mut self, record: Record);
}

/// Actions an [`L2Protocol`] asks its owner to perform. Unlike
/// `send`/`close`, which this crate performs directly (see the module
/// docs), `BecameCandidate` must be relayed to the Connector, which lives
/// outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2Action {
    /// This connection received its peer's KCM and should be registered
    /// with the Connector as a selection candidate
    /// (`Connector::add_candidate`).
    BecameCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unselected,
    Selecting,
    Selected,
}

/// One tentative transport connection's candidate lifecycle, built on a
/// [`RecordCodec`]. Owned by the Connector until selection, at which point
/// the Manager reference is installed and records start flowing upward.
pub struct L2Protocol<T: TransportWriter, N: NoiseSession> {
    codec: RecordCodec<T, N>,
    role: Role,
    state: State,
    manager: Option<Box<dyn Manager>>,
    disconnected_tx: Option<oneshot::Sender<()>>,
}

impl<T: TransportWriter, N: NoiseSession> L2Protocol<T, N> {
    /// Build a new candidate in the initial `Unselected` state.
    pub fn new(codec: RecordCodec<T, N>, config: L2Config) -> Self {
        Self { codec, role: config.role, state: State::Unselected, manager: None, disconnected_tx: None }
    }

    /// Forwards to the underlying Record codec.
    pub fn connection_made(&mut self) {
        self.codec.connection_made();
    }

    /// Drive the Record codec with `data`. A `Handshake` token triggers an
    /// immediate KCM send if this is the Follower; a `KCM` record raises
    /// `got_kcm` (`Unselected -> Selecting`); every other record is
    /// delivered to the Manager if selected, or dropped with a debug log
    /// if not (may happen legitimately due to racing between candidates).
    ///
    /// # Errors
    ///
    /// Propagates [`RecordError`](crate::error::RecordError) from the
    /// underlying Record codec via [`L2Error::Record`].
    #[tracing::instrument(skip(self, data), fields(len = data.len()))]
    pub fn data_received(&mut self, data: &[u8]) -> Result<Vec<L2Action>, L2Error> {
        let tokens = self.codec.data_received(data)?;
        let mut actions = Vec::new();
        for token in tokens {
            match token {
                RecordCodecToken::Handshake => {
                    if self.role.sends_kcm_on_handshake() {
                        self.codec.send_record(&Record::Kcm)?;
                    }
                },
                RecordCodecToken::Record(Record::Kcm) => match self.state {
                    State::Unselected => {
                        self.state = State::Selecting;
                        actions.push(L2Action::BecameCandidate);
                    },
                    State::Selecting | State::Selected => {
                        tracing::debug!("received a redundant KCM; ignoring");
                    },
                },
                RecordCodecToken::Record(record) => match self.state {
                    State::Selected => {
                        if let Some(manager) = self.manager.as_mut() {
                            manager.got_record(record);
                        }
                    },
                    State::Unselected | State::Selecting => {
                        tracing::debug!(?record, "dropping record received before selection");
                    },
                },
            }
        }
        Ok(actions)
    }

    /// Called by the Connector on the one candidate it chooses: installs
    /// the Manager and enables `send_record`.
    ///
    /// # Errors
    ///
    /// Returns [`L2Error::NotYetCandidate`] if this connection has not yet
    /// received its peer's KCM, and [`L2Error::AlreadySelected`] if
    /// `select` was already called once.
    pub fn select(&mut self, manager: Box<dyn Manager>) -> Result<(), L2Error> {
        match self.state {
            State::Unselected => Err(L2Error::NotYetCandidate),
            State::Selected => Err(L2Error::AlreadySelected),
            State::Selecting => {
                self.manager = Some(manager);
                self.state = State::Selected;
                Ok(())
            },
        }
    }

    /// Send a record to the peer. Only valid once this connection has been
    /// selected (the Leader's KCM is sent this way, on `select`).
    ///
    /// # Errors
    ///
    /// Returns [`L2Error::NotSelected`] if this connection has not yet been
    /// selected.
    pub fn send_record(&mut self, record: &Record) -> Result<(), L2Error> {
        if self.state != State::Selected {
            return Err(L2Error::NotSelected);
        }
        self.codec.send_record(record)?;
        Ok(())
    }

    /// A one-shot receiver that fires when this connection is disconnected,
    /// either because the Connector called [`L2Protocol::disconnect`] or
    /// because the transport reported connection loss. Returns `None` if
    /// called more than once (only one observer is supported).
    pub fn when_disconnected(&mut self) -> Option<oneshot::Receiver<()>> {
        if self.disconnected_tx.is_some() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        self.disconnected_tx = Some(tx);
        Some(rx)
    }

    /// Close the underlying transport and fire the `when_disconnected`
    /// signal, if anyone is listening.
    pub fn disconnect(&mut self) {
        self.codec.close();
        if let Some(tx) = self.disconnected_tx.take() {
            let _ = tx.send(());
        }
    }

    /// This candidate's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
impl<N: NoiseSession> L2Protocol<crate::transport::RecordingTransport, N> {
    pub(crate) fn written_bytes(&self) -> Vec<u8> {
        self.codec.written_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{framer::Framer, noise::StubNoiseSession, transport::RecordingTransport};

    struct RecordingManager {
        received: Arc<Mutex<Vec<Record>>>,
    }

    impl Manager for RecordingManager {
        fn got_record(&mut self, record: Record) {
            self.received.lock().expect("test mutex poisoned").push(record);
        }
    }

    fn protocol(
        role: Role,
        tag: u8,
        peer_tag: u8,
    ) -> L2Protocol<RecordingTransport, StubNoiseSession> {
        let framer =
            Framer::new(RecordingTransport::new(), b"out".to_vec(), b"in".to_vec(), crate::framer::FramerConfig::default());
        let codec = RecordCodec::new(framer, StubNoiseSession::new(tag, peer_tag));
        L2Protocol::new(codec, L2Config { role })
    }

    fn peer_encrypt(tag: u8, peer_tag: u8, handshake_from_us: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let mut peer = StubNoiseSession::new(peer_tag, tag);
        peer.write_handshake_message();
        peer.read_handshake_message(handshake_from_us).unwrap();
        peer.encrypt(plaintext)
    }

    #[test]
    fn follower_sends_kcm_unprompted_after_handshake() {
        // E7 / testable property #7.
        let mut p = protocol(Role::Follower, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let before_handshake = p.written_bytes();
        // prologue(3) + our handshake frame (4-byte len + 1 stub tag byte).
        assert_eq!(before_handshake, b"out\x00\x00\x00\x01\xAA");

        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        let actions = p.data_received(&peer_handshake).unwrap();
        assert!(actions.is_empty());

        // The Follower autonomously wrote exactly one more frame: its KCM,
        // encrypted as a single stub-tagged byte carrying the KCM tag 0x00.
        let after_handshake = p.written_bytes();
        let new_bytes = &after_handshake[before_handshake.len()..];
        assert_eq!(new_bytes, &[0, 0, 0, 2, 0xAA, 0x00]);
    }

    #[test]
    fn leader_defers_kcm_until_selected() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        p.data_received(&peer_handshake).unwrap();

        // Leader must not have sent anything beyond prologue + its own
        // handshake: no autonomous KCM.
        let err = p.send_record(&Record::Kcm).unwrap_err();
        assert_eq!(err, L2Error::NotSelected);
    }

    #[test]
    fn kcm_record_moves_unselected_to_selecting() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        p.data_received(&peer_handshake).unwrap();

        let kcm_ciphertext = peer_encrypt(0xAA, 0xBB, &[0xAA], &Record::Kcm.encode_to_vec());
        let frame = dilation_proto::encode_frame_to_vec(&kcm_ciphertext).unwrap();
        let actions = p.data_received(&frame).unwrap();
        assert_eq!(actions, vec![L2Action::BecameCandidate]);
    }

    #[test]
    fn select_before_candidate_is_rejected() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        let received = Arc::new(Mutex::new(Vec::new()));
        let manager = Box::new(RecordingManager { received });
        assert_eq!(p.select(manager).unwrap_err(), L2Error::NotYetCandidate);
    }

    #[test]
    fn selected_connection_delivers_records_to_manager() {
        // E1 scenario tail: Open(scid=1, seqnum=2) delivered after selection.
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        p.data_received(&peer_handshake).unwrap();

        let kcm_ciphertext = peer_encrypt(0xAA, 0xBB, &[0xAA], &Record::Kcm.encode_to_vec());
        let frame = dilation_proto::encode_frame_to_vec(&kcm_ciphertext).unwrap();
        p.data_received(&frame).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let manager = Box::new(RecordingManager { received: Arc::clone(&received) });
        p.select(manager).unwrap();

        let open = Record::Open { scid: [0, 0, 0, 1], seqnum: [0, 0, 0, 2] };
        let open_ciphertext = peer_encrypt(0xAA, 0xBB, &[0xAA], &open.encode_to_vec());
        let open_frame = dilation_proto::encode_frame_to_vec(&open_ciphertext).unwrap();
        p.data_received(&open_frame).unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), &[open]);
    }

    #[test]
    fn records_before_selection_are_dropped_not_fatal() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        p.data_received(&peer_handshake).unwrap();

        let open = Record::Open { scid: [0, 0, 0, 1], seqnum: [0, 0, 0, 2] };
        let open_ciphertext = peer_encrypt(0xAA, 0xBB, &[0xAA], &open.encode_to_vec());
        let open_frame = dilation_proto::encode_frame_to_vec(&open_ciphertext).unwrap();
        // Still Unselected: must not error, just drop.
        let actions = p.data_received(&open_frame).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn disconnect_fires_when_disconnected() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        let rx = p.when_disconnected().unwrap();
        p.disconnect();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn double_select_is_rejected() {
        let mut p = protocol(Role::Leader, 0xAA, 0xBB);
        p.data_received(b"in").unwrap();
        let peer_handshake = dilation_proto::encode_frame_to_vec(&[0xBB]).unwrap();
        p.data_received(&peer_handshake).unwrap();
        let kcm_ciphertext = peer_encrypt(0xAA, 0xBB, &[0xAA], &Record::Kcm.encode_to_vec());
        let frame = dilation_proto::encode_frame_to_vec(&kcm_ciphertext).unwrap();
        p.data_received(&frame).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        p.select(Box::new(RecordingManager { received: Arc::clone(&received) })).unwrap();
        let err = p.select(Box::new(RecordingManager { received })).unwrap_err();
        assert_eq!(err, L2Error::AlreadySelected);
    }
}
