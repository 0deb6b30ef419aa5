//! Drives one TCP connection through the Framer → Record codec → L2
//! Protocol stack and exposes it as channels, for use by both the demo
//! binary and the loopback integration tests.
//!
//! The real Connector/Manager selection policy is out of scope for the core
//! (§4.4 of the specification); this module supplies the smallest possible
//! stand-in — immediate self-selection of the sole candidate — suitable for
//! a point-to-point demo where no racing between multiple candidates
//! happens. A production Connector would instead hold several
//! [`dilation_core::l2::L2Protocol`] instances and pick a winner.

use dilation_core::{
    l2::{L2Action, L2Config, L2Protocol, Manager},
    record_codec::RecordCodec,
    role::Role,
};
use dilation_crypto::NoiseNNpsk0Session;
use dilation_proto::Record;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::AbortHandle,
};

use crate::{error::TransportError, writer::TcpWriter};

/// How this connection learns which bytes identify "us" and "the peer" at
/// the wire level before any cryptography runs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Role this side plays in candidate selection.
    pub role: Role,
    /// Bytes written immediately after `connection_made` (or after the
    /// relay handshake, if `relay_handshake` is set).
    pub outbound_prologue: Vec<u8>,
    /// Bytes expected from the peer before any frames.
    pub inbound_prologue: Vec<u8>,
    /// The 32-byte session key shared out-of-band (by the rendezvous
    /// mailbox in the real system), used as the Noise pre-shared key.
    pub session_key: [u8; 32],
    /// If set, sent first and the literal `ok\n` reply awaited before the
    /// prologue, per the relay-traversal sub-protocol (§4.1).
    pub relay_handshake: Option<Vec<u8>>,
    /// Maximum frame payload size this side will accept.
    pub max_frame_size: u32,
}

/// A live connection, already past `connection_made`, exposed as plain
/// channels so callers never touch the sans-io core's `&mut self` API
/// directly across an async boundary.
pub struct ConnectedL2 {
    /// Records delivered to the Manager once this connection is selected.
    pub records: mpsc::Receiver<Record>,
    /// Feed records here to have them encrypted and sent once selected.
    pub outbound: mpsc::UnboundedSender<Record>,
    /// Fires once, when the connection is torn down.
    pub when_disconnected: oneshot::Receiver<()>,
    read_task: AbortHandle,
}

impl ConnectedL2 {
    /// Stop the background read/write loop immediately.
    pub fn disconnect(&self) {
        self.read_task.abort();
    }
}

struct ChannelManager {
    tx: mpsc::Sender<Record>,
}

impl Manager for ChannelManager {
    fn got_record(&mut self, record: Record) {
        // A full channel means the caller has stopped draining `records`;
        // dropping the record here matches the core's "Manager is
        // responsible for pacing" contract (§5) rather than blocking the
        // connection's read loop.
        if self.tx.try_send(record).is_err() {
            tracing::warn!("records channel full or closed, dropping record");
        }
    }
}

/// Drive `stream` through the Framer/Record codec/L2 Protocol stack until it
/// disconnects.
///
/// # Errors
///
/// Returns [`TransportError::Crypto`] if `config.session_key` cannot seed a
/// [`NoiseNNpsk0Session`].
pub fn drive(stream: TcpStream, config: ConnectionConfig) -> Result<ConnectedL2, TransportError> {
    let (read_half, write_half) = stream.into_split();
    let writer = TcpWriter::spawn(write_half);

    let noise = NoiseNNpsk0Session::new(&config.session_key, config.role)?;
    let framer_config = dilation_core::framer::FramerConfig { max_frame_size: config.max_frame_size };
    let mut framer =
        dilation_core::framer::Framer::new(writer, config.outbound_prologue, config.inbound_prologue, framer_config);
    if let Some(relay_handshake) = config.relay_handshake {
        framer.use_relay(relay_handshake);
    }
    let codec = RecordCodec::new(framer, noise);
    let mut l2 = L2Protocol::new(codec, L2Config { role: config.role });

    let when_disconnected = l2
        .when_disconnected()
        .ok_or(TransportError::Internal("freshly constructed L2Protocol has no disconnected observer yet"))?;

    let (records_tx, records_rx) = mpsc::channel(64);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    l2.connection_made();

    let read_task =
        tokio::spawn(run_connection(l2, read_half, records_tx, outbound_rx)).abort_handle();

    Ok(ConnectedL2 { records: records_rx, outbound: outbound_tx, when_disconnected, read_task })
}

async fn run_connection(
    mut l2: L2Protocol<TcpWriter, NoiseNNpsk0Session>,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    records_tx: mpsc::Sender<Record>,
    mut outbound_rx: mpsc::UnboundedReceiver<Record>,
) {
    use tokio::io::AsyncReadExt;

    let mut selected = false;
    let mut buf = vec![0u8; 64 * 1024];

    // Labeled so a failure discovered while handling one of several actions
    // emitted by a single `data_received` call can still tear down the
    // whole connection, rather than only breaking the inner `for`.
    'conn: loop {
        tokio::select! {
            read_result = read_half.read(&mut buf) => {
                let n = match read_result {
                    Ok(0) => {
                        tracing::debug!("peer closed connection");
                        break 'conn;
                    },
                    Ok(n) => n,
                    Err(error) => {
                        tracing::warn!(%error, "tcp read failed");
                        break 'conn;
                    },
                };

                let actions = match l2.data_received(&buf[..n]) {
                    Ok(actions) => actions,
                    Err(error) => {
                        tracing::warn!(%error, "connection core rejected peer, disconnecting");
                        break 'conn;
                    },
                };

                for action in actions {
                    match action {
                        L2Action::BecameCandidate => {
                            if !selected {
                                let manager = Box::new(ChannelManager { tx: records_tx.clone() });
                                if let Err(error) = l2.select(manager) {
                                    tracing::warn!(%error, "self-selection failed");
                                    break 'conn;
                                }
                                selected = true;
                                if l2.role() == Role::Leader {
                                    if let Err(error) = l2.send_record(&Record::Kcm) {
                                        tracing::warn!(%error, "leader kcm send failed");
                                        break 'conn;
                                    }
                                }
                            }
                        },
                    }
                }
            },
            outbound = outbound_rx.recv(), if selected => {
                match outbound {
                    Some(record) => {
                        if let Err(error) = l2.send_record(&record) {
                            tracing::warn!(%error, "send_record failed");
                            break 'conn;
                        }
                    },
                    None => break 'conn,
                }
            },
        }
    }

    l2.disconnect();
}
