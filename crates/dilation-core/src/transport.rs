//! The minimal transport capability the core depends on: `write` and
//! `close`. A real socket implementation lives in `dilation-transport`; an
//! in-memory fake lives here so the core is unit-testable without one.

/// Something bytes can be written to and that can be closed. The core never
/// reads from this trait directly — inbound bytes arrive as arguments to
/// `add_and_parse`/`data_received`, driven by whatever owns the real
/// socket.
pub trait TransportWriter: Send {
    /// Write bytes to the peer.
    fn write(&mut self, bytes: &[u8]);

    /// Close the underlying connection.
    fn close(&mut self);
}

/// An in-memory [`TransportWriter`] that records everything written to it,
/// for assertions in unit tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    /// Bytes written, in order, one entry per `write` call.
    pub writes: Vec<Vec<u8>>,
    /// Whether `close` has been called.
    pub closed: bool,
}

impl RecordingTransport {
    /// Build an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes concatenated into one buffer, in order.
    #[must_use]
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.iter().flatten().copied().collect()
    }
}

impl TransportWriter for RecordingTransport {
    fn write(&mut self, bytes: &[u8]) {
        self.writes.push(bytes.to_vec());
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
