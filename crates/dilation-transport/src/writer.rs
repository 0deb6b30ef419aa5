//! Bridges the core's synchronous [`TransportWriter`] surface onto a real,
//! asynchronous TCP socket.
//!
//! [`dilation_core::framer::Framer`] calls `write`/`close` synchronously from
//! within `add_and_parse`/`send_frame`; the actual socket write is
//! necessarily async. The bridge is the same shape `ConnectedClient` uses
//! elsewhere in this workspace for its QUIC transport: an unbounded channel
//! feeding a dedicated task that owns the socket's write half, so the
//! sans-io core never awaits anything.

use tokio::{
    io::AsyncWriteExt,
    net::tcp::OwnedWriteHalf,
    sync::mpsc,
    task::AbortHandle,
};

use dilation_core::TransportWriter;

/// A [`TransportWriter`] that forwards writes to a background task owning
/// the real socket's write half.
pub struct TcpWriter {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    writer_task: AbortHandle,
}

impl TcpWriter {
    /// Spawn the background writer task for `write_half` and return a handle
    /// to feed it.
    pub fn spawn(write_half: OwnedWriteHalf) -> Self {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(drain_to_socket(write_half, inbound)).abort_handle();
        Self { outbound, writer_task }
    }
}

impl TransportWriter for TcpWriter {
    fn write(&mut self, bytes: &[u8]) {
        // The receiver only disappears once the writer task has exited
        // (socket closed or errored); a send failing here means the
        // connection is already tearing down, so there is nothing left to
        // report it to.
        let _ = self.outbound.send(bytes.to_vec());
    }

    fn close(&mut self) {
        self.writer_task.abort();
    }
}

async fn drain_to_socket(mut write_half: OwnedWriteHalf, mut inbound: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = inbound.recv().await {
        if let Err(error) = write_half.write_all(&bytes).await {
            tracing::warn!(%error, "tcp write failed, closing writer task");
            return;
        }
    }
}
