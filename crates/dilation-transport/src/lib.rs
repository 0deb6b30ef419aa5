//! TCP transport for the Dilation L2 connection core.
//!
//! `dilation-core` never touches a socket; this crate supplies the real
//! [`dilation_core::TransportWriter`] implementation ([`writer::TcpWriter`])
//! and the read-loop glue ([`connection::drive`]) that turns an accepted or
//! connected [`tokio::net::TcpStream`] into a running Framer → Record codec
//! → L2 Protocol stack exposed as plain channels. `src/main.rs` is a small
//! standalone driver binary (`dilation-connector`) for manual loopback
//! testing; a real Connector/Manager implementation lives outside this
//! workspace family.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod error;
pub mod writer;

pub use connection::{drive, ConnectedL2, ConnectionConfig};
pub use error::TransportError;
pub use writer::TcpWriter;
