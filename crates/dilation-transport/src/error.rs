//! Error taxonomy for the TCP transport driver.

use thiserror::Error;

/// Failures from binding, connecting, or driving one TCP connection through
/// the Dilation L2 connection core.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured bind or peer address did not parse.
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        /// The address string that failed to parse.
        address: String,
        /// The underlying parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// A socket operation (bind, connect, accept) failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The session key supplied to the Noise session was malformed.
    #[error("crypto setup failed: {0}")]
    Crypto(#[from] dilation_crypto::CryptoError),

    /// The L2 connection core rejected or terminated the connection.
    #[error("connection core error: {0}")]
    L2(#[from] dilation_core::L2Error),

    /// An internal invariant was violated; should be unreachable.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
