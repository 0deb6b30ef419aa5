//! `dilation-connector`: a standalone loopback driver for the Dilation L2
//! connection core.
//!
//! Connects or listens over plain TCP, runs the prologue/Noise
//! handshake/KCM exchange to completion, and logs every record the Manager
//! receives afterwards. Exists for manual end-to-end testing of the core
//! outside the `tests/` loopback harness; it is not a production Connector
//! (see the module docs of `dilation_transport::connection`).

use clap::Parser;
use dilation_core::role::Role;
use dilation_transport::{connection::ConnectionConfig, drive};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Drive one Dilation L2 connection over TCP and print the records it
/// receives.
#[derive(Parser, Debug)]
#[command(name = "dilation-connector")]
#[command(about = "Loopback driver for the Dilation L2 connection core")]
#[command(version)]
struct Args {
    /// Address to listen on, or connect to, depending on `--connect`.
    #[arg(short, long, default_value = "127.0.0.1:4932")]
    addr: String,

    /// Connect to `--addr` instead of listening on it.
    #[arg(long)]
    connect: bool,

    /// Play the Leader role instead of the Follower.
    #[arg(long)]
    leader: bool,

    /// 64 hex characters (32 bytes): the pre-shared session key.
    #[arg(
        long,
        default_value = "1111111111111111111111111111111111111111111111111111111111111111"
    )]
    session_key_hex: String,

    /// Outbound prologue banner.
    #[arg(long, default_value = "dilation-l2-v1-leader")]
    outbound_prologue: String,

    /// Inbound prologue banner expected from the peer.
    #[arg(long, default_value = "dilation-l2-v1-follower")]
    inbound_prologue: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let session_key_bytes =
        hex::decode(&args.session_key_hex).map_err(|e| format!("invalid --session-key-hex: {e}"))?;
    let mut session_key = [0u8; 32];
    if session_key_bytes.len() != 32 {
        return Err(format!(
            "--session-key-hex must decode to exactly 32 bytes, got {}",
            session_key_bytes.len()
        )
        .into());
    }
    session_key.copy_from_slice(&session_key_bytes);

    let role = if args.leader { Role::Leader } else { Role::Follower };
    let (outbound_prologue, inbound_prologue) = if args.leader {
        (args.outbound_prologue.clone().into_bytes(), args.inbound_prologue.clone().into_bytes())
    } else {
        (args.inbound_prologue.clone().into_bytes(), args.outbound_prologue.clone().into_bytes())
    };

    let config = ConnectionConfig {
        role,
        outbound_prologue,
        inbound_prologue,
        session_key,
        relay_handshake: None,
        max_frame_size: 1 << 20,
    };

    let stream = if args.connect {
        tracing::info!(addr = %args.addr, "connecting");
        TcpStream::connect(&args.addr).await?
    } else {
        tracing::info!(addr = %args.addr, "listening");
        let listener = TcpListener::bind(&args.addr).await?;
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "accepted connection");
        stream
    };

    let mut connected = drive(stream, config)?;
    tracing::info!(?role, "connection driver running, waiting for records");

    loop {
        tokio::select! {
            record = connected.records.recv() => {
                match record {
                    Some(record) => tracing::info!(?record, "received record"),
                    None => {
                        tracing::info!("records channel closed, exiting");
                        break;
                    },
                }
            },
            _ = &mut connected.when_disconnected => {
                tracing::info!("connection disconnected, exiting");
                break;
            },
        }
    }

    Ok(())
}
