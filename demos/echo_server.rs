//! Probe responder for local pool runs
//!
//! Echoes every byte it receives, which is exactly what the TCP transport's
//! health round-trip expects. With `--reset-after N` each connection is
//! dropped after N echoes so pooled connections go stale and get evicted.
//!
//! Usage:
//!   cargo run --release --example echo_server -- --port 9160 --reset-after 5
//!   cargo run --release -- --port 9160 --stale-check --max-active 4

use clap::Parser;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "echo_server")]
#[command(about = "TCP echo responder for nodepool health checks", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Bind port
    #[arg(short, long, default_value = "9160")]
    port: u16,

    /// Drop each connection after this many echoes (0 = never)
    #[arg(long, default_value = "0")]
    reset_after: usize,
}

async fn handle_client(mut stream: TcpStream, client_addr: SocketAddr, reset_after: usize) {
    let mut buf = vec![0u8; 8192];
    let mut echoes = 0usize;

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() {
                    warn!("Error writing to {}", client_addr);
                    break;
                }
                echoes += 1;
                if reset_after > 0 && echoes >= reset_after {
                    debug!("Dropping {} after {} echoes", client_addr, echoes);
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading from {}: {}", client_addr, e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Echo responder listening on {}", bind_addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_client(stream, addr, args.reset_after));
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}
