use crate::config::HostConfig;
use crate::pool::{Connection, ConnectionFactory};
use crate::utils::error::TransportError;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Opens TCP connections to the configured node.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    port: u16,
    connect_timeout: Duration,
    probe: Arc<[u8]>,
    probe_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: &HostConfig) -> Self {
        Self {
            address: host.address.clone(),
            port: host.port,
            connect_timeout: host.connect_timeout(),
            probe: Arc::from(host.probe.as_bytes()),
            probe_timeout: host.probe_timeout(),
        }
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnector {
    type Connection = TcpConnection;

    async fn open(&self) -> Result<TcpConnection, TransportError> {
        let target = (self.address.as_str(), self.port);

        let stream = match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::with_cause(
                    format!("Failed to connect to {}:{}: {}", self.address, self.port, e),
                    e,
                ))
            }
            Err(_) => {
                return Err(TransportError::with_cause(
                    format!("Failed to connect to {}:{}", self.address, self.port),
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!(
                            "Connection to {}:{} timed out after {:?}",
                            self.address, self.port, self.connect_timeout
                        ),
                    ),
                ))
            }
        };

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!("Opened connection to {}", peer);

        Ok(TcpConnection {
            stream: Some(stream),
            peer,
            probe: Arc::clone(&self.probe),
            probe_timeout: self.probe_timeout,
        })
    }
}

/// A TCP connection whose health check is an echo of the probe payload.
#[derive(Debug)]
pub struct TcpConnection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    probe: Arc<[u8]>,
    probe_timeout: Duration,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn round_trip(stream: &mut TcpStream, probe: &[u8]) -> io::Result<Vec<u8>> {
        stream.write_all(probe).await?;
        let mut reply = vec![0u8; probe.len()];
        match stream.read_exact(&mut reply).await {
            Ok(_) => Ok(reply),
            // Peer hung up mid-probe: same as a reset as far as the pool cares.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "Connection reset by peer during health check",
            )),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn health_check(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::with_cause(
                format!("Health check on closed connection to {}", self.peer),
                io::Error::new(io::ErrorKind::NotConnected, "socket already closed"),
            ));
        };

        let outcome = timeout(self.probe_timeout, Self::round_trip(stream, &self.probe)).await;

        match outcome {
            Ok(Ok(reply)) if reply.as_slice() == &*self.probe => {
                trace!("Health check on {} answered", self.peer);
                Ok(())
            }
            Ok(Ok(_)) => {
                self.stream = None;
                Err(TransportError::new(format!(
                    "Unexpected health check reply from {}",
                    self.peer
                )))
            }
            Ok(Err(e)) => {
                self.stream = None;
                Err(TransportError::with_cause(
                    format!("Health check on {} failed: {}", self.peer, e),
                    e,
                ))
            }
            Err(_) => {
                self.stream = None;
                Err(TransportError::new(format!(
                    "Health check on {} timed out after {:?}",
                    self.peer, self.probe_timeout
                )))
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            trace!("Closed connection to {}", self.peer);
        }
    }
}
