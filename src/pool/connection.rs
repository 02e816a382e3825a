use crate::utils::error::TransportError;
use async_trait::async_trait;
use std::fmt::Debug;

/// An opened, reusable handle to the remote node.
///
/// The pool never looks inside a connection. It only asks whether it is
/// still open, probes it with a cheap round-trip and closes it.
#[async_trait]
pub trait Connection: Debug + Send + 'static {
    /// Whether the connection still believes it is usable.
    fn is_open(&self) -> bool;

    /// Issue a real, cheap protocol round-trip against the node.
    ///
    /// Socket-level failures should keep the underlying [`std::io::Error`]
    /// as the cause so that broken sockets can be told apart from other
    /// transport failures.
    async fn health_check(&mut self) -> Result<(), TransportError>;

    /// Close the connection. Must be a no-op on an already closed one.
    async fn close(&mut self);
}

/// Opens new connections to the pool's host.
///
/// Handshakes and credentials belong here, never in the pool.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Connection;

    async fn open(&self) -> Result<Self::Connection, TransportError>;
}
