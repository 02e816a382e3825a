use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodePoolError {
    #[error("Attempt to acquire on inactive pool: {0}")]
    PoolInactive(String),

    #[error("maxWaitTimeWhenExhausted of {wait_ms}ms exceeded on host {host}")]
    PoolExhausted { host: String, wait_ms: u64 },

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("shutdown() called for inactive pool: {0}")]
    AlreadyShutdown(String),

    #[error("Pool returned no connection after acquisition on {0} - are we shutting down?")]
    AcquisitionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodePoolError>;

/// Failure reported by a connection collaborator (open, health check).
///
/// The optional cause carries the lower-level error, usually a
/// [`std::io::Error`] from the socket, and is what stale detection inspects.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    /// Transport failure without an underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Transport failure wrapping a lower-level cause.
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}
