// nodepool - Bounded, fair connection pool for a single remote database node

pub mod config;
pub mod pool;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, HostConfig};
pub use pool::{Connection, ConnectionFactory, HostPool, PoolStatus};
pub use utils::error::{NodePoolError, Result, TransportError};
