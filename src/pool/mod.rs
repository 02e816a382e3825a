pub mod connection;
pub mod host_pool;
pub mod idle;
pub mod metrics;
pub mod stale;
pub mod stats;

pub use connection::{Connection, ConnectionFactory};
pub use host_pool::{HostPool, POLL_INTERVAL};
pub use idle::{IdleQueue, Waiter};
pub use metrics::PoolMetrics;
pub use stale::{check_stale, is_broken_socket};
pub use stats::PoolStatus;
