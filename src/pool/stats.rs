use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time view of a pool for operators and monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub host: String,
    pub is_active: bool,
    pub max_active: usize,
    /// Leases that completed acquisition and are not yet released.
    pub active: usize,
    pub idle: usize,
    pub blocked: usize,
    pub num_before_exhausted: usize,
    pub is_exhausted: bool,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; IsActive?: {}; Active: {}; Blocked: {}; Idle: {}; NumBeforeExhausted: {}",
            self.name,
            self.is_active,
            self.active,
            self.blocked,
            self.idle,
            self.num_before_exhausted
        )
    }
}
