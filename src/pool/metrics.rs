#[cfg(feature = "metrics")]
use lazy_static::lazy_static;
#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref ACTIVE_LEASES: IntGaugeVec = register_int_gauge_vec!(
        "nodepool_active_leases",
        "Connections currently leased out to callers",
        &["host"]
    )
    .expect("register nodepool_active_leases gauge");
    pub static ref IDLE_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "nodepool_idle_connections",
        "Connections sitting idle in the pool",
        &["host"]
    )
    .expect("register nodepool_idle_connections gauge");
    pub static ref BLOCKED_WAITERS: IntGaugeVec = register_int_gauge_vec!(
        "nodepool_blocked_waiters",
        "Callers parked waiting for an exhausted pool",
        &["host"]
    )
    .expect("register nodepool_blocked_waiters gauge");
    pub static ref CONNECTIONS_OPENED: IntCounterVec = register_int_counter_vec!(
        "nodepool_connections_opened_total",
        "Connections opened against the host, including warm and replacement opens",
        &["host"]
    )
    .expect("register nodepool_connections_opened_total counter_vec");
    pub static ref STALE_DISCARDS: IntCounterVec = register_int_counter_vec!(
        "nodepool_stale_discards_total",
        "Idle connections discarded after failing the health round-trip",
        &["host"]
    )
    .expect("register nodepool_stale_discards_total counter_vec");
    pub static ref EXHAUSTED_ACQUIRES: IntCounterVec = register_int_counter_vec!(
        "nodepool_exhausted_total",
        "Acquisitions that gave up after the exhausted wait budget",
        &["host"]
    )
    .expect("register nodepool_exhausted_total counter_vec");
}

/// Prometheus recording for one pool. Every call is a no-op when the
/// `metrics` feature is off.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    host: String,
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
impl PoolMetrics {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    #[inline]
    pub fn record_opened(&self) {
        #[cfg(feature = "metrics")]
        CONNECTIONS_OPENED.with_label_values(&[self.host.as_str()]).inc();
    }

    #[inline]
    pub fn record_stale_discard(&self) {
        #[cfg(feature = "metrics")]
        STALE_DISCARDS.with_label_values(&[self.host.as_str()]).inc();
    }

    #[inline]
    pub fn record_exhausted(&self) {
        #[cfg(feature = "metrics")]
        EXHAUSTED_ACQUIRES.with_label_values(&[self.host.as_str()]).inc();
    }

    #[inline]
    pub fn observe(&self, active: usize, idle: usize, blocked: usize) {
        #[cfg(feature = "metrics")]
        {
            ACTIVE_LEASES
                .with_label_values(&[self.host.as_str()])
                .set(active as i64);
            IDLE_CONNECTIONS
                .with_label_values(&[self.host.as_str()])
                .set(idle as i64);
            BLOCKED_WAITERS
                .with_label_values(&[self.host.as_str()])
                .set(blocked as i64);
        }
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn counters_are_labelled_by_host() {
        let metrics = PoolMetrics::new("metrics-test-host:1");
        metrics.record_opened();
        metrics.record_opened();
        metrics.record_stale_discard();
        metrics.observe(2, 1, 0);

        assert_eq!(
            CONNECTIONS_OPENED
                .with_label_values(&["metrics-test-host:1"])
                .get(),
            2
        );
        assert_eq!(
            STALE_DISCARDS
                .with_label_values(&["metrics-test-host:1"])
                .get(),
            1
        );
        assert_eq!(
            ACTIVE_LEASES
                .with_label_values(&["metrics-test-host:1"])
                .get(),
            2
        );
    }
}
