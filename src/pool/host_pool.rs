use crate::config::HostConfig;
use crate::pool::connection::{Connection, ConnectionFactory};
use crate::pool::idle::IdleQueue;
use crate::pool::metrics::PoolMetrics;
use crate::pool::stale;
use crate::pool::stats::PoolStatus;
use crate::utils::error::{NodePoolError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Slice length of an unbounded wait. Shutdown is noticed between slices.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection pool for a single remote node.
///
/// Idle connections live in a bounded, fair [`IdleQueue`] whose capacity is
/// `max_active`; that queue is what actually limits how many connections
/// exist. The lease counters next to it are advisory and may run ahead of
/// reality for a moment under contention.
///
/// A pool opens `max_active / 3` connections up front, grows on demand up
/// to `max_active`, and parks callers once it cannot grow any further:
///
/// * `max_wait_time_when_exhausted > 0` waits that long, then fails with
///   [`NodePoolError::PoolExhausted`].
/// * `max_wait_time_when_exhausted <= 0` waits **forever**. Negative values
///   are normalized to 0, and 0 is not "don't wait". The wait is sliced
///   into [`POLL_INTERVAL`] steps so that shutdown is observed.
pub struct HostPool<F: ConnectionFactory> {
    host: HostConfig,
    host_name: String,
    factory: F,
    idle: IdleQueue<F::Connection>,
    /// Leases in flight, bumped before a connection is actually secured.
    attempted: AtomicUsize,
    /// Leases that completed acquisition.
    active_leases: AtomicUsize,
    blocked: AtomicUsize,
    active: AtomicBool,
    max_wait: Duration,
    metrics: PoolMetrics,
}

impl<F: ConnectionFactory> HostPool<F> {
    /// Create the pool and open its warm set.
    pub async fn new(host: HostConfig, factory: F) -> Result<Self> {
        host.validate()?;

        let host_name = host.name();
        let pool = Self {
            idle: IdleQueue::new(host.max_active).with_discard(close_detached::<F::Connection>),
            attempted: AtomicUsize::new(0),
            active_leases: AtomicUsize::new(0),
            blocked: AtomicUsize::new(0),
            active: AtomicBool::new(true),
            max_wait: host.max_wait(),
            metrics: PoolMetrics::new(host_name.clone()),
            host_name,
            factory,
            host,
        };

        for _ in 0..pool.host.max_active / 3 {
            match pool.open_connection().await {
                Ok(conn) => {
                    if let Err(mut extra) = pool.idle.push(conn) {
                        extra.close().await;
                    }
                }
                Err(err) => {
                    for mut conn in pool.idle.drain() {
                        conn.close().await;
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            "Host pool started with {} idle connections; max: {} exhausted wait: {:?}",
            pool.num_idle(),
            pool.host.max_active,
            pool.max_wait
        );
        pool.observe();

        Ok(pool)
    }

    /// Lease a connection.
    ///
    /// Returns an idle connection when there is one (health-checked first if
    /// stale checking is on), opens a new one while under `max_active`, and
    /// otherwise waits for a release.
    pub async fn acquire(&self) -> Result<F::Connection> {
        if !self.is_active() {
            return Err(NodePoolError::PoolInactive(self.name()));
        }

        let candidate = if self.host.use_stale_connection_check {
            self.next_non_stale().await?
        } else {
            self.idle.poll()
        };

        let attempt = LeaseAttempt::start(&self.attempted);

        let conn = match candidate {
            Some(conn) => Some(conn),
            None if attempt.count <= self.host.max_active => Some(self.open_connection().await?),
            None => self.wait_for_connection().await?,
        };

        let Some(conn) = conn else {
            return Err(NodePoolError::AcquisitionFailed(self.name()));
        };

        attempt.commit();
        self.active_leases.fetch_add(1, Ordering::SeqCst);
        self.observe();

        Ok(conn)
    }

    /// Give a leased connection back.
    ///
    /// Never fails: an open connection goes back to the idle set (or is
    /// closed when the set is full or the pool is shut down), and a dead one
    /// is replaced by a fresh connection when one can be opened.
    pub async fn release(&self, mut conn: F::Connection) {
        // The caller no longer holds it, whatever happens next.
        decrement(&self.active_leases);
        let _lease = LeaseRelease { pool: self };
        let open = conn.is_open();

        if open {
            if self.is_active() {
                self.add_to_idle_gently(conn).await;
            } else {
                info!(
                    "Open connection {:?} released to inactive pool for host {}. Closing.",
                    conn, self.host_name
                );
                conn.close().await;
            }
        } else if self.is_active() {
            match self.open_connection().await {
                Ok(replacement) => self.add_to_idle_gently(replacement).await,
                Err(e) => {
                    // Shrink rather than fail the caller.
                    error!(
                        "Transport failure re-opening connection in release on {}: {}",
                        self.name(),
                        e
                    );
                }
            }
        } else {
            debug!(
                "Closed connection released to inactive pool for host {}",
                self.host_name
            );
        }

        debug!("Status of release to idle queue: open={}", open);
    }

    /// Shut the pool down and close every idle connection.
    ///
    /// Leased connections are closed when their holders release them.
    /// Fails with [`NodePoolError::AlreadyShutdown`] on a second call.
    pub async fn shutdown(&self) -> Result<()> {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NodePoolError::AlreadyShutdown(self.name()));
        }

        info!("Shutdown triggered on {}", self.name());
        self.close_idle().await;
        info!("Shutdown complete on {}", self.name());
        self.observe();

        Ok(())
    }

    pub fn name(&self) -> String {
        format!("<HostPool>:{{{}}}", self.host_name)
    }

    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    pub fn max_active(&self) -> usize {
        self.host.max_active
    }

    /// Normalized exhausted wait; zero means unbounded.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn num_active(&self) -> usize {
        self.active_leases.load(Ordering::SeqCst)
    }

    pub fn num_idle(&self) -> usize {
        self.idle.len()
    }

    pub fn num_blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    pub fn num_before_exhausted(&self) -> usize {
        self.max_active().saturating_sub(self.num_active())
    }

    pub fn is_exhausted(&self) -> bool {
        self.num_before_exhausted() == 0
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PoolStatus {
        let num_before_exhausted = self.num_before_exhausted();
        PoolStatus {
            name: self.name(),
            host: self.host_name.clone(),
            is_active: self.is_active(),
            max_active: self.max_active(),
            active: self.num_active(),
            idle: self.num_idle(),
            blocked: self.num_blocked(),
            num_before_exhausted,
            is_exhausted: num_before_exhausted == 0,
        }
    }

    pub fn status_string(&self) -> String {
        self.status().to_string()
    }

    async fn open_connection(&self) -> Result<F::Connection> {
        debug!("Creation of new connection to {}", self.host_name);
        let conn = self.factory.open().await?;
        self.metrics.record_opened();
        Ok(conn)
    }

    async fn next_non_stale(&self) -> Result<Option<F::Connection>> {
        while let Some(mut candidate) = self.idle.poll() {
            match stale::check_stale(&mut candidate).await {
                Ok(false) => return Ok(Some(candidate)),
                Ok(true) => {
                    info!("Discarding stale connection from pool for {}", self.host_name);
                    self.metrics.record_stale_discard();
                    candidate.close().await;
                }
                Err(e) => {
                    candidate.close().await;
                    return Err(e);
                }
            }
        }

        Ok(None)
    }

    async fn wait_for_connection(&self) -> Result<Option<F::Connection>> {
        let mut blocked = BlockedWaiter::start(&self.blocked);
        debug!("Blocking on idle queue - current block count {}", blocked.count);
        self.observe();

        let outcome = if self.max_wait.is_zero() {
            // Leaving the line after shutdown closes anything handed to us
            // in the meantime, since the drained queue refuses it.
            let mut waiter = self.idle.wait();
            let mut conn = None;
            while conn.is_none() && self.is_active() {
                conn = waiter.wait_for(POLL_INTERVAL).await;
            }
            Ok(conn)
        } else {
            match self.idle.poll_timeout(self.max_wait).await {
                Some(conn) => Ok(Some(conn)),
                None if !self.is_active() => Ok(None),
                None => {
                    self.metrics.record_exhausted();
                    Err(NodePoolError::PoolExhausted {
                        host: self.host_name.clone(),
                        wait_ms: self.max_wait.as_millis() as u64,
                    })
                }
            }
        };

        blocked.finish();
        outcome
    }

    /// Add to the idle set, closing the connection instead when the set is
    /// already full or has been drained by shutdown.
    async fn add_to_idle_gently(&self, conn: F::Connection) {
        if let Err(mut extra) = self.idle.push(conn) {
            if self.idle.is_closed() {
                info!(
                    "Pool for host {} shut down while returning {:?}. Closing.",
                    self.host_name, extra
                );
            } else {
                warn!("Capacity hit adding connection back to idle queue. Closing extra");
            }
            extra.close().await;
        }
    }

    async fn close_idle(&self) {
        for mut conn in self.idle.drain() {
            conn.close().await;
        }
    }

    fn observe(&self) {
        self.metrics
            .observe(self.num_active(), self.num_idle(), self.num_blocked());
    }
}

fn decrement(counter: &AtomicUsize) {
    if counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_err()
    {
        warn!("Lease counter already at zero; release without a matching acquire?");
    }
}

/// Close a connection outside any pool call, on whatever runtime is current.
fn close_detached<C: Connection>(mut conn: C) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            debug!("Closing {:?} left with a cancelled waiter after shutdown", conn);
            runtime.spawn(async move { conn.close().await });
        }
        Err(_) => warn!("No runtime to close {:?}; dropping it", conn),
    }
}

/// Optimistic bump of the attempted-lease counter, rolled back unless the
/// acquisition commits. Covers error returns and cancelled futures alike.
struct LeaseAttempt<'a> {
    counter: &'a AtomicUsize,
    count: usize,
    committed: bool,
}

impl<'a> LeaseAttempt<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            counter,
            count,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for LeaseAttempt<'_> {
    fn drop(&mut self) {
        if !self.committed {
            decrement(self.counter);
        }
    }
}

struct BlockedWaiter<'a> {
    counter: &'a AtomicUsize,
    count: usize,
    finished: bool,
}

impl<'a> BlockedWaiter<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            counter,
            count,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for BlockedWaiter<'_> {
    fn drop(&mut self) {
        decrement(self.counter);
        if !self.finished {
            error!("Connection acquisition interrupted while waiting on exhausted pool");
        }
    }
}

/// Frees the attempted-lease slot once `release` is done with the
/// connection, even if `release` itself is cancelled.
struct LeaseRelease<'a, F: ConnectionFactory> {
    pool: &'a HostPool<F>,
}

impl<F: ConnectionFactory> Drop for LeaseRelease<'_, F> {
    fn drop(&mut self) {
        decrement(&self.pool.attempted);
        self.pool.observe();
    }
}
