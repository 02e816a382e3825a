use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;

/// Bounded container of idle connections with first-come, first-served
/// hand-off to parked waiters.
///
/// A connection pushed while callers are parked goes straight to the
/// oldest one, so waiters are served in arrival order. Otherwise it is
/// queued, up to `capacity`.
///
/// [`IdleQueue::drain`] closes the queue for good: later pushes are refused.
pub struct IdleQueue<C> {
    capacity: usize,
    inner: Mutex<Inner<C>>,
    discard: fn(C),
}

struct Inner<C> {
    idle: VecDeque<C>,
    waiters: VecDeque<oneshot::Sender<C>>,
    closed: bool,
}

impl<C> IdleQueue<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                idle: VecDeque::with_capacity(capacity),
                waiters: VecDeque::new(),
                closed: false,
            }),
            discard: drop,
        }
    }

    /// Disposal for connections an abandoned [`Waiter`] cannot give back.
    /// Defaults to dropping them.
    pub fn with_discard(mut self, discard: fn(C)) -> Self {
        self.discard = discard;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle connections currently held.
    pub fn len(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of callers parked for a connection.
    pub fn waiters(&self) -> usize {
        self.lock()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    /// Offer a connection, handing it to the oldest waiter if there is one.
    ///
    /// Gives the connection back when the container is full or drained.
    pub fn push(&self, conn: C) -> Result<(), C> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(conn);
        }

        let mut conn = conn;

        while let Some(waiter) = inner.waiters.pop_front() {
            match waiter.send(conn) {
                Ok(()) => return Ok(()),
                // Waiter gave up; try the next one.
                Err(returned) => conn = returned,
            }
        }

        if inner.idle.len() >= self.capacity {
            return Err(conn);
        }

        inner.idle.push_back(conn);
        Ok(())
    }

    /// Take the oldest idle connection without waiting.
    pub fn poll(&self) -> Option<C> {
        self.lock().idle.pop_front()
    }

    /// Take an idle connection, waiting at most `wait` for one to be pushed.
    pub async fn poll_timeout(&self, wait: Duration) -> Option<C> {
        let mut waiter = self.wait();
        waiter.wait_for(wait).await
    }

    /// Join the line of waiters.
    ///
    /// The returned handle keeps its place across several
    /// [`Waiter::wait_for`] slices.
    pub fn wait(&self) -> Waiter<'_, C> {
        let mut waiter = Waiter {
            queue: self,
            ready: None,
            rx: None,
        };
        waiter.enroll();
        waiter
    }

    /// Remove every idle connection, release all parked waiters empty-handed
    /// and refuse further pushes.
    pub fn drain(&self) -> Vec<C> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.waiters.clear();
        inner.idle.drain(..).collect()
    }
}

/// A place in the [`IdleQueue`] line.
///
/// Dropping it, for example when the caller's future is cancelled, gives up
/// the place. A connection that was already handed over is pushed back, or
/// discarded when the queue has been drained in the meantime.
pub struct Waiter<'a, C> {
    queue: &'a IdleQueue<C>,
    ready: Option<C>,
    rx: Option<oneshot::Receiver<C>>,
}

impl<C> Waiter<'_, C> {
    fn enroll(&mut self) {
        let mut inner = self.queue.lock();
        if inner.closed {
            return;
        }

        if let Some(conn) = inner.idle.pop_front() {
            self.ready = Some(conn);
            return;
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.push_back(tx);
        self.rx = Some(rx);
    }

    /// Wait up to `slice` for a connection.
    ///
    /// Returns `None` on timeout while keeping the place in line, or when the
    /// queue was drained.
    pub async fn wait_for(&mut self, slice: Duration) -> Option<C> {
        if let Some(conn) = self.ready.take() {
            return Some(conn);
        }

        if self.rx.is_none() {
            self.enroll();
            if let Some(conn) = self.ready.take() {
                return Some(conn);
            }
        }

        let rx = self.rx.as_mut()?;
        match timeout(slice, rx).await {
            Ok(Ok(conn)) => {
                self.rx = None;
                Some(conn)
            }
            Ok(Err(_)) => {
                // Drained.
                self.rx = None;
                None
            }
            Err(_) => None,
        }
    }
}

impl<C> Drop for Waiter<'_, C> {
    fn drop(&mut self) {
        let mut recovered = self.ready.take();

        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if let Ok(conn) = rx.try_recv() {
                recovered = Some(conn);
            }
        }

        if let Some(conn) = recovered {
            if let Err(conn) = self.queue.push(conn) {
                if !self.queue.is_closed() {
                    warn!("Idle queue full while returning connection from abandoned waiter");
                }
                (self.queue.discard)(conn);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SLICE: Duration = Duration::from_millis(20);

    #[test]
    fn push_and_poll_are_fifo() {
        let queue = IdleQueue::new(3);
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.poll(), Some(2));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn push_beyond_capacity_hands_connection_back() {
        let queue = IdleQueue::new(1);
        assert_eq!(queue.capacity(), 1);
        queue.push("a").unwrap();
        assert_eq!(queue.push("b"), Err("b"));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let queue = IdleQueue::new(2);
        let mut first = queue.wait();
        let mut second = queue.wait();
        assert_eq!(queue.waiters(), 2);

        queue.push("one").unwrap();
        queue.push("two").unwrap();

        assert_eq!(second.wait_for(SLICE).await, Some("two"));
        assert_eq!(first.wait_for(SLICE).await, Some("one"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn waiter_is_woken_by_push() {
        let queue = IdleQueue::new(1);
        let mut waiter = queue.wait();

        let mut slice = tokio_test::task::spawn(waiter.wait_for(Duration::from_secs(5)));
        tokio_test::assert_pending!(slice.poll());

        queue.push(9).unwrap();
        assert!(slice.is_woken());
        assert_eq!(tokio_test::assert_ready!(slice.poll()), Some(9));
    }

    #[tokio::test]
    async fn timed_out_slice_keeps_place_in_line() {
        let queue = IdleQueue::new(1);
        let mut waiter = queue.wait();

        assert_eq!(waiter.wait_for(SLICE).await, None);
        assert_eq!(queue.waiters(), 1);

        queue.push(7).unwrap();
        assert_eq!(waiter.wait_for(SLICE).await, Some(7));
    }

    #[tokio::test]
    async fn poll_timeout_expires_without_losing_later_pushes() {
        let queue = IdleQueue::new(1);
        assert_eq!(queue.poll_timeout(SLICE).await, None);
        assert_eq!(queue.waiters(), 0);

        queue.push(3).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn abandoned_waiter_returns_handed_over_connection() {
        let queue = IdleQueue::new(1);
        let waiter = queue.wait();
        queue.push(42).unwrap();
        assert!(queue.is_empty());

        drop(waiter);
        assert_eq!(queue.poll(), Some(42));
    }

    #[tokio::test]
    async fn drain_releases_waiters() {
        let queue = IdleQueue::<u32>::new(2);
        let mut waiter = queue.wait();
        assert!(queue.drain().is_empty());
        assert_eq!(waiter.wait_for(Duration::from_secs(5)).await, None);
    }

    #[tokio::test]
    async fn drained_queue_refuses_pushes() {
        let queue = IdleQueue::new(2);
        queue.push(1).unwrap();
        assert_eq!(queue.drain(), vec![1]);
        assert!(queue.is_closed());

        assert_eq!(queue.push(2), Err(2));
        assert!(queue.is_empty());
        assert_eq!(queue.poll_timeout(SLICE).await, None);
    }

    static DISCARDED: AtomicUsize = AtomicUsize::new(0);

    fn count_discard(_conn: u32) {
        DISCARDED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn waiter_abandoned_after_drain_discards_its_connection() {
        let queue = IdleQueue::new(1).with_discard(count_discard);
        let waiter = queue.wait();
        queue.push(5).unwrap();
        queue.drain();

        drop(waiter);
        assert!(queue.is_empty());
        assert_eq!(DISCARDED.load(Ordering::SeqCst), 1);
    }
}
