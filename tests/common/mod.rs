//! Scriptable in-memory connections shared by the pool integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use nodepool::{Connection, ConnectionFactory, HostConfig, TransportError};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct Shared {
    next_id: AtomicU64,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub health_checks: AtomicUsize,
    fail_open: AtomicBool,
    /// Connection id -> socket error message its next health check fails with.
    failures: Mutex<HashMap<u64, String>>,
}

#[derive(Debug)]
pub struct MockConnection {
    pub id: u64,
    open: bool,
    shared: Arc<Shared>,
}

impl MockConnection {
    /// Simulate the connection dying while leased.
    pub fn kill(&mut self) {
        self.open = false;
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn health_check(&mut self) -> Result<(), TransportError> {
        self.shared.health_checks.fetch_add(1, Ordering::SeqCst);
        let failure = self.shared.failures.lock().unwrap().get(&self.id).cloned();
        match failure {
            Some(message) => Err(TransportError::with_cause(
                "health check failed",
                io::Error::new(io::ErrorKind::Other, message),
            )),
            None => Ok(()),
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub shared: Arc<Shared>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_opens(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make every health check on connection `id` fail with a socket error.
    pub fn break_connection(&self, id: u64, message: &str) {
        self.shared
            .failures
            .lock()
            .unwrap()
            .insert(id, message.to_string());
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> usize {
        self.shared.health_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn open(&self) -> Result<MockConnection, TransportError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::with_cause(
                "open failed",
                io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused"),
            ));
        }

        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            open: true,
            shared: Arc::clone(&self.shared),
        })
    }
}

pub fn host(max_active: usize, max_wait_ms: i64) -> HostConfig {
    HostConfig::new("node-under-test", 9160)
        .with_max_active(max_active)
        .with_max_wait_time_when_exhausted(max_wait_ms)
}
