/// Benchmark: Acquire/Release Cycle
///
/// Measures the uncontended lease path and a contended one where more tasks
/// than connections compete for the pool.
use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nodepool::{Connection, ConnectionFactory, HostConfig, HostPool, TransportError};
use std::sync::Arc;
use tokio::runtime::Runtime;

// In-memory connection so only pool overhead is measured
#[derive(Debug)]
struct NullConnection {
    open: bool,
}

#[async_trait]
impl Connection for NullConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn health_check(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
    }
}

struct NullFactory;

#[async_trait]
impl ConnectionFactory for NullFactory {
    type Connection = NullConnection;

    async fn open(&self) -> Result<NullConnection, TransportError> {
        Ok(NullConnection { open: true })
    }
}

fn build_pool(rt: &Runtime, max_active: usize, stale_check: bool) -> Arc<HostPool<NullFactory>> {
    let host = HostConfig::new("bench", 9160)
        .with_max_active(max_active)
        .with_stale_connection_check(stale_check);
    Arc::new(
        rt.block_on(HostPool::new(host, NullFactory))
            .expect("build bench pool"),
    )
}

fn bench_uncontended(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("uncontended");

    for stale_check in [false, true] {
        let pool = build_pool(&rt, 8, stale_check);
        group.bench_with_input(
            BenchmarkId::new("acquire_release", stale_check),
            &stale_check,
            |b, _| {
                b.to_async(&rt).iter(|| {
                    let pool = Arc::clone(&pool);
                    async move {
                        let conn = pool.acquire().await.expect("acquire");
                        pool.release(black_box(conn)).await;
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("contended");

    for tasks in [4usize, 16, 64] {
        let pool = build_pool(&rt, 4, false);
        group.bench_with_input(BenchmarkId::new("tasks", tasks), &tasks, |b, &tasks| {
            b.to_async(&rt).iter(|| {
                let pool = Arc::clone(&pool);
                async move {
                    let handles: Vec<_> = (0..tasks)
                        .map(|_| {
                            let pool = Arc::clone(&pool);
                            tokio::spawn(async move {
                                let conn = pool.acquire().await.expect("acquire");
                                pool.release(conn).await;
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.expect("join");
                    }
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
