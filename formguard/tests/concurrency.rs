// Concurrent bursts against the rate limiter on a multi-threaded runtime.

use std::sync::Arc;

use proptest::prelude::*;

use formguard::config::RateLimitConfig;
use formguard::RateLimiter;

const T0: i64 = 1_700_000_000_000;

async fn burst(limiter: Arc<RateLimiter>, identifier: &str, n: usize, max: u32, now: i64) -> usize {
    let mut handles = Vec::with_capacity(n);
    for _ in 0..n {
        let rl = Arc::clone(&limiter);
        let id = identifier.to_string();
        handles.push(tokio::spawn(async move {
            rl.check_basic_at(&id, 60_000, max, now).await.allowed
        }));
    }
    let mut admitted = 0;
    for h in handles {
        if h.await.unwrap() { admitted += 1; }
    }
    admitted
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn burst_never_over_admits(n in 1usize..200, max in 1u32..20) {
        let rt = runtime();
        let admitted = rt.block_on(async {
            let rl = Arc::new(RateLimiter::new(RateLimitConfig { window_ms: 60_000, max_requests: max }));
            burst(rl, "203.0.113.1", n, max, T0).await
        });
        prop_assert_eq!(admitted, n.min(max as usize));
    }

    #[test]
    fn identifiers_do_not_share_budgets(n in 1usize..60, ids in 2usize..6) {
        let rt = runtime();
        let per_id = rt.block_on(async {
            let rl = Arc::new(RateLimiter::new(RateLimitConfig::default()));
            let mut tasks = Vec::new();
            for i in 0..ids {
                let rl = Arc::clone(&rl);
                tasks.push(tokio::spawn(async move {
                    burst(rl, &format!("198.51.100.{i}"), n, 5, T0).await
                }));
            }
            let mut out = Vec::new();
            for t in tasks { out.push(t.await.unwrap()); }
            out
        });
        prop_assert!(per_id.iter().all(|&a| a == n.min(5)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn next_window_admits_again_after_a_burst() {
    let rl = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    assert_eq!(burst(Arc::clone(&rl), "192.0.2.1", 100, 5, T0).await, 5);
    assert_eq!(burst(Arc::clone(&rl), "192.0.2.1", 100, 5, T0 + 59_999).await, 0);
    assert_eq!(burst(Arc::clone(&rl), "192.0.2.1", 100, 5, T0 + 60_000).await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sweep_during_burst_never_over_admits() {
    let rl = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    let sweeper = {
        let rl = Arc::clone(&rl);
        tokio::spawn(async move {
            for _ in 0..50 {
                rl.sweep(T0 + 30_000).await;
                tokio::task::yield_now().await;
            }
        })
    };
    let admitted = burst(Arc::clone(&rl), "192.0.2.77", 200, 5, T0).await;
    sweeper.await.unwrap();
    // Live records are never purged, so the window budget holds.
    assert_eq!(admitted, 5);
}
