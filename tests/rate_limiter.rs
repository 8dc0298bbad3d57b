use std::sync::Arc;

use backend::ai::{KvStore, MemoryStore, RateLimitSettings, RateLimiter, keys};

mod support;

use support::{FailingStore, MockClock};

fn limiter(
    settings: RateLimitSettings,
    start: i64,
) -> (RateLimiter, Arc<MemoryStore>, Arc<MockClock>) {
    let clock = MockClock::new(start);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let limiter = RateLimiter::new(store.clone(), clock.clone(), settings);
    (limiter, store, clock)
}

async fn backoff_value(store: &MemoryStore, resource: &str) -> Option<u32> {
    store
        .get(&keys::backoff_key(resource))
        .await
        .unwrap()
        .and_then(|v| v.parse().ok())
}

#[tokio::test]
async fn hourly_quota_is_enforced() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 5,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (limiter, store, _clock) = limiter(settings, 1000);

    for _ in 0..5 {
        assert!(limiter.admit("huggingface_api").await);
    }
    // 同一窗口内第 max_requests + 1 次被拒
    assert!(!limiter.admit("huggingface_api").await);
    assert_eq!(backoff_value(&store, "huggingface_api").await, Some(2));
}

#[tokio::test]
async fn backoff_doubles_on_denial_and_decays_on_admission() {
    let settings = RateLimitSettings {
        window_secs: 100,
        max_requests: 2,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (limiter, store, clock) = limiter(settings, 50);

    assert!(limiter.admit("hf").await);
    assert!(limiter.admit("hf").await);

    // 超配额：1 -> 2 -> 4
    assert!(!limiter.admit("hf").await);
    assert_eq!(backoff_value(&store, "hf").await, Some(2));
    assert!(!limiter.admit("hf").await);
    assert_eq!(backoff_value(&store, "hf").await, Some(4));

    // 进入下一个固定窗口，计数重置，退避逐次回落：4 -> 3 -> 2
    clock.advance(60);
    assert!(limiter.admit("hf").await);
    assert_eq!(backoff_value(&store, "hf").await, Some(3));
    assert!(limiter.admit("hf").await);
    assert_eq!(backoff_value(&store, "hf").await, Some(2));
}

#[tokio::test]
async fn backoff_never_exceeds_cap() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 1,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (limiter, store, _clock) = limiter(settings, 1000);

    assert!(limiter.admit("hf").await);
    for _ in 0..6 {
        assert!(!limiter.admit("hf").await);
    }
    assert_eq!(backoff_value(&store, "hf").await, Some(8));
}

#[tokio::test]
async fn minimum_interval_is_enforced() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 100,
        min_interval_secs: 180,
        backoff_cap: 8,
    };
    let (limiter, _store, clock) = limiter(settings, 1000);

    assert!(limiter.admit("hf").await);
    clock.advance(100);
    // 间隔不足 180 秒
    assert!(!limiter.admit("hf").await);
    clock.advance(81);
    // 距上次放行 181 秒
    assert!(limiter.admit("hf").await);
}

#[tokio::test]
async fn denied_interval_check_does_not_move_last_request() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 100,
        min_interval_secs: 180,
        backoff_cap: 8,
    };
    let (limiter, store, clock) = limiter(settings, 1000);

    assert!(limiter.admit("hf").await);
    clock.advance(100);
    assert!(!limiter.admit("hf").await);

    let last: Option<String> = store.get(&keys::last_request_key("hf")).await.unwrap();
    assert_eq!(last.as_deref(), Some("1000"));
}

#[tokio::test]
async fn counter_resets_at_bucket_boundary() {
    let settings = RateLimitSettings {
        window_secs: 100,
        max_requests: 2,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (limiter, _store, clock) = limiter(settings, 50);

    assert!(limiter.admit("hf").await);
    assert!(limiter.admit("hf").await);
    assert!(!limiter.admit("hf").await);

    // 跨过窗口边界后计数从零开始
    clock.advance(60);
    assert!(limiter.admit("hf").await);
}

#[tokio::test]
async fn zero_window_does_not_panic() {
    // 直接构造的参数可能带着零窗口，判定时按 1 秒处理
    let settings = RateLimitSettings {
        window_secs: 0,
        max_requests: 5,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (limiter, _store, _clock) = limiter(settings, 1000);

    assert!(limiter.admit("hf").await);
}

#[tokio::test]
async fn store_outage_fails_open() {
    let clock = MockClock::new(1000);
    let limiter = RateLimiter::new(
        Arc::new(FailingStore),
        clock,
        RateLimitSettings::default(),
    );

    for _ in 0..10 {
        assert!(limiter.admit("huggingface_api").await);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_admissions_have_bounded_overrun() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 5,
        min_interval_secs: 60,
        backoff_cap: 8,
    };
    let clock = MockClock::new(1_000_000);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let limiter = Arc::new(RateLimiter::new(store.clone(), clock, settings));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move { limiter.admit("shared").await }));
    }
    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    // 读-判-写不在一个事务里，并发下放行数可能少于配额，但绝不超过
    assert!(admitted >= 1, "at least one caller must be admitted");
    assert!(admitted <= 5, "admissions must not exceed the hourly cap");

    // 计数器每次调用恰好加一
    let bucket = 1_000_000 / 3600;
    let count: i64 = store
        .get(&keys::hourly_bucket_key("shared", bucket))
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(count, 20);

    // 退避倍数在并发更新下仍然保持在 [1, 8]
    if let Some(backoff) = backoff_value(&store, "shared").await {
        assert!((1..=8).contains(&backoff));
    }
}
