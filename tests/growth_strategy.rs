use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use backend::ai::{
    AiCache, AiClientError, CacheSettings, FallbackProvider, InferenceClient, KvStore, MemoryStore,
    RateLimitSettings, RateLimiter, keys,
};
use backend::routes::growth_strategy::{DefaultGrowthInsights, generate_growth_insights};

mod support;

use support::MockClock;

/// 按脚本逐次返回预设结果的推理客户端
struct ScriptedClient {
    configured: bool,
    responses: Mutex<Vec<Result<String, AiClientError>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, AiClientError>>) -> Self {
        Self {
            configured: true,
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    fn unconfigured() -> Self {
        Self {
            configured: false,
            responses: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _prompt: &str) -> Result<String, AiClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(AiClientError::Malformed);
        }
        responses.remove(0)
    }
}

fn guard(
    settings: RateLimitSettings,
    start: i64,
) -> (AiCache, RateLimiter, Arc<MemoryStore>, Arc<MockClock>) {
    let clock = MockClock::new(start);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let cache = AiCache::new(store.clone(), clock.clone(), CacheSettings::default());
    let limiter = RateLimiter::new(store.clone(), clock.clone(), settings);
    (cache, limiter, store, clock)
}

#[tokio::test]
async fn gate_denial_returns_fallback_without_calling_upstream() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 0,
        min_interval_secs: 0,
        backoff_cap: 8,
    };
    let (cache, limiter, _store, _clock) = guard(settings, 1_000_000);
    let client = ScriptedClient::new(vec![Ok("Expand sales team".to_string())]);
    let company = serde_json::json!({"industry": "SaaS"});

    let insights = generate_growth_insights(&cache, &limiter, &client, &company).await;

    assert_eq!(insights, DefaultGrowthInsights.fallback());
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn unconfigured_client_returns_fallback() {
    let (cache, limiter, _store, _clock) =
        guard(RateLimitSettings::default(), 1_000_000);
    let client = ScriptedClient::unconfigured();
    let company = serde_json::json!({"industry": "SaaS"});

    let insights = generate_growth_insights(&cache, &limiter, &client, &company).await;

    assert_eq!(insights, DefaultGrowthInsights.fallback());
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn upstream_error_falls_back_and_keeps_interval_consumed() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 10,
        min_interval_secs: 180,
        backoff_cap: 8,
    };
    let (cache, limiter, _store, clock) = guard(settings, 1_000_000);
    let client = ScriptedClient::new(vec![
        Err(AiClientError::Status(500)),
        Ok("Should never be reached".to_string()),
    ]);
    let company = serde_json::json!({"industry": "SaaS"});

    let insights = generate_growth_insights(&cache, &limiter, &client, &company).await;
    assert_eq!(insights, DefaultGrowthInsights.fallback());
    assert_eq!(client.calls(), 1);

    // 失败不退还名额：最小间隔未过，紧接着的重试被拒，上游不再被调用
    clock.advance(10);
    let retry = generate_growth_insights(&cache, &limiter, &client, &company).await;
    assert_eq!(retry, DefaultGrowthInsights.fallback());
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn success_is_cached_and_reordered_payload_hits_cache() {
    let settings = RateLimitSettings {
        window_secs: 3600,
        max_requests: 10,
        min_interval_secs: 180,
        backoff_cap: 8,
    };
    let (cache, limiter, store, _clock) = guard(settings, 1_000_000);
    let client = ScriptedClient::new(vec![Ok(
        "Expand sales team\nLaunch referral program".to_string()
    )]);
    let company = serde_json::json!({"industry": "SaaS", "revenue": "$5M"});

    let first = generate_growth_insights(&cache, &limiter, &client, &company).await;
    assert_eq!(first.strategies.len(), 2);
    assert_ne!(first, DefaultGrowthInsights.fallback());
    assert_eq!(client.calls(), 1);

    // 字段顺序不同的同一份数据命中同一个缓存条目，不再走上游
    let reordered = serde_json::json!({"revenue": "$5M", "industry": "SaaS"});
    let second = generate_growth_insights(&cache, &limiter, &client, &reordered).await;
    assert_eq!(second, first);
    assert_eq!(client.calls(), 1);

    // 命中缓存的请求不消耗配额，窗口计数仍停在首次调用
    let bucket = 1_000_000 / 3600;
    let count = store
        .get(&keys::hourly_bucket_key("huggingface_api", bucket))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(count, "1");
}

#[tokio::test]
async fn unparseable_response_falls_back_without_caching() {
    let (cache, limiter, _store, _clock) =
        guard(RateLimitSettings::default(), 1_000_000);
    let client = ScriptedClient::new(vec![Ok("  \n \n".to_string())]);
    let company = serde_json::json!({"industry": "SaaS"});

    let insights = generate_growth_insights(&cache, &limiter, &client, &company).await;
    assert_eq!(insights, DefaultGrowthInsights.fallback());

    // 空响应不落缓存
    assert!(cache.lookup(&backend::ai::fingerprint(&company)).await.is_none());
}
