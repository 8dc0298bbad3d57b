// AI 调用防护模块
// 包含准入限流、响应缓存、请求指纹和降级逻辑

pub mod cache;
pub mod client;
pub mod fingerprint;
pub mod keys;
pub mod rate_limiter;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use cache::{AiCache, CacheSettings, CacheStats};
pub use client::{AiClientError, HuggingFaceClient, InferenceClient};
pub use fingerprint::fingerprint;
pub use rate_limiter::{RateLimitSettings, RateLimiter};
pub use store::{Clock, KvStore, MemoryStore, RedisStore, StoreError, SystemClock};

/// 降级响应提供者。
/// 上游不可用或配额耗尽时，调用方用它拿到一份可辨识的预置
/// 结果，核心模块不关心具体业务负载的形状。
pub trait FallbackProvider: Send + Sync {
    type Output;

    fn fallback(&self) -> Self::Output;
}
