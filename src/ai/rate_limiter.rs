use std::sync::Arc;

use crate::ai::keys;
use crate::ai::store::{Clock, KvStore, StoreError};
use crate::config::Config;

/// 限流参数
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// 固定窗口长度（秒）
    pub window_secs: u64,
    /// 单窗口最大放行次数
    pub max_requests: u32,
    /// 两次放行之间的最小间隔（秒）
    pub min_interval_secs: u64,
    /// 退避倍数上限
    pub backoff_cap: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            max_requests: 20,
            min_interval_secs: 180,
            backoff_cap: 8,
        }
    }
}

impl RateLimitSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            // 窗口为零会让桶编号除零，钳制到至少 1 秒
            window_secs: config.ai_rate_window_secs.max(1),
            max_requests: config.ai_max_requests,
            min_interval_secs: config.ai_min_interval_secs,
            backoff_cap: config.ai_backoff_cap,
        }
    }
}

/// AI 调用准入限流器。
///
/// 所有状态都在共享存储里，实例本身无状态，可以在任意多个
/// 任务间并发使用。判定由固定小时桶计数、最小间隔和指数退避
/// 三部分组成；读-判-写序列不在一个事务里，同一资源键的并发
/// 调用可能基于过期读互相放行，属于接受的权衡，退避倍数在每次
/// 写入时钳制在 [1, backoff_cap] 内。
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        settings: RateLimitSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// 判定一次对 `resource_key` 的外部调用是否放行。
    /// 存储故障时放行（可用性优先），绝不向调用方抛错。
    pub async fn admit(&self, resource_key: &str) -> bool {
        match self.try_admit(resource_key).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!("rate limiter store error, failing open: {}", e);
                true
            }
        }
    }

    async fn try_admit(&self, resource_key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_secs();
        let window = self.settings.window_secs.max(1);
        let bucket = now.div_euclid(window as i64);

        // 固定窗口计数，过期时间即窗口长度，旧桶自清理
        let hour_key = keys::hourly_bucket_key(resource_key, bucket);
        let count = self.store.incr(&hour_key, window).await?;

        let last_request = self
            .store
            .get(&keys::last_request_key(resource_key))
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let backoff = self
            .store
            .get(&keys::backoff_key(resource_key))
            .await?
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1)
            .clamp(1, self.settings.backoff_cap);

        if count > self.settings.max_requests as i64 {
            tracing::warn!("hourly rate limit exceeded for {}", resource_key);
            let next = (backoff * 2).min(self.settings.backoff_cap);
            self.store
                .set_ex(&keys::backoff_key(resource_key), &next.to_string(), window)
                .await?;
            return Ok(false);
        }

        let required = self.settings.min_interval_secs as i64 * backoff as i64;
        let elapsed = now - last_request;
        if elapsed < required {
            tracing::warn!(
                "request for {} too soon, {}s before next admission",
                resource_key,
                required - elapsed
            );
            return Ok(false);
        }

        self.store
            .set(&keys::last_request_key(resource_key), &now.to_string())
            .await?;

        // 每次成功放行让退避倍数回落一步
        if backoff > 1 {
            self.store
                .set_ex(
                    &keys::backoff_key(resource_key),
                    &(backoff - 1).to_string(),
                    window,
                )
                .await?;
        }

        Ok(true)
    }
}
