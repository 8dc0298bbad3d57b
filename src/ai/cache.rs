use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::ai::keys;
use crate::ai::store::{Clock, KvStore, StoreError};
use crate::config::Config;

/// 缓存参数
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// 条目保鲜时间（秒）
    pub ttl_secs: u64,
    /// 最大条目数，超出按最久未访问驱逐
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 7200,
            capacity: 1000,
        }
    }
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl_secs: config.ai_cache_ttl_secs,
            capacity: config.ai_cache_capacity,
        }
    }
}

/// 缓存观测数据，供健康检查接口使用
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// AI 响应缓存。
///
/// 值键 `ai_cache:{指纹}` 带 TTL，访问时间记录在有序集合
/// `ai_cache:access` 里作为 LRU 依据。驱逐时值键和访问记录在
/// 同一个逻辑步骤里一起删除，两个结构必须保持一致。存储故障
/// 时查询按未命中处理，写入静默放弃。
pub struct AiCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl AiCache {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// 按指纹查缓存，命中时刷新该键的访问时间
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        match self.try_lookup(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("cache lookup failed, treating as miss: {}", e);
                None
            }
        }
    }

    async fn try_lookup(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let Some(raw) = self.store.get(&keys::cache_value_key(key)).await? else {
            return Ok(None);
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("discarding unreadable cache entry {}: {}", key, e);
                return Ok(None);
            }
        };
        // 命中即刷新访问时间，保证真实的 LRU 序
        self.store
            .zadd(keys::CACHE_ACCESS_KEY, key, self.clock.now_secs() as f64)
            .await?;
        Ok(Some(value))
    }

    /// 写入一条响应，容量满时先驱逐最久未访问的条目
    pub async fn store(&self, key: &str, value: &Value) {
        if let Err(e) = self.try_store(key, value).await {
            tracing::error!("cache store failed: {}", e);
        }
    }

    async fn try_store(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let size = self.store.zcard(keys::CACHE_ACCESS_KEY).await?;
        if size >= self.settings.capacity as u64 {
            // 驱逐 size - capacity + 1 条，为新条目腾出位置
            let stop = (size - self.settings.capacity as u64) as isize;
            let oldest = self.store.zrange(keys::CACHE_ACCESS_KEY, 0, stop).await?;
            if !oldest.is_empty() {
                let value_keys: Vec<String> =
                    oldest.iter().map(|k| keys::cache_value_key(k)).collect();
                self.store.del(&value_keys).await?;
                self.store.zrem(keys::CACHE_ACCESS_KEY, &oldest).await?;
            }
        }

        let raw = serde_json::to_string(value)?;
        self.store
            .set_ex(&keys::cache_value_key(key), &raw, self.settings.ttl_secs)
            .await?;
        self.store
            .zadd(keys::CACHE_ACCESS_KEY, key, self.clock.now_secs() as f64)
            .await?;
        Ok(())
    }

    /// 缓存规模与配置，存储不可达时报告 disconnected 而不是报错
    pub async fn stats(&self) -> CacheStats {
        match self.store.zcard(keys::CACHE_ACCESS_KEY).await {
            Ok(size) => CacheStats {
                status: "connected".to_string(),
                cache_size: Some(size),
                max_size: Some(self.settings.capacity),
                ttl: Some(self.settings.ttl_secs),
            },
            Err(e) => {
                tracing::error!("cache stats error: {}", e);
                CacheStats {
                    status: "disconnected".to_string(),
                    cache_size: None,
                    max_size: None,
                    ttl: None,
                }
            }
        }
    }
}
