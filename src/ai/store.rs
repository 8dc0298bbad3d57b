use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use thiserror::Error;
use tokio::sync::Mutex;

/// 共享键值存储操作错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis 操作失败: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("序列化失败: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 时钟抽象，测试中可替换为可控时钟
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// 限流与 AI 缓存共用的存储原语。
/// 每个方法在存储层面都是原子的，跨方法的序列不保证原子性。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 原子自增并刷新过期时间，返回自增后的值
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;
    async fn del(&self, keys: &[String]) -> Result<(), StoreError>;
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;
    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;
    /// 按名次取区间，支持负索引，区间两端均包含
    async fn zrange(&self, key: &str, start: isize, stop: isize)
    -> Result<Vec<String>, StoreError>;
    async fn zrem(&self, key: &str, members: &[String]) -> Result<(), StoreError>;
}

/// Redis 实现，每次操作获取一个多路复用连接
pub struct RedisStore {
    client: Arc<RedisClient>,
}

impl RedisStore {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let count: i64 = conn.incr(key, 1).await?;
        let _: () = conn.expire(key, ttl_secs as i64).await?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let _: () = conn.del(keys.to_vec()).await?;
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(key).await?)
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(conn.zrange(key, start, stop).await?)
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let _: () = conn.zrem(key, members.to_vec()).await?;
        Ok(())
    }
}

struct StoredValue {
    data: String,
    expires_at: Option<i64>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, StoredValue>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

/// 内存实现，开发环境无 Redis 时使用，也是测试的替身存储
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(MemoryInner::default()),
        }
    }
}

impl MemoryInner {
    fn live_value(&mut self, key: &str, now: i64) -> Option<&StoredValue> {
        let expired = self
            .values
            .get(key)
            .and_then(|v| v.expires_at)
            .is_some_and(|at| now >= at);
        if expired {
            self.values.remove(key);
        }
        self.values.get(key)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        let now = self.clock.now_secs();
        let mut inner = self.inner.lock().await;
        let current = inner
            .live_value(key, now)
            .and_then(|v| v.data.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        inner.values.insert(
            key.to_string(),
            StoredValue {
                data: next.to_string(),
                expires_at: Some(now + ttl_secs as i64),
            },
        );
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_secs();
        let mut inner = self.inner.lock().await;
        Ok(inner.live_value(key, now).map(|v| v.data.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.values.insert(
            key.to_string(),
            StoredValue {
                data: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let now = self.clock.now_secs();
        let mut inner = self.inner.lock().await;
        inner.values.insert(
            key.to_string(),
            StoredValue {
                data: value.to_string(),
                expires_at: Some(now + ttl_secs as i64),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for key in keys {
            inner.values.remove(key);
        }
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.zsets.get(key).map_or(0, |z| z.len() as u64))
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(zset) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, f64)> = zset.iter().map(|(m, s)| (m, *s)).collect();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(b.0))
        });

        let len = members.len() as isize;
        let resolve = |idx: isize| if idx < 0 { len + idx } else { idx };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }
        Ok(members[start as usize..=stop as usize]
            .iter()
            .map(|(m, _)| (*m).clone())
            .collect())
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(zset) = inner.zsets.get_mut(key) {
            for member in members {
                zset.remove(member);
            }
        }
        Ok(())
    }
}
