#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use backend::ai::{Clock, KvStore, StoreError};

/// 可手动推进的时钟
pub struct MockClock {
    now: AtomicI64,
}

impl MockClock {
    pub fn new(start: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(start),
        })
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 每个操作都失败的存储，模拟存储不可达
pub struct FailingStore;

fn outage() -> StoreError {
    StoreError::Unavailable("simulated outage".to_string())
}

#[async_trait]
impl KvStore for FailingStore {
    async fn incr(&self, _key: &str, _ttl_secs: u64) -> Result<i64, StoreError> {
        Err(outage())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(outage())
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn del(&self, _keys: &[String]) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn zadd(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn zcard(&self, _key: &str) -> Result<u64, StoreError> {
        Err(outage())
    }

    async fn zrange(
        &self,
        _key: &str,
        _start: isize,
        _stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        Err(outage())
    }

    async fn zrem(&self, _key: &str, _members: &[String]) -> Result<(), StoreError> {
        Err(outage())
    }
}
