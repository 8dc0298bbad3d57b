/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 上次放行时间键前缀
const LAST_REQUEST_PREFIX: &str = "last_request:";

/// 退避倍数键前缀
const BACKOFF_PREFIX: &str = "backoff:";

/// 缓存值键前缀
const CACHE_VALUE_PREFIX: &str = "ai_cache:";

/// 缓存访问时间有序集合键
pub const CACHE_ACCESS_KEY: &str = "ai_cache:access";

/// 生成小时桶计数键，bucket 为 `now / window` 的固定窗口编号
pub fn hourly_bucket_key(resource: &str, bucket: i64) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, resource, bucket)
}

/// 生成上次放行时间键
pub fn last_request_key(resource: &str) -> String {
    format!("{}{}", LAST_REQUEST_PREFIX, resource)
}

/// 生成退避倍数键
pub fn backoff_key(resource: &str) -> String {
    format!("{}{}", BACKOFF_PREFIX, resource)
}

/// 生成缓存值键，fingerprint 为请求负载指纹
pub fn cache_value_key(fingerprint: &str) -> String {
    format!("{}{}", CACHE_VALUE_PREFIX, fingerprint)
}
