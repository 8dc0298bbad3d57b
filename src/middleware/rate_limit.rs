use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// HTTP 层按 IP 限流器，与 AI 准入限流相互独立
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: Config) -> Self {
        Self {
            redis: Arc::new(redis),
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, StatusCode> {
        let ip = client_ip(&req);

        let key = format!("http_rate_limit:{}", ip);
        // 计数失败时放行，限流层故障不应挡住正常流量
        match self.incr_window(&key).await {
            Ok(count) if count > self.config.rate_limit_requests as i64 => {
                return Ok((
                    StatusCode::OK,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "请求过于频繁，请在{}秒后重试",
                            self.config.rate_limit_window().as_secs()
                        ),
                    ),
                )
                    .into_response());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("HTTP rate limit store error, failing open: {}", e);
            }
        }

        Ok(next.run(req).await)
    }

    async fn incr_window(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            // 第一次请求时设置窗口过期
            let _: () = conn
                .expire(key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }
}

// 优先取代理头，取不到再退回连接地址
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    limiter.check_rate_limit(req, next).await
}
