use std::sync::Arc;

use ai::{AiCache, InferenceClient, RateLimiter};
use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

pub mod ai;
pub mod config;
pub mod middleware;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub ai_limiter: Arc<RateLimiter>,
    pub ai_cache: Arc<AiCache>,
    pub ai_client: Arc<dyn InferenceClient>,
}
