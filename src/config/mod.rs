use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub ai_rate_window_secs: u64,
    pub ai_max_requests: u32,
    pub ai_min_interval_secs: u64,
    pub ai_backoff_cap: u32,
    pub ai_cache_ttl_secs: u64,
    pub ai_cache_capacity: usize,
    pub huggingface_api_url: String,
    pub huggingface_api_key: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            ai_rate_window_secs: parse_or("AI_RATE_WINDOW", 3600),
            ai_max_requests: parse_or("AI_MAX_REQUESTS", 20),
            ai_min_interval_secs: parse_or("AI_MIN_INTERVAL", 180),
            ai_backoff_cap: parse_or("AI_BACKOFF_CAP", 8),
            ai_cache_ttl_secs: parse_or("AI_CACHE_TTL", 7200),
            ai_cache_capacity: parse_or("AI_CACHE_CAPACITY", 1000),
            huggingface_api_url: env::var("HUGGINGFACE_API_URL").unwrap_or_else(|_| {
                "https://api-inference.huggingface.co/models/facebook/bart-large-cnn".to_string()
            }),
            huggingface_api_key: env::var("HUGGINGFACE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            server_host: env::var("SERVER_HOST")?,
            server_port: parse_or("SERVER_PORT", 3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api/v1".to_string()),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
