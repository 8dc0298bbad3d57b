use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post, put},
};
use backend::{
    AppState,
    ai::{
        AiCache, CacheSettings, HuggingFaceClient, InferenceClient, RateLimitSettings, RedisStore,
        SystemClock,
    },
    config::Config,
    middleware::{self, auth_middleware, log_errors, rate_limit},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'growth_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    // 组装 AI 调用防护组件，共用同一个 Redis 存储
    let clock = Arc::new(SystemClock);
    let store = Arc::new(RedisStore::new(redis_arc.clone()));
    let ai_limiter = Arc::new(backend::ai::RateLimiter::new(
        store.clone(),
        clock.clone(),
        RateLimitSettings::from_config(&config),
    ));
    let ai_cache = Arc::new(AiCache::new(
        store,
        clock,
        CacheSettings::from_config(&config),
    ));
    let ai_client: Arc<dyn InferenceClient> = Arc::new(HuggingFaceClient::new(&config));

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
        ai_limiter,
        ai_cache,
        ai_client,
    };

    // HTTP 层按 IP 限流器
    let rate_limiter = Arc::new(middleware::RateLimiter::new(redis_client, config.clone()));

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/health", get(service_health))
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login))
        .route(
            "/growth-strategy/health",
            get(routes::growth_strategy::health_check),
        );

    let protected_routes = Router::new()
        .route("/users/me", get(routes::user::get_me))
        .route("/users/update-password", put(routes::user::update_password))
        .route(
            "/growth-strategy",
            post(routes::growth_strategy::create_growth_strategy)
                .get(routes::growth_strategy::get_growth_strategy),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 创建基础路由
    let router = Router::new().nest(
        &config.api_base_uri,
        Router::new().merge(public_routes).merge(protected_routes),
    );

    // 添加日志中间件和限流中间件
    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

async fn service_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
