use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

use crate::{
    AppState,
    ai::{AiCache, FallbackProvider, InferenceClient, RateLimiter, fingerprint},
    utils::success_to_api_response,
};

use super::model::{
    DefaultGrowthInsights, GrowthStrategyResponse, HealthResponse, MetricData, RateLimiterHealth,
    Strategy, StrategyStatus, UpstreamHealth,
};

/// AI 调用配额的资源键
const HUGGINGFACE_RESOURCE: &str = "huggingface_api";

/// 基于公司数据生成增长策略
#[axum::debug_handler]
pub async fn create_growth_strategy(
    State(state): State<AppState>,
    Json(company): Json<Value>,
) -> impl IntoResponse {
    let insights = generate_growth_insights(
        &state.ai_cache,
        &state.ai_limiter,
        state.ai_client.as_ref(),
        &company,
    )
    .await;
    (StatusCode::OK, success_to_api_response(insights))
}

/// 获取默认增长策略
#[axum::debug_handler]
pub async fn get_growth_strategy() -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(DefaultGrowthInsights.fallback()),
    )
}

/// 增长策略服务健康检查。
/// 注意 can_make_request 走的是真实的准入判定，会消耗一个放行名额。
#[axum::debug_handler]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.ai_cache.stats().await;
    let can_make_request = state.ai_limiter.admit(HUGGINGFACE_RESOURCE).await;
    let settings = state.ai_limiter.settings();

    (
        StatusCode::OK,
        success_to_api_response(HealthResponse {
            status: "healthy".to_string(),
            cache,
            rate_limiter: RateLimiterHealth {
                can_make_request,
                max_requests_per_hour: settings.max_requests,
                min_interval_seconds: settings.min_interval_secs,
            },
            huggingface_api: UpstreamHealth {
                configured: state.ai_client.configured(),
            },
        }),
    )
}

/// 核心工作流：指纹查缓存 → 准入判定 → 外部调用 → 解析入缓存。
/// 任何一步失败都回退到预置数据，调用方永远拿得到结果。
pub async fn generate_growth_insights(
    cache: &AiCache,
    limiter: &RateLimiter,
    client: &dyn InferenceClient,
    company: &Value,
) -> GrowthStrategyResponse {
    let key = fingerprint(company);

    // 缓存命中不消耗配额
    if let Some(cached) = cache.lookup(&key).await {
        if let Ok(insights) = serde_json::from_value::<GrowthStrategyResponse>(cached) {
            tracing::info!("returning cached growth insights");
            return insights;
        }
    }

    if !limiter.admit(HUGGINGFACE_RESOURCE).await {
        tracing::warn!("AI rate limit exceeded, using fallback insights");
        return DefaultGrowthInsights.fallback();
    }

    if !client.configured() {
        tracing::info!("HuggingFace API key not configured, using fallback insights");
        return DefaultGrowthInsights.fallback();
    }

    let prompt = build_prompt(company);
    let generated = match client.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            // 配额名额已消耗，不退还
            tracing::warn!("AI call failed, using fallback insights: {}", e);
            return DefaultGrowthInsights.fallback();
        }
    };

    let Some(insights) = parse_insights(&generated, company) else {
        tracing::warn!("unable to parse AI response, using fallback insights");
        return DefaultGrowthInsights.fallback();
    };

    match serde_json::to_value(&insights) {
        Ok(raw) => cache.store(&key, &raw).await,
        Err(e) => tracing::warn!("failed to serialize insights for caching: {}", e),
    }
    insights
}

fn field<'a>(company: &'a Value, key: &str, default: &'a str) -> &'a str {
    company.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn build_prompt(company: &Value) -> String {
    format!(
        "As a business growth strategist, analyze this company:\n\
         Industry: {}\n\
         Size: {}\n\
         Revenue: {}\n\
         Growth Rate: {}\n\
         Target Market: {}\n\
         Current Challenges: {}\n\n\
         Provide specific, actionable growth strategies and key metrics to track.\n\
         Format the response as a business plan with clear objectives and targets.",
        field(company, "industry", "Unknown"),
        field(company, "size", "Unknown"),
        field(company, "revenue", "Unknown"),
        field(company, "growth_rate", "Unknown"),
        field(company, "target_market", "Unknown"),
        field(company, "current_challenges", "None specified"),
    )
}

// 把生成文本按行拆成最多 4 条策略，指标由营收和增长率推出
fn parse_insights(text: &str, company: &Value) -> Option<GrowthStrategyResponse> {
    let points: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if points.is_empty() {
        return None;
    }

    let strategies = points
        .iter()
        .take(4)
        .enumerate()
        .map(|(i, point)| {
            let progress = match i {
                0 => 90.0,
                1 => 65.0,
                2 => 40.0,
                _ => 25.0,
            };
            Strategy {
                id: (i + 1).to_string(),
                title: format!("Strategy {}", i + 1),
                description: (*point).to_string(),
                progress,
                status: StrategyStatus::from_progress(progress),
            }
        })
        .collect();

    let revenue_str = field(company, "revenue", "$10M")
        .replace('$', "")
        .replace('M', "");
    let growth_str = field(company, "growth_rate", "15%").replace('%', "");
    let base_revenue = revenue_str
        .parse::<f64>()
        .map(|v| v * 1_000_000.0)
        .unwrap_or(10_000_000.0);
    let growth_rate = growth_str.parse::<f64>().unwrap_or(15.0);

    let metrics = vec![
        MetricData {
            name: "Customer Acquisition".to_string(),
            current: (base_revenue / 100_000.0).round(),
            target: (base_revenue / 80_000.0).round(),
        },
        MetricData {
            name: "Revenue Growth".to_string(),
            current: base_revenue,
            target: base_revenue * (1.0 + growth_rate / 100.0),
        },
        MetricData {
            name: "Market Share".to_string(),
            current: growth_rate,
            target: (growth_rate * 1.3).min(100.0),
        },
        MetricData {
            name: "Customer Retention".to_string(),
            current: 85.0,
            target: 95.0,
        },
    ];

    Some(GrowthStrategyResponse {
        metrics,
        strategies,
    })
}
