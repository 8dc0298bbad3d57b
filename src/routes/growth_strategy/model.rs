use serde::{Deserialize, Serialize};

use crate::ai::{CacheStats, FallbackProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub name: String,
    pub current: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Pending,
    InProgress,
    Completed,
}

impl StrategyStatus {
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 90.0 {
            StrategyStatus::Completed
        } else if progress >= 40.0 {
            StrategyStatus::InProgress
        } else {
            StrategyStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub title: String,
    pub description: String,
    pub progress: f64,
    pub status: StrategyStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStrategyResponse {
    pub metrics: Vec<MetricData>,
    pub strategies: Vec<Strategy>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: CacheStats,
    pub rate_limiter: RateLimiterHealth,
    pub huggingface_api: UpstreamHealth,
}

#[derive(Serialize)]
pub struct RateLimiterHealth {
    pub can_make_request: bool,
    pub max_requests_per_hour: u32,
    pub min_interval_seconds: u64,
}

#[derive(Serialize)]
pub struct UpstreamHealth {
    pub configured: bool,
}

/// 预置的增长策略数据，AI 服务不可用时的降级响应
pub struct DefaultGrowthInsights;

impl FallbackProvider for DefaultGrowthInsights {
    type Output = GrowthStrategyResponse;

    fn fallback(&self) -> GrowthStrategyResponse {
        GrowthStrategyResponse {
            metrics: vec![
                MetricData {
                    name: "Customer Acquisition".to_string(),
                    current: 120.0,
                    target: 150.0,
                },
                MetricData {
                    name: "Revenue Growth".to_string(),
                    current: 85000.0,
                    target: 100000.0,
                },
                MetricData {
                    name: "Market Share".to_string(),
                    current: 15.0,
                    target: 20.0,
                },
                MetricData {
                    name: "Customer Retention".to_string(),
                    current: 85.0,
                    target: 95.0,
                },
            ],
            strategies: vec![
                Strategy {
                    id: "1".to_string(),
                    title: "Market Expansion".to_string(),
                    description: "Expand into new geographic markets to increase customer base"
                        .to_string(),
                    progress: 90.0,
                    status: StrategyStatus::Completed,
                },
                Strategy {
                    id: "2".to_string(),
                    title: "Product Innovation".to_string(),
                    description: "Develop new features based on customer feedback".to_string(),
                    progress: 65.0,
                    status: StrategyStatus::InProgress,
                },
                Strategy {
                    id: "3".to_string(),
                    title: "Customer Retention".to_string(),
                    description: "Implement loyalty program to improve retention".to_string(),
                    progress: 40.0,
                    status: StrategyStatus::InProgress,
                },
                Strategy {
                    id: "4".to_string(),
                    title: "Digital Transformation".to_string(),
                    description: "Modernize internal processes and customer touchpoints"
                        .to_string(),
                    progress: 25.0,
                    status: StrategyStatus::Pending,
                },
            ],
        }
    }
}
