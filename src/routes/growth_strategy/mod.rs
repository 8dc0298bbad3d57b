mod handler;
mod model;

pub use handler::{
    create_growth_strategy, generate_growth_insights, get_growth_strategy, health_check,
};
pub use model::{
    DefaultGrowthInsights, GrowthStrategyResponse, MetricData, Strategy, StrategyStatus,
};
