pub mod growth_strategy;
pub mod user;
