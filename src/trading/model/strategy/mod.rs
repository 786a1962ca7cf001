pub mod strategy;
pub mod strategy_trade;

pub use strategy::StrategyEntity;
pub use strategy_trade::StrategyTradeEntity;
