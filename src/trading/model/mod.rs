pub mod bot;
pub mod enums;
pub mod order;
pub mod strategy;

pub use bot::{ApiCredentials, BotEntity, ExchangeAccountEntity, ExchangeEntity};
pub use enums::{OrderKind, PositionSide, StrategyTradeStatus, UserTradeStatus};
pub use order::{UserTradeEntity, UserTradeOrderEntity};
pub use strategy::{StrategyEntity, StrategyTradeEntity};
