pub mod user_trade;
pub mod user_trade_order;

pub use user_trade::UserTradeEntity;
pub use user_trade_order::UserTradeOrderEntity;
