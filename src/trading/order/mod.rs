use std::fmt::{Display, Formatter};

use crate::trading::model::PositionSide;

pub mod pnl;

pub use pnl::{pnl_pct, realized_pnl, RealizedPnl};

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl Display for OrderSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// 开平仓标记（双向持仓模式下随订单传给交易所）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Open,
    Close,
}

impl Display for TradeSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Open => write!(f, "open"),
            TradeSide::Close => write!(f, "close"),
        }
    }
}

/// 保证金模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginMode {
    /// 逐仓
    Isolated,
}

impl Display for MarginMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginMode::Isolated => write!(f, "isolated"),
        }
    }
}

/// 开仓方向：双向持仓模式下开仓固定用 buy
pub fn open_side() -> OrderSide {
    OrderSide::Buy
}

/// 平仓方向：多单卖出平仓，空单买入平仓
pub fn close_side(position_side: PositionSide) -> OrderSide {
    match position_side {
        PositionSide::Long => OrderSide::Sell,
        PositionSide::Short => OrderSide::Buy,
    }
}
