//! 已实现盈亏计算
//!
//! 多单：收益率 = (平仓价 / 开仓价 - 1) * 100，盈亏 = (平仓价 - 开仓价) * 数量
//! 空单：收益率 = (开仓价 / 平仓价 - 1) * 100，盈亏 = (开仓价 - 平仓价) * 数量
//!
//! 策略主控单只记录收益率，用户仓位同时记录收益率和盈亏金额

use crate::trading::model::PositionSide;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedPnl {
    /// 盈亏金额（计价货币）
    pub pnl: f64,
    /// 收益率（百分比）
    pub pnl_pct: f64,
}

/// 收益率，价格非正时无法计算返回 None
pub fn pnl_pct(side: PositionSide, entry_price: f64, exit_price: f64) -> Option<f64> {
    if entry_price <= 0.0 || exit_price <= 0.0 {
        return None;
    }
    let pct = match side {
        PositionSide::Long => (exit_price / entry_price - 1.0) * 100.0,
        PositionSide::Short => (entry_price / exit_price - 1.0) * 100.0,
    };
    Some(pct)
}

pub fn realized_pnl(
    side: PositionSide,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
) -> Option<RealizedPnl> {
    let pnl_pct = pnl_pct(side, entry_price, exit_price)?;
    let pnl = match side {
        PositionSide::Long => (exit_price - entry_price) * quantity,
        PositionSide::Short => (entry_price - exit_price) * quantity,
    };
    Some(RealizedPnl { pnl, pnl_pct })
}
