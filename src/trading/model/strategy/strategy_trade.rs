use rbatis::rbdc::DateTime;
use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

use crate::trading::model::enums::{PositionSide, StrategyTradeStatus};

/// 策略主控单：一次开平仓周期在策略层面的记录
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct StrategyTradeEntity {
    pub id: Option<i64>,
    pub strategy_id: i64,
    pub position_side: PositionSide,
    pub entry_price: f64,
    pub entry_at: Option<DateTime>,
    pub exit_price: Option<f64>,
    pub exit_at: Option<DateTime>,
    pub status: StrategyTradeStatus,
    /// 已实现收益率（百分比）
    pub pnl_pct: Option<f64>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

impl StrategyTradeEntity {
    pub fn new_open(strategy_id: i64, position_side: PositionSide, entry_price: f64, now: DateTime) -> Self {
        Self {
            id: None,
            strategy_id,
            position_side,
            entry_price,
            entry_at: Some(now.clone()),
            exit_price: None,
            exit_at: None,
            status: StrategyTradeStatus::Open,
            pnl_pct: None,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }
}

crud!(StrategyTradeEntity {}, "strategy_trades");
impl_select!(StrategyTradeEntity{select_latest_open(strategy_id: i64) =>
    "`where strategy_id = #{strategy_id} and status = 'OPEN' order by id desc limit 1`"}, "strategy_trades");
