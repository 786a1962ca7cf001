use rbatis::rbdc::DateTime;
use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

use crate::trading::model::enums::{PositionSide, UserTradeStatus};

/// 用户仓位：每个 bot 每个开平仓周期一条
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct UserTradeEntity {
    pub id: Option<i64>,
    pub user_id: i64,
    pub strategy_trade_id: Option<i64>,
    pub exchange_account_id: i64,
    pub bot_id: i64,
    pub exchange_symbol: String,
    pub position_side: PositionSide,
    /// 状态到 OPEN 之后才是成交数量
    pub quantity: f64,
    pub leverage: i64,
    pub entry_price: f64,
    pub opened_at: Option<DateTime>,
    pub status: UserTradeStatus,
    pub exit_price: Option<f64>,
    pub closed_at: Option<DateTime>,
    pub realized_pnl: Option<f64>,
    pub realized_pnl_pct: Option<f64>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

crud!(UserTradeEntity {}, "user_trades");
impl_select!(UserTradeEntity{select_one_by_id(id: i64) => "`where id = #{id} limit 1`"}, "user_trades");
impl_select!(UserTradeEntity{select_latest_open_by_bot(bot_id: i64) =>
    "`where bot_id = #{bot_id} and status = 'OPEN' order by id desc limit 1`"}, "user_trades");
