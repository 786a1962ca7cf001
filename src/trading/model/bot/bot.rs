use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

pub const BOT_STATUS_RUNNING: &str = "RUNNING";

/// 交易机器人（只读），绑定一个交易所账户和一个交易对
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct BotEntity {
    pub id: i64,
    pub user_id: i64,
    pub strategy_id: i64,
    pub exchange_account_id: i64,
    /// 交易所下单用的交易对，如 BTC-USDT-SWAP
    pub exchange_symbol: String,
    /// 每次开仓的名义金额（USDT）
    pub base_order_usdt: f64,
    pub leverage: i64,
    pub status: String,
}

impl BotEntity {
    /// 与 bots.status 列一致，区分大小写
    pub fn is_running(&self) -> bool {
        self.status == BOT_STATUS_RUNNING
    }
}

crud!(BotEntity {}, "bots");
impl_select!(BotEntity{select_running_by_strategy(strategy_id: i64) =>
    "`where strategy_id = #{strategy_id} and status = 'RUNNING' order by id asc`"}, "bots");
impl_select!(BotEntity{select_one_by_id(id: i64) => "`where id = #{id} limit 1`"}, "bots");
