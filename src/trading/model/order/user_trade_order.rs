use rbatis::rbdc::DateTime;
use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

use crate::trading::model::enums::OrderKind;

/// 交易所订单记录，只追加；同一 (user_trade_id, exchange_order_id) 以 id 最大的一条为准
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct UserTradeOrderEntity {
    pub id: Option<i64>,
    pub user_trade_id: i64,
    pub exchange_order_id: String,
    #[serde(rename = "type")]
    pub order_type: OrderKind,
    /// 委托价格
    pub price: f64,
    pub requested_qty: Option<f64>,
    pub filled_qty: f64,
    /// 交易所返回的订单状态
    pub status: String,
    /// 交易所原始响应 json
    pub raw_response: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

crud!(UserTradeOrderEntity {}, "user_trade_orders");
impl_select!(UserTradeOrderEntity{select_latest_by_exchange_order(user_trade_id: i64, exchange_order_id: &str) =>
    "`where user_trade_id = #{user_trade_id} and exchange_order_id = #{exchange_order_id} order by id desc limit 1`"}, "user_trade_orders");
