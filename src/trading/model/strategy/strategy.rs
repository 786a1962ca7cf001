use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

/// 策略配置（只读）
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct StrategyEntity {
    pub id: i64,
    pub name: String,
    /// 策略取价的交易对，如 BTC-USDT-SWAP
    pub symbol: String,
    pub is_active: i32,
}

crud!(StrategyEntity {}, "strategies");
impl_select!(StrategyEntity{select_active_by_id(id: i64) =>
    "`where id = #{id} and is_active = 1 limit 1`"}, "strategies");
