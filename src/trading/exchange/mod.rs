//! 交易所网关
//!
//! 下单、平仓、对账只依赖 `ExchangeGateway`，具体交易所由 `GatewayFactory`
//! 按交易所代码创建。所有网关错误都是 `AppError::Exchange`。

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::trading::model::{ApiCredentials, ExchangeAccountEntity, ExchangeEntity, PositionSide};
use crate::trading::order::{MarginMode, OrderSide, TradeSide};

pub mod factory;
pub mod okx_gateway;

pub use factory::{ExchangeFactory, GatewayFactory};
pub use okx_gateway::OkxGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
}

/// 下单参数
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    pub margin_mode: MarginMode,
    /// 开平仓标记
    pub trade_side: TradeSide,
    /// 双向持仓时的持仓方向
    pub position_side: Option<PositionSide>,
}

/// 下单结果
#[derive(Debug, Clone, Default)]
pub struct PlacedOrder {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub filled: Option<f64>,
    /// 交易所原始响应
    pub info: Value,
}

impl PlacedOrder {
    /// 订单号：id → order_id → info.orderId
    pub fn exchange_order_id(&self) -> Option<String> {
        non_empty(self.id.as_deref())
            .or_else(|| non_empty(self.order_id.as_deref()))
            .or_else(|| match self.info.get("orderId") {
                Some(Value::String(s)) => non_empty(Some(s.as_str())),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
    }

    /// 交易所状态，缺省为 NEW
    pub fn status_or_new(&self) -> String {
        non_empty(self.status.as_deref()).unwrap_or_else(|| "NEW".to_string())
    }

    pub fn filled_or_zero(&self) -> f64 {
        self.filled.unwrap_or(0.0)
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// 查单结果
#[derive(Debug, Clone, Default)]
pub struct FetchedOrder {
    pub status: Option<String>,
    pub filled: Option<f64>,
    pub amount: Option<f64>,
    pub average: Option<f64>,
    pub price: Option<f64>,
    pub raw: Value,
}

#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    fn exchange_code(&self) -> &str;

    /// 模拟盘开关
    fn set_sandbox_mode(&mut self, enabled: bool);

    async fn set_leverage(
        &self,
        leverage: i64,
        symbol: &str,
        margin_mode: MarginMode,
    ) -> AppResult<()>;

    async fn place_order(&self, request: &OrderRequest) -> AppResult<PlacedOrder>;

    async fn fetch_order(&self, order_id: &str, symbol: &str) -> AppResult<FetchedOrder>;

    async fn fetch_last_price(&self, symbol: &str) -> AppResult<f64>;
}

/// 根据账户凭证创建网关，强制开启模拟盘
pub fn connect_account(
    factory: &dyn GatewayFactory,
    exchange: &ExchangeEntity,
    account: &ExchangeAccountEntity,
) -> AppResult<Box<dyn ExchangeGateway>> {
    let credentials: ApiCredentials = account.credentials()?;
    if credentials.api_key.is_empty() || credentials.secret_key.is_empty() {
        return Err(AppError::Config(format!(
            "exchange_account {} 缺少 api_key/secret_key",
            account.id
        )));
    }
    let mut gateway = factory.create(&exchange.code, &credentials)?;
    gateway.set_sandbox_mode(true);
    Ok(gateway)
}
