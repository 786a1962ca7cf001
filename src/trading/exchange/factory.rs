//! 交易所工厂
//!
//! 按交易所代码创建网关，下单服务和对账服务通过 `GatewayFactory` 注入

use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::trading::model::ApiCredentials;

use super::{ExchangeGateway, OkxGateway};

pub trait GatewayFactory: Send + Sync {
    /// 带账户凭证的网关
    fn create(
        &self,
        exchange_code: &str,
        credentials: &ApiCredentials,
    ) -> AppResult<Box<dyn ExchangeGateway>>;

    /// 只读行情网关
    fn create_public(&self, exchange_code: &str) -> AppResult<Box<dyn ExchangeGateway>>;
}

/// 交易所工厂
pub struct ExchangeFactory {
    timeout: Duration,
}

impl ExchangeFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GatewayFactory for ExchangeFactory {
    fn create(
        &self,
        exchange_code: &str,
        credentials: &ApiCredentials,
    ) -> AppResult<Box<dyn ExchangeGateway>> {
        match exchange_code.to_lowercase().as_str() {
            "okx" => Ok(Box::new(OkxGateway::new(credentials.clone(), self.timeout)?)),
            // 未来添加其他交易所：
            // "binance" => Ok(Box::new(BinanceGateway::new(credentials.clone(), self.timeout)?)),
            _ => Err(AppError::Exchange(format!("不支持的交易所: {}", exchange_code))),
        }
    }

    fn create_public(&self, exchange_code: &str) -> AppResult<Box<dyn ExchangeGateway>> {
        match exchange_code.to_lowercase().as_str() {
            "okx" => Ok(Box::new(OkxGateway::public(self.timeout)?)),
            _ => Err(AppError::Exchange(format!("不支持的交易所: {}", exchange_code))),
        }
    }
}
