use std::sync::Arc;

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{info, warn};

use super::{CloseReason, RawSignal, SignalAction, SignalGenerator};
use crate::error::AppResult;
use crate::trading::exchange::ExchangeGateway;
use crate::trading::ledger::PositionLedger;
use crate::trading::model::{PositionSide, StrategyEntity};

/// 突破策略：没有持仓时按最新价开多，有持仓时按最新价平仓
pub struct BreakoutStrategy {
    ledger: Arc<dyn PositionLedger>,
    price_gateway: Arc<dyn ExchangeGateway>,
}

impl BreakoutStrategy {
    pub fn new(ledger: Arc<dyn PositionLedger>, price_gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            ledger,
            price_gateway,
        }
    }

    async fn last_price(&self, symbol: &str) -> AppResult<f64> {
        let retry_strategy = ExponentialBackoff::from_millis(200).map(jitter).take(3);
        Retry::spawn(retry_strategy, || async {
            let res = self.price_gateway.fetch_last_price(symbol).await;
            if let Err(e) = &res {
                warn!("获取最新价格失败 {}: {}", symbol, e);
            }
            res
        })
        .await
    }
}

#[async_trait]
impl SignalGenerator for BreakoutStrategy {
    async fn generate(&self, strategy: &StrategyEntity) -> AppResult<Option<RawSignal>> {
        let price = self.last_price(&strategy.symbol).await?;
        info!("策略 {} 最新价格 {}: {}", strategy.name, strategy.symbol, price);

        let signal = match self.ledger.find_open_strategy_trade(strategy.id).await? {
            None => RawSignal {
                action: SignalAction::Open.to_string(),
                position_side: PositionSide::Long,
                price,
            },
            Some(open) => RawSignal {
                action: SignalAction::Close(CloseReason::Signal).to_string(),
                position_side: open.position_side,
                price,
            },
        };
        Ok(Some(signal))
    }
}
