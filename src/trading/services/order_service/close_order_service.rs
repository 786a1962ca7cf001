use std::sync::Arc;

use tracing::{error, info, warn};

use super::{load_bot_context, outcome_from_error, OrderOutcome, PlacedTrade};
use crate::error::{AppError, AppResult};
use crate::time_util;
use crate::trading::exchange::{GatewayFactory, OrderRequest, OrderType};
use crate::trading::ledger::PositionLedger;
use crate::trading::model::{OrderKind, UserTradeOrderEntity};
use crate::trading::order::{close_side, MarginMode, TradeSide};
use crate::trading::strategy::Signal;

/// 平仓下单：平掉 bot 当前最近的 OPEN 仓位
pub struct CloseOrderService {
    ledger: Arc<dyn PositionLedger>,
    factory: Arc<dyn GatewayFactory>,
}

impl CloseOrderService {
    pub fn new(ledger: Arc<dyn PositionLedger>, factory: Arc<dyn GatewayFactory>) -> Self {
        Self { ledger, factory }
    }

    pub async fn place_close(&self, bot_id: i64, signal: &Signal) -> OrderOutcome {
        match self.try_place_close(bot_id, signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[Bot {}] 平仓失败: {}", bot_id, e);
                outcome_from_error(e)
            }
        }
    }

    async fn try_place_close(&self, bot_id: i64, signal: &Signal) -> AppResult<OrderOutcome> {
        let Some(trade) = self.ledger.find_latest_open_user_trade(bot_id).await? else {
            info!("[Bot {}] 没有持仓，无需平仓", bot_id);
            return Ok(OrderOutcome::Skipped("nothing to close".to_string()));
        };
        let user_trade_id = trade
            .id
            .ok_or_else(|| AppError::Db(format!("bot {} 的持仓缺少 id", bot_id)))?;

        if signal.price <= 0.0 {
            return Err(AppError::Unknown(format!("信号价格无效: {}", signal.price)));
        }

        let ctx = load_bot_context(self.ledger.as_ref(), bot_id).await?;
        let gateway = ctx.connect(self.factory.as_ref())?;

        let side = close_side(trade.position_side);
        info!(
            "[Bot {}] 平仓 user_trade {} {} {} @ {} ({})",
            bot_id, user_trade_id, side, trade.quantity, signal.price, signal.action
        );
        let request = OrderRequest {
            symbol: trade.exchange_symbol.clone(),
            order_type: OrderType::Limit,
            side,
            amount: trade.quantity,
            price: Some(signal.price),
            margin_mode: MarginMode::Isolated,
            trade_side: TradeSide::Close,
            position_side: Some(trade.position_side),
        };
        let order = match gateway.place_order(&request).await {
            Ok(order) => order,
            Err(e) => {
                warn!("[Bot {}] 平仓下单失败: {}", bot_id, e);
                return Ok(OrderOutcome::Failed(e));
            }
        };
        info!("[Bot {}] 交易所回应：{}", bot_id, order.info);

        let exchange_order_id = order.exchange_order_id().ok_or_else(|| {
            AppError::Exchange(format!("交易所响应中没有订单号: {}", order.info))
        })?;
        let order_status = order.status_or_new();

        let now = time_util::now();
        let order_row = UserTradeOrderEntity {
            id: None,
            user_trade_id,
            exchange_order_id: exchange_order_id.clone(),
            order_type: OrderKind::Close,
            price: signal.price,
            requested_qty: Some(trade.quantity),
            filled_qty: order.filled_or_zero(),
            status: order_status.clone(),
            raw_response: order.info.to_string(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        self.ledger
            .record_close_placement(user_trade_id, signal.price, &order_row)
            .await?;
        info!(
            "[Bot {}] user_trade {} 进入 CLOSING，平仓单 {}",
            bot_id, user_trade_id, exchange_order_id
        );

        Ok(OrderOutcome::Placed(PlacedTrade {
            user_trade_id,
            exchange_order_id,
            order_status,
        }))
    }
}
