use std::sync::Arc;

use tracing::{error, info, warn};

use super::{load_bot_context, outcome_from_error, OrderOutcome, PlacedTrade};
use crate::error::{AppError, AppResult};
use crate::time_util;
use crate::trading::exchange::{GatewayFactory, OrderRequest, OrderType};
use crate::trading::ledger::PositionLedger;
use crate::trading::model::{OrderKind, UserTradeEntity, UserTradeOrderEntity, UserTradeStatus};
use crate::trading::order::{open_side, MarginMode, TradeSide};
use crate::trading::strategy::Signal;

/// 开仓下单
pub struct OpenOrderService {
    ledger: Arc<dyn PositionLedger>,
    factory: Arc<dyn GatewayFactory>,
}

impl OpenOrderService {
    pub fn new(ledger: Arc<dyn PositionLedger>, factory: Arc<dyn GatewayFactory>) -> Self {
        Self { ledger, factory }
    }

    pub async fn place_open(&self, bot_id: i64, signal: &Signal) -> OrderOutcome {
        match self.try_place_open(bot_id, signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[Bot {}] 开仓失败: {}", bot_id, e);
                outcome_from_error(e)
            }
        }
    }

    async fn try_place_open(&self, bot_id: i64, signal: &Signal) -> AppResult<OrderOutcome> {
        let ctx = load_bot_context(self.ledger.as_ref(), bot_id).await?;
        let bot = &ctx.bot;
        info!("[Bot {}] 使用交易所：{}", bot_id, ctx.exchange.code);

        if signal.price <= 0.0 {
            return Err(AppError::Unknown(format!("信号价格无效: {}", signal.price)));
        }
        if bot.base_order_usdt <= 0.0 {
            return Err(AppError::Config(format!(
                "bot {} 下单金额无效: {}",
                bot_id, bot.base_order_usdt
            )));
        }
        let qty = bot.base_order_usdt / signal.price;

        let gateway = ctx.connect(self.factory.as_ref())?;

        // 设置杠杆，失败不重试
        if let Err(e) = gateway
            .set_leverage(bot.leverage, &bot.exchange_symbol, MarginMode::Isolated)
            .await
        {
            warn!("[Bot {}] 设置杠杆失败: {}", bot_id, e);
            return Ok(OrderOutcome::Failed(e));
        }

        info!("[Bot {}] 下单 {} {}", bot_id, signal.position_side, qty);
        let request = OrderRequest {
            symbol: bot.exchange_symbol.clone(),
            order_type: OrderType::Limit,
            // 双向持仓：多单 = buy
            side: open_side(),
            amount: qty,
            price: Some(signal.price),
            margin_mode: MarginMode::Isolated,
            trade_side: TradeSide::Open,
            position_side: Some(signal.position_side),
        };
        let order = match gateway.place_order(&request).await {
            Ok(order) => order,
            Err(e) => {
                warn!("[Bot {}] 下单失败: {}", bot_id, e);
                return Ok(OrderOutcome::Failed(e));
            }
        };
        info!("[Bot {}] 交易所回应：{}", bot_id, order.info);

        let exchange_order_id = order.exchange_order_id().ok_or_else(|| {
            AppError::Exchange(format!("交易所响应中没有订单号: {}", order.info))
        })?;
        let order_status = order.status_or_new();

        let now = time_util::now();
        let trade = UserTradeEntity {
            id: None,
            user_id: bot.user_id,
            strategy_trade_id: signal.strategy_trade_id,
            exchange_account_id: bot.exchange_account_id,
            bot_id: bot.id,
            exchange_symbol: bot.exchange_symbol.clone(),
            position_side: signal.position_side,
            quantity: qty,
            leverage: bot.leverage,
            entry_price: signal.price,
            opened_at: None,
            // 成交后由对账改为 OPEN
            status: UserTradeStatus::Pending,
            exit_price: None,
            closed_at: None,
            realized_pnl: None,
            realized_pnl_pct: None,
            created_at: Some(now.clone()),
            updated_at: Some(now.clone()),
        };
        let order_row = UserTradeOrderEntity {
            id: None,
            user_trade_id: 0,
            exchange_order_id: exchange_order_id.clone(),
            order_type: OrderKind::Open,
            price: signal.price,
            requested_qty: Some(qty),
            filled_qty: order.filled_or_zero(),
            status: order_status.clone(),
            raw_response: order.info.to_string(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        let user_trade_id = self.ledger.record_open_placement(&trade, &order_row).await?;
        info!(
            "[Bot {}] 建立 user_trades.id = {}，订单 {} ({})",
            bot_id, user_trade_id, exchange_order_id, order_status
        );

        Ok(OrderOutcome::Placed(PlacedTrade {
            user_trade_id,
            exchange_order_id,
            order_status,
        }))
    }
}
