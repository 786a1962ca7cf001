//! 订单对账
//!
//! 下单后延迟查询交易所订单状态，回写订单记录并推进用户仓位：
//! 开仓单成交 PENDING → OPEN，平仓单成交 CLOSING → CLOSED 并结算盈亏。
//! 未成交的状态交给任务处理器重新排队，撤单/拒单等终态不再查询。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::time_util;
use crate::trading::exchange::{connect_account, FetchedOrder, GatewayFactory};
use crate::trading::ledger::{OrderFillUpdate, PositionLedger, ReconcileUpdate, TradeTransition};
use crate::trading::model::{OrderKind, UserTradeEntity, UserTradeOrderEntity, UserTradeStatus};
use crate::trading::order::realized_pnl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// CLOSED / FILLED
    Filled,
    /// CANCELED / CANCELLED / REJECTED / EXPIRED
    Terminal,
    /// 其它状态都视为未完成
    Pending,
}

pub fn classify_status(status: &str) -> StatusClass {
    match status.to_uppercase().as_str() {
        "CLOSED" | "FILLED" => StatusClass::Filled,
        "CANCELED" | "CANCELLED" | "REJECTED" | "EXPIRED" => StatusClass::Terminal,
        _ => StatusClass::Pending,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// 开仓单成交
    Opened,
    /// 平仓单成交
    Closed,
    /// 订单未完成，需要再次查询
    Pending(String),
    /// 订单已撤销或被拒绝
    Terminal(String),
    /// 查询交易所失败，未改动数据
    FetchFailed(String),
    /// 记录缺失，未改动数据
    Skipped(String),
}

impl ReconcileOutcome {
    /// 是否需要稍后再查
    pub fn should_retry(&self) -> bool {
        matches!(self, ReconcileOutcome::Pending(_) | ReconcileOutcome::FetchFailed(_))
    }
}

pub struct ReconcileService {
    ledger: Arc<dyn PositionLedger>,
    factory: Arc<dyn GatewayFactory>,
}

impl ReconcileService {
    pub fn new(ledger: Arc<dyn PositionLedger>, factory: Arc<dyn GatewayFactory>) -> Self {
        Self { ledger, factory }
    }

    pub async fn reconcile(&self, user_trade_id: i64, exchange_order_id: &str) -> ReconcileOutcome {
        info!(
            "[CheckOrder] 检查 user_trade_id={} order={}",
            user_trade_id, exchange_order_id
        );
        match self.try_reconcile(user_trade_id, exchange_order_id).await {
            Ok(outcome) => outcome,
            Err(AppError::NotFound(what)) => {
                warn!("[CheckOrder] {} 不存在，跳过", what);
                ReconcileOutcome::Skipped(what)
            }
            Err(e) => {
                error!(
                    "[CheckOrder] user_trade {} order {} 对账失败: {}",
                    user_trade_id, exchange_order_id, e
                );
                ReconcileOutcome::FetchFailed(e.to_string())
            }
        }
    }

    async fn try_reconcile(
        &self,
        user_trade_id: i64,
        exchange_order_id: &str,
    ) -> AppResult<ReconcileOutcome> {
        let trade = self
            .ledger
            .find_user_trade(user_trade_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user_trade {}", user_trade_id)))?;
        let order_row = self
            .ledger
            .find_latest_order(user_trade_id, exchange_order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user_trade_order ({}, {})",
                    user_trade_id, exchange_order_id
                ))
            })?;
        let account = self
            .ledger
            .find_account(trade.exchange_account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exchange_account {}", trade.exchange_account_id)))?;
        let exchange = self
            .ledger
            .find_exchange(account.exchange_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exchange {}", account.exchange_id)))?;

        let gateway = connect_account(self.factory.as_ref(), &exchange, &account)?;
        let fetched = match gateway
            .fetch_order(exchange_order_id, &trade.exchange_symbol)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                warn!("[CheckOrder] fetch_order 失败：{}", e);
                return Ok(ReconcileOutcome::FetchFailed(e.to_string()));
            }
        };
        info!("[CheckOrder] 交易所回应：{}", fetched.raw);

        let (update, outcome) = build_update(&trade, &order_row, &fetched)?;
        self.ledger.apply_reconciliation(&update).await?;

        match &outcome {
            ReconcileOutcome::Opened => {
                info!("[CheckOrder] 订单完全成交，user_trade {} 更新为 OPEN", user_trade_id)
            }
            ReconcileOutcome::Closed => {
                info!("[CheckOrder] 平仓完成，user_trade {} 更新为 CLOSED", user_trade_id)
            }
            other => info!("[CheckOrder] 订单状态：{:?}", other),
        }
        Ok(outcome)
    }
}

/// 根据交易所订单状态生成回写内容
pub(crate) fn build_update(
    trade: &UserTradeEntity,
    order_row: &UserTradeOrderEntity,
    fetched: &FetchedOrder,
) -> AppResult<(ReconcileUpdate, ReconcileOutcome)> {
    let order_row_id = order_row
        .id
        .ok_or_else(|| AppError::Db("user_trade_order 缺少 id".to_string()))?;
    let user_trade_id = trade
        .id
        .ok_or_else(|| AppError::Db("user_trade 缺少 id".to_string()))?;

    let status = fetched
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let order = OrderFillUpdate {
        order_row_id,
        requested_qty: fetched.amount.or(order_row.requested_qty),
        filled_qty: fetched.filled.unwrap_or(0.0),
        status: status.clone(),
        raw_response: fetched.raw.to_string(),
    };

    let now = time_util::now();
    let (transition, outcome) = match classify_status(&status) {
        StatusClass::Pending => (TradeTransition::Unchanged, ReconcileOutcome::Pending(status)),
        StatusClass::Terminal => (TradeTransition::Unchanged, ReconcileOutcome::Terminal(status)),
        StatusClass::Filled => match order_row.order_type {
            OrderKind::Open => {
                let quantity = fetched
                    .filled
                    .filter(|q| *q > 0.0)
                    .or(fetched.amount.filter(|q| *q > 0.0))
                    .unwrap_or(trade.quantity);
                let transition = if trade.status == UserTradeStatus::Pending {
                    TradeTransition::Opened {
                        user_trade_id,
                        quantity,
                        opened_at: now,
                    }
                } else {
                    // 重复投递的任务，仓位已经推进过
                    TradeTransition::Unchanged
                };
                (transition, ReconcileOutcome::Opened)
            }
            OrderKind::Close => {
                let exit_price = fetched
                    .average
                    .or(fetched.price)
                    .unwrap_or(order_row.price);
                let pnl = realized_pnl(trade.position_side, trade.entry_price, exit_price, trade.quantity);
                if pnl.is_none() {
                    warn!(
                        "user_trade {} 价格无效，无法计算盈亏 entry={} exit={}",
                        user_trade_id, trade.entry_price, exit_price
                    );
                }
                let transition = if trade.status == UserTradeStatus::Closing {
                    TradeTransition::Closed {
                        user_trade_id,
                        exit_price,
                        closed_at: now,
                        realized_pnl: pnl.map(|p| p.pnl),
                        realized_pnl_pct: pnl.map(|p| p.pnl_pct),
                    }
                } else {
                    // 只有 CLOSING 才能结算，已结算或状态不符时只更新订单行
                    warn!(
                        "user_trade {} 状态为 {:?}，跳过平仓结算",
                        user_trade_id, trade.status
                    );
                    TradeTransition::Unchanged
                };
                (transition, ReconcileOutcome::Closed)
            }
        },
    };

    Ok((ReconcileUpdate { order, transition }, outcome))
}
