use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{PositionLedger, ReconcileUpdate, TradeTransition};
use crate::error::{AppError, AppResult};
use crate::time_util;
use crate::trading::model::{
    BotEntity, ExchangeAccountEntity, ExchangeEntity, StrategyEntity, StrategyTradeEntity,
    StrategyTradeStatus, UserTradeEntity, UserTradeOrderEntity, UserTradeStatus,
};

#[derive(Default)]
struct LedgerTables {
    strategies: Vec<StrategyEntity>,
    strategy_trades: Vec<StrategyTradeEntity>,
    bots: Vec<BotEntity>,
    accounts: Vec<ExchangeAccountEntity>,
    exchanges: Vec<ExchangeEntity>,
    user_trades: Vec<UserTradeEntity>,
    orders: Vec<UserTradeOrderEntity>,
    next_id: i64,
}

impl LedgerTables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 内存账本，用于测试和本地演练；`write_count` 统计写操作次数
#[derive(Default)]
pub struct InMemoryLedger {
    tables: Mutex<LedgerTables>,
    writes: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_strategy(&self, strategy: StrategyEntity) {
        self.tables.lock().await.strategies.push(strategy);
    }

    pub async fn add_bot(&self, bot: BotEntity) {
        self.tables.lock().await.bots.push(bot);
    }

    pub async fn add_account(&self, account: ExchangeAccountEntity) {
        self.tables.lock().await.accounts.push(account);
    }

    pub async fn add_exchange(&self, exchange: ExchangeEntity) {
        self.tables.lock().await.exchanges.push(exchange);
    }

    /// 直接写入一条仓位（不计入写次数），返回 id
    pub async fn seed_user_trade(&self, mut trade: UserTradeEntity) -> i64 {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        trade.id = Some(id);
        tables.user_trades.push(trade);
        id
    }

    /// 直接写入一条订单记录（不计入写次数），返回 id
    pub async fn seed_order(&self, mut order: UserTradeOrderEntity) -> i64 {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        order.id = Some(id);
        tables.orders.push(order);
        id
    }

    pub async fn strategy_trades(&self) -> Vec<StrategyTradeEntity> {
        self.tables.lock().await.strategy_trades.clone()
    }

    pub async fn user_trades(&self) -> Vec<UserTradeEntity> {
        self.tables.lock().await.user_trades.clone()
    }

    pub async fn orders(&self) -> Vec<UserTradeOrderEntity> {
        self.tables.lock().await.orders.clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn mark_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositionLedger for InMemoryLedger {
    async fn find_active_strategy(&self, strategy_id: i64) -> AppResult<Option<StrategyEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .strategies
            .iter()
            .find(|s| s.id == strategy_id && s.is_active == 1)
            .cloned())
    }

    async fn find_open_strategy_trade(
        &self,
        strategy_id: i64,
    ) -> AppResult<Option<StrategyTradeEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .strategy_trades
            .iter()
            .filter(|t| t.strategy_id == strategy_id && t.status == StrategyTradeStatus::Open)
            .max_by_key(|t| t.id)
            .cloned())
    }

    async fn insert_strategy_trade(&self, trade: &StrategyTradeEntity) -> AppResult<i64> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let mut trade = trade.clone();
        trade.id = Some(id);
        tables.strategy_trades.push(trade);
        self.mark_write();
        Ok(id)
    }

    async fn close_strategy_trade(
        &self,
        strategy_trade_id: i64,
        exit_price: f64,
        pnl_pct: Option<f64>,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let now = time_util::now();
        if let Some(trade) = tables
            .strategy_trades
            .iter_mut()
            .find(|t| t.id == Some(strategy_trade_id) && t.status == StrategyTradeStatus::Open)
        {
            trade.status = StrategyTradeStatus::Closed;
            trade.exit_price = Some(exit_price);
            trade.exit_at = Some(now.clone());
            trade.pnl_pct = pnl_pct;
            trade.updated_at = Some(now);
        }
        self.mark_write();
        Ok(())
    }

    async fn find_running_bots(&self, strategy_id: i64) -> AppResult<Vec<BotEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bots
            .iter()
            .filter(|b| b.strategy_id == strategy_id && b.is_running())
            .cloned()
            .collect())
    }

    async fn find_bot(&self, bot_id: i64) -> AppResult<Option<BotEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables.bots.iter().find(|b| b.id == bot_id).cloned())
    }

    async fn find_account(&self, account_id: i64) -> AppResult<Option<ExchangeAccountEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.iter().find(|a| a.id == account_id).cloned())
    }

    async fn find_exchange(&self, exchange_id: i64) -> AppResult<Option<ExchangeEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables.exchanges.iter().find(|e| e.id == exchange_id).cloned())
    }

    async fn record_open_placement(
        &self,
        trade: &UserTradeEntity,
        order: &UserTradeOrderEntity,
    ) -> AppResult<i64> {
        let mut tables = self.tables.lock().await;
        let user_trade_id = tables.next_id();
        let mut trade = trade.clone();
        trade.id = Some(user_trade_id);
        tables.user_trades.push(trade);

        let order_id = tables.next_id();
        let mut order = order.clone();
        order.id = Some(order_id);
        order.user_trade_id = user_trade_id;
        tables.orders.push(order);
        self.mark_write();
        Ok(user_trade_id)
    }

    async fn find_latest_open_user_trade(
        &self,
        bot_id: i64,
    ) -> AppResult<Option<UserTradeEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .user_trades
            .iter()
            .filter(|t| t.bot_id == bot_id && t.status == UserTradeStatus::Open)
            .max_by_key(|t| t.id)
            .cloned())
    }

    async fn record_close_placement(
        &self,
        user_trade_id: i64,
        provisional_exit_price: f64,
        order: &UserTradeOrderEntity,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.user_trades.iter().any(|t| t.id == Some(user_trade_id)) {
            return Err(AppError::NotFound(format!("user_trade {}", user_trade_id)));
        }
        let order_id = tables.next_id();
        let mut order = order.clone();
        order.id = Some(order_id);
        tables.orders.push(order);

        let now = time_util::now();
        if let Some(trade) = tables
            .user_trades
            .iter_mut()
            .find(|t| t.id == Some(user_trade_id))
        {
            trade.status = UserTradeStatus::Closing;
            trade.exit_price = Some(provisional_exit_price);
            trade.updated_at = Some(now);
        }
        self.mark_write();
        Ok(())
    }

    async fn find_user_trade(&self, user_trade_id: i64) -> AppResult<Option<UserTradeEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .user_trades
            .iter()
            .find(|t| t.id == Some(user_trade_id))
            .cloned())
    }

    async fn find_latest_order(
        &self,
        user_trade_id: i64,
        exchange_order_id: &str,
    ) -> AppResult<Option<UserTradeOrderEntity>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_trade_id == user_trade_id && o.exchange_order_id == exchange_order_id)
            .max_by_key(|o| o.id)
            .cloned())
    }

    async fn apply_reconciliation(&self, update: &ReconcileUpdate) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let now = time_util::now();
        let fill = &update.order;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == Some(fill.order_row_id))
            .ok_or_else(|| AppError::NotFound(format!("user_trade_order {}", fill.order_row_id)))?;
        order.requested_qty = fill.requested_qty;
        order.filled_qty = fill.filled_qty;
        order.status = fill.status.clone();
        order.raw_response = fill.raw_response.clone();
        order.updated_at = Some(now.clone());

        match &update.transition {
            TradeTransition::Unchanged => {}
            TradeTransition::Opened {
                user_trade_id,
                quantity,
                opened_at,
            } => {
                if let Some(trade) = tables
                    .user_trades
                    .iter_mut()
                    .find(|t| t.id == Some(*user_trade_id))
                {
                    trade.quantity = *quantity;
                    trade.status = UserTradeStatus::Open;
                    trade.opened_at = Some(opened_at.clone());
                    trade.updated_at = Some(now);
                }
            }
            TradeTransition::Closed {
                user_trade_id,
                exit_price,
                closed_at,
                realized_pnl,
                realized_pnl_pct,
            } => {
                if let Some(trade) = tables
                    .user_trades
                    .iter_mut()
                    .find(|t| t.id == Some(*user_trade_id))
                {
                    trade.status = UserTradeStatus::Closed;
                    trade.exit_price = Some(*exit_price);
                    trade.closed_at = Some(closed_at.clone());
                    trade.realized_pnl = *realized_pnl;
                    trade.realized_pnl_pct = *realized_pnl_pct;
                    trade.updated_at = Some(now);
                }
            }
        }
        self.mark_write();
        Ok(())
    }
}
