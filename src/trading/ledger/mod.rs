//! 仓位账本：策略主控单、bot、账户、用户仓位和订单记录的读写
//!
//! 所有实体只通过 `PositionLedger` 读写；每次调用都是一次短连接或短事务，
//! 组合写入（仓位 + 订单记录）在同一个事务里完成。

use async_trait::async_trait;
use rbatis::rbdc::DateTime;

use crate::error::AppResult;
use crate::trading::model::{
    BotEntity, ExchangeAccountEntity, ExchangeEntity, StrategyEntity, StrategyTradeEntity,
    UserTradeEntity, UserTradeOrderEntity,
};

pub mod memory_ledger;
pub mod mysql_ledger;

pub use memory_ledger::InMemoryLedger;
pub use mysql_ledger::MysqlLedger;

/// 对账时回写到订单记录的交易所状态
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFillUpdate {
    /// user_trade_orders.id
    pub order_row_id: i64,
    pub requested_qty: Option<f64>,
    pub filled_qty: f64,
    pub status: String,
    pub raw_response: String,
}

/// 对账引起的用户仓位状态变化
#[derive(Debug, Clone, PartialEq)]
pub enum TradeTransition {
    /// 订单未终结或被撤销，仓位不变
    Unchanged,
    /// PENDING → OPEN
    Opened {
        user_trade_id: i64,
        quantity: f64,
        opened_at: DateTime,
    },
    /// CLOSING → CLOSED
    Closed {
        user_trade_id: i64,
        exit_price: f64,
        closed_at: DateTime,
        realized_pnl: Option<f64>,
        realized_pnl_pct: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileUpdate {
    pub order: OrderFillUpdate,
    pub transition: TradeTransition,
}

#[async_trait]
pub trait PositionLedger: Send + Sync {
    /// 启用中的策略
    async fn find_active_strategy(&self, strategy_id: i64) -> AppResult<Option<StrategyEntity>>;

    /// 最近创建的 OPEN 策略主控单
    async fn find_open_strategy_trade(
        &self,
        strategy_id: i64,
    ) -> AppResult<Option<StrategyTradeEntity>>;

    /// 新建策略主控单，返回 id
    async fn insert_strategy_trade(&self, trade: &StrategyTradeEntity) -> AppResult<i64>;

    async fn close_strategy_trade(
        &self,
        strategy_trade_id: i64,
        exit_price: f64,
        pnl_pct: Option<f64>,
    ) -> AppResult<()>;

    async fn find_running_bots(&self, strategy_id: i64) -> AppResult<Vec<BotEntity>>;

    async fn find_bot(&self, bot_id: i64) -> AppResult<Option<BotEntity>>;

    async fn find_account(&self, account_id: i64) -> AppResult<Option<ExchangeAccountEntity>>;

    async fn find_exchange(&self, exchange_id: i64) -> AppResult<Option<ExchangeEntity>>;

    /// 开仓下单成功后在一个事务里写入 PENDING 仓位和 OPEN 订单记录，返回仓位 id。
    /// `order.user_trade_id` 会被替换为新仓位的 id
    async fn record_open_placement(
        &self,
        trade: &UserTradeEntity,
        order: &UserTradeOrderEntity,
    ) -> AppResult<i64>;

    /// bot 当前最近的 OPEN 仓位
    async fn find_latest_open_user_trade(&self, bot_id: i64)
        -> AppResult<Option<UserTradeEntity>>;

    /// 平仓下单成功后在一个事务里追加 CLOSE 订单记录，并把仓位置为 CLOSING（暂记平仓价）
    async fn record_close_placement(
        &self,
        user_trade_id: i64,
        provisional_exit_price: f64,
        order: &UserTradeOrderEntity,
    ) -> AppResult<()>;

    async fn find_user_trade(&self, user_trade_id: i64) -> AppResult<Option<UserTradeEntity>>;

    /// 同一 (仓位, 交易所订单号) 下 id 最大的订单记录
    async fn find_latest_order(
        &self,
        user_trade_id: i64,
        exchange_order_id: &str,
    ) -> AppResult<Option<UserTradeOrderEntity>>;

    /// 回写订单状态并推进仓位状态，同一个事务
    async fn apply_reconciliation(&self, update: &ReconcileUpdate) -> AppResult<()>;
}
