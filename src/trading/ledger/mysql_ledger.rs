use async_trait::async_trait;
use rbatis::executor::Executor;
use rbatis::RBatis;
use rbs::{to_value, Value};
use tracing::{debug, error, warn};

use super::{PositionLedger, ReconcileUpdate, TradeTransition};
use crate::error::{AppError, AppResult};
use crate::time_util;
use crate::trading::model::{
    BotEntity, ExchangeAccountEntity, ExchangeEntity, StrategyEntity, StrategyTradeEntity,
    UserTradeEntity, UserTradeOrderEntity, UserTradeStatus,
};

/// MySQL 账本（rbatis）
#[derive(Clone)]
pub struct MysqlLedger {
    rb: RBatis,
}

impl MysqlLedger {
    pub fn new(rb: RBatis) -> Self {
        Self { rb }
    }

    async fn insert_order(executor: &dyn Executor, order: &UserTradeOrderEntity) -> AppResult<i64> {
        let res = UserTradeOrderEntity::insert(executor, order).await?;
        debug!("insert user_trade_orders result: {:?}", res);
        res.last_insert_id
            .as_i64()
            .ok_or_else(|| AppError::Db("user_trade_orders 未返回自增 id".to_string()))
    }

    async fn write_reconciliation(executor: &dyn Executor, update: &ReconcileUpdate) -> AppResult<()> {
        let order = &update.order;
        let sql = "UPDATE user_trade_orders SET requested_qty = ?, filled_qty = ?, status = ?, raw_response = ?, updated_at = ? WHERE id = ?";
        let params: Vec<Value> = vec![
            to_value!(order.requested_qty),
            Value::from(order.filled_qty),
            Value::from(order.status.as_str()),
            Value::from(order.raw_response.as_str()),
            to_value!(time_util::now()),
            Value::from(order.order_row_id),
        ];
        executor.exec(sql, params).await?;

        match &update.transition {
            TradeTransition::Unchanged => {}
            TradeTransition::Opened {
                user_trade_id,
                quantity,
                opened_at,
            } => {
                let sql = "UPDATE user_trades SET quantity = ?, status = ?, opened_at = ?, updated_at = ? WHERE id = ?";
                let params: Vec<Value> = vec![
                    Value::from(*quantity),
                    Value::from(UserTradeStatus::Open.as_str()),
                    to_value!(opened_at.clone()),
                    to_value!(time_util::now()),
                    Value::from(*user_trade_id),
                ];
                let res = executor.exec(sql, params).await?;
                if res.rows_affected == 0 {
                    warn!("user_trade {} 不存在，未更新为 OPEN", user_trade_id);
                }
            }
            TradeTransition::Closed {
                user_trade_id,
                exit_price,
                closed_at,
                realized_pnl,
                realized_pnl_pct,
            } => {
                let sql = "UPDATE user_trades SET status = ?, exit_price = ?, closed_at = ?, realized_pnl = ?, realized_pnl_pct = ?, updated_at = ? WHERE id = ?";
                let params: Vec<Value> = vec![
                    Value::from(UserTradeStatus::Closed.as_str()),
                    Value::from(*exit_price),
                    to_value!(closed_at.clone()),
                    to_value!(*realized_pnl),
                    to_value!(*realized_pnl_pct),
                    to_value!(time_util::now()),
                    Value::from(*user_trade_id),
                ];
                let res = executor.exec(sql, params).await?;
                if res.rows_affected == 0 {
                    warn!("user_trade {} 不存在，未更新为 CLOSED", user_trade_id);
                }
            }
        }
        Ok(())
    }
}

/// 提交或回滚事务
async fn finish_tx<T>(
    tx: rbatis::executor::RBatisTxExecutor,
    result: AppResult<T>,
) -> AppResult<T> {
    match result {
        Ok(v) => {
            tx.commit().await?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("事务回滚失败: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[async_trait]
impl PositionLedger for MysqlLedger {
    async fn find_active_strategy(&self, strategy_id: i64) -> AppResult<Option<StrategyEntity>> {
        let list = StrategyEntity::select_active_by_id(&self.rb, strategy_id).await?;
        Ok(list.into_iter().next())
    }

    async fn find_open_strategy_trade(
        &self,
        strategy_id: i64,
    ) -> AppResult<Option<StrategyTradeEntity>> {
        let list = StrategyTradeEntity::select_latest_open(&self.rb, strategy_id).await?;
        Ok(list.into_iter().next())
    }

    async fn insert_strategy_trade(&self, trade: &StrategyTradeEntity) -> AppResult<i64> {
        let res = StrategyTradeEntity::insert(&self.rb, trade).await?;
        debug!("insert strategy_trades result: {:?}", res);
        res.last_insert_id
            .as_i64()
            .ok_or_else(|| AppError::Db("strategy_trades 未返回自增 id".to_string()))
    }

    async fn close_strategy_trade(
        &self,
        strategy_trade_id: i64,
        exit_price: f64,
        pnl_pct: Option<f64>,
    ) -> AppResult<()> {
        let now = time_util::now();
        let sql = "UPDATE strategy_trades SET status = 'CLOSED', exit_price = ?, exit_at = ?, pnl_pct = ?, updated_at = ? WHERE id = ? AND status = 'OPEN'";
        let params: Vec<Value> = vec![
            Value::from(exit_price),
            to_value!(now.clone()),
            to_value!(pnl_pct),
            to_value!(now),
            Value::from(strategy_trade_id),
        ];
        let res = self.rb.exec(sql, params).await?;
        if res.rows_affected == 0 {
            warn!("strategy_trade {} 已经不是 OPEN 状态", strategy_trade_id);
        }
        Ok(())
    }

    async fn find_running_bots(&self, strategy_id: i64) -> AppResult<Vec<BotEntity>> {
        Ok(BotEntity::select_running_by_strategy(&self.rb, strategy_id).await?)
    }

    async fn find_bot(&self, bot_id: i64) -> AppResult<Option<BotEntity>> {
        let list = BotEntity::select_one_by_id(&self.rb, bot_id).await?;
        Ok(list.into_iter().next())
    }

    async fn find_account(&self, account_id: i64) -> AppResult<Option<ExchangeAccountEntity>> {
        let list = ExchangeAccountEntity::select_one_by_id(&self.rb, account_id).await?;
        Ok(list.into_iter().next())
    }

    async fn find_exchange(&self, exchange_id: i64) -> AppResult<Option<ExchangeEntity>> {
        let list = ExchangeEntity::select_one_by_id(&self.rb, exchange_id).await?;
        Ok(list.into_iter().next())
    }

    async fn record_open_placement(
        &self,
        trade: &UserTradeEntity,
        order: &UserTradeOrderEntity,
    ) -> AppResult<i64> {
        let tx = self.rb.acquire_begin().await?;
        let result: AppResult<i64> = async {
            let res = UserTradeEntity::insert(&tx, trade).await?;
            let user_trade_id = res
                .last_insert_id
                .as_i64()
                .ok_or_else(|| AppError::Db("user_trades 未返回自增 id".to_string()))?;
            let mut order = order.clone();
            order.user_trade_id = user_trade_id;
            Self::insert_order(&tx, &order).await?;
            Ok(user_trade_id)
        }
        .await;
        finish_tx(tx, result).await
    }

    async fn find_latest_open_user_trade(
        &self,
        bot_id: i64,
    ) -> AppResult<Option<UserTradeEntity>> {
        let list = UserTradeEntity::select_latest_open_by_bot(&self.rb, bot_id).await?;
        Ok(list.into_iter().next())
    }

    async fn record_close_placement(
        &self,
        user_trade_id: i64,
        provisional_exit_price: f64,
        order: &UserTradeOrderEntity,
    ) -> AppResult<()> {
        let tx = self.rb.acquire_begin().await?;
        let result: AppResult<()> = async {
            Self::insert_order(&tx, order).await?;
            let sql = "UPDATE user_trades SET status = ?, exit_price = ?, updated_at = ? WHERE id = ?";
            let params: Vec<Value> = vec![
                Value::from(UserTradeStatus::Closing.as_str()),
                Value::from(provisional_exit_price),
                to_value!(time_util::now()),
                Value::from(user_trade_id),
            ];
            tx.exec(sql, params).await?;
            Ok(())
        }
        .await;
        finish_tx(tx, result).await
    }

    async fn find_user_trade(&self, user_trade_id: i64) -> AppResult<Option<UserTradeEntity>> {
        let list = UserTradeEntity::select_one_by_id(&self.rb, user_trade_id).await?;
        Ok(list.into_iter().next())
    }

    async fn find_latest_order(
        &self,
        user_trade_id: i64,
        exchange_order_id: &str,
    ) -> AppResult<Option<UserTradeOrderEntity>> {
        let list = UserTradeOrderEntity::select_latest_by_exchange_order(
            &self.rb,
            user_trade_id,
            exchange_order_id,
        )
        .await?;
        Ok(list.into_iter().next())
    }

    async fn apply_reconciliation(&self, update: &ReconcileUpdate) -> AppResult<()> {
        let tx = self.rb.acquire_begin().await?;
        let result = Self::write_reconciliation(&tx, update).await;
        finish_tx(tx, result).await
    }
}
