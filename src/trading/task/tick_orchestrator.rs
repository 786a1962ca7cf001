//! 策略 tick：每个周期执行一次
//!
//! 取锁 → 加载策略 → 生成信号 → 解析动作 → 查询运行中的 bot →
//! 写策略主控单 → 派发。任何失败都折叠进 `TickResult`，不向上抛错。

use std::fmt::{Display, Formatter};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::dispatcher::FanOutDispatcher;
use crate::error::AppResult;
use crate::time_util;
use crate::trading::ledger::PositionLedger;
use crate::trading::model::StrategyTradeEntity;
use crate::trading::order::pnl_pct;
use crate::trading::services::strategy_lock::StrategyLock;
use crate::trading::strategy::{Signal, SignalAction, SignalGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    NoSignal,
    NoRunningBots,
    UnsupportedAction,
    Completed,
    StrategyNotFound,
    /// 策略已有 OPEN 主控单，忽略新的开仓信号
    AlreadyOpen,
    /// 同一策略的上一个 tick 还在执行
    TickInProgress,
    /// 数据库或锁服务不可用
    Failed,
}

impl TickStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickStatus::NoSignal => "no_signal",
            TickStatus::NoRunningBots => "no_running_bots",
            TickStatus::UnsupportedAction => "unsupported_action",
            TickStatus::Completed => "completed",
            TickStatus::StrategyNotFound => "strategy_not_found",
            TickStatus::AlreadyOpen => "already_open",
            TickStatus::TickInProgress => "tick_in_progress",
            TickStatus::Failed => "failed",
        }
    }
}

impl Display for TickStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResult {
    pub status: TickStatus,
    /// 信号动作原文
    pub action: Option<String>,
    pub bot_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
}

impl TickResult {
    fn empty(status: TickStatus, action: Option<String>) -> Self {
        Self {
            status,
            action,
            bot_count: 0,
            success_count: 0,
            fail_count: 0,
        }
    }
}

impl Display for TickResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "status={} action={} bots={} success={} fail={}",
            self.status,
            self.action.as_deref().unwrap_or("-"),
            self.bot_count,
            self.success_count,
            self.fail_count
        )
    }
}

pub struct TickOrchestrator {
    ledger: Arc<dyn PositionLedger>,
    generator: Arc<dyn SignalGenerator>,
    dispatcher: Arc<FanOutDispatcher>,
    lock: Arc<dyn StrategyLock>,
    lock_ttl: Duration,
}

impl TickOrchestrator {
    pub fn new(
        ledger: Arc<dyn PositionLedger>,
        generator: Arc<dyn SignalGenerator>,
        dispatcher: Arc<FanOutDispatcher>,
        lock: Arc<dyn StrategyLock>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            generator,
            dispatcher,
            lock,
            lock_ttl,
        }
    }

    pub async fn run_tick(&self, strategy_id: i64) -> TickResult {
        info!("=== 开始跑策略 Tick strategy_id={} ===", strategy_id);
        let lease = match self.lock.try_acquire(strategy_id, self.lock_ttl).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                warn!("策略 {} 上一个 tick 尚未结束，跳过本次", strategy_id);
                return TickResult::empty(TickStatus::TickInProgress, None);
            }
            Err(e) => {
                error!("策略 {} 获取 tick 锁失败: {}", strategy_id, e);
                return TickResult::empty(TickStatus::Failed, None);
            }
        };

        // panic 也要释放租约
        let result = match AssertUnwindSafe(self.run_locked(strategy_id))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("策略 {} tick 执行失败: {}", strategy_id, e);
                TickResult::empty(TickStatus::Failed, None)
            }
            Err(_) => {
                error!("策略 {} tick 执行 panic", strategy_id);
                TickResult::empty(TickStatus::Failed, None)
            }
        };

        if let Err(e) = self.lock.release(&lease).await {
            warn!("策略 {} 释放 tick 锁失败: {}", strategy_id, e);
        }
        info!("=== 策略 Tick 结束 strategy_id={} {} ===", strategy_id, result);
        result
    }

    async fn run_locked(&self, strategy_id: i64) -> AppResult<TickResult> {
        let Some(strategy) = self.ledger.find_active_strategy(strategy_id).await? else {
            warn!("策略 {} 不存在或未启用", strategy_id);
            return Ok(TickResult::empty(TickStatus::StrategyNotFound, None));
        };
        info!("策略：{}", strategy.name);

        let raw = match self.generator.generate(&strategy).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("没有讯号，结束。");
                return Ok(TickResult::empty(TickStatus::NoSignal, None));
            }
            Err(e) => {
                error!("策略 {} 生成信号失败: {}", strategy_id, e);
                return Ok(TickResult::empty(TickStatus::NoSignal, None));
            }
        };
        info!("策略产生讯号：{:?}", raw);

        let mut signal = match Signal::from_raw(&raw) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("忽略信号: {}", e);
                return Ok(TickResult::empty(
                    TickStatus::UnsupportedAction,
                    Some(raw.action.clone()),
                ));
            }
        };

        let bots = self.ledger.find_running_bots(strategy_id).await?;
        if bots.is_empty() {
            info!("策略 {} 没有运行中的 bot", strategy_id);
            return Ok(TickResult::empty(
                TickStatus::NoRunningBots,
                Some(raw.action.clone()),
            ));
        }
        info!("共 {} 个 bot 要处理", bots.len());

        match signal.action {
            SignalAction::Open => {
                if let Some(open) = self.ledger.find_open_strategy_trade(strategy_id).await? {
                    warn!(
                        "策略 {} 已有未平仓主控单 {:?}，忽略开仓信号",
                        strategy_id, open.id
                    );
                    return Ok(TickResult::empty(
                        TickStatus::AlreadyOpen,
                        Some(raw.action.clone()),
                    ));
                }
                let trade = StrategyTradeEntity::new_open(
                    strategy_id,
                    signal.position_side,
                    signal.price,
                    time_util::now(),
                );
                let trade_id = self.ledger.insert_strategy_trade(&trade).await?;
                info!("产生策略主控单 strategy_trade_id: {}", trade_id);
                signal.strategy_trade_id = Some(trade_id);
            }
            SignalAction::Close(reason) => {
                match self.ledger.find_open_strategy_trade(strategy_id).await? {
                    Some(open) => {
                        let pct = pnl_pct(open.position_side, open.entry_price, signal.price);
                        if let Some(trade_id) = open.id {
                            self.ledger
                                .close_strategy_trade(trade_id, signal.price, pct)
                                .await?;
                            info!(
                                "策略主控单 {} 平仓 ({:?})，收益率 {:?}",
                                trade_id, reason, pct
                            );
                        }
                        signal.strategy_trade_id = open.id;
                    }
                    None => {
                        warn!("策略 {} 没有未平仓主控单，仍派发平仓", strategy_id);
                    }
                }
            }
        }

        let summary = self.dispatcher.dispatch(&signal, &bots).await;
        Ok(TickResult {
            status: TickStatus::Completed,
            action: Some(raw.action),
            bot_count: bots.len(),
            success_count: summary.success_count,
            fail_count: summary.fail_count,
        })
    }
}
