use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::job::{JobQueue, TradeJob};
use crate::trading::model::BotEntity;
use crate::trading::services::order_service::{CloseOrderService, OpenOrderService, OrderOutcome};
use crate::trading::strategy::{Signal, SignalAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    pub success_count: usize,
    pub fail_count: usize,
}

/// 把一个信号派发给所有 bot，每个 bot 一个任务，并发数受信号量限制。
/// 单个 bot 的失败或 panic 不影响其它 bot
pub struct FanOutDispatcher {
    open_service: Arc<OpenOrderService>,
    close_service: Arc<CloseOrderService>,
    queue: Arc<dyn JobQueue>,
    pool_size: usize,
    reconcile_delay: Duration,
}

impl FanOutDispatcher {
    pub fn new(
        open_service: Arc<OpenOrderService>,
        close_service: Arc<CloseOrderService>,
        queue: Arc<dyn JobQueue>,
        pool_size: usize,
        reconcile_delay: Duration,
    ) -> Self {
        Self {
            open_service,
            close_service,
            queue,
            pool_size: pool_size.max(1),
            reconcile_delay,
        }
    }

    pub async fn dispatch(&self, signal: &Signal, bots: &[BotEntity]) -> DispatchSummary {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut batch_tasks = Vec::with_capacity(bots.len());

        for bot in bots {
            let bot_id = bot.id;
            let signal = signal.clone();
            let permit = Arc::clone(&semaphore);
            let open_service = Arc::clone(&self.open_service);
            let close_service = Arc::clone(&self.close_service);
            let queue = Arc::clone(&self.queue);
            let reconcile_delay = self.reconcile_delay;

            batch_tasks.push((
                bot_id,
                tokio::spawn(async move {
                    let _permit = match permit.acquire_owned().await {
                        Ok(p) => p,
                        Err(e) => {
                            error!("[Bot {}] 获取并发许可失败: {}", bot_id, e);
                            return false;
                        }
                    };
                    let outcome = match signal.action {
                        SignalAction::Open => open_service.place_open(bot_id, &signal).await,
                        SignalAction::Close(_) => close_service.place_close(bot_id, &signal).await,
                    };
                    match &outcome {
                        OrderOutcome::Placed(placed) => {
                            info!(
                                "[Bot {}] 已建立 user_trade {}，{} 秒后检查订单状态",
                                bot_id,
                                placed.user_trade_id,
                                reconcile_delay.as_secs()
                            );
                            let job = TradeJob::reconcile(
                                placed.user_trade_id,
                                placed.exchange_order_id.clone(),
                            );
                            // 投递失败只记录，不影响本次下单结果
                            if let Err(e) = queue.enqueue_after(reconcile_delay, job).await {
                                error!(
                                    "[Bot {}] 对账任务投递失败 user_trade {}: {}",
                                    bot_id, placed.user_trade_id, e
                                );
                            }
                            true
                        }
                        OrderOutcome::Skipped(reason) => {
                            info!("[Bot {}] 下单被略过: {}", bot_id, reason);
                            false
                        }
                        OrderOutcome::Failed(e) => {
                            warn!("[Bot {}] 下单失败: {}", bot_id, e);
                            false
                        }
                    }
                }),
            ));
        }

        let batch_start = Instant::now();
        let (bot_ids, handles): (Vec<i64>, Vec<_>) = batch_tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut summary = DispatchSummary::default();
        for (bot_id, res) in bot_ids.into_iter().zip(results) {
            match res {
                Ok(true) => summary.success_count += 1,
                Ok(false) => summary.fail_count += 1,
                Err(e) => {
                    error!("[Bot {}] 下单任务异常退出: {}", bot_id, e);
                    summary.fail_count += 1;
                }
            }
        }
        info!(
            "{} 信号派发完成，成功 {}，失败 {}，用时：{:?}",
            signal.action,
            summary.success_count,
            summary.fail_count,
            batch_start.elapsed()
        );
        summary
    }
}
