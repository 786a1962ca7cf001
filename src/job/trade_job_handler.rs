use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{JobQueue, TradeJob};
use crate::trading::services::order_service::{ReconcileOutcome, ReconcileService};

/// 执行队列中的任务
pub struct TradeJobHandler {
    reconcile: Arc<ReconcileService>,
    queue: Arc<dyn JobQueue>,
    retry_delay: Duration,
    max_attempts: u32,
}

impl TradeJobHandler {
    pub fn new(
        reconcile: Arc<ReconcileService>,
        queue: Arc<dyn JobQueue>,
        retry_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            reconcile,
            queue,
            retry_delay,
            max_attempts,
        }
    }

    pub async fn handle(&self, job: TradeJob) -> ReconcileOutcome {
        match job {
            TradeJob::ReconcileOrder {
                user_trade_id,
                exchange_order_id,
                attempt,
            } => {
                let outcome = self.reconcile.reconcile(user_trade_id, &exchange_order_id).await;
                match &outcome {
                    o if o.should_retry() && attempt < self.max_attempts => {
                        let next = TradeJob::ReconcileOrder {
                            user_trade_id,
                            exchange_order_id: exchange_order_id.clone(),
                            attempt: attempt + 1,
                        };
                        info!(
                            "订单 {} 尚未完成 ({:?})，{} 秒后第 {} 次查询",
                            exchange_order_id,
                            o,
                            self.retry_delay.as_secs(),
                            attempt + 1
                        );
                        if let Err(e) = self.queue.enqueue_after(self.retry_delay, next).await {
                            error!("对账任务重新投递失败 order {}: {}", exchange_order_id, e);
                        }
                    }
                    o if o.should_retry() => {
                        warn!(
                            "订单 {} 查询 {} 次仍未完成，放弃: {:?}",
                            exchange_order_id, attempt, o
                        );
                    }
                    ReconcileOutcome::Terminal(status) => {
                        warn!("订单 {} 已终结 ({})，不再查询", exchange_order_id, status);
                    }
                    _ => {}
                }
                outcome
            }
        }
    }
}
