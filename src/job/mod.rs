//! 后台任务：下单后的延迟对账
//!
//! 任务通过注入的 `JobQueue` 投递，本地模式在进程内执行，
//! redis 模式可以由独立的 worker 进程消费。投递语义为至少一次。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub mod local_queue;
pub mod redis_queue;
pub mod trade_job_handler;

pub use local_queue::{LocalJobQueue, LocalJobReceiver};
pub use redis_queue::RedisJobQueue;
pub use trade_job_handler::TradeJobHandler;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeJob {
    /// 查询订单状态并回写账本，attempt 从 1 开始
    ReconcileOrder {
        user_trade_id: i64,
        exchange_order_id: String,
        attempt: u32,
    },
}

impl TradeJob {
    pub fn reconcile(user_trade_id: i64, exchange_order_id: impl Into<String>) -> Self {
        TradeJob::ReconcileOrder {
            user_trade_id,
            exchange_order_id: exchange_order_id.into(),
            attempt: 1,
        }
    }

    pub fn to_payload(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue_now(&self, job: TradeJob) -> AppResult<()>;

    async fn enqueue_after(&self, delay: Duration, job: TradeJob) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        let job = TradeJob::reconcile(7, "okx-1");
        let payload = job.to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"type":"reconcile_order","user_trade_id":7,"exchange_order_id":"okx-1","attempt":1}"#
        );
        assert_eq!(TradeJob::from_payload(&payload).unwrap(), job);
    }

    #[test]
    fn test_bad_payload() {
        assert!(TradeJob::from_payload(r#"{"type":"unknown"}"#).is_err());
    }
}
