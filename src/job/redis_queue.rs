use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use super::{JobQueue, TradeJob, TradeJobHandler};
use crate::app_config::redis::{delayed_queue_key, processing_queue_key, ready_queue_key};
use crate::error::{AppError, AppResult};
use crate::time_util;

const PROMOTE_BATCH: i64 = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// 到期任务从 zset 移到就绪 list，整段脚本原子执行
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, ARGV[2])
for _, payload in ipairs(due) do
    redis.call("ZREM", KEYS[1], payload)
    redis.call("LPUSH", KEYS[2], payload)
end
return #due
"#;

/// redis 任务队列
///
/// 就绪任务放 list，延迟任务放 zset（score 为到期毫秒时间戳）。
/// 取任务用 RPOPLPUSH 移进 processing list，执行完才 LREM，
/// worker 启动时把 processing 里残留的任务放回就绪队列。
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    ready_key: String,
    delayed_key: String,
    processing_key: String,
}

impl RedisJobQueue {
    pub fn new(conn: MultiplexedConnection, queue_name: &str) -> Self {
        Self {
            conn,
            ready_key: ready_queue_key(queue_name),
            delayed_key: delayed_queue_key(queue_name),
            processing_key: processing_queue_key(queue_name),
        }
    }

    /// 把到期的延迟任务移到就绪队列，返回迁移条数
    pub async fn promote_due(&self) -> AppResult<usize> {
        let mut conn = self.conn.clone();
        let promoted: i64 = Script::new(PROMOTE_SCRIPT)
            .key(&self.delayed_key)
            .key(&self.ready_key)
            .arg(time_util::now_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;
        Ok(promoted.max(0) as usize)
    }

    /// 取出一个就绪任务，同时放进 processing list
    pub async fn claim(&self) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .rpoplpush(&self.ready_key, &self.processing_key)
            .await?;
        Ok(payload)
    }

    /// 任务执行完毕，从 processing list 删除
    pub async fn ack(&self, payload: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(&self.processing_key, 1, payload).await?;
        Ok(())
    }

    /// 上次退出时未执行完的任务放回就绪队列，返回条数
    pub async fn recover_in_flight(&self) -> AppResult<usize> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        loop {
            let payload: Option<String> = conn
                .rpoplpush(&self.processing_key, &self.ready_key)
                .await?;
            if payload.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }

    /// worker 主循环，收到关闭信号后等待执行中的任务结束
    pub async fn run_worker(
        &self,
        handler: Arc<TradeJobHandler>,
        concurrency: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        info!(
            "redis worker 启动 queue={} concurrency={}",
            self.ready_key, concurrency
        );
        match self.recover_in_flight().await {
            Ok(0) => {}
            Ok(n) => warn!("放回 {} 个未执行完的任务", n),
            Err(e) => error!("恢复未执行完的任务失败: {}", e),
        }

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.promote_due().await {
                error!("延迟任务迁移失败: {}", e);
            }

            // 先拿许可再取任务，关闭时不会有取出未执行的任务
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Queue(format!("worker 信号量已关闭: {}", e)))?;

            let payload = match self.claim().await {
                Ok(payload) => payload,
                Err(e) => {
                    error!("读取任务失败: {}", e);
                    None
                }
            };

            let Some(payload) = payload else {
                drop(permit);
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    changed = shutdown.changed() => {
                        // 发送端已释放，视为关闭
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };

            let job = match TradeJob::from_payload(&payload) {
                Ok(job) => job,
                Err(e) => {
                    warn!("丢弃无法解析的任务 {}: {}", payload, e);
                    if let Err(e) = self.ack(&payload).await {
                        error!("删除无法解析的任务失败: {}", e);
                    }
                    continue;
                }
            };
            debug!("redis worker 收到任务: {:?}", job);

            let handler = handler.clone();
            let queue = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                handler.handle(job).await;
                if let Err(e) = queue.ack(&payload).await {
                    // 留在 processing 里，下次启动会重新执行
                    error!("任务确认失败 {}: {}", payload, e);
                }
            });
        }

        // 等待执行中的任务
        let _ = semaphore
            .acquire_many(concurrency.max(1) as u32)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        info!("redis worker 已停止");
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue_now(&self, job: TradeJob) -> AppResult<()> {
        let payload = job.to_payload()?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(&self.ready_key, payload).await?;
        Ok(())
    }

    async fn enqueue_after(&self, delay: Duration, job: TradeJob) -> AppResult<()> {
        let payload = job.to_payload()?;
        let due_at = time_util::now_millis() + delay.as_millis() as i64;
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(&self.delayed_key, payload, due_at).await?;
        Ok(())
    }
}
