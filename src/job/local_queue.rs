use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

use super::{JobQueue, TradeJob, TradeJobHandler};
use crate::error::{AppError, AppResult};

/// 未完成任务计数，归零时唤醒等待者
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn inc(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn dec(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// 进程内任务队列
#[derive(Clone)]
pub struct LocalJobQueue {
    sender: mpsc::UnboundedSender<TradeJob>,
    in_flight: Arc<InFlight>,
}

pub struct LocalJobReceiver {
    receiver: mpsc::UnboundedReceiver<TradeJob>,
    in_flight: Arc<InFlight>,
}

impl LocalJobQueue {
    pub fn channel() -> (LocalJobQueue, LocalJobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let in_flight = Arc::new(InFlight::default());
        (
            LocalJobQueue {
                sender,
                in_flight: in_flight.clone(),
            },
            LocalJobReceiver {
                receiver,
                in_flight,
            },
        )
    }

    /// 已投递但未执行完的任务数（含延迟中的任务）
    pub fn pending(&self) -> usize {
        self.in_flight.get()
    }

    /// 等待所有任务（包括执行中重新投递的任务）完成
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight.get() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn send(&self, job: TradeJob) -> AppResult<()> {
        self.sender.send(job).map_err(|e| {
            self.in_flight.dec();
            AppError::Queue(format!("本地队列已关闭: {:?}", e.0))
        })
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue_now(&self, job: TradeJob) -> AppResult<()> {
        self.in_flight.inc();
        self.send(job)
    }

    async fn enqueue_after(&self, delay: Duration, job: TradeJob) -> AppResult<()> {
        if self.sender.is_closed() {
            return Err(AppError::Queue("本地队列已关闭".to_string()));
        }
        self.in_flight.inc();
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.send(job) {
                warn!("延迟任务投递失败: {}", e);
            }
        });
        Ok(())
    }
}

impl LocalJobReceiver {
    /// 消费任务直到所有发送端关闭，每个任务一个 tokio task
    pub async fn run(mut self, handler: Arc<TradeJobHandler>) {
        while let Some(job) = self.receiver.recv().await {
            debug!("本地队列收到任务: {:?}", job);
            let handler = handler.clone();
            let in_flight = self.in_flight.clone();
            tokio::spawn(async move {
                let job_desc = format!("{:?}", job);
                let res = tokio::spawn(async move { handler.handle(job).await }).await;
                if let Err(e) = res {
                    error!("任务执行 panic: {} {}", job_desc, e);
                }
                in_flight.dec();
            });
        }
        debug!("本地队列已关闭，worker 退出");
    }
}
