//! 应用组装：按配置创建账本、交易所工厂、队列、锁和各个服务

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::app_config::db::init_db;
use crate::app_config::redis::get_redis_connection;
use crate::app_config::settings::{QueueBackend, TradeSettings};
use crate::job::{JobQueue, LocalJobQueue, RedisJobQueue, TradeJobHandler};
use crate::trading::exchange::{ExchangeFactory, GatewayFactory};
use crate::trading::ledger::{MysqlLedger, PositionLedger};
use crate::trading::services::order_service::{
    CloseOrderService, OpenOrderService, ReconcileService,
};
use crate::trading::services::scheduler_service::SchedulerService;
use crate::trading::services::strategy_lock::{
    LocalStrategyLock, RedisStrategyLock, StrategyLock,
};
use crate::trading::strategy::BreakoutStrategy;
use crate::trading::task::{FanOutDispatcher, TickOrchestrator};

/// 关闭时等待本地对账任务的最长时间
const LOCAL_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// 任务队列运行时
pub enum QueueRuntime {
    Local(LocalJobQueue),
    Redis(RedisJobQueue),
}

impl QueueRuntime {
    fn as_job_queue(&self) -> Arc<dyn JobQueue> {
        match self {
            QueueRuntime::Local(queue) => Arc::new(queue.clone()),
            QueueRuntime::Redis(queue) => Arc::new(queue.clone()),
        }
    }

    /// 本地队列：等待执行中和延迟中的对账任务结束
    pub async fn drain_local(&self) {
        if let QueueRuntime::Local(queue) = self {
            let pending = queue.pending();
            if pending == 0 {
                return;
            }
            info!("等待 {} 个本地对账任务完成...", pending);
            if tokio::time::timeout(LOCAL_DRAIN_TIMEOUT, queue.wait_idle())
                .await
                .is_err()
            {
                warn!(
                    "等待本地对账任务超时 ({}秒)，剩余 {} 个",
                    LOCAL_DRAIN_TIMEOUT.as_secs(),
                    queue.pending()
                );
            }
        }
    }
}

pub struct Pipeline {
    pub settings: TradeSettings,
    pub orchestrator: Arc<TickOrchestrator>,
    pub reconcile: Arc<ReconcileService>,
    pub handler: Arc<TradeJobHandler>,
    pub queue: QueueRuntime,
}

impl Pipeline {
    /// 按配置组装整条流水线；本地队列的消费者在这里启动
    pub async fn build(settings: TradeSettings) -> anyhow::Result<Self> {
        let rb = init_db().await?;
        let ledger: Arc<dyn PositionLedger> = Arc::new(MysqlLedger::new(rb));
        let factory: Arc<dyn GatewayFactory> =
            Arc::new(ExchangeFactory::new(settings.exchange_timeout));

        let (queue, local_receiver, lock) = match settings.queue_backend {
            QueueBackend::Local => {
                let (queue, receiver) = LocalJobQueue::channel();
                (
                    QueueRuntime::Local(queue),
                    Some(receiver),
                    Arc::new(LocalStrategyLock::new()) as Arc<dyn StrategyLock>,
                )
            }
            QueueBackend::Redis => {
                let conn = get_redis_connection().await?;
                (
                    QueueRuntime::Redis(RedisJobQueue::new(conn.clone(), &settings.queue_name)),
                    None,
                    Arc::new(RedisStrategyLock::new(conn)) as Arc<dyn StrategyLock>,
                )
            }
        };
        let job_queue = queue.as_job_queue();

        let reconcile = Arc::new(ReconcileService::new(ledger.clone(), factory.clone()));
        let handler = Arc::new(TradeJobHandler::new(
            reconcile.clone(),
            job_queue.clone(),
            settings.reconcile_retry_delay,
            settings.reconcile_max_attempts,
        ));
        if let Some(receiver) = local_receiver {
            tokio::spawn(receiver.run(handler.clone()));
        }

        let price_gateway = factory.create_public(&settings.price_exchange)?;
        let generator = Arc::new(BreakoutStrategy::new(
            ledger.clone(),
            Arc::from(price_gateway),
        ));
        let dispatcher = Arc::new(FanOutDispatcher::new(
            Arc::new(OpenOrderService::new(ledger.clone(), factory.clone())),
            Arc::new(CloseOrderService::new(ledger.clone(), factory.clone())),
            job_queue,
            settings.worker_pool_size,
            settings.reconcile_delay,
        ));
        let orchestrator = Arc::new(TickOrchestrator::new(
            ledger,
            generator,
            dispatcher,
            lock,
            settings.tick_lock_ttl,
        ));

        info!(
            "流水线初始化完成 queue={:?} pool={} reconcile_delay={}s",
            settings.queue_backend,
            settings.worker_pool_size,
            settings.reconcile_delay.as_secs()
        );
        Ok(Self {
            settings,
            orchestrator,
            reconcile,
            handler,
            queue,
        })
    }
}

/// 定时跑策略 tick，直到收到退出信号
pub async fn run_scheduler(pipeline: Pipeline) -> anyhow::Result<()> {
    let mut scheduler = SchedulerService::new_scheduler().await?;
    SchedulerService::schedule_strategy_tick(
        &scheduler,
        &pipeline.settings.tick_cron,
        pipeline.settings.strategy_id,
        pipeline.orchestrator.clone(),
    )
    .await?;

    let signal_name = setup_shutdown_signals().await?;
    info!("接收到 {} 信号，开始优雅关闭...", signal_name);

    if let Err(e) = scheduler.shutdown().await {
        error!("调度器关闭失败: {}", e);
    }
    pipeline.queue.drain_local().await;
    info!("应用已优雅退出");
    Ok(())
}

/// 单次 tick，本地队列时等对账任务跑完再返回
pub async fn run_single_tick(pipeline: &Pipeline, strategy_id: i64) -> anyhow::Result<()> {
    let result = pipeline.orchestrator.run_tick(strategy_id).await;
    info!("tick 结果: {}", result);
    println!("{}", serde_json::to_string(&result)?);
    pipeline.queue.drain_local().await;
    Ok(())
}

/// redis 对账 worker
pub async fn run_worker(pipeline: Pipeline) -> anyhow::Result<()> {
    let QueueRuntime::Redis(queue) = &pipeline.queue else {
        return Err(anyhow!("worker 需要 QUEUE_BACKEND=redis"));
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let queue = queue.clone();
    let handler = pipeline.handler.clone();
    let concurrency = pipeline.settings.worker_pool_size;
    let worker = tokio::spawn(async move { queue.run_worker(handler, concurrency, shutdown_rx).await });

    let signal_name = setup_shutdown_signals().await?;
    info!("接收到 {} 信号，停止 worker...", signal_name);
    shutdown_tx.send(true)?;
    worker.await??;
    Ok(())
}

/// 手动对账一笔订单
pub async fn run_reconcile(
    pipeline: &Pipeline,
    user_trade_id: i64,
    exchange_order_id: &str,
) -> anyhow::Result<()> {
    let outcome = pipeline
        .reconcile
        .reconcile(user_trade_id, exchange_order_id)
        .await;
    info!(
        "手动对账 user_trade {} order {}: {:?}",
        user_trade_id, exchange_order_id, outcome
    );
    Ok(())
}

/// 设置多种退出信号处理
async fn setup_shutdown_signals() -> anyhow::Result<&'static str> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
        let mut sigquit = signal::unix::signal(signal::unix::SignalKind::quit())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sigquit.recv() => "SIGQUIT",
        };
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("CTRL+C")
    }
}
