//! 调度器服务
//!
//! 按 cron 表达式周期性触发策略 tick，注册失败时带重试。

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::trading::task::TickOrchestrator;

/// 调度器服务错误类型
#[derive(thiserror::Error, Debug)]
pub enum SchedulerServiceError {
    #[error("调度器初始化失败: {reason}")]
    InitFailed { reason: String },

    #[error("任务创建失败: {reason}")]
    JobCreationFailed { reason: String },

    #[error("任务注册失败: {reason}")]
    JobRegistrationFailed { reason: String },

    #[error("调度器启动失败: {reason}")]
    StartFailed { reason: String },
}

pub struct SchedulerService;

impl SchedulerService {
    const MAX_RETRY_ATTEMPTS: u32 = 3;
    const RETRY_DELAY_MS: u64 = 100;

    pub fn build_task_key(strategy_id: i64) -> String {
        format!("strategy_{}_tick_task", strategy_id)
    }

    pub async fn new_scheduler() -> Result<JobScheduler, SchedulerServiceError> {
        JobScheduler::new()
            .await
            .map_err(|e| SchedulerServiceError::InitFailed {
                reason: e.to_string(),
            })
    }

    /// 创建策略 tick 定时任务
    pub fn create_tick_job(
        cron_expression: &str,
        strategy_id: i64,
        orchestrator: Arc<TickOrchestrator>,
    ) -> Result<Job, SchedulerServiceError> {
        let task_key = Self::build_task_key(strategy_id);
        debug!("创建定时任务: {}, cron={}", task_key, cron_expression);

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                let result = orchestrator.run_tick(strategy_id).await;
                info!("策略 {} 定时 tick 完成: {}", strategy_id, result);
            })
        })
        .map_err(|e| SchedulerServiceError::JobCreationFailed {
            reason: format!("{} cron={} : {}", task_key, cron_expression, e),
        })?;

        debug!("定时任务创建成功: {}", job.guid());
        Ok(job)
    }

    /// 注册任务到调度器（带重试机制）
    pub async fn register_job(
        scheduler: &JobScheduler,
        job: Job,
    ) -> Result<Uuid, SchedulerServiceError> {
        let job_id = job.guid();
        for attempt in 1..=Self::MAX_RETRY_ATTEMPTS {
            match scheduler.add(job.clone()).await {
                Ok(_) => {
                    info!("任务注册成功: {} (尝试次数: {})", job_id, attempt);
                    return Ok(job_id);
                }
                Err(e) if attempt < Self::MAX_RETRY_ATTEMPTS => {
                    warn!("任务注册失败，第{}次重试: {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(
                        Self::RETRY_DELAY_MS * attempt as u64,
                    ))
                    .await;
                }
                Err(e) => {
                    error!("任务注册最终失败: {}", e);
                    return Err(SchedulerServiceError::JobRegistrationFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(SchedulerServiceError::JobRegistrationFailed {
            reason: "达到最大重试次数".to_string(),
        })
    }

    /// 创建、注册并启动策略 tick
    pub async fn schedule_strategy_tick(
        scheduler: &JobScheduler,
        cron_expression: &str,
        strategy_id: i64,
        orchestrator: Arc<TickOrchestrator>,
    ) -> Result<Uuid, SchedulerServiceError> {
        let job = Self::create_tick_job(cron_expression, strategy_id, orchestrator)?;
        let job_id = Self::register_job(scheduler, job).await?;
        scheduler
            .start()
            .await
            .map_err(|e| SchedulerServiceError::StartFailed {
                reason: e.to_string(),
            })?;
        info!(
            "策略 {} 定时任务已启动 cron={} job={}",
            strategy_id, cron_expression, job_id
        );
        Ok(job_id)
    }
}
