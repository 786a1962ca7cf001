use std::str::FromStr;
use std::time::Duration;

use crate::app_config::env::{env_or_default, env_parse};
use crate::error::AppError;

/// 对账任务使用的队列后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// 进程内 tokio 队列
    Local,
    /// redis list + zset，可由独立 worker 进程消费
    Redis,
}

impl FromStr for QueueBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(QueueBackend::Local),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(AppError::Config(format!("QUEUE_BACKEND 不支持: {}", other))),
        }
    }
}

/// 交易流水线配置
#[derive(Debug, Clone)]
pub struct TradeSettings {
    /// 定时任务跑的策略
    pub strategy_id: i64,
    /// 单个 tick 内同时执行的 bot 任务上限
    pub worker_pool_size: usize,
    /// 下单后首次对账的延迟
    pub reconcile_delay: Duration,
    /// 订单未终结时再次对账的间隔
    pub reconcile_retry_delay: Duration,
    /// 单笔订单最多对账次数
    pub reconcile_max_attempts: u32,
    /// tick 的 cron 表达式（秒 分 时 日 月 周）
    pub tick_cron: String,
    /// tick 互斥锁过期时间
    pub tick_lock_ttl: Duration,
    pub queue_backend: QueueBackend,
    pub queue_name: String,
    /// 交易所 http 请求超时
    pub exchange_timeout: Duration,
    /// 策略取最新价使用的交易所
    pub price_exchange: String,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            strategy_id: 1,
            worker_pool_size: 10,
            reconcile_delay: Duration::from_secs(3),
            reconcile_retry_delay: Duration::from_secs(10),
            reconcile_max_attempts: 5,
            tick_cron: "0 0 * * * *".to_string(),
            tick_lock_ttl: Duration::from_secs(600),
            queue_backend: QueueBackend::Local,
            queue_name: "default".to_string(),
            exchange_timeout: Duration::from_secs(15),
            price_exchange: "okx".to_string(),
        }
    }
}

impl TradeSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let default = Self::default();
        let worker_pool_size: usize = env_parse("WORKER_POOL_SIZE", default.worker_pool_size);
        if worker_pool_size == 0 {
            return Err(AppError::Config("WORKER_POOL_SIZE 必须大于0".to_string()));
        }

        Ok(Self {
            strategy_id: env_parse("STRATEGY_ID", default.strategy_id),
            worker_pool_size,
            reconcile_delay: Duration::from_secs(env_parse("RECONCILE_DELAY_SECS", 3u64)),
            reconcile_retry_delay: Duration::from_secs(env_parse(
                "RECONCILE_RETRY_DELAY_SECS",
                10u64,
            )),
            reconcile_max_attempts: env_parse(
                "RECONCILE_MAX_ATTEMPTS",
                default.reconcile_max_attempts,
            )
            .max(1),
            tick_cron: env_or_default("TICK_CRON", &default.tick_cron),
            tick_lock_ttl: Duration::from_secs(env_parse("TICK_LOCK_TTL_SECS", 600u64)),
            queue_backend: env_or_default("QUEUE_BACKEND", "local").parse()?,
            queue_name: env_or_default("QUEUE_NAME", &default.queue_name),
            exchange_timeout: Duration::from_secs(env_parse("EXCHANGE_TIMEOUT_SECS", 15u64)),
            price_exchange: env_or_default("PRICE_SYMBOL_EXCHANGE", &default.price_exchange),
        })
    }
}
