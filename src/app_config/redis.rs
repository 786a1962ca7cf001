use redis::aio::MultiplexedConnection;
use redis::Client;

use crate::app_config::env::env_or_default;
use crate::error::AppError;

/// Get a Redis multiplexed async connection using REDIS_HOST from env
pub async fn get_redis_connection() -> Result<MultiplexedConnection, AppError> {
    let url = env_or_default("REDIS_HOST", "redis://127.0.0.1/");
    let client = Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

/// 队列中就绪任务的 list key
pub fn ready_queue_key(queue: &str) -> String {
    format!("strade:queue:{}", queue)
}

/// 延迟任务的 zset key，score 为到期毫秒时间戳
pub fn delayed_queue_key(queue: &str) -> String {
    format!("strade:queue:{}:delayed", queue)
}

/// 已取出、尚未执行完的任务 list key
pub fn processing_queue_key(queue: &str) -> String {
    format!("strade:queue:{}:processing", queue)
}

/// 策略 tick 互斥锁 key
pub fn strategy_lock_key(strategy_id: i64) -> String {
    format!("strade:lock:strategy_tick:{}", strategy_id)
}
