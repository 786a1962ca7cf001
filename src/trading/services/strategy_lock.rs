//! 策略 tick 互斥锁
//!
//! 同一策略同一时间只允许一个 tick 在执行。本地模式用进程内表，
//! redis 模式用 `SET NX PX`，释放时校验 token，过期后自动失效。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app_config::redis::strategy_lock_key;
use crate::error::AppResult;

/// 持有中的租约
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    pub strategy_id: i64,
    pub token: String,
}

#[async_trait]
pub trait StrategyLock: Send + Sync {
    /// 已被占用时返回 None
    async fn try_acquire(&self, strategy_id: i64, ttl: Duration) -> AppResult<Option<LeaseToken>>;

    async fn release(&self, lease: &LeaseToken) -> AppResult<()>;
}

/// 进程内锁，超过 ttl 未释放的租约视为失效
#[derive(Default)]
pub struct LocalStrategyLock {
    held: Mutex<HashMap<i64, (String, Instant)>>,
}

impl LocalStrategyLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrategyLock for LocalStrategyLock {
    async fn try_acquire(&self, strategy_id: i64, ttl: Duration) -> AppResult<Option<LeaseToken>> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        if let Some((_, expires_at)) = held.get(&strategy_id) {
            if *expires_at > now {
                return Ok(None);
            }
            warn!("策略 {} 的 tick 锁已过期，重新获取", strategy_id);
        }
        let token = Uuid::new_v4().to_string();
        held.insert(strategy_id, (token.clone(), now + ttl));
        Ok(Some(LeaseToken { strategy_id, token }))
    }

    async fn release(&self, lease: &LeaseToken) -> AppResult<()> {
        let mut held = self.held.lock().await;
        match held.get(&lease.strategy_id) {
            Some((token, _)) if *token == lease.token => {
                held.remove(&lease.strategy_id);
            }
            _ => warn!("策略 {} 的 tick 锁已过期或被他人持有", lease.strategy_id),
        }
        Ok(())
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// 跨进程锁
pub struct RedisStrategyLock {
    conn: MultiplexedConnection,
}

impl RedisStrategyLock {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StrategyLock for RedisStrategyLock {
    async fn try_acquire(&self, strategy_id: i64, ttl: Duration) -> AppResult<Option<LeaseToken>> {
        let key = strategy_lock_key(strategy_id);
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();
        let res: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        if res.is_none() {
            debug!("策略 {} 的 tick 锁已被占用", strategy_id);
            return Ok(None);
        }
        Ok(Some(LeaseToken { strategy_id, token }))
    }

    async fn release(&self, lease: &LeaseToken) -> AppResult<()> {
        let key = strategy_lock_key(lease.strategy_id);
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await?;
        if deleted == 0 {
            warn!("策略 {} 的 tick 锁已过期或被他人持有", lease.strategy_id);
        }
        Ok(())
    }
}
