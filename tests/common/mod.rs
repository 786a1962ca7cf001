//! 测试用的交易所、队列和账本数据
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use strade::error::{AppError, AppResult};
use strade::job::{JobQueue, TradeJob};
use strade::trading::exchange::{
    ExchangeGateway, FetchedOrder, GatewayFactory, OrderRequest, PlacedOrder,
};
use strade::trading::ledger::InMemoryLedger;
use strade::trading::model::{
    ApiCredentials, BotEntity, ExchangeAccountEntity, ExchangeEntity, OrderKind, PositionSide,
    StrategyEntity, UserTradeEntity, UserTradeOrderEntity, UserTradeStatus,
};
use strade::trading::order::MarginMode;
use strade::trading::strategy::{RawSignal, SignalGenerator};
use strade::time_util;

pub const STRATEGY_ID: i64 = 1;
pub const OKX_EXCHANGE_ID: i64 = 1;

/// 下单时的行为，按交易对配置
#[derive(Debug, Clone)]
pub enum PlaceBehavior {
    Accept,
    Reject(String),
    Panic,
    /// 响应里没有订单号
    NoOrderId,
}

/// 可编排的交易所，所有网关实例共享
#[derive(Default)]
pub struct ScriptedExchange {
    place_behaviors: Mutex<HashMap<String, PlaceBehavior>>,
    leverage_error: Mutex<Option<String>>,
    fetch_scripts: Mutex<HashMap<String, VecDeque<Result<FetchedOrder, String>>>>,
    place_delay: Mutex<Option<Duration>>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub leverage_calls: Mutex<Vec<(i64, String, MarginMode)>>,
    pub sandbox_flags: Mutex<Vec<bool>>,
    pub fetch_calls: AtomicUsize,
    order_seq: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_place(&self, symbol: &str, behavior: PlaceBehavior) {
        self.place_behaviors
            .lock()
            .unwrap()
            .insert(symbol.to_string(), behavior);
    }

    pub fn fail_leverage(&self, msg: &str) {
        *self.leverage_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn slow_place(&self, delay: Duration) {
        *self.place_delay.lock().unwrap() = Some(delay);
    }

    /// 依次返回；只剩最后一个时一直返回它
    pub fn script_fetch(&self, order_id: &str, results: Vec<Result<FetchedOrder, String>>) {
        self.fetch_scripts
            .lock()
            .unwrap()
            .insert(order_id.to_string(), results.into());
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }
}

pub struct ScriptedGateway {
    exchange: Arc<ScriptedExchange>,
    sandbox: bool,
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    fn exchange_code(&self) -> &str {
        "okx"
    }

    fn set_sandbox_mode(&mut self, enabled: bool) {
        self.sandbox = enabled;
        self.exchange.sandbox_flags.lock().unwrap().push(enabled);
    }

    async fn set_leverage(
        &self,
        leverage: i64,
        symbol: &str,
        margin_mode: MarginMode,
    ) -> AppResult<()> {
        self.exchange
            .leverage_calls
            .lock()
            .unwrap()
            .push((leverage, symbol.to_string(), margin_mode));
        let err = self.exchange.leverage_error.lock().unwrap().clone();
        match err {
            Some(msg) => Err(AppError::Exchange(msg)),
            None => Ok(()),
        }
    }

    async fn place_order(&self, request: &OrderRequest) -> AppResult<PlacedOrder> {
        let behavior = self
            .exchange
            .place_behaviors
            .lock()
            .unwrap()
            .get(&request.symbol)
            .cloned()
            .unwrap_or(PlaceBehavior::Accept);
        let delay = *self.exchange.place_delay.lock().unwrap();

        let now = self.exchange.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.exchange.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.exchange.in_flight.fetch_sub(1, Ordering::SeqCst);

        match behavior {
            PlaceBehavior::Panic => panic!("scripted panic for {}", request.symbol),
            PlaceBehavior::Reject(msg) => Err(AppError::Exchange(msg)),
            PlaceBehavior::NoOrderId => {
                self.exchange.placed.lock().unwrap().push(request.clone());
                Ok(PlacedOrder {
                    info: json!({"sCode": "0"}),
                    ..Default::default()
                })
            }
            PlaceBehavior::Accept => {
                self.exchange.placed.lock().unwrap().push(request.clone());
                let seq = self.exchange.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
                let order_id = format!("ord-{}", seq);
                Ok(PlacedOrder {
                    id: Some(order_id.clone()),
                    order_id: None,
                    status: None,
                    filled: None,
                    info: json!({"ordId": order_id, "sCode": "0"}),
                })
            }
        }
    }

    async fn fetch_order(&self, order_id: &str, _symbol: &str) -> AppResult<FetchedOrder> {
        self.exchange.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.exchange.fetch_scripts.lock().unwrap();
        let result = match scripts.get_mut(order_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match result {
            Some(Ok(order)) => Ok(order),
            Some(Err(msg)) => Err(AppError::Exchange(msg)),
            None => Err(AppError::Exchange(format!("order {} not found", order_id))),
        }
    }

    async fn fetch_last_price(&self, _symbol: &str) -> AppResult<f64> {
        Ok(100.0)
    }
}

pub struct ScriptedFactory {
    pub exchange: Arc<ScriptedExchange>,
}

impl GatewayFactory for ScriptedFactory {
    fn create(
        &self,
        exchange_code: &str,
        _credentials: &ApiCredentials,
    ) -> AppResult<Box<dyn ExchangeGateway>> {
        self.create_public(exchange_code)
    }

    fn create_public(&self, exchange_code: &str) -> AppResult<Box<dyn ExchangeGateway>> {
        if exchange_code != "okx" {
            return Err(AppError::Exchange(format!("不支持的交易所: {}", exchange_code)));
        }
        Ok(Box::new(ScriptedGateway {
            exchange: self.exchange.clone(),
            sandbox: false,
        }))
    }
}

/// 只记录投递的任务，不执行
#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<(Duration, TradeJob)>>,
    pub fail: bool,
}

impl RecordingQueue {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<(Duration, TradeJob)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue_now(&self, job: TradeJob) -> AppResult<()> {
        self.enqueue_after(Duration::ZERO, job).await
    }

    async fn enqueue_after(&self, delay: Duration, job: TradeJob) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Queue("queue down".to_string()));
        }
        self.jobs.lock().unwrap().push((delay, job));
        Ok(())
    }
}

/// 每次返回同样结果的信号生成器
pub enum FixedSignal {
    Nothing,
    Error,
    Panic,
    Raw(RawSignal),
}

impl FixedSignal {
    pub fn raw(action: &str, side: PositionSide, price: f64) -> Self {
        FixedSignal::Raw(RawSignal {
            action: action.to_string(),
            position_side: side,
            price,
        })
    }
}

#[async_trait]
impl SignalGenerator for FixedSignal {
    async fn generate(&self, _strategy: &StrategyEntity) -> AppResult<Option<RawSignal>> {
        match self {
            FixedSignal::Nothing => Ok(None),
            FixedSignal::Error => Err(AppError::Exchange("ticker timeout".to_string())),
            FixedSignal::Panic => panic!("generator bug"),
            FixedSignal::Raw(raw) => Ok(Some(raw.clone())),
        }
    }
}

pub fn strategy(id: i64) -> StrategyEntity {
    StrategyEntity {
        id,
        name: format!("breakout-{}", id),
        symbol: "BTC-USDT-SWAP".to_string(),
        is_active: 1,
    }
}

pub fn bot(id: i64, strategy_id: i64, symbol: &str) -> BotEntity {
    BotEntity {
        id,
        user_id: 1000 + id,
        strategy_id,
        exchange_account_id: 100 + id,
        exchange_symbol: symbol.to_string(),
        base_order_usdt: 100.0,
        leverage: 5,
        status: "RUNNING".to_string(),
    }
}

pub fn account(id: i64, exchange_id: i64) -> ExchangeAccountEntity {
    ExchangeAccountEntity {
        id,
        user_id: 1,
        exchange_id,
        params: json!({"api_key": "key-123456", "secret_key": "secret", "passphrase": "pass"})
            .to_string(),
    }
}

pub fn okx_exchange() -> ExchangeEntity {
    ExchangeEntity {
        id: OKX_EXCHANGE_ID,
        code: "okx".to_string(),
        name: Some("OKX".to_string()),
    }
}

/// 策略 + okx 交易所
pub async fn seed_strategy(ledger: &InMemoryLedger) {
    ledger.add_strategy(strategy(STRATEGY_ID)).await;
    ledger.add_exchange(okx_exchange()).await;
}

/// bot 及其账户
pub async fn seed_bot(ledger: &InMemoryLedger, bot: BotEntity) {
    ledger
        .add_account(account(bot.exchange_account_id, OKX_EXCHANGE_ID))
        .await;
    ledger.add_bot(bot).await;
}

pub fn user_trade(bot: &BotEntity, side: PositionSide, status: UserTradeStatus) -> UserTradeEntity {
    let now = time_util::now();
    UserTradeEntity {
        id: None,
        user_id: bot.user_id,
        strategy_trade_id: None,
        exchange_account_id: bot.exchange_account_id,
        bot_id: bot.id,
        exchange_symbol: bot.exchange_symbol.clone(),
        position_side: side,
        quantity: 2.0,
        leverage: bot.leverage,
        entry_price: 100.0,
        opened_at: None,
        status,
        exit_price: None,
        closed_at: None,
        realized_pnl: None,
        realized_pnl_pct: None,
        created_at: Some(now.clone()),
        updated_at: Some(now),
    }
}

pub fn order_row(
    user_trade_id: i64,
    exchange_order_id: &str,
    kind: OrderKind,
    price: f64,
) -> UserTradeOrderEntity {
    UserTradeOrderEntity {
        id: None,
        user_trade_id,
        exchange_order_id: exchange_order_id.to_string(),
        order_type: kind,
        price,
        requested_qty: Some(2.0),
        filled_qty: 0.0,
        status: "NEW".to_string(),
        raw_response: "{}".to_string(),
        created_at: None,
        updated_at: None,
    }
}

pub fn fetched(status: &str, filled: Option<f64>, average: Option<f64>, price: Option<f64>) -> FetchedOrder {
    FetchedOrder {
        status: Some(status.to_string()),
        filled,
        amount: Some(2.0),
        average,
        price,
        raw: json!({"state": status}),
    }
}
