//! bot 级别的下单、平仓和对账服务

use std::fmt::{Display, Formatter};

use crate::error::{AppError, AppResult};
use crate::trading::exchange::{connect_account, ExchangeGateway, GatewayFactory};
use crate::trading::ledger::PositionLedger;
use crate::trading::model::{BotEntity, ExchangeAccountEntity, ExchangeEntity};

pub mod close_order_service;
pub mod open_order_service;
pub mod reconcile_service;

pub use close_order_service::CloseOrderService;
pub use open_order_service::OpenOrderService;
pub use reconcile_service::{classify_status, ReconcileOutcome, ReconcileService, StatusClass};

/// 下单成功后返回给派发器，用于安排对账
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedTrade {
    pub user_trade_id: i64,
    pub exchange_order_id: String,
    pub order_status: String,
}

/// 单个 bot 的下单结果
#[derive(Debug)]
pub enum OrderOutcome {
    Placed(PlacedTrade),
    /// 数据缺失或没有可平的仓位，未写库
    Skipped(String),
    /// 交易所或数据库失败
    Failed(AppError),
}

impl OrderOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, OrderOutcome::Placed(_))
    }

    pub fn placed(&self) -> Option<&PlacedTrade> {
        match self {
            OrderOutcome::Placed(trade) => Some(trade),
            _ => None,
        }
    }
}

impl Display for OrderOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderOutcome::Placed(t) => write!(
                f,
                "placed user_trade={} order={} status={}",
                t.user_trade_id, t.exchange_order_id, t.order_status
            ),
            OrderOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            OrderOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// 下单所需的 bot、账户、交易所
pub(crate) struct BotContext {
    pub bot: BotEntity,
    pub account: ExchangeAccountEntity,
    pub exchange: ExchangeEntity,
}

impl BotContext {
    pub fn connect(&self, factory: &dyn GatewayFactory) -> AppResult<Box<dyn ExchangeGateway>> {
        connect_account(factory, &self.exchange, &self.account)
    }
}

/// 任一环节缺失返回 NotFound
pub(crate) async fn load_bot_context(
    ledger: &dyn PositionLedger,
    bot_id: i64,
) -> AppResult<BotContext> {
    let bot = ledger
        .find_bot(bot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bot {}", bot_id)))?;
    let account = ledger
        .find_account(bot.exchange_account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("exchange_account {}", bot.exchange_account_id)))?;
    let exchange = ledger
        .find_exchange(account.exchange_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("exchange {}", account.exchange_id)))?;
    Ok(BotContext {
        bot,
        account,
        exchange,
    })
}

/// NotFound 归为 Skipped，其它错误归为 Failed
pub(crate) fn outcome_from_error(err: AppError) -> OrderOutcome {
    match err {
        AppError::NotFound(what) => OrderOutcome::Skipped(format!("{} 不存在", what)),
        other => OrderOutcome::Failed(other),
    }
}
