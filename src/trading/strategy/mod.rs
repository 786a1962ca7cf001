//! 策略信号
//!
//! 信号生成器返回 `RawSignal`（动作是字符串），编排器通过 `SignalAction::parse`
//! 转成封闭的动作枚举；无法识别的动作在派发前就被拒绝。

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::trading::model::{PositionSide, StrategyEntity};

pub mod breakout_strategy;

pub use breakout_strategy::BreakoutStrategy;

/// 平仓原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// 策略信号平仓
    Signal,
    /// 止盈
    TakeProfit,
    /// 止损
    StopLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Open,
    Close(CloseReason),
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Open => "OPEN",
            SignalAction::Close(CloseReason::Signal) => "CLOSE",
            SignalAction::Close(CloseReason::TakeProfit) => "TP_CLOSE",
            SignalAction::Close(CloseReason::StopLoss) => "SL_CLOSE",
        }
    }
}

impl Display for SignalAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignalAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(SignalAction::Open),
            "CLOSE" => Ok(SignalAction::Close(CloseReason::Signal)),
            "TP_CLOSE" => Ok(SignalAction::Close(CloseReason::TakeProfit)),
            "SL_CLOSE" => Ok(SignalAction::Close(CloseReason::StopLoss)),
            other => Err(AppError::UnsupportedAction(other.to_string())),
        }
    }
}

/// 信号生成器的原始输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub action: String,
    pub position_side: PositionSide,
    pub price: f64,
}

/// 派发给 bot 的信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: SignalAction,
    pub position_side: PositionSide,
    /// 参考价格，开平仓都按这个价格挂限价单
    pub price: f64,
    /// 对应的策略主控单
    pub strategy_trade_id: Option<i64>,
}

impl Signal {
    pub fn from_raw(raw: &RawSignal) -> AppResult<Self> {
        Ok(Self {
            action: raw.action.parse()?,
            position_side: raw.position_side,
            price: raw.price,
            strategy_trade_id: None,
        })
    }
}

#[async_trait]
pub trait SignalGenerator: Send + Sync {
    /// 没有可执行的信号时返回 None
    async fn generate(&self, strategy: &StrategyEntity) -> AppResult<Option<RawSignal>>;
}
