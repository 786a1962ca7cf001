use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 持仓方向
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

impl Display for PositionSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            other => Err(AppError::UnsupportedAction(format!("未知持仓方向: {}", other))),
        }
    }
}

/// 策略主控单状态
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyTradeStatus {
    Open,
    Closed,
}

/// 用户仓位状态
///
/// PENDING → OPEN 由对账推进；OPEN → CLOSING 由平仓下单推进；CLOSING → CLOSED 由对账推进
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserTradeStatus {
    Pending,
    Open,
    Closing,
    Closed,
}

impl UserTradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTradeStatus::Pending => "PENDING",
            UserTradeStatus::Open => "OPEN",
            UserTradeStatus::Closing => "CLOSING",
            UserTradeStatus::Closed => "CLOSED",
        }
    }
}

impl Display for UserTradeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 订单记录类型：开仓单 / 平仓单
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Open,
    Close,
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Open => write!(f, "OPEN"),
            OrderKind::Close => write!(f, "CLOSE"),
        }
    }
}
