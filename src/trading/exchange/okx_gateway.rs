use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ExchangeGateway, FetchedOrder, OrderRequest, OrderType, PlacedOrder};
use crate::error::{AppError, AppResult};
use crate::trading::model::ApiCredentials;
use crate::trading::okx::account::{Account, SetLeverageRequest};
use crate::trading::okx::market::Market;
use crate::trading::okx::public_data::{InstrumentData, PublicData};
use crate::trading::okx::trade::{OkxTrade, OrdType, OrderDetail, OrderRequest as OkxOrderRequest};
use crate::trading::okx::{parse_num, OkxClient};
use crate::trading::order::TradeSide;

/// okx 网关
pub struct OkxGateway {
    client: OkxClient,
    /// 产品精度缓存，按 instId
    instruments: Mutex<HashMap<String, InstrumentSpec>>,
}

impl OkxGateway {
    pub fn new(credentials: ApiCredentials, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: OkxClient::new(credentials, timeout)?,
            instruments: Mutex::new(HashMap::new()),
        })
    }

    pub fn public(timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: OkxClient::public(timeout)?,
            instruments: Mutex::new(HashMap::new()),
        })
    }

    async fn instrument(&self, symbol: &str) -> AppResult<InstrumentSpec> {
        let mut cache = self.instruments.lock().await;
        if let Some(spec) = cache.get(symbol) {
            return Ok(spec.clone());
        }
        let data = PublicData::new(&self.client).get_instrument(symbol).await?;
        let spec = InstrumentSpec::from_data(&data)?;
        debug!("okx 产品精度 {}: {:?}", symbol, spec);
        cache.insert(symbol.to_string(), spec.clone());
        Ok(spec)
    }
}

/// 产品精度：合约的 sz 是张数，币币的 sz 是币数量
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InstrumentSpec {
    /// 合约面值（一张对应的币数量），币币为 None
    ct_val: Option<f64>,
    lot_sz: f64,
    min_sz: f64,
    tick_sz: f64,
    lot_decimals: usize,
    tick_decimals: usize,
}

const STEP_EPSILON: f64 = 1e-9;

fn decimals_of(step: &str) -> usize {
    step.trim()
        .split_once('.')
        .map(|(_, frac)| frac.trim_end_matches('0').len())
        .unwrap_or(0)
}

fn parse_step(name: &str, value: &str) -> AppResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| *v > 0.0)
        .ok_or_else(|| AppError::Exchange(format!("产品精度 {} 无效: {:?}", name, value)))
}

impl InstrumentSpec {
    pub(crate) fn from_data(data: &InstrumentData) -> AppResult<Self> {
        let ct_val = if data.inst_type == "SPOT" || data.inst_type == "MARGIN" {
            None
        } else {
            Some(parse_step("ctVal", &data.ct_val)?)
        };
        Ok(Self {
            ct_val,
            lot_sz: parse_step("lotSz", &data.lot_sz)?,
            min_sz: parse_step("minSz", &data.min_sz)?,
            tick_sz: parse_step("tickSz", &data.tick_sz)?,
            lot_decimals: decimals_of(&data.lot_sz),
            tick_decimals: decimals_of(&data.tick_sz),
        })
    }

    /// 币数量转成委托数量，按 lotSz 向下取整
    pub(crate) fn format_size(&self, base_amount: f64) -> AppResult<String> {
        let units = match self.ct_val {
            Some(ct_val) => base_amount / ct_val,
            None => base_amount,
        };
        let steps = (units / self.lot_sz + STEP_EPSILON).floor();
        let sz = steps * self.lot_sz;
        if sz + STEP_EPSILON < self.min_sz {
            return Err(AppError::Exchange(format!(
                "下单数量 {} 小于最小委托量 {}",
                base_amount, self.min_sz
            )));
        }
        Ok(format!("{:.*}", self.lot_decimals, sz))
    }

    /// 价格按 tickSz 取最近值
    pub(crate) fn format_price(&self, price: f64) -> String {
        let px = (price / self.tick_sz).round() * self.tick_sz;
        format!("{:.*}", self.tick_decimals, px)
    }

    /// 交易所返回的委托数量换回币数量
    pub(crate) fn to_base(&self, size: f64) -> f64 {
        match self.ct_val {
            Some(ct_val) => size * ct_val,
            None => size,
        }
    }
}

/// okx 订单状态转成统一状态（小写），对账时再转大写
pub(crate) fn normalize_okx_state(state: &str) -> &'static str {
    match state {
        "live" | "partially_filled" => "open",
        "filled" => "closed",
        "canceled" | "mmp_canceled" => "canceled",
        _ => "unknown",
    }
}

pub(crate) fn to_okx_order(
    request: &OrderRequest,
    spec: &InstrumentSpec,
) -> AppResult<OkxOrderRequest> {
    let ord_type = match request.order_type {
        OrderType::Limit => OrdType::LIMIT,
    };
    let price = request
        .price
        .ok_or_else(|| AppError::Exchange("限价单缺少价格".to_string()))?;
    Ok(OkxOrderRequest {
        inst_id: request.symbol.clone(),
        td_mode: request.margin_mode.to_string(),
        cl_ord_id: None,
        tag: None,
        side: request.side.to_string(),
        pos_side: request
            .position_side
            .map(|side| side.as_str().to_lowercase()),
        ord_type: ord_type.to_string(),
        sz: spec.format_size(request.amount)?,
        px: Some(spec.format_price(price)),
        reduce_only: match (request.trade_side, request.position_side) {
            // 买卖模式下平仓只减仓；双向持仓由 posSide 区分
            (TradeSide::Close, None) => Some(true),
            _ => None,
        },
    })
}

fn to_fetched_order(detail: &OrderDetail, spec: &InstrumentSpec, raw: Value) -> FetchedOrder {
    FetchedOrder {
        status: Some(normalize_okx_state(&detail.state).to_string()),
        filled: parse_num(&detail.acc_fill_sz).map(|v| spec.to_base(v)),
        amount: parse_num(&detail.sz).map(|v| spec.to_base(v)),
        average: parse_num(&detail.avg_px).filter(|p| *p > 0.0),
        price: parse_num(&detail.px).filter(|p| *p > 0.0),
        raw,
    }
}

#[async_trait]
impl ExchangeGateway for OkxGateway {
    fn exchange_code(&self) -> &str {
        "okx"
    }

    fn set_sandbox_mode(&mut self, enabled: bool) {
        self.client.set_simulated(enabled);
    }

    async fn set_leverage(
        &self,
        leverage: i64,
        symbol: &str,
        margin_mode: crate::trading::order::MarginMode,
    ) -> AppResult<()> {
        let params = SetLeverageRequest {
            inst_id: Some(symbol.to_string()),
            ccy: None,
            lever: leverage.to_string(),
            mgn_mode: margin_mode.to_string(),
            pos_side: None,
        };
        let data = Account::new(&self.client).set_leverage(&params).await?;
        debug!("okx set_leverage ok: {:?}", data);
        Ok(())
    }

    async fn place_order(&self, request: &OrderRequest) -> AppResult<PlacedOrder> {
        let spec = self.instrument(&request.symbol).await?;
        let params = to_okx_order(request, &spec)?;
        let data = OkxTrade::new(&self.client).order(&params).await?;
        if data.s_code != "0" && !data.s_code.is_empty() {
            return Err(AppError::Exchange(format!(
                "下单失败 sCode:{} sMsg:{}",
                data.s_code,
                data.s_msg.clone().unwrap_or_default()
            )));
        }
        let info = serde_json::to_value(&data)?;
        Ok(PlacedOrder {
            id: Some(data.ord_id.clone()),
            order_id: None,
            // 下单接口不返回订单状态
            status: None,
            filled: None,
            info,
        })
    }

    async fn fetch_order(&self, order_id: &str, symbol: &str) -> AppResult<FetchedOrder> {
        let spec = self.instrument(symbol).await?;
        let detail = OkxTrade::new(&self.client).get_order(symbol, order_id).await?;
        let raw = serde_json::to_value(&detail).unwrap_or_else(|_| json!({}));
        Ok(to_fetched_order(&detail, &spec, raw))
    }

    async fn fetch_last_price(&self, symbol: &str) -> AppResult<f64> {
        let ticker = Market::new(&self.client).get_ticker(symbol).await?;
        ticker
            .last
            .trim()
            .parse::<f64>()
            .map_err(|e| AppError::Exchange(format!("行情价格解析失败 {}: {}", ticker.last, e)))
    }
}
