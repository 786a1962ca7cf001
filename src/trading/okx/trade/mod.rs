use std::fmt::{Display, Formatter};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AppError;
use crate::trading::okx::{OkxApiResponse, OkxClient};

pub enum OrdType {
    /// 限价单
    LIMIT,
}

impl Display for OrdType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrdType::LIMIT => write!(f, "limit"),
        }
    }
}

/// 下单请求
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// 产品ID，如 BTC-USDT-SWAP
    pub inst_id: String,
    /// 交易模式 isolated：逐仓 ；cross：全仓
    pub td_mode: String,
    /// 客户自定义订单ID，字母数字 1-32 位
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
    /// 订单标签，字母数字 1-16 位
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// buy：买， sell：卖
    pub side: String,
    /// 开平仓模式下必填 long / short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<String>,
    pub ord_type: String,
    /// 委托数量
    pub sz: String,
    /// 委托价格，仅限价单
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
}

/// 下单响应数据
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponseData {
    /// 订单ID
    #[serde(default)]
    pub ord_id: String,
    pub cl_ord_id: Option<String>,
    pub tag: Option<String>,
    pub ts: Option<String>,
    /// 事件执行结果的code，0代表成功
    #[serde(default)]
    pub s_code: String,
    pub s_msg: Option<String>,
}

/// 订单详情
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub inst_id: String,
    pub ord_id: String,
    pub cl_ord_id: Option<String>,
    /// 委托价格
    pub px: Option<String>,
    /// 委托数量
    pub sz: Option<String>,
    /// 累计成交数量
    pub acc_fill_sz: Option<String>,
    /// 成交均价
    pub avg_px: Option<String>,
    /// live / partially_filled / filled / canceled / mmp_canceled
    pub state: String,
    pub side: Option<String>,
    pub pos_side: Option<String>,
}

pub struct OkxTrade<'a> {
    client: &'a OkxClient,
}

impl<'a> OkxTrade<'a> {
    pub fn new(client: &'a OkxClient) -> Self {
        OkxTrade { client }
    }

    ///下单
    pub async fn order(&self, params: &OrderRequest) -> Result<OrderResponseData, AppError> {
        let path = "/api/v5/trade/order";
        let body = serde_json::to_string(params)?;
        debug!("send place order okx_request params:{}", body);
        let res: OkxApiResponse<Vec<OrderResponseData>> =
            self.client.send_request(Method::POST, path, &body).await?;
        if res.code != "0" {
            error!(
                "okx请求成功，但是操作失败，code:{},msg:{},data:{:?}",
                res.code, res.msg, res.data
            );
            let detail = res
                .data
                .first()
                .map(|d| format!(" sCode:{} sMsg:{}", d.s_code, d.s_msg.clone().unwrap_or_default()))
                .unwrap_or_default();
            return Err(AppError::Exchange(format!(
                "下单失败 code:{} msg:{}{}",
                res.code, res.msg, detail
            )));
        }
        res.data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Exchange("下单响应 data 为空".to_string()))
    }

    /// 查询订单
    pub async fn get_order(&self, inst_id: &str, ord_id: &str) -> Result<OrderDetail, AppError> {
        let path = format!("/api/v5/trade/order?instId={}&ordId={}", inst_id, ord_id);
        let res: OkxApiResponse<Vec<OrderDetail>> =
            self.client.send_request(Method::GET, &path, "").await?;
        res.into_data()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Exchange(format!("订单不存在: {}", ord_id)))
    }
}
