use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::trading::okx::{OkxApiResponse, OkxClient};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TickersData {
    pub inst_type: String,
    pub inst_id: String,
    pub last: String,
    pub last_sz: Option<String>,
    pub ask_px: Option<String>,
    pub bid_px: Option<String>,
    pub ts: String,
}

pub type TickersResponse = OkxApiResponse<Vec<TickersData>>;

pub struct Market<'a> {
    client: &'a OkxClient,
}

impl<'a> Market<'a> {
    pub fn new(client: &'a OkxClient) -> Self {
        Market { client }
    }

    /// 获取单个产品行情
    pub async fn get_ticker(&self, inst_id: &str) -> Result<TickersData, AppError> {
        let path = format!("/api/v5/market/ticker?instId={}", inst_id);
        let res: TickersResponse = self.client.send_public_request(&path).await?;
        res.into_data()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Exchange(format!("没有行情数据: {}", inst_id)))
    }
}
