use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::trading::okx::{OkxApiResponse, OkxClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccy: Option<String>,
    pub lever: String,
    pub mgn_mode: String,
    /// 逐仓开平仓模式下需要指定 long / short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageData {
    pub lever: String,
    pub mgn_mode: String,
    pub inst_id: String,
    #[serde(default)]
    pub pos_side: String,
}

pub struct Account<'a> {
    client: &'a OkxClient,
}

impl<'a> Account<'a> {
    pub fn new(client: &'a OkxClient) -> Self {
        Account { client }
    }

    /// 设置杠杆倍数
    pub async fn set_leverage(&self, params: &SetLeverageRequest) -> Result<SetLeverageData, AppError> {
        let path = "/api/v5/account/set-leverage";
        let body = serde_json::to_string(params)?;
        info!("send set_leverage okx_request params:{}", body);
        let res: OkxApiResponse<Vec<SetLeverageData>> =
            self.client.send_request(Method::POST, path, &body).await?;
        res.into_data()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Exchange("设置杠杆响应 data 为空".to_string()))
    }
}
