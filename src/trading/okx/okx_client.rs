use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use crate::error::AppError;
use crate::trading::model::ApiCredentials;

const OKX_BASE_URL: &str = "https://www.okx.com";

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    msg: String,
    code: String,
}

/// okx rest 客户端，一个交易所账户一个实例
#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    credentials: Option<ApiCredentials>,
    base_url: String,
    /// 模拟盘
    simulated: bool,
}

impl OkxClient {
    /// 带账户凭证的私有接口客户端
    pub fn new(credentials: ApiCredentials, timeout: Duration) -> Result<Self, AppError> {
        Ok(OkxClient {
            client: build_http_client(timeout)?,
            credentials: Some(credentials),
            base_url: OKX_BASE_URL.to_string(),
            simulated: false,
        })
    }

    /// 只访问公共行情接口
    pub fn public(timeout: Duration) -> Result<Self, AppError> {
        Ok(OkxClient {
            client: build_http_client(timeout)?,
            credentials: None,
            base_url: OKX_BASE_URL.to_string(),
            simulated: false,
        })
    }

    pub fn set_simulated(&mut self, simulated: bool) {
        self.simulated = simulated;
    }

    pub(crate) fn generate_signature(
        secret: &str,
        timestamp: &str,
        method: &Method,
        path: &str,
        body: &str,
    ) -> Result<String, AppError> {
        let sign_payload = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut hmac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Config(format!("okx secret 无效: {}", e)))?;
        hmac.update(sign_payload.as_bytes());
        Ok(STANDARD.encode(hmac.finalize().into_bytes()))
    }

    /// 签名请求
    pub(crate) async fn send_request<T: for<'a> Deserialize<'a>>(
        &self,
        method: Method,
        path: &str,
        body: &str,
    ) -> Result<T, AppError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| AppError::Config("okx 私有接口缺少 api 凭证".to_string()))?;

        let timestamp = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S.%3fZ")
            .to_string();
        let signature =
            Self::generate_signature(&credentials.secret_key, &timestamp, &method, path, body)?;

        let url = format!("{}{}", self.base_url, path);
        let mut request_builder = self
            .client
            .request(method, &url)
            .header("OK-ACCESS-KEY", &credentials.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header(
                "OK-ACCESS-PASSPHRASE",
                credentials.passphrase.clone().unwrap_or_default(),
            )
            .header("Content-Type", "application/json");
        if !body.is_empty() {
            request_builder = request_builder.body(body.to_string());
        }
        //设置是否是模拟盘
        if self.simulated {
            request_builder = request_builder.header("x-simulated-trading", "1");
        }

        let response = request_builder.send().await?;
        Self::parse_response(path, response).await
    }

    /// 公共接口，无需签名
    pub(crate) async fn send_public_request<T: for<'a> Deserialize<'a>>(
        &self,
        path: &str,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request_builder = self.client.get(&url);
        if self.simulated {
            request_builder = request_builder.header("x-simulated-trading", "1");
        }
        let response = request_builder.send().await?;
        Self::parse_response(path, response).await
    }

    async fn parse_response<T: for<'a> Deserialize<'a>>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status_code = response.status();
        let response_body = response.text().await?;
        info!("path:{},okx_response: {}", path, response_body);

        if status_code == StatusCode::OK {
            let result: T = serde_json::from_str(&response_body).map_err(|e| {
                AppError::Exchange(format!("okx 响应解析失败: {}, body:{}", e, response_body))
            })?;
            Ok(result)
        } else {
            match serde_json::from_str::<ErrorResponse>(&response_body) {
                Ok(error) => Err(AppError::Exchange(format!(
                    "请求失败: http {} code:{} msg:{}",
                    status_code, error.code, error.msg
                ))),
                Err(_) => {
                    debug!("okx 非 json 错误响应: {}", response_body);
                    Err(AppError::Exchange(format!("请求失败: http {}", status_code)))
                }
            }
        }
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Config(format!("http client 创建失败: {}", e)))
}
