use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub mod account;
pub mod market;
pub mod okx_client;
pub mod public_data;
pub mod trade;

pub use okx_client::OkxClient;

// 通用的响应结构体
#[derive(Serialize, Deserialize, Debug)]
pub struct OkxApiResponse<T> {
    pub code: String,
    pub msg: String,
    pub data: T,
}

impl<T> OkxApiResponse<T> {
    /// okx 在 http 200 时也可能返回业务错误，code 不为 "0" 即失败
    pub fn into_data(self) -> Result<T, AppError> {
        if self.code != "0" {
            return Err(AppError::Exchange(format!(
                "okx code:{} msg:{}",
                self.code, self.msg
            )));
        }
        Ok(self.data)
    }
}

/// 解析 okx 的数字字符串，空串视为 None
pub(crate) fn parse_num(s: &Option<String>) -> Option<f64> {
    s.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_error_code() {
        let res: OkxApiResponse<Vec<String>> = OkxApiResponse {
            code: "51000".to_string(),
            msg: "Parameter error".to_string(),
            data: vec![],
        };
        let err = res.into_data().unwrap_err();
        assert!(err.is_exchange());
    }

    #[test]
    fn test_parse_num() {
        assert_eq!(parse_num(&Some("1.5".to_string())), Some(1.5));
        assert_eq!(parse_num(&Some("".to_string())), None);
        assert_eq!(parse_num(&None), None);
    }
}
