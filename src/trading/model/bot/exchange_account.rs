use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 交易所账户（只读），params 字段是 json 格式的 api 凭证
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct ExchangeAccountEntity {
    pub id: i64,
    pub user_id: i64,
    pub exchange_id: i64,
    pub params: String,
}

/// 交易所
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct ExchangeEntity {
    pub id: i64,
    /// 交易所代码：okx, binance, bitget ...
    pub code: String,
    pub name: Option<String>,
}

/// api 凭证
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ApiCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

fn mask(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}***{}", head, tail)
}

impl ExchangeAccountEntity {
    pub fn credentials(&self) -> Result<ApiCredentials, AppError> {
        serde_json::from_str(&self.params).map_err(|e| {
            AppError::Config(format!("exchange_account {} params 解析失败: {}", self.id, e))
        })
    }
}

crud!(ExchangeAccountEntity {}, "exchange_accounts");
impl_select!(ExchangeAccountEntity{select_one_by_id(id: i64) => "`where id = #{id} limit 1`"}, "exchange_accounts");

crud!(ExchangeEntity {}, "exchanges");
impl_select!(ExchangeEntity{select_one_by_id(id: i64) => "`where id = #{id} limit 1`"}, "exchanges");
