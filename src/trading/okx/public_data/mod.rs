use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::trading::okx::{OkxApiResponse, OkxClient};

/// 交易产品基础信息
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentData {
    pub inst_type: String,
    pub inst_id: String,
    /// 合约面值，币币为空串
    #[serde(default)]
    pub ct_val: String,
    #[serde(default)]
    pub ct_val_ccy: String,
    /// 下单数量精度
    pub lot_sz: String,
    /// 最小下单数量
    pub min_sz: String,
    /// 下单价格精度
    pub tick_sz: String,
}

pub type InstrumentsResponse = OkxApiResponse<Vec<InstrumentData>>;

pub struct PublicData<'a> {
    client: &'a OkxClient,
}

/// 由产品ID推断产品类型：BTC-USDT-SWAP 为永续，BTC-USDT 为币币，其余为交割
pub fn inst_type_of(inst_id: &str) -> &'static str {
    if inst_id.ends_with("-SWAP") {
        "SWAP"
    } else if inst_id.split('-').count() == 2 {
        "SPOT"
    } else {
        "FUTURES"
    }
}

impl<'a> PublicData<'a> {
    pub fn new(client: &'a OkxClient) -> Self {
        PublicData { client }
    }

    /**
    获取交易产品基础信息
    inst_id 产品ID，产品类型由 inst_id 推断
     **/
    pub async fn get_instrument(&self, inst_id: &str) -> Result<InstrumentData, AppError> {
        let path = format!(
            "/api/v5/public/instruments?instType={}&instId={}",
            inst_type_of(inst_id),
            inst_id
        );
        let res: InstrumentsResponse = self.client.send_public_request(&path).await?;
        res.into_data()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Exchange(format!("没有产品信息: {}", inst_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inst_type_of() {
        assert_eq!(inst_type_of("BTC-USDT-SWAP"), "SWAP");
        assert_eq!(inst_type_of("BTC-USDT"), "SPOT");
        assert_eq!(inst_type_of("BTC-USD-250328"), "FUTURES");
    }

    #[test]
    fn test_parse_instrument() {
        let raw = r#"{"code":"0","msg":"","data":[{"instType":"SWAP","instId":"BTC-USDT-SWAP",
            "ctVal":"0.01","ctValCcy":"BTC","lotSz":"0.01","minSz":"0.01","tickSz":"0.1",
            "state":"live","settleCcy":"USDT"}]}"#;
        let res: InstrumentsResponse = serde_json::from_str(raw).unwrap();
        let data = res.into_data().unwrap();
        assert_eq!(data[0].ct_val, "0.01");
        assert_eq!(data[0].tick_sz, "0.1");
    }
}
