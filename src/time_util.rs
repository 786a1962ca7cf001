use chrono::{FixedOffset, Utc};
use rbatis::rbdc::DateTime;

/// 数据库时间戳（写入 created_at / opened_at 等字段）
pub fn now() -> DateTime {
    DateTime::now()
}

/// 当前毫秒时间戳
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 东八区时间字符串，用于日志和订单标签
pub fn now_str_utc8() -> String {
    let now = Utc::now();
    match FixedOffset::east_opt(8 * 3600) {
        Some(offset) => now.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => now.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
