use thiserror::Error;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 交易所拒绝请求或网络失败（设置杠杆、下单、查单）
    #[error("交易所错误: {0}")]
    Exchange(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Db(String),

    /// 任务队列错误
    #[error("任务队列错误: {0}")]
    Queue(String),

    /// 数据不存在（策略、bot、账户、持仓、订单记录）
    #[error("数据不存在: {0}")]
    NotFound(String),

    /// 无法识别的信号动作
    #[error("不支持的信号动作: {0}")]
    UnsupportedAction(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn is_exchange(&self) -> bool {
        matches!(self, AppError::Exchange(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// 把任何错误转换为Error类型的结果
pub fn to_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> AppError {
    AppError::Unknown(err.to_string())
}

impl From<rbatis::Error> for AppError {
    fn from(err: rbatis::Error) -> Self {
        AppError::Db(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Queue(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Exchange(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Unknown(format!("序列化失败: {}", err))
    }
}
