use reqwest::StatusCode;
use thiserror::Error;

/// 本地持久化失败
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt record under '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// 网关调用失败
///
/// `Network` 和 `Timeout` 视为断网，走离线流程；其余为终止性错误，直接交给调用方。
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("request rejected ({status}): {message}")]
    Client { status: StatusCode, message: String },

    #[error("server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout)
    }

    /// 服务器明确拒绝了请求，重试也不会成功
    pub fn is_rejection(&self) -> bool {
        matches!(self, GatewayError::Client { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout
        } else if error.is_connect() || error.is_request() {
            GatewayError::Network(error.to_string())
        } else if error.is_decode() || error.is_body() {
            GatewayError::Decode(error.to_string())
        } else {
            GatewayError::Network(error.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot perform authentication while offline.")]
    AuthOffline,

    #[error("{method} {endpoint} cannot be queued for sync")]
    NotQueueable { endpoint: String, method: String },

    #[error("local storage unavailable: {0}")]
    Persistence(#[from] StoreError),

    #[error("offline and no cached response for {0}")]
    OfflineNoCache(String),

    #[error("queued request #{seq} was rejected ({error}), discard it before syncing more")]
    Rejected { seq: u64, error: GatewayError },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
