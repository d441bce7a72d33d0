use thiserror::Error;

use crate::cache::StoreError;

/// 限流错误的机器可读类型
pub const TOO_MANY_REQUESTS: &str = "TOO_MANY_REQUESTS";

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// 请求被限流，等待后可恢复
    #[error("{message}")]
    Exceeded {
        message: String,
        retry_after_minutes: Option<u64>,
    },
    #[error("rate limit store not configured")]
    StoreNotConfigured,
    #[error("rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("failed to encode rate limit record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RateLimitError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Exceeded { .. } => TOO_MANY_REQUESTS,
            Self::StoreNotConfigured | Self::StoreUnavailable(_) | Self::Encode(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }
}
