//! 错误类型 - 区分可重试的瞬时故障和需要人工处理的故障

use thiserror::Error;

/// 中继过程中的错误
///
/// 调度器只依赖 [`RelayError::is_transient`] 决定日志级别，
/// 任何错误都只会中止当前轮次，不会让调度器退出。
#[derive(Debug, Error)]
pub enum RelayError {
    /// 网络错误、超时、限流、5xx
    #[error("{service} transient failure: {message}")]
    Transient { service: String, message: String },

    /// 凭据无效或权限不足
    #[error("{service} authentication failed: {message}")]
    Auth { service: String, message: String },

    /// 服务端明确拒绝（4xx，非认证类）
    #[error("{service} rejected request ({status}): {message}")]
    Rejected {
        service: String,
        status: u16,
        message: String,
    },

    /// 响应无法解析
    #[error("{service} returned an undecodable response: {message}")]
    Decode { service: String, message: String },

    /// 配置缺失或无效
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn transient(service: &str, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn auth(service: &str, message: impl Into<String>) -> Self {
        Self::Auth {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(service: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// 是否属于下一轮自然重试即可恢复的故障
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// 根据 HTTP 状态码归类
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body.chars().take(200).collect()
        };

        match status.as_u16() {
            401 | 403 => Self::auth(service, message),
            408 | 429 => Self::transient(service, message),
            code if code >= 500 => Self::transient(service, message),
            code => Self::Rejected {
                service: service.to_string(),
                status: code,
                message,
            },
        }
    }

    /// 归类 reqwest 传输层错误
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::decode(service, err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(service, status, "");
        }
        // 超时、连接失败、请求中断都按瞬时故障处理
        Self::transient(service, err.to_string())
    }
}
