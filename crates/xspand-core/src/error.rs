//! 错误定义模块

use thiserror::Error;

/// 系统统一错误类型
#[derive(Error, Debug)]
pub enum XspandError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("外部服务错误: {0}")]
    ExternalService(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("影像分类错误: {0}")]
    Classification(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl XspandError {
    /// 是否为资源缺失错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, XspandError::NotFound(_))
    }
}

/// 系统统一结果类型
pub type Result<T> = std::result::Result<T, XspandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(XspandError::NotFound("patient p1".to_string()).is_not_found());
        assert!(!XspandError::Validation("bad email".to_string()).is_not_found());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: XspandError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, XspandError::Serialization(_)));
    }
}
