//! # Xspand管理模块
//!
//! 运维相关的公共能力：
//! - 配置管理：默认值、TOML 文件与环境变量分层加载并校验
//! - 日志初始化：`tracing-subscriber`，支持 pretty / json 输出
//! - 监控指标：Prometheus 计数器与文本导出

pub mod config;
pub mod logging;
pub mod monitoring;

pub use config::{
    AuthBackend, AuthConfig, ClassifierConfig, ConfigValidator, DatabaseConfig, LogFormat, LoggingConfig,
    ServerConfig, StoreBackend, XspandConfig,
};
pub use logging::init_logging;
pub use monitoring::ServiceMetrics;
