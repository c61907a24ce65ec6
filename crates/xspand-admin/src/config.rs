//! 配置管理
//!
//! 加载顺序：内置默认值 → 可选的 TOML 文件 → `XSPAND__SECTION__KEY` 环境变量。
//! 加载后统一校验。

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// 系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct XspandConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 文档存储配置
    pub database: DatabaseConfig,
    /// 身份认证服务配置
    pub auth: AuthConfig,
    /// 影像分类配置
    pub classifier: ClassifierConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 文档存储后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// 文档存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// 连接字符串，PostgreSQL 后端必填
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// 最大连接数
    pub max_connections: u32,
}

/// 身份认证服务后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthBackend {
    Memory,
    IdentityToolkit,
}

/// 身份认证服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub provider: AuthBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// 删除账户时使用的服务账号令牌
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    pub timeout_secs: u64,
}

/// 影像分类配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// 模型文件路径，未配置时不启用分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    /// 模型输入张量名
    pub input_name: String,
    /// 模型输出类别数
    pub class_count: usize,
    pub image_width: u32,
    pub image_height: u32,
    /// 多标签阈值
    pub confidence_threshold: f32,
    /// 下载影像超时
    pub fetch_timeout_secs: u64,
    /// 单张影像的最大字节数
    pub max_image_bytes: u64,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令，`RUST_LOG` 优先
    pub level: String,
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            connection_string: None,
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: AuthBackend::Memory,
            endpoint: None,
            api_key: None,
            service_token: None,
            timeout_secs: 10,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_name: "input".to_string(),
            class_count: 13,
            image_width: 128,
            image_height: 128,
            confidence_threshold: 0.5,
            fetch_timeout_secs: 30,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl XspandConfig {
    /// 加载配置，`path` 为空时只使用默认值和环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&XspandConfig::default()).context("Failed to build default configuration")?,
        );

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("XSPAND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: XspandConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        ConfigValidator::new().validate(&config)?;

        match path {
            Some(path) => info!("Configuration loaded successfully from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 以 TOML 输出当前配置
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// 配置验证规则
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&XspandConfig) -> std::result::Result<(), String>,
}

/// 配置验证器
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| match config.server.port {
                    0 => Err("port must be non-zero".to_string()),
                    _ => Ok(()),
                },
            },
            ValidationRule {
                field_path: "database.connection_string",
                validator: |config| match (&config.database.backend, &config.database.connection_string) {
                    (StoreBackend::Postgres, None) => {
                        Err("connection_string is required for the postgres backend".to_string())
                    }
                    _ => Ok(()),
                },
            },
            ValidationRule {
                field_path: "database.max_connections",
                validator: |config| match config.database.max_connections {
                    0 => Err("max_connections must be at least 1".to_string()),
                    _ => Ok(()),
                },
            },
            ValidationRule {
                field_path: "auth.endpoint",
                validator: |config| {
                    let auth = &config.auth;
                    if auth.provider == AuthBackend::IdentityToolkit
                        && (auth.endpoint.is_none() || auth.api_key.is_none())
                    {
                        return Err("endpoint and api_key are required for identity_toolkit".to_string());
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "classifier.confidence_threshold",
                validator: |config| {
                    let threshold = config.classifier.confidence_threshold;
                    if threshold > 0.0 && threshold <= 1.0 {
                        Ok(())
                    } else {
                        Err(format!("threshold must be in (0, 1], got {}", threshold))
                    }
                },
            },
            ValidationRule {
                field_path: "classifier.image_width",
                validator: |config| {
                    let classifier = &config.classifier;
                    if classifier.image_width == 0 || classifier.image_height == 0 || classifier.class_count == 0 {
                        return Err("resolution and class_count must be non-zero".to_string());
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "classifier.max_image_bytes",
                validator: |config| match config.classifier.max_image_bytes {
                    0 => Err("max_image_bytes must be non-zero".to_string()),
                    _ => Ok(()),
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &XspandConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("invalid {}: {}", rule.field_path, e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = XspandConfig::default();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.classifier.image_width, 128);
    }

    #[test]
    fn test_postgres_requires_connection_string() {
        let mut config = XspandConfig::default();
        config.database.backend = StoreBackend::Postgres;
        assert!(ConfigValidator::new().validate(&config).is_err());

        config.database.connection_string = Some("postgres://localhost/xspand".to_string());
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = XspandConfig::default();
        config.classifier.confidence_threshold = 0.0;
        assert!(ConfigValidator::new().validate(&config).is_err());

        config.classifier.confidence_threshold = 1.0;
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_image_size_limit_must_be_positive() {
        let mut config = XspandConfig::default();
        assert_eq!(config.classifier.max_image_bytes, 20 * 1024 * 1024);

        config.classifier.max_image_bytes = 0;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("xspand-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = XspandConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.database.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_toml_dump_round_trips() {
        let config = XspandConfig::default();
        let dumped = config.to_toml().unwrap();
        assert!(dumped.contains("[classifier]"));

        let parsed: XspandConfig = toml::from_str(&dumped).unwrap();
        assert_eq!(parsed, config);
    }
}
