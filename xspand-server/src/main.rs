//! Xspand医疗记录服务主程序

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use xspand_admin::{init_logging, AuthBackend, ClassifierConfig, ServiceMetrics, StoreBackend, XspandConfig};
use xspand_classifier::ClassifierAdapter;
use xspand_database::{MemoryDocumentStore, PgDocumentStore, RecordStore};
use xspand_integration::{AuthProvider, IdentityToolkitProvider, MemoryAuthProvider};
use xspand_web::{AppState, WebServer};
use xspand_workflow::WorkflowEngine;

/// 命令行参数，优先级高于配置文件和环境变量
#[derive(Parser, Debug)]
#[command(name = "xspand-server")]
#[command(about = "Xspand 医疗记录后端服务")]
struct Args {
    /// 配置文件路径 (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,

    /// 打印生效的配置后退出
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = XspandConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    info!("Starting Xspand server...");

    let records = build_store(&config).await?;
    let auth = build_auth(&config)?;
    let classifier = build_classifier(&config.classifier)?;

    let engine = Arc::new(WorkflowEngine::new(records, auth, classifier));
    let metrics = ServiceMetrics::new().context("Failed to create metrics registry")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    WebServer::new(addr, AppState::new(engine, metrics)).run().await
}

async fn build_store(config: &XspandConfig) -> Result<RecordStore> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory document store, records are lost on restart");
            Ok(RecordStore::new(Arc::new(MemoryDocumentStore::new())))
        }
        StoreBackend::Postgres => {
            let connection_string = config
                .database
                .connection_string
                .as_deref()
                .context("database.connection_string is required for the postgres backend")?;
            let store = PgDocumentStore::connect(connection_string, config.database.max_connections)
                .await
                .context("Failed to connect to document store")?;
            info!("Connected to PostgreSQL document store");
            Ok(RecordStore::new(Arc::new(store)))
        }
    }
}

fn build_auth(config: &XspandConfig) -> Result<Arc<dyn AuthProvider>> {
    let auth = &config.auth;
    match auth.provider {
        AuthBackend::Memory => {
            warn!("Using in-memory auth provider");
            Ok(Arc::new(MemoryAuthProvider::new()))
        }
        AuthBackend::IdentityToolkit => {
            let endpoint = auth.endpoint.clone().context("auth.endpoint is required")?;
            let api_key = auth.api_key.clone().context("auth.api_key is required")?;
            let provider = IdentityToolkitProvider::new(
                endpoint,
                api_key,
                auth.service_token.clone(),
                Duration::from_secs(auth.timeout_secs),
            )
            .context("Failed to create identity toolkit client")?;
            info!("Using identity toolkit auth provider");
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(feature = "onnx")]
fn build_classifier(config: &ClassifierConfig) -> Result<Option<Arc<ClassifierAdapter>>> {
    use xspand_classifier::{ClassifierSettings, OnnxModel};

    let Some(model_path) = &config.model_path else {
        warn!("classifier.model_path not set, classification endpoints will report failure");
        return Ok(None);
    };

    let model = OnnxModel::load(model_path, &config.input_name, config.class_count)
        .context("Failed to load classification model")?;
    let settings = ClassifierSettings {
        image_width: config.image_width,
        image_height: config.image_height,
        confidence_threshold: config.confidence_threshold,
        fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        max_image_bytes: config.max_image_bytes,
    };
    let adapter = ClassifierAdapter::new(Arc::new(model), settings)?;
    Ok(Some(Arc::new(adapter)))
}

#[cfg(not(feature = "onnx"))]
fn build_classifier(config: &ClassifierConfig) -> Result<Option<Arc<ClassifierAdapter>>> {
    if config.model_path.is_some() {
        warn!("classifier.model_path is set but the server was built without the `onnx` feature");
    }
    Ok(None)
}
