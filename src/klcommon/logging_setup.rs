//! 统一日志系统初始化模块
//!
//! 提供跨二进制文件的日志系统初始化功能，避免代码重复。
//! 控制台输出和按天滚动的文件输出共用同一个过滤器，`RUST_LOG` 优先于配置文件。

use crate::klcommon::{config::LoggingConfig, AppError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// 构造业务日志过滤器字符串，压低第三方库的噪音
fn business_filter(log_level: &str) -> String {
    format!("{},hyper=warn,tower_http=info,tungstenite=warn", log_level)
}

/// 初始化日志系统
///
/// 返回文件写入线程的 guard，调用方必须在 main 中持有它直到退出，否则缓冲的日志会丢失。
/// 日志关闭时返回 `None`。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    // 确保日志目录存在
    std::fs::create_dir_all(&config.log_dir)?;

    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| business_filter(&config.log_level));

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // 文件层：可选JSON格式
    let file_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_filter(EnvFilter::new(&filter_str))
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(file_writer)
            .with_filter(EnvFilter::new(&filter_str))
            .boxed()
    };

    // 控制台层：使用 Option<Layer> 处理条件层
    let console_layer = config.enable_console_output.then(|| {
        fmt::layer()
            .with_target(true)
            .with_filter(EnvFilter::new(&filter_str))
    });

    Registry::default()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AppError::ConfigError(format!("日志系统初始化失败: {}", e)))?;

    tracing::info!(target: "Logging", log_dir = %config.log_dir, level = %config.log_level, "统一日志系统初始化完成");

    Ok(Some(guard))
}

/// 测试和离线工具使用的简易控制台日志，重复调用是安全的
pub fn init_console_logging(log_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(business_filter(log_level)))
        .with_target(true)
        .try_init();
}
