// 图表同步服务主程序
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use kline_chart::engine::ChartEngine;
use kline_chart::klcommon::{logging_setup, ChartConfig};
use kline_chart::klserver;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Streaming candlestick chart synchronization server.", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/chart_config.toml")]
    config: String,

    /// Override the configured log level (trace/debug/info/warn/error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the configured bind address, e.g. 127.0.0.1:3000.
    #[arg(long)]
    bind: Option<String>,

    /// Optional history JSON file loaded before the server starts accepting ticks.
    #[arg(long)]
    history: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 配置文件不存在时使用默认配置
    let config_missing = !Path::new(&args.config).exists();
    let mut config = if config_missing {
        ChartConfig::default()
    } else {
        ChartConfig::from_file(&args.config).with_context(|| format!("加载配置文件失败: {}", args.config))?
    };
    if let Some(level) = args.log_level {
        config.logging.log_level = level;
    }
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    config.validate().context("配置校验失败")?;

    let _guard = logging_setup::init_logging(&config.logging).context("初始化日志失败")?;
    if config_missing {
        warn!(target: "应用生命周期", path = %args.config, "配置文件不存在，使用默认配置");
    }

    info!(
        target: "应用生命周期",
        symbol = %config.chart.symbol,
        interval_minutes = config.chart.bar_interval_minutes,
        "启动图表同步服务"
    );

    let config = Arc::new(config);
    let (engine, state_rx, engine_join) = ChartEngine::spawn(config.clone());

    if let Some(path) = args.history {
        let payload = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("读取历史文件失败: {}", path))?;
        match engine.load_history(payload).await {
            Ok(report) => info!(target: "应用生命周期", records = report.records, "预加载历史数据完成"),
            Err(e) => error!(target: "应用生命周期", "预加载历史数据失败，等待客户端重新加载: {}", e),
        }
    }

    let server_config = config.server.clone();
    let mut web_handle = tokio::spawn(async move {
        klserver::start_web_server(&server_config, engine, state_rx).await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(target: "应用生命周期", reason = "received_ctrl_c", "接收到关闭信号，开始关闭");
            web_handle.abort();
        }
        result = &mut web_handle => {
            match result {
                Ok(Ok(())) => info!(target: "应用生命周期", "Web服务器已退出"),
                Ok(Err(e)) => {
                    error!(target: "应用生命周期", error_type = e.get_error_type_summary(), "Web服务器失败: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!(target: "应用生命周期", "Web服务器任务异常: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    // 仍在运行的连接任务可能持有引擎句柄，直接终止引擎任务
    engine_join.abort();
    info!(target: "应用生命周期", "服务已关闭");
    Ok(())
}
