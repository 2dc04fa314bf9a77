// 离线回放工具：加载历史文件，逐行回放推送，并打印每一步之后的图例
use anyhow::{Context, Result};
use clap::Parser;

use kline_chart::klchart::{ChartContext, PointerState, RenderedLegend, TickOutcome};
use kline_chart::klcommon::{logging_setup, ChartConfig};
use std::sync::Arc;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Replay a history snapshot and a JSON-lines tick file through the chart core.", long_about = None)]
struct Args {
    /// History JSON file (array of records).
    #[arg(long)]
    history: String,

    /// Tick file, one JSON record per line. Empty lines are heartbeats.
    #[arg(long)]
    ticks: Option<String>,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Hover these times after replay (comma-separated epoch seconds).
    #[arg(long, value_delimiter = ',')]
    hover: Vec<i64>,

    /// Print rendered legends as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn print_legend(label: &str, legend: &RenderedLegend, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(legend)?);
        return Ok(());
    }
    let fields: Vec<String> = legend.fields.iter().map(|(id, text)| format!("{}={}", id, text)).collect();
    println!("[{}] {} | {}", label, legend.ohlc_text, fields.join(" "));
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging_setup::init_console_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => ChartConfig::from_file(path).with_context(|| format!("加载配置文件失败: {}", path))?,
        None => ChartConfig::default(),
    };
    let mut ctx = ChartContext::new(Arc::new(config));

    let history = std::fs::read_to_string(&args.history)
        .with_context(|| format!("读取历史文件失败: {}", args.history))?;
    let report = ctx.load_history(&history).context("历史数据加载失败")?;
    println!(
        "loaded {} records ({} bars, {} signal markers, {} spike markers, {} cloud points)",
        report.records, report.bars, report.candle_markers, report.spike_markers, report.cloud_points
    );
    print_legend("history", &ctx.legend(&PointerState::left()).render(), args.json)?;

    if let Some(path) = &args.ticks {
        let ticks = std::fs::read_to_string(path).with_context(|| format!("读取推送文件失败: {}", path))?;
        for (line_no, line) in ticks.lines().enumerate() {
            let label = match ctx.apply_tick(line) {
                TickOutcome::Heartbeat => "heartbeat".to_string(),
                TickOutcome::Applied { time, .. } => format!("tick {}", time),
                TickOutcome::Dropped { reason } => format!("line {} dropped ({:?})", line_no + 1, reason),
            };
            print_legend(&label, &ctx.legend(&PointerState::left()).render(), args.json)?;
        }
    }

    for time in &args.hover {
        print_legend(&format!("hover {}", time), &ctx.legend(&PointerState::at(*time)).render(), args.json)?;
    }

    let stats = ctx.stats();
    println!(
        "ticks applied={} dropped={} heartbeats={} markers={} connected={}",
        stats.ticks_applied,
        stats.ticks_dropped,
        stats.heartbeats,
        stats.markers_added,
        ctx.is_connected()
    );
    Ok(())
}
