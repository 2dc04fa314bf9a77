//! 图表同步服务配置模块

use serde::{Deserialize, Serialize};
use crate::klcommon::{AppError, Result};

/// 系统配置常量
pub mod constants {
    /// 默认K线周期（分钟）
    pub const DEFAULT_BAR_INTERVAL_MINUTES: i64 = 60;

    /// 一目均衡表云图前移的K线根数
    pub const DEFAULT_CLOUD_LOOKAHEAD_BARS: i64 = 26;

    /// 默认引擎事件通道容量
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

    /// 默认监听地址
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

    /// 价格主刻度ID
    pub const PRICE_SCALE_RIGHT: &str = "right";
    pub const PRICE_SCALE_ATR: &str = "atrScale";
    pub const PRICE_SCALE_RSI: &str = "rsiScale";
    pub const PRICE_SCALE_STOCH: &str = "stochScale";
}

use constants::*;

fn default_log_enabled() -> bool {
    true
}

fn default_enable_console_output() -> bool {
    true
}

/// 图表同步服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartConfig {
    /// 图表会话配置
    #[serde(default)]
    pub chart: SessionConfig,

    /// 配色
    #[serde(default)]
    pub palette: PaletteConfig,

    /// 窗格布局
    #[serde(default)]
    pub panes: PaneConfig,

    /// Web服务配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 单品种、单周期的会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 品种显示名，仅用于标题和日志
    pub symbol: String,

    /// K线周期（分钟）
    pub bar_interval_minutes: i64,

    /// 云图前移的K线根数
    pub cloud_lookahead_bars: i64,

    /// 回调买入信号使用紧凑标签 "SQZ" 而不是 "SQUEEZE"
    pub compact_signal_labels: bool,
}

/// 配色
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub up: String,
    pub down: String,
    pub accent_blue: String,
    pub spike: String,
    /// 参考线的中性颜色（尚未收到实时数据时）
    pub price_line: String,
    pub threshold: String,
    pub ema: String,
    pub tenkan: String,
    pub kijun: String,
    pub span_a: String,
    pub span_b: String,
    pub atr: String,
    pub rsi: String,
    pub stoch_k: String,
    pub stoch_d: String,
}

/// 单个刻度的上下边距（占图表高度的比例）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMargins {
    pub top: f64,
    pub bottom: f64,
}

/// 窗格布局与静态阈值线
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneConfig {
    pub price: ScaleMargins,
    pub atr: ScaleMargins,
    pub rsi: ScaleMargins,
    pub stoch: ScaleMargins,
    pub rsi_thresholds: Vec<f64>,
    pub stoch_thresholds: Vec<f64>,
}

/// Web服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_addr: String,

    /// 静态文件目录
    pub static_dir: String,

    /// 引擎事件通道容量（有界通道的缓冲区大小）
    pub channel_capacity: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志系统总开关
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,

    /// 日志级别 (trace, debug, info, warn, error)
    pub log_level: String,

    /// 日志文件目录，按天滚动
    pub log_dir: String,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 是否启用控制台输出
    #[serde(default = "default_enable_console_output")]
    pub enable_console_output: bool,

    /// 文件日志使用JSON格式
    pub json: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USD".to_string(),
            bar_interval_minutes: DEFAULT_BAR_INTERVAL_MINUTES,
            cloud_lookahead_bars: DEFAULT_CLOUD_LOOKAHEAD_BARS,
            compact_signal_labels: false,
        }
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            up: "#26a69a".to_string(),
            down: "#ef5350".to_string(),
            accent_blue: "#2196F3".to_string(),
            spike: "#ff5252".to_string(),
            price_line: "#d1d4dc".to_string(),
            threshold: "#444444".to_string(),
            ema: "#E0E0E0FF".to_string(),
            tenkan: "#F44336".to_string(),
            kijun: "#880E4F".to_string(),
            span_a: "#26a69a80".to_string(),
            span_b: "#ef535080".to_string(),
            atr: "#9c27b0".to_string(),
            rsi: "#7e57c2".to_string(),
            stoch_k: "#2196F3".to_string(),
            stoch_d: "#FF9800".to_string(),
        }
    }
}

impl Default for PaneConfig {
    fn default() -> Self {
        Self {
            price: ScaleMargins { top: 0.05, bottom: 0.45 },
            atr: ScaleMargins { top: 0.6, bottom: 0.3 },
            rsi: ScaleMargins { top: 0.72, bottom: 0.18 },
            stoch: ScaleMargins { top: 0.84, bottom: 0.02 },
            rsi_thresholds: vec![70.0, 30.0],
            stoch_thresholds: vec![80.0, 20.0],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            static_dir: "static".to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            file_prefix: "kline_chart.log".to_string(),
            enable_console_output: true,
            json: false,
        }
    }
}

impl SessionConfig {
    /// K线周期（秒）
    pub fn bar_interval_secs(&self) -> i64 {
        self.bar_interval_minutes * 60
    }
}

impl ChartConfig {
    /// 从文件加载配置
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// 从TOML文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("解析配置文件失败: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.chart.bar_interval_minutes <= 0 {
            return Err(AppError::ConfigError(format!(
                "K线周期必须大于0: {}",
                self.chart.bar_interval_minutes
            )));
        }

        if self.chart.cloud_lookahead_bars <= 0 {
            return Err(AppError::ConfigError(format!(
                "云图前移根数必须大于0: {}",
                self.chart.cloud_lookahead_bars
            )));
        }

        for (name, margins) in [
            (PRICE_SCALE_RIGHT, &self.panes.price),
            (PRICE_SCALE_ATR, &self.panes.atr),
            (PRICE_SCALE_RSI, &self.panes.rsi),
            (PRICE_SCALE_STOCH, &self.panes.stoch),
        ] {
            let in_range = (0.0..=1.0).contains(&margins.top) && (0.0..=1.0).contains(&margins.bottom);
            if !in_range || margins.top + margins.bottom >= 1.0 {
                return Err(AppError::ConfigError(format!(
                    "刻度 {} 的边距无效: top={}, bottom={}",
                    name, margins.top, margins.bottom
                )));
            }
        }

        if self.server.channel_capacity == 0 {
            return Err(AppError::ConfigError("引擎通道容量必须大于0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let config = ChartConfig::from_toml_str("").unwrap();
        assert_eq!(config.chart.bar_interval_minutes, 60);
        assert_eq!(config.chart.cloud_lookahead_bars, 26);
        assert_eq!(config.palette.up, "#26a69a");
        assert_eq!(config.panes.rsi_thresholds, vec![70.0, 30.0]);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ChartConfig::from_toml_str(
            r#"
            [chart]
            bar_interval_minutes = 15
            compact_signal_labels = true

            [logging]
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.chart.bar_interval_secs(), 900);
        assert!(config.chart.compact_signal_labels);
        assert_eq!(config.chart.cloud_lookahead_bars, 26);
        assert_eq!(config.logging.log_level, "debug");
        assert!(config.logging.enabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ChartConfig::from_toml_str("[chart]\nbar_interval_minutes = 0").is_err());
        assert!(ChartConfig::from_toml_str("[panes.rsi]\ntop = 0.7\nbottom = 0.4").is_err());
        assert!(ChartConfig::from_toml_str("[server]\nchannel_capacity = 0").is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = ChartConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = ChartConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.panes.stoch, config.panes.stoch);
        assert_eq!(parsed.server.bind_addr, config.server.bind_addr);
    }
}
