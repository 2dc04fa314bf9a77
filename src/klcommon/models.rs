//! 图表数据模型
//!
//! 原始载荷 (`RawRecord`) 只在解析边界出现；经 `klchart::time_key::validate`
//! 校验后变为强类型的 `ChartRecord`，下游逻辑只对字段是否存在做模式匹配。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 规范时间键：Unix纪元秒
pub type ChartTime = i64;

/// 图表上的一条可视序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesId {
    Candles,
    Ema,
    Tenkan,
    Kijun,
    SpanA,
    SpanB,
    Atr,
    Rsi,
    StochK,
    StochD,
}

impl SeriesId {
    pub const ALL: [SeriesId; 10] = [
        SeriesId::Candles,
        SeriesId::Ema,
        SeriesId::Tenkan,
        SeriesId::Kijun,
        SeriesId::SpanA,
        SeriesId::SpanB,
        SeriesId::Atr,
        SeriesId::Rsi,
        SeriesId::StochK,
        SeriesId::StochD,
    ];

    /// 直接按记录时间绘制的指标线（云图两条跨度线需要位移，不在此列）
    pub const UNSHIFTED_LINES: [SeriesId; 7] = [
        SeriesId::Ema,
        SeriesId::Tenkan,
        SeriesId::Kijun,
        SeriesId::Atr,
        SeriesId::Rsi,
        SeriesId::StochK,
        SeriesId::StochD,
    ];

    pub const CLOUD_SPANS: [SeriesId; 2] = [SeriesId::SpanA, SeriesId::SpanB];

    /// 载荷中的字段名
    pub fn name(&self) -> &'static str {
        match self {
            SeriesId::Candles => "candles",
            SeriesId::Ema => "ema",
            SeriesId::Tenkan => "tenkan",
            SeriesId::Kijun => "kijun",
            SeriesId::SpanA => "spanA",
            SeriesId::SpanB => "spanB",
            SeriesId::Atr => "atr",
            SeriesId::Rsi => "rsi",
            SeriesId::StochK => "stochK",
            SeriesId::StochD => "stochD",
        }
    }

    /// 在 `ALL` 中的下标，用于扁平数组索引
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 原始载荷中的时间字段，可能是数字、结构化对象或字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Numeric(f64),
    Structured(StructuredTime),
    Text(String),
}

/// 结构化时间对象，例如 `{"seconds": ...}` 或 `{"epochSecond": ..., "nano": ...}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredTime {
    #[serde(default)]
    pub seconds: Option<f64>,
    #[serde(default, rename = "epochSecond")]
    pub epoch_second: Option<f64>,
}

/// 历史批次或实时推送中的一条原始记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub time: Option<RawTime>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub ema: Option<f64>,
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    pub span_a: Option<f64>,
    pub span_b: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub signal: Option<String>,
    pub volatility_spike: Option<bool>,
}

/// OHLC蜡烛
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: ChartTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// 收盘价不低于开盘价即视为阳线
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// 单条指标序列上的一个标量点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: ChartTime,
    pub value: f64,
}

/// 一条记录中携带的全部标量指标，缺失即 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorValues {
    pub ema: Option<f64>,
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    pub span_a: Option<f64>,
    pub span_b: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
}

impl IndicatorValues {
    pub fn get(&self, id: SeriesId) -> Option<f64> {
        match id {
            SeriesId::Candles => None,
            SeriesId::Ema => self.ema,
            SeriesId::Tenkan => self.tenkan,
            SeriesId::Kijun => self.kijun,
            SeriesId::SpanA => self.span_a,
            SeriesId::SpanB => self.span_b,
            SeriesId::Atr => self.atr,
            SeriesId::Rsi => self.rsi,
            SeriesId::StochK => self.stoch_k,
            SeriesId::StochD => self.stoch_d,
        }
    }
}

/// 交易信号类别
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalKind {
    None,
    PullbackBuy,
    /// 名称中包含 "BUY" 的其他信号，保留原始名称
    Buy(String),
    /// 名称中不包含 "BUY" 的信号，保留原始名称
    Sell(String),
}

impl SignalKind {
    pub const PULLBACK_BUY: &'static str = "PULLBACK_BUY";

    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "NONE" => SignalKind::None,
            Self::PULLBACK_BUY => SignalKind::PullbackBuy,
            s if s.contains("BUY") => SignalKind::Buy(s.to_string()),
            s => SignalKind::Sell(s.to_string()),
        }
    }

    pub fn raw_name(&self) -> &str {
        match self {
            SignalKind::None => "NONE",
            SignalKind::PullbackBuy => Self::PULLBACK_BUY,
            SignalKind::Buy(name) | SignalKind::Sell(name) => name,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SignalKind::None)
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, SignalKind::PullbackBuy | SignalKind::Buy(_))
    }
}

impl Default for SignalKind {
    fn default() -> Self {
        SignalKind::None
    }
}

impl From<String> for SignalKind {
    fn from(raw: String) -> Self {
        SignalKind::parse(&raw)
    }
}

impl From<SignalKind> for String {
    fn from(kind: SignalKind) -> Self {
        kind.raw_name().to_string()
    }
}

/// 通过解析边界校验后的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub time: ChartTime,
    /// 只有 open 和 close 同时存在时才有蜡烛
    pub bar: Option<Bar>,
    pub indicators: IndicatorValues,
    pub signal: SignalKind,
    pub volatility_spike: bool,
}

/// 标注相对于K线的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
}

/// 标注形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
    Circle,
}

/// 附着在某条序列某个时间点上的离散标注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub time: ChartTime,
    pub position: MarkerPosition,
    pub shape: MarkerShape,
    pub color: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// 带时间键的数据点
pub trait HasTime {
    fn time(&self) -> ChartTime;
}

impl HasTime for Bar {
    fn time(&self) -> ChartTime {
        self.time
    }
}

impl HasTime for IndicatorPoint {
    fn time(&self) -> ChartTime {
        self.time
    }
}

impl HasTime for Marker {
    fn time(&self) -> ChartTime {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_reads_camel_case_fields() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"time":1000,"open":10,"high":12,"low":9,"close":11,"spanA":5.5,"stochK":20,"volatilitySpike":true,"signal":"BUY_TK"}"#,
        )
        .unwrap();
        assert_eq!(raw.time, Some(RawTime::Numeric(1000.0)));
        assert_eq!(raw.span_a, Some(5.5));
        assert_eq!(raw.stoch_k, Some(20.0));
        assert_eq!(raw.volatility_spike, Some(true));
        assert_eq!(raw.rsi, None);
    }

    #[test]
    fn structured_time_variants_deserialize() {
        let raw: RawRecord = serde_json::from_str(r#"{"time":{"epochSecond":1700000000,"nano":0}}"#).unwrap();
        assert_eq!(
            raw.time,
            Some(RawTime::Structured(StructuredTime { seconds: None, epoch_second: Some(1_700_000_000.0) }))
        );

        let raw: RawRecord = serde_json::from_str(r#"{"time":"2023-11-14T22:13:20Z"}"#).unwrap();
        assert!(matches!(raw.time, Some(RawTime::Text(_))));
    }

    #[test]
    fn signal_kind_classification() {
        assert_eq!(SignalKind::parse("NONE"), SignalKind::None);
        assert_eq!(SignalKind::parse(""), SignalKind::None);
        assert_eq!(SignalKind::parse("PULLBACK_BUY"), SignalKind::PullbackBuy);
        assert_eq!(SignalKind::parse("BUY_TK"), SignalKind::Buy("BUY_TK".into()));
        assert_eq!(SignalKind::parse("SELL_TK"), SignalKind::Sell("SELL_TK".into()));
        assert!(SignalKind::parse("PULLBACK_BUY").is_buy());
        assert!(!SignalKind::parse("SELL_TK").is_buy());
    }

    #[test]
    fn marker_serializes_with_chart_names() {
        let marker = Marker {
            time: 1000,
            position: MarkerPosition::BelowBar,
            shape: MarkerShape::ArrowUp,
            color: "#26a69a".into(),
            text: "BUY".into(),
            size: None,
        };
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["position"], "belowBar");
        assert_eq!(json["shape"], "arrowUp");
        assert!(json.get("size").is_none());
    }
}
