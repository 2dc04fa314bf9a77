//! 图例解析
//!
//! 悬停在某根K线上时读取各序列在该时间的值；指针离开或该时间无数据时回退到
//! 最新记录。两条路径产出同一种 `LegendValue`，格式化只认这一种形态。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::klchart::context::ChartContext;
use crate::klcommon::{Bar, ChartRecord, ChartTime, PaletteConfig, SeriesId};

/// 不可用字段的占位文本
pub const PLACEHOLDER: &str = "n/a";

/// 指针状态：`time` 为 `None` 表示指针不在绘图区内
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerState {
    pub time: Option<ChartTime>,
}

impl PointerState {
    pub fn at(time: ChartTime) -> Self {
        Self { time: Some(time) }
    }

    pub fn left() -> Self {
        Self { time: None }
    }
}

/// 图例中的单个数值
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendValue {
    pub value: f64,
}

impl LegendValue {
    fn from_option(value: Option<f64>) -> Option<Self> {
        value.map(|value| Self { value })
    }
}

/// 图例数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LegendSource {
    Hover { time: ChartTime },
    Latest { time: ChartTime },
    Unavailable,
}

/// OHLC 区块，颜色跟随涨跌
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcLegend {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub color: String,
}

impl OhlcLegend {
    fn from_bar(bar: &Bar, palette: &PaletteConfig) -> Self {
        let color = if bar.is_up() { &palette.up } else { &palette.down };
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            color: color.clone(),
        }
    }
}

/// 图例中的固定字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LegendField {
    Ema,
    Atr,
    Rsi,
    StochK,
    StochD,
}

impl LegendField {
    pub const ALL: [LegendField; 5] = [
        LegendField::Ema,
        LegendField::Atr,
        LegendField::Rsi,
        LegendField::StochK,
        LegendField::StochD,
    ];

    /// 渲染层使用的元素标识
    pub fn element_id(&self) -> &'static str {
        match self {
            LegendField::Ema => "ema-val",
            LegendField::Atr => "atr-val",
            LegendField::Rsi => "rsi-val",
            LegendField::StochK => "stoch-k-val",
            LegendField::StochD => "stoch-d-val",
        }
    }

    pub fn series(&self) -> SeriesId {
        match self {
            LegendField::Ema => SeriesId::Ema,
            LegendField::Atr => SeriesId::Atr,
            LegendField::Rsi => SeriesId::Rsi,
            LegendField::StochK => SeriesId::StochK,
            LegendField::StochD => SeriesId::StochD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendContext {
    pub source: LegendSource,
    pub ohlc: Option<OhlcLegend>,
    pub ema: Option<LegendValue>,
    pub atr: Option<LegendValue>,
    pub rsi: Option<LegendValue>,
    pub stoch_k: Option<LegendValue>,
    pub stoch_d: Option<LegendValue>,
}

/// 交给文本渲染层的最终形态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedLegend {
    pub source: LegendSource,
    pub ohlc_text: String,
    pub ohlc_color: Option<String>,
    /// 元素标识 -> 文本
    pub fields: BTreeMap<String, String>,
}

/// 两位小数；缺失或 NaN 输出占位符
pub fn format_value(value: Option<LegendValue>) -> String {
    match value {
        Some(LegendValue { value }) if value.is_finite() => format!("{:.2}", value),
        _ => PLACEHOLDER.to_string(),
    }
}

fn format_price(value: f64) -> String {
    format_value(Some(LegendValue { value }))
}

impl LegendContext {
    fn unavailable() -> Self {
        Self {
            source: LegendSource::Unavailable,
            ohlc: None,
            ema: None,
            atr: None,
            rsi: None,
            stoch_k: None,
            stoch_d: None,
        }
    }

    fn collect(
        source: LegendSource,
        ohlc: Option<OhlcLegend>,
        lookup: impl Fn(SeriesId) -> Option<f64>,
    ) -> Self {
        let value = |field: LegendField| LegendValue::from_option(lookup(field.series()));
        Self {
            source,
            ohlc,
            ema: value(LegendField::Ema),
            atr: value(LegendField::Atr),
            rsi: value(LegendField::Rsi),
            stoch_k: value(LegendField::StochK),
            stoch_d: value(LegendField::StochD),
        }
    }

    pub fn value(&self, field: LegendField) -> Option<LegendValue> {
        match field {
            LegendField::Ema => self.ema,
            LegendField::Atr => self.atr,
            LegendField::Rsi => self.rsi,
            LegendField::StochK => self.stoch_k,
            LegendField::StochD => self.stoch_d,
        }
    }

    /// `O 100.00 H 106.00 L 99.00 C 105.00`
    pub fn ohlc_text(&self) -> String {
        match &self.ohlc {
            Some(ohlc) => format!(
                "O {} H {} L {} C {}",
                format_price(ohlc.open),
                format_price(ohlc.high),
                format_price(ohlc.low),
                format_price(ohlc.close)
            ),
            None => format!("O {0} H {0} L {0} C {0}", PLACEHOLDER),
        }
    }

    pub fn render(&self) -> RenderedLegend {
        let fields = LegendField::ALL
            .iter()
            .map(|field| (field.element_id().to_string(), format_value(self.value(*field))))
            .collect();
        RenderedLegend {
            source: self.source,
            ohlc_text: self.ohlc_text(),
            ohlc_color: self.ohlc.as_ref().map(|o| o.color.clone()),
            fields,
        }
    }
}

fn hover_context(ctx: &ChartContext, time: ChartTime) -> LegendContext {
    let registry = ctx.registry();
    let ohlc = registry.bar_at(time).map(|bar| OhlcLegend::from_bar(&bar, &ctx.config().palette));
    LegendContext::collect(LegendSource::Hover { time }, ohlc, |id| registry.value_at(id, time))
}

fn latest_context(record: &ChartRecord, palette: &PaletteConfig) -> LegendContext {
    let ohlc = record.bar.as_ref().map(|bar| OhlcLegend::from_bar(bar, palette));
    LegendContext::collect(LegendSource::Latest { time: record.time }, ohlc, |id| record.indicators.get(id))
}

/// 根据指针状态解析图例
pub fn resolve(ctx: &ChartContext, pointer: &PointerState) -> LegendContext {
    if let Some(time) = pointer.time {
        let shown = LegendField::ALL.map(|field| field.series());
        if ctx.registry().has_value_at(time, &shown) {
            return hover_context(ctx, time);
        }
    }
    match ctx.latest() {
        Some(record) => latest_context(record, &ctx.config().palette),
        None => LegendContext::unavailable(),
    }
}
