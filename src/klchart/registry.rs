//! 序列注册表
//!
//! 每条可视序列（蜡烛、叠加线、振荡器线、云图边界）持有一份按时间排序的数据点、
//! 一份标注列表，以及它所属窗格/刻度的配置。

use serde::Serialize;
use std::collections::BTreeMap;

use crate::klchart::markers::MarkerLedger;
use crate::klcommon::{
    config::constants::{PRICE_SCALE_ATR, PRICE_SCALE_RIGHT, PRICE_SCALE_RSI, PRICE_SCALE_STOCH},
    AppError, Bar, ChartConfig, ChartTime, HasTime, IndicatorPoint, Marker, Result, ScaleMargins,
    SeriesId,
};

/// 序列的绘制类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesKind {
    Candlestick,
    Line,
}

/// 序列的静态配置
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSpec {
    pub id: SeriesId,
    pub kind: SeriesKind,
    pub price_scale_id: String,
    pub color: String,
    pub line_width: f64,
}

/// 静态参考线（RSI 70/30、随机指标 80/20）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLine {
    pub price: f64,
    pub color: String,
    /// 2 = 虚线
    pub line_style: u8,
    pub axis_label_visible: bool,
}

/// 一个独立刻度的窗格布局
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneLayout {
    pub price_scale_id: String,
    pub scale_margins: ScaleMargins,
}

/// 更新结果：追加新点，或替换了已有时间上的点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Appended,
    Replaced,
}

/// 按时间排序的数据点序列
#[derive(Debug, Clone)]
pub struct TimeSeries<T> {
    data: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: HasTime> TimeSeries<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.data.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// 整体替换，信任调用方给出的顺序
    pub fn set_data(&mut self, data: Vec<T>) {
        self.data = data;
    }

    /// 按时间查找
    pub fn get(&self, time: ChartTime) -> Option<&T> {
        self.data
            .binary_search_by_key(&time, |p| p.time())
            .ok()
            .map(|idx| &self.data[idx])
    }

    /// 按时间更新：已有时间则替换，比最新点新则追加，否则拒绝
    pub fn upsert(&mut self, series: SeriesId, point: T) -> Result<Upsert> {
        let time = point.time();
        match self.data.last().map(|p| p.time()) {
            None => {
                self.data.push(point);
                Ok(Upsert::Appended)
            }
            Some(latest) if time > latest => {
                self.data.push(point);
                Ok(Upsert::Appended)
            }
            Some(latest) => match self.data.binary_search_by_key(&time, |p| p.time()) {
                Ok(idx) => {
                    self.data[idx] = point;
                    Ok(Upsert::Replaced)
                }
                Err(_) => Err(AppError::StaleUpdate { series, time, latest }),
            },
        }
    }
}

/// 一条序列：配置 + 数据 + 标注
#[derive(Debug, Clone)]
pub struct Series<T> {
    pub spec: SeriesSpec,
    pub points: TimeSeries<T>,
    pub markers: Vec<Marker>,
    pub price_lines: Vec<PriceLine>,
}

impl<T: HasTime> Series<T> {
    fn new(spec: SeriesSpec) -> Self {
        Self {
            spec,
            points: TimeSeries::new(),
            markers: Vec::new(),
            price_lines: Vec::new(),
        }
    }
}

/// 序列中的单个点，用于导出
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesPoint {
    Bar(Bar),
    Line(IndicatorPoint),
}

/// 单条序列的完整导出
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesExport {
    pub spec: SeriesSpec,
    pub points: Vec<SeriesPoint>,
    pub markers: Vec<Marker>,
    pub price_lines: Vec<PriceLine>,
}

/// 整个图表状态的快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub panes: Vec<PaneLayout>,
    pub price_line_color: String,
    pub series: Vec<SeriesExport>,
}

/// 单条序列的增量：最新点及当前标注
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDelta {
    pub id: SeriesId,
    pub latest: Option<SeriesPoint>,
    pub markers: Vec<Marker>,
}

/// 持有每条序列的句柄和窗格配置
#[derive(Debug, Clone)]
pub struct SeriesRegistry {
    candles: Series<Bar>,
    lines: BTreeMap<SeriesId, Series<IndicatorPoint>>,
    panes: Vec<PaneLayout>,
    ledger: MarkerLedger,
    /// 蜡烛序列参考线颜色，随最新K线涨跌变化
    price_line_color: String,
}

impl SeriesRegistry {
    pub fn new(config: &ChartConfig) -> Self {
        let palette = &config.palette;
        let line = |id: SeriesId, scale: &str, color: &str, line_width: f64| {
            Series::new(SeriesSpec {
                id,
                kind: SeriesKind::Line,
                price_scale_id: scale.to_string(),
                color: color.to_string(),
                line_width,
            })
        };

        let candles = Series::new(SeriesSpec {
            id: SeriesId::Candles,
            kind: SeriesKind::Candlestick,
            price_scale_id: PRICE_SCALE_RIGHT.to_string(),
            color: palette.up.clone(),
            line_width: 1.0,
        });

        let mut lines = BTreeMap::new();
        lines.insert(SeriesId::Ema, line(SeriesId::Ema, PRICE_SCALE_RIGHT, &palette.ema, 1.0));
        lines.insert(SeriesId::Tenkan, line(SeriesId::Tenkan, PRICE_SCALE_RIGHT, &palette.tenkan, 1.0));
        lines.insert(SeriesId::Kijun, line(SeriesId::Kijun, PRICE_SCALE_RIGHT, &palette.kijun, 1.0));
        lines.insert(SeriesId::SpanA, line(SeriesId::SpanA, PRICE_SCALE_RIGHT, &palette.span_a, 1.0));
        lines.insert(SeriesId::SpanB, line(SeriesId::SpanB, PRICE_SCALE_RIGHT, &palette.span_b, 1.0));
        lines.insert(SeriesId::Atr, line(SeriesId::Atr, PRICE_SCALE_ATR, &palette.atr, 1.0));
        lines.insert(SeriesId::Rsi, line(SeriesId::Rsi, PRICE_SCALE_RSI, &palette.rsi, 2.0));
        lines.insert(SeriesId::StochK, line(SeriesId::StochK, PRICE_SCALE_STOCH, &palette.stoch_k, 1.5));
        lines.insert(SeriesId::StochD, line(SeriesId::StochD, PRICE_SCALE_STOCH, &palette.stoch_d, 1.5));

        let threshold = |price: f64| PriceLine {
            price,
            color: palette.threshold.clone(),
            line_style: 2,
            axis_label_visible: false,
        };
        if let Some(rsi) = lines.get_mut(&SeriesId::Rsi) {
            rsi.price_lines = config.panes.rsi_thresholds.iter().copied().map(threshold).collect();
        }
        if let Some(stoch_k) = lines.get_mut(&SeriesId::StochK) {
            stoch_k.price_lines = config.panes.stoch_thresholds.iter().copied().map(threshold).collect();
        }

        let panes = [
            (PRICE_SCALE_RIGHT, config.panes.price),
            (PRICE_SCALE_ATR, config.panes.atr),
            (PRICE_SCALE_RSI, config.panes.rsi),
            (PRICE_SCALE_STOCH, config.panes.stoch),
        ]
        .into_iter()
        .map(|(id, scale_margins)| PaneLayout { price_scale_id: id.to_string(), scale_margins })
        .collect();

        Self {
            candles,
            lines,
            panes,
            ledger: MarkerLedger::new(),
            price_line_color: palette.price_line.clone(),
        }
    }

    pub fn candles(&self) -> &TimeSeries<Bar> {
        &self.candles.points
    }

    pub fn line(&self, id: SeriesId) -> Option<&TimeSeries<IndicatorPoint>> {
        self.lines.get(&id).map(|s| &s.points)
    }

    pub fn spec(&self, id: SeriesId) -> Option<&SeriesSpec> {
        match id {
            SeriesId::Candles => Some(&self.candles.spec),
            _ => self.lines.get(&id).map(|s| &s.spec),
        }
    }

    pub fn panes(&self) -> &[PaneLayout] {
        &self.panes
    }

    pub fn price_lines(&self, id: SeriesId) -> &[PriceLine] {
        match id {
            SeriesId::Candles => &self.candles.price_lines,
            _ => self.lines.get(&id).map(|s| s.price_lines.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn set_bars(&mut self, bars: Vec<Bar>) {
        self.candles.points.set_data(bars);
    }

    pub fn upsert_bar(&mut self, bar: Bar) -> Result<Upsert> {
        self.candles.points.upsert(SeriesId::Candles, bar)
    }

    pub fn set_line(&mut self, id: SeriesId, points: Vec<IndicatorPoint>) {
        if let Some(series) = self.lines.get_mut(&id) {
            series.points.set_data(points);
        }
    }

    pub fn upsert_line(&mut self, id: SeriesId, point: IndicatorPoint) -> Result<Upsert> {
        match self.lines.get_mut(&id) {
            Some(series) => series.points.upsert(id, point),
            None => Err(AppError::MalformedPayload(format!("{} 不是指标线序列", id))),
        }
    }

    /// 某条指标线在指定时间的值
    pub fn value_at(&self, id: SeriesId, time: ChartTime) -> Option<f64> {
        self.line(id).and_then(|s| s.get(time)).map(|p| p.value)
    }

    pub fn bar_at(&self, time: ChartTime) -> Option<Bar> {
        self.candles.points.get(time).copied()
    }

    /// 指定时间上蜡烛或给定指标线中是否至少有一个值
    pub fn has_value_at(&self, time: ChartTime, lines: &[SeriesId]) -> bool {
        self.candles.points.get(time).is_some() || lines.iter().any(|id| self.value_at(*id, time).is_some())
    }

    pub fn markers(&self, id: SeriesId) -> &[Marker] {
        match id {
            SeriesId::Candles => &self.candles.markers,
            _ => self.lines.get(&id).map(|s| s.markers.as_slice()).unwrap_or(&[]),
        }
    }

    fn markers_mut(&mut self, id: SeriesId) -> Option<&mut Vec<Marker>> {
        match id {
            SeriesId::Candles => Some(&mut self.candles.markers),
            _ => self.lines.get_mut(&id).map(|s| &mut s.markers),
        }
    }

    /// 整体替换标注列表（历史加载路径，不做去重检查）
    pub fn set_markers(&mut self, id: SeriesId, markers: Vec<Marker>) {
        self.ledger.rebuild(id, &markers);
        if let Some(slot) = self.markers_mut(id) {
            *slot = markers;
        }
    }

    /// 按时间插入一个标注；同一时间已有标注时不做任何事并返回 false
    pub fn add_marker(&mut self, id: SeriesId, marker: Marker) -> bool {
        if !self.ledger.should_add(id, marker.time) {
            return false;
        }
        let time = marker.time;
        match self.markers_mut(id) {
            Some(slot) => {
                let at = slot.partition_point(|m| m.time < time);
                slot.insert(at, marker);
                self.ledger.record(id, time);
                true
            }
            None => false,
        }
    }

    pub fn price_line_color(&self) -> &str {
        &self.price_line_color
    }

    pub fn set_price_line_color(&mut self, color: &str) {
        if self.price_line_color != color {
            self.price_line_color = color.to_string();
        }
    }

    /// 所有序列当前点数之和
    pub fn total_points(&self) -> usize {
        self.candles.points.len() + self.lines.values().map(|s| s.points.len()).sum::<usize>()
    }

    pub fn delta(&self, id: SeriesId) -> SeriesDelta {
        let latest = match id {
            SeriesId::Candles => self.candles.points.last().copied().map(SeriesPoint::Bar),
            _ => self.line(id).and_then(|s| s.last()).copied().map(SeriesPoint::Line),
        };
        SeriesDelta {
            id,
            latest,
            markers: self.markers(id).to_vec(),
        }
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        let mut series = Vec::with_capacity(self.lines.len() + 1);
        series.push(SeriesExport {
            spec: self.candles.spec.clone(),
            points: self.candles.points.as_slice().iter().copied().map(SeriesPoint::Bar).collect(),
            markers: self.candles.markers.clone(),
            price_lines: self.candles.price_lines.clone(),
        });
        for line in self.lines.values() {
            series.push(SeriesExport {
                spec: line.spec.clone(),
                points: line.points.as_slice().iter().copied().map(SeriesPoint::Line).collect(),
                markers: line.markers.clone(),
                price_lines: line.price_lines.clone(),
            });
        }
        ChartSnapshot {
            panes: self.panes.clone(),
            price_line_color: self.price_line_color.clone(),
            series,
        }
    }
}
