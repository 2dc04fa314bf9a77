//! 标注账本与信号到标注的映射
//!
//! 同一条序列上同一时间最多一个标注。蜡烛信号标注和ATR波动尖峰标注的账本互不相干。

use std::collections::{HashMap, HashSet};

use crate::klcommon::{ChartTime, Marker, MarkerPosition, MarkerShape, PaletteConfig, SeriesId, SignalKind};

pub const SQUEEZE_LABEL: &str = "SQUEEZE";
pub const SQUEEZE_LABEL_COMPACT: &str = "SQZ";
pub const SPIKE_LABEL: &str = "S";

/// 波动尖峰标注挂在ATR序列上，而不是蜡烛序列
pub const SPIKE_SERIES: SeriesId = SeriesId::Atr;

/// 按序列记录已有标注的时间
#[derive(Debug, Clone, Default)]
pub struct MarkerLedger {
    times: HashMap<SeriesId, HashSet<ChartTime>>,
}

impl MarkerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_add(&self, id: SeriesId, time: ChartTime) -> bool {
        !self.times.get(&id).is_some_and(|set| set.contains(&time))
    }

    pub fn record(&mut self, id: SeriesId, time: ChartTime) {
        self.times.entry(id).or_default().insert(time);
    }

    /// 用整份标注列表重建某条序列的账本
    pub fn rebuild(&mut self, id: SeriesId, markers: &[Marker]) {
        let set = self.times.entry(id).or_default();
        set.clear();
        set.extend(markers.iter().map(|m| m.time));
    }

    pub fn len(&self, id: SeriesId) -> usize {
        self.times.get(&id).map_or(0, HashSet::len)
    }
}

/// 信号到蜡烛标注的映射；NONE 不产生标注
///
/// | 条件 | 位置 | 颜色 | 形状 | 文本 |
/// |---|---|---|---|---|
/// | PULLBACK_BUY | 下方 | 强调蓝 | 上箭头 | SQUEEZE / SQZ |
/// | 其他含 BUY | 下方 | 涨色 | 上箭头 | 原始名称 |
/// | 不含 BUY | 上方 | 跌色 | 下箭头 | 原始名称 |
pub fn signal_marker(time: ChartTime, kind: &SignalKind, palette: &PaletteConfig, compact: bool) -> Option<Marker> {
    let (position, shape, color, text) = match kind {
        SignalKind::None => return None,
        SignalKind::PullbackBuy => (
            MarkerPosition::BelowBar,
            MarkerShape::ArrowUp,
            &palette.accent_blue,
            if compact { SQUEEZE_LABEL_COMPACT } else { SQUEEZE_LABEL },
        ),
        SignalKind::Buy(name) => (MarkerPosition::BelowBar, MarkerShape::ArrowUp, &palette.up, name.as_str()),
        SignalKind::Sell(name) => (MarkerPosition::AboveBar, MarkerShape::ArrowDown, &palette.down, name.as_str()),
    };
    Some(Marker {
        time,
        position,
        shape,
        color: color.clone(),
        text: text.to_string(),
        size: None,
    })
}

/// 波动尖峰标注：固定圆点、固定颜色、文本 "S"、总在上方
pub fn spike_marker(time: ChartTime, palette: &PaletteConfig) -> Marker {
    Marker {
        time,
        position: MarkerPosition::AboveBar,
        shape: MarkerShape::Circle,
        color: palette.spike.clone(),
        text: SPIKE_LABEL.to_string(),
        size: Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_table_is_reproduced() {
        let palette = PaletteConfig::default();

        let pullback = signal_marker(1, &SignalKind::PullbackBuy, &palette, false).unwrap();
        assert_eq!(pullback.position, MarkerPosition::BelowBar);
        assert_eq!(pullback.shape, MarkerShape::ArrowUp);
        assert_eq!(pullback.color, palette.accent_blue);
        assert_eq!(pullback.text, "SQUEEZE");

        let compact = signal_marker(1, &SignalKind::PullbackBuy, &palette, true).unwrap();
        assert_eq!(compact.text, "SQZ");

        let buy = signal_marker(2, &SignalKind::parse("BUY_TK"), &palette, false).unwrap();
        assert_eq!(buy.position, MarkerPosition::BelowBar);
        assert_eq!(buy.color, palette.up);
        assert_eq!(buy.text, "BUY_TK");

        let sell = signal_marker(3, &SignalKind::parse("SELL_TK"), &palette, false).unwrap();
        assert_eq!(sell.position, MarkerPosition::AboveBar);
        assert_eq!(sell.shape, MarkerShape::ArrowDown);
        assert_eq!(sell.color, palette.down);
        assert_eq!(sell.text, "SELL_TK");

        assert!(signal_marker(4, &SignalKind::None, &palette, false).is_none());
    }

    #[test]
    fn spike_marker_is_fixed() {
        let palette = PaletteConfig::default();
        let marker = spike_marker(1000, &palette);
        assert_eq!(marker.shape, MarkerShape::Circle);
        assert_eq!(marker.position, MarkerPosition::AboveBar);
        assert_eq!(marker.text, "S");
        assert_eq!(marker.color, "#ff5252");
    }

    #[test]
    fn ledger_dedups_per_series() {
        let mut ledger = MarkerLedger::new();
        assert!(ledger.should_add(SeriesId::Candles, 10));
        ledger.record(SeriesId::Candles, 10);
        assert!(!ledger.should_add(SeriesId::Candles, 10));
        assert!(ledger.should_add(SeriesId::Atr, 10));
        assert_eq!(ledger.len(SeriesId::Candles), 1);
        assert_eq!(ledger.len(SeriesId::Atr), 0);
    }
}
