//! 一目均衡表云图投影
//!
//! 先行跨度A/B按 `前移根数 × 周期分钟 × 60` 秒向未来平移，位移在整个会话内不变。

use tracing::warn;

use crate::klcommon::{ChartRecord, ChartTime, IndicatorPoint, SeriesId, SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudProjector {
    displacement: ChartTime,
}

impl CloudProjector {
    pub fn new(interval_minutes: i64, lookahead_bars: i64) -> Self {
        Self {
            displacement: lookahead_bars * interval_minutes * 60,
        }
    }

    pub fn from_session(session: &SessionConfig) -> Self {
        Self::new(session.bar_interval_minutes, session.cloud_lookahead_bars)
    }

    /// 位移秒数
    pub fn displacement(&self) -> ChartTime {
        self.displacement
    }

    /// 平移后超出时间范围时返回 None
    pub fn project(&self, time: ChartTime) -> Option<ChartTime> {
        time.checked_add(self.displacement)
    }

    /// 缺失或非正值不绘制，否则会画出一个假的零点
    pub fn project_value(&self, time: ChartTime, value: Option<f64>) -> Option<IndicatorPoint> {
        let value = value.filter(|v| *v > 0.0)?;
        match self.project(time) {
            Some(time) => Some(IndicatorPoint { time, value }),
            None => {
                warn!(target: "CloudProjector", time, displacement = self.displacement, "云图平移后时间溢出，已跳过");
                None
            }
        }
    }

    /// 从一条记录中取出某条跨度线的投影点
    pub fn project_record(&self, span: SeriesId, record: &ChartRecord) -> Option<IndicatorPoint> {
        debug_assert!(SeriesId::CLOUD_SPANS.contains(&span));
        self.project_value(record.time, record.indicators.get(span))
    }

    /// 整批投影，跳过缺失和非正值
    pub fn project_batch(&self, span: SeriesId, records: &[ChartRecord]) -> Vec<IndicatorPoint> {
        records.iter().filter_map(|r| self.project_record(span, r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_bars_shift_twenty_six_hours() {
        let projector = CloudProjector::new(60, 26);
        assert_eq!(projector.displacement(), 93_600);
        assert_eq!(projector.project(1_000), Some(94_600));
    }

    #[test]
    fn overflowing_shift_is_skipped() {
        let projector = CloudProjector::new(60, 26);
        assert_eq!(projector.project(i64::MAX), None);
        assert!(projector.project_value(i64::MAX - 10, Some(5.0)).is_none());
        assert!(projector.project_value(i64::MAX - 93_600, Some(5.0)).is_some());
    }

    #[test]
    fn zero_negative_and_missing_values_are_not_projected() {
        let projector = CloudProjector::new(60, 26);
        assert!(projector.project_value(1_000, Some(0.0)).is_none());
        assert!(projector.project_value(1_000, Some(-3.0)).is_none());
        assert!(projector.project_value(1_000, None).is_none());
        assert_eq!(
            projector.project_value(1_000, Some(42.0)),
            Some(IndicatorPoint { time: 94_600, value: 42.0 })
        );
    }

    #[test]
    fn session_defaults_match_ichimoku_convention() {
        let projector = CloudProjector::from_session(&SessionConfig::default());
        assert_eq!(projector.displacement(), 26 * 60 * 60);
    }
}
