//! 时间键解析与载荷校验
//!
//! 所有进入图表的记录都在这里被转换成规范时间（纪元秒）和强类型字段。
//! 时间值按"真值"规则处理：0、null、非有限数都视为缺失。

use chrono::DateTime;
use tracing::trace;

use crate::klcommon::{
    AppError, Bar, ChartRecord, ChartTime, IndicatorValues, RawRecord, RawTime, Result, SignalKind,
};

/// 把一个数值时间截断为整数秒；截断后为0或非有限数则视为未设置
fn truthy_seconds(value: f64) -> Option<ChartTime> {
    if !value.is_finite() {
        return None;
    }
    let secs = value.trunc();
    if secs == 0.0 {
        return None;
    }
    Some(secs as ChartTime)
}

/// 字符串时间：先按数字解析，再按 RFC 3339 解析
fn parse_text_time(text: &str) -> Option<ChartTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return truthy_seconds(value);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp())
        .filter(|secs| *secs != 0)
}

/// 解析单个时间字段
///
/// 结构化对象优先取 `seconds`，其次 `epochSecond`。
pub fn resolve(raw: &RawTime) -> Result<ChartTime> {
    let resolved = match raw {
        RawTime::Numeric(value) => truthy_seconds(*value),
        RawTime::Structured(structured) => structured
            .seconds
            .and_then(truthy_seconds)
            .or_else(|| structured.epoch_second.and_then(truthy_seconds)),
        RawTime::Text(text) => parse_text_time(text),
    };
    resolved.ok_or(AppError::MissingTime { index: None })
}

/// 只保留有限数值，NaN/无穷按缺失处理
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// 由 open/close 及可选的 high/low 构造蜡烛，并保证 low ≤ open,close ≤ high
fn normalize_bar(time: ChartTime, open: f64, high: Option<f64>, low: Option<f64>, close: f64) -> Bar {
    let body_high = open.max(close);
    let body_low = open.min(close);
    let bar = Bar {
        time,
        open,
        high: high.map_or(body_high, |h| h.max(body_high)),
        low: low.map_or(body_low, |l| l.min(body_low)),
        close,
    };
    if high.map_or(true, |h| h != bar.high) || low.map_or(true, |l| l != bar.low) {
        trace!(target: "TimeKeyResolver", time, high = ?high, low = ?low, "补齐或修正了蜡烛的最高/最低价");
    }
    bar
}

/// 解析边界：把原始记录校验为 `ChartRecord`
///
/// 时间缺失时返回 `MissingTime`，其余字段缺失从不报错。
pub fn validate(raw: RawRecord) -> Result<ChartRecord> {
    let time = match raw.time.as_ref() {
        Some(raw_time) => resolve(raw_time)?,
        None => return Err(AppError::MissingTime { index: None }),
    };

    let bar = match (finite(raw.open), finite(raw.close)) {
        (Some(open), Some(close)) => Some(normalize_bar(time, open, finite(raw.high), finite(raw.low), close)),
        _ => None,
    };

    let indicators = IndicatorValues {
        ema: finite(raw.ema),
        tenkan: finite(raw.tenkan),
        kijun: finite(raw.kijun),
        span_a: finite(raw.span_a),
        span_b: finite(raw.span_b),
        atr: finite(raw.atr),
        rsi: finite(raw.rsi),
        stoch_k: finite(raw.stoch_k),
        stoch_d: finite(raw.stoch_d),
    };

    Ok(ChartRecord {
        time,
        bar,
        indicators,
        signal: raw.signal.as_deref().map(SignalKind::parse).unwrap_or_default(),
        volatility_spike: raw.volatility_spike == Some(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klcommon::StructuredTime;

    fn structured(seconds: Option<f64>, epoch_second: Option<f64>) -> RawTime {
        RawTime::Structured(StructuredTime { seconds, epoch_second })
    }

    #[test]
    fn numeric_and_structured_resolve_to_same_domain() {
        assert_eq!(resolve(&RawTime::Numeric(1_700_000_000.0)).unwrap(), 1_700_000_000);
        assert_eq!(resolve(&RawTime::Numeric(1_700_000_000.9)).unwrap(), 1_700_000_000);
        assert_eq!(resolve(&structured(Some(1_700_000_000.0), None)).unwrap(), 1_700_000_000);
        assert_eq!(resolve(&structured(None, Some(1_700_000_000.0))).unwrap(), 1_700_000_000);
    }

    #[test]
    fn seconds_preferred_over_epoch_second() {
        assert_eq!(resolve(&structured(Some(10.0), Some(20.0))).unwrap(), 10);
        // seconds 为0时按未设置处理，回退到 epochSecond
        assert_eq!(resolve(&structured(Some(0.0), Some(20.0))).unwrap(), 20);
    }

    #[test]
    fn falsy_times_are_missing() {
        assert!(matches!(resolve(&RawTime::Numeric(0.0)), Err(AppError::MissingTime { .. })));
        assert!(matches!(resolve(&structured(None, None)), Err(AppError::MissingTime { .. })));
        assert!(matches!(resolve(&structured(Some(0.0), Some(0.0))), Err(AppError::MissingTime { .. })));
        assert!(matches!(resolve(&RawTime::Text(String::new())), Err(AppError::MissingTime { .. })));
    }

    #[test]
    fn text_times_accept_numbers_and_rfc3339() {
        assert_eq!(resolve(&RawTime::Text("1700000000".into())).unwrap(), 1_700_000_000);
        assert_eq!(resolve(&RawTime::Text("2023-11-14T22:13:20Z".into())).unwrap(), 1_700_000_000);
        assert!(resolve(&RawTime::Text("yesterday".into())).is_err());
    }

    #[test]
    fn validate_requires_time() {
        let raw = RawRecord { open: Some(1.0), close: Some(2.0), ..Default::default() };
        assert!(matches!(validate(raw), Err(AppError::MissingTime { .. })));
    }

    #[test]
    fn validate_builds_bar_only_with_open_and_close() {
        let raw = RawRecord {
            time: Some(RawTime::Numeric(1000.0)),
            open: Some(10.0),
            rsi: Some(75.0),
            ..Default::default()
        };
        let record = validate(raw).unwrap();
        assert!(record.bar.is_none());
        assert_eq!(record.indicators.rsi, Some(75.0));
        assert!(record.signal.is_none());
        assert!(!record.volatility_spike);
    }

    #[test]
    fn validate_widens_inconsistent_high_low() {
        let raw = RawRecord {
            time: Some(RawTime::Numeric(1000.0)),
            open: Some(10.0),
            high: Some(10.5),
            close: Some(11.0),
            ..Default::default()
        };
        let bar = validate(raw).unwrap().bar.unwrap();
        assert_eq!(bar.high, 11.0);
        assert_eq!(bar.low, 10.0);
    }

    #[test]
    fn non_finite_indicator_values_are_dropped() {
        let raw = RawRecord {
            time: Some(RawTime::Numeric(1000.0)),
            ema: Some(f64::NAN),
            atr: Some(2.5),
            ..Default::default()
        };
        let record = validate(raw).unwrap();
        assert_eq!(record.indicators.ema, None);
        assert_eq!(record.indicators.atr, Some(2.5));
    }
}
