#[cfg(test)]
mod tests {
    use kline_chart::klchart::{ChartContext, LegendSource, PointerState, TickOutcome};
    use kline_chart::klcommon::{
        AppError, ChartConfig, IndicatorPoint, MarkerPosition, MarkerShape, SeriesId,
    };
    use std::sync::Arc;

    fn new_context() -> ChartContext {
        ChartContext::new(Arc::new(ChartConfig::default()))
    }

    // 构造一段按小时递增的历史数据
    fn hourly_history(count: i64) -> String {
        let signals = ["NONE", "BUY_TK", "SELL_TK", "PULLBACK_BUY"];
        let records: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                let open = 100.0 + i as f64;
                serde_json::json!({
                    "time": 1_700_000_000 + i * 3600,
                    "open": open,
                    "high": open + 2.0,
                    "low": open - 1.0,
                    "close": open + 1.0,
                    "ema": open + 0.5,
                    "spanA": if i % 2 == 0 { 0.0 } else { open },
                    "rsi": 50.0,
                    "signal": signals[(i % 4) as usize],
                    "volatilitySpike": i % 3 == 0,
                })
            })
            .collect();
        serde_json::to_string(&records).unwrap()
    }

    #[test]
    fn test_history_one_bar_per_time_in_input_order() {
        let mut ctx = new_context();
        ctx.load_history(&hourly_history(12)).unwrap();

        let times: Vec<i64> = ctx.registry().candles().as_slice().iter().map(|b| b.time).collect();
        let expected: Vec<i64> = (0..12).map(|i| 1_700_000_000 + i * 3600).collect();
        assert_eq!(times, expected);

        // 每个非 NONE 信号恰好一个标注
        let markers = ctx.registry().markers(SeriesId::Candles);
        assert_eq!(markers.len(), 9);
        for marker in markers {
            let index = (marker.time - 1_700_000_000) / 3600;
            match index % 4 {
                1 => {
                    assert_eq!(marker.text, "BUY_TK");
                    assert_eq!(marker.position, MarkerPosition::BelowBar);
                    assert_eq!(marker.color, "#26a69a");
                }
                2 => {
                    assert_eq!(marker.text, "SELL_TK");
                    assert_eq!(marker.position, MarkerPosition::AboveBar);
                    assert_eq!(marker.shape, MarkerShape::ArrowDown);
                }
                3 => {
                    assert_eq!(marker.text, "SQUEEZE");
                    assert_eq!(marker.color, "#2196F3");
                }
                _ => panic!("NONE 信号不应产生标注"),
            }
        }

        // 尖峰标注只挂在ATR序列上
        assert_eq!(ctx.registry().markers(SeriesId::Atr).len(), 4);

        // 云图只有正值被投影
        let span_a = ctx.registry().line(SeriesId::SpanA).unwrap().as_slice();
        assert_eq!(span_a.len(), 6);
        assert!(span_a.iter().all(|p| (p.time - 93_600 - 1_700_000_000) % 7200 == 3600));
    }

    #[test]
    fn test_scenario_single_record_load() {
        let mut ctx = new_context();
        ctx.load_history(r#"[{"time":1000,"open":10,"high":12,"low":9,"close":11,"rsi":75,"signal":"BUY"}]"#)
            .unwrap();

        let candles = ctx.registry().candles().as_slice();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].time, 1000);
        assert_eq!(
            ctx.registry().line(SeriesId::Rsi).unwrap().as_slice(),
            &[IndicatorPoint { time: 1000, value: 75.0 }]
        );

        let markers = serde_json::to_value(ctx.registry().markers(SeriesId::Candles)).unwrap();
        assert_eq!(markers.as_array().unwrap().len(), 1);
        assert_eq!(markers[0]["time"], 1000);
        assert_eq!(markers[0]["position"], "belowBar");
        assert_eq!(markers[0]["shape"], "arrowUp");
        assert_eq!(markers[0]["text"], "BUY");
    }

    #[test]
    fn test_tick_with_existing_time_replaces_bar() {
        let mut ctx = new_context();
        ctx.load_history(&hourly_history(3)).unwrap();
        let last_time = 1_700_000_000 + 2 * 3600;

        let tick = format!(r#"{{"time":{},"open":102,"high":110,"low":90,"close":95}}"#, last_time);
        assert!(ctx.apply_tick(&tick).is_applied());

        let candles = ctx.registry().candles().as_slice();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[2].close, 95.0);
        assert_eq!(candles[2].high, 110.0);
    }

    #[test]
    fn test_tick_without_time_leaves_series_unchanged() {
        let mut ctx = new_context();
        ctx.load_history(&hourly_history(3)).unwrap();
        let before = serde_json::to_value(ctx.registry().snapshot()).unwrap();

        for payload in [
            r#"{"open":1,"close":2,"rsi":10}"#,
            r#"{"time":null,"atr":1,"volatilitySpike":true}"#,
            r#"{"time":{"seconds":0},"ema":3}"#,
            r#"{"time":0,"signal":"BUY_TK"}"#,
        ] {
            let outcome = ctx.apply_tick(payload);
            assert!(matches!(outcome, TickOutcome::Dropped { .. }), "{} 应被丢弃", payload);
        }

        let after = serde_json::to_value(ctx.registry().snapshot()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_signal_tick_merged_twice_yields_one_marker() {
        let mut ctx = new_context();
        let tick = r#"{"time":5000,"open":1,"close":2,"signal":"PULLBACK_BUY"}"#;
        ctx.apply_tick(tick);
        ctx.apply_tick(tick);
        let markers = ctx.registry().markers(SeriesId::Candles);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].text, "SQUEEZE");
    }

    #[test]
    fn test_scenario_atr_spike_merged_twice() {
        let mut ctx = new_context();
        let tick = r#"{"time":1000,"atr":2.5,"volatilitySpike":true}"#;
        ctx.apply_tick(tick);
        ctx.apply_tick(tick);

        assert_eq!(
            ctx.registry().line(SeriesId::Atr).unwrap().as_slice(),
            &[IndicatorPoint { time: 1000, value: 2.5 }]
        );
        let spikes = ctx.registry().markers(SeriesId::Atr);
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].time, 1000);
        assert_eq!(spikes[0].shape, MarkerShape::Circle);
        assert!(ctx.registry().markers(SeriesId::Candles).is_empty());
    }

    #[test]
    fn test_cloud_displacement_hourly() {
        let mut ctx = new_context();
        ctx.apply_tick(r#"{"time":7200,"spanA":31.5,"spanB":0}"#);
        ctx.apply_tick(r#"{"time":10800,"spanB":29}"#);
        assert_eq!(
            ctx.registry().line(SeriesId::SpanA).unwrap().as_slice(),
            &[IndicatorPoint { time: 7200 + 93_600, value: 31.5 }]
        );
        assert_eq!(
            ctx.registry().line(SeriesId::SpanB).unwrap().as_slice(),
            &[IndicatorPoint { time: 10800 + 93_600, value: 29.0 }]
        );
    }

    #[test]
    fn test_legend_falls_back_to_latest_tick() {
        let mut ctx = new_context();
        ctx.apply_tick(r#"{"time":1000,"open":100,"close":105,"high":106,"low":99}"#);
        let legend = ctx.legend(&PointerState::left());
        let rendered = legend.render();
        assert_eq!(rendered.ohlc_text, "O 100.00 H 106.00 L 99.00 C 105.00");
        assert_eq!(rendered.ohlc_color.as_deref(), Some("#26a69a"));
        assert_eq!(rendered.fields["ema-val"], "n/a");
    }

    #[test]
    fn test_legend_hover_then_leave() {
        let mut ctx = new_context();
        ctx.load_history(&hourly_history(3)).unwrap();
        let first = 1_700_000_000;

        let hover = ctx.legend(&PointerState::at(first));
        assert_eq!(hover.source, LegendSource::Hover { time: first });
        assert_eq!(hover.render().fields["ema-val"], "100.50");

        let idle = ctx.legend(&PointerState::left());
        assert_eq!(idle.source, LegendSource::Latest { time: first + 2 * 3600 });
        assert_eq!(idle.render().ohlc_text, "O 102.00 H 104.00 L 101.00 C 103.00");
    }

    #[test]
    fn test_structured_and_text_times_share_domain() {
        let mut ctx = new_context();
        ctx.apply_tick(r#"{"time":{"epochSecond":1700000000,"nano":0},"rsi":10}"#);
        ctx.apply_tick(r#"{"time":{"seconds":1700000000},"rsi":20}"#);
        ctx.apply_tick(r#"{"time":"2023-11-14T22:13:20Z","rsi":30}"#);
        assert_eq!(
            ctx.registry().line(SeriesId::Rsi).unwrap().as_slice(),
            &[IndicatorPoint { time: 1_700_000_000, value: 30.0 }]
        );
    }

    #[test]
    fn test_failed_history_load_keeps_previous_chart() {
        let mut ctx = new_context();
        ctx.load_history(&hourly_history(3)).unwrap();
        let before = serde_json::to_value(ctx.registry().snapshot()).unwrap();

        let err = ctx.load_history(r#"[{"time":1,"open":1,"close":1},{"open":2,"close":2}]"#).unwrap_err();
        assert!(matches!(err, AppError::MissingTime { index: Some(1) }));
        assert!(!err.is_retryable());

        let after = serde_json::to_value(ctx.registry().snapshot()).unwrap();
        assert_eq!(before, after);
    }
}
