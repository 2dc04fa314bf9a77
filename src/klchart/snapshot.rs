//! 历史快照加载
//!
//! 整批解析和校验都在修改任何序列之前完成：解析失败、时间缺失或时间不递增时
//! 图表保持调用前的状态。校验通过后按步骤一次性初始化每条序列。

use serde::Serialize;
use tracing::{error, info};

use crate::klchart::{
    context::{ChartContext, ViewCommand},
    markers::{signal_marker, spike_marker, SPIKE_SERIES},
    time_key,
};
use crate::klcommon::{
    AppError, Bar, ChartRecord, ChartTime, IndicatorPoint, RawRecord, Result, SeriesId,
};

/// 一次历史加载的结果摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub records: usize,
    pub bars: usize,
    pub indicator_points: usize,
    pub candle_markers: usize,
    pub spike_markers: usize,
    pub cloud_points: usize,
    pub first_time: Option<ChartTime>,
    pub last_time: Option<ChartTime>,
}

/// 解析并校验整批历史数据，不触碰任何状态
///
/// 历史记录缺失时间是致命错误，因为顺序依赖它；时间必须严格递增。
pub fn parse_batch(payload: &str) -> Result<Vec<ChartRecord>> {
    let raws: Vec<RawRecord> = serde_json::from_str(payload)
        .map_err(|e| AppError::MalformedPayload(format!("历史批次解析失败: {}", e)))?;

    let mut records = Vec::with_capacity(raws.len());
    let mut previous: Option<ChartTime> = None;
    for (index, raw) in raws.into_iter().enumerate() {
        let record = time_key::validate(raw).map_err(|e| match e {
            AppError::MissingTime { .. } => AppError::MissingTime { index: Some(index) },
            other => other,
        })?;
        if let Some(previous) = previous {
            if record.time <= previous {
                return Err(AppError::OutOfOrder { index, time: record.time, previous });
            }
        }
        previous = Some(record.time);
        records.push(record);
    }
    Ok(records)
}

/// 加载一份历史批次
pub fn load(ctx: &mut ChartContext, payload: &str) -> Result<LoadReport> {
    let records = match parse_batch(payload) {
        Ok(records) => records,
        Err(e) => {
            ctx.stats_mut().failed_loads += 1;
            error!(
                target: "SnapshotLoader",
                error_type = e.get_error_type_summary(),
                payload_len = payload.len(),
                "历史加载失败，图表保持原状态: {}", e
            );
            return Err(e);
        }
    };
    Ok(apply_batch(ctx, records))
}

/// 用已校验的批次初始化所有序列
pub fn apply_batch(ctx: &mut ChartContext, records: Vec<ChartRecord>) -> LoadReport {
    let config = ctx.config_handle();
    let palette = &config.palette;
    let compact = config.chart.compact_signal_labels;
    let projector = ctx.projector();
    let mut report = LoadReport {
        records: records.len(),
        first_time: records.first().map(|r| r.time),
        last_time: records.last().map(|r| r.time),
        ..Default::default()
    };

    // 1. 蜡烛，按数组顺序安装
    let bars: Vec<Bar> = records.iter().filter_map(|r| r.bar).collect();
    report.bars = bars.len();
    ctx.registry_mut().set_bars(bars);

    // 2. 各指标线，缺失值不产生点
    for id in SeriesId::UNSHIFTED_LINES {
        let points: Vec<IndicatorPoint> = records
            .iter()
            .filter_map(|r| r.indicators.get(id).map(|value| IndicatorPoint { time: r.time, value }))
            .collect();
        report.indicator_points += points.len();
        ctx.registry_mut().set_line(id, points);
    }

    // 3. 蜡烛信号标注，先过滤掉 NONE
    let candle_markers: Vec<_> = records
        .iter()
        .filter(|r| !r.signal.is_none())
        .filter_map(|r| signal_marker(r.time, &r.signal, palette, compact))
        .collect();
    report.candle_markers = candle_markers.len();
    ctx.registry_mut().set_markers(SeriesId::Candles, candle_markers);

    // 4. 波动尖峰标注
    let spike_markers: Vec<_> = records
        .iter()
        .filter(|r| r.volatility_spike)
        .map(|r| spike_marker(r.time, palette))
        .collect();
    report.spike_markers = spike_markers.len();
    ctx.registry_mut().set_markers(SPIKE_SERIES, spike_markers);

    // 5. 云图跨度线，整批前移
    for span in SeriesId::CLOUD_SPANS {
        let points = projector.project_batch(span, &records);
        report.cloud_points += points.len();
        ctx.registry_mut().set_line(span, points);
    }

    // 6. 最后一条作为图例回退的最新记录
    ctx.set_latest(records.into_iter().last());

    // 7. 适配可见范围
    ctx.push_view_command(ViewCommand::FitContent);

    let stats = ctx.stats_mut();
    stats.loads += 1;
    stats.markers_added += (report.candle_markers + report.spike_markers) as u64;

    info!(
        target: "SnapshotLoader",
        records = report.records,
        bars = report.bars,
        candle_markers = report.candle_markers,
        spike_markers = report.spike_markers,
        cloud_points = report.cloud_points,
        "历史数据加载完成"
    );

    report
}
