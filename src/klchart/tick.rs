//! 实时推送合并
//!
//! 每条推送独立处理：解析失败或缺少时间只丢弃这一条，任何一条坏数据都不会
//! 阻断后续推送。单条序列的过期更新只影响该序列，其余字段照常写入。

use serde::Serialize;
use tracing::{debug, warn};

use crate::klchart::{
    context::ChartContext,
    markers::{signal_marker, spike_marker, SPIKE_SERIES},
    time_key,
};
use crate::klcommon::{AppError, ChartRecord, ChartTime, IndicatorPoint, RawRecord, Result, SeriesId};

/// 短于此长度的坏载荷视为连接噪声，只记调试日志
const NOISE_PAYLOAD_LEN: usize = 10;

/// 推送被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    Malformed,
    MissingTime,
}

/// 一条推送的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TickOutcome {
    /// 空载荷：只表示连接存活
    Heartbeat,
    Applied {
        time: ChartTime,
        /// 数据或标注发生变化的序列
        touched: Vec<SeriesId>,
        /// 因时间早于最新点而被拒绝的序列
        rejected: Vec<SeriesId>,
    },
    Dropped { reason: DropReason },
}

impl TickOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TickOutcome::Applied { .. })
    }
}

/// 合并一条序列化的推送
pub fn merge_payload(ctx: &mut ChartContext, payload: &str) -> TickOutcome {
    if payload.trim().is_empty() {
        ctx.mark_connected();
        ctx.stats_mut().heartbeats += 1;
        return TickOutcome::Heartbeat;
    }

    let raw: RawRecord = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(e) => {
            if payload.len() > NOISE_PAYLOAD_LEN {
                warn!(target: "TickMerger", payload_len = payload.len(), "实时推送解析失败，已丢弃: {}", e);
            } else {
                debug!(target: "TickMerger", payload = %payload, "忽略过短的推送");
            }
            ctx.stats_mut().ticks_dropped += 1;
            return TickOutcome::Dropped { reason: DropReason::Malformed };
        }
    };

    ctx.mark_connected();
    match merge(ctx, raw) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                target: "TickMerger",
                error_type = e.get_error_type_summary(),
                "实时推送处理失败，已丢弃: {}", e
            );
            ctx.stats_mut().ticks_dropped += 1;
            TickOutcome::Dropped { reason: DropReason::Malformed }
        }
    }
}

/// 合并一条已解析的推送
pub fn merge(ctx: &mut ChartContext, raw: RawRecord) -> Result<TickOutcome> {
    let record = match time_key::validate(raw) {
        Ok(record) => record,
        Err(AppError::MissingTime { .. }) => {
            debug!(target: "TickMerger", "推送缺少时间戳，已丢弃");
            ctx.stats_mut().ticks_dropped += 1;
            return Ok(TickOutcome::Dropped { reason: DropReason::MissingTime });
        }
        Err(e) => return Err(e),
    };
    Ok(apply_record(ctx, record))
}

/// 把一条校验过的记录逐序列写入
pub fn apply_record(ctx: &mut ChartContext, record: ChartRecord) -> TickOutcome {
    let config = ctx.config_handle();
    let palette = &config.palette;
    let projector = ctx.projector();
    let time = record.time;
    let mut touched = Vec::new();
    let mut rejected = Vec::new();
    let mut markers_added = 0u64;

    if let Some(bar) = record.bar {
        match ctx.registry_mut().upsert_bar(bar) {
            Ok(_) => {
                let color = if bar.is_up() { &palette.up } else { &palette.down };
                ctx.registry_mut().set_price_line_color(color);
                touched.push(SeriesId::Candles);
            }
            Err(e) => reject(&mut rejected, SeriesId::Candles, e),
        }
    }

    for id in SeriesId::UNSHIFTED_LINES {
        if let Some(value) = record.indicators.get(id) {
            match ctx.registry_mut().upsert_line(id, IndicatorPoint { time, value }) {
                Ok(_) => touched.push(id),
                Err(e) => reject(&mut rejected, id, e),
            }
        }
    }

    for span in SeriesId::CLOUD_SPANS {
        if let Some(point) = projector.project_record(span, &record) {
            match ctx.registry_mut().upsert_line(span, point) {
                Ok(_) => touched.push(span),
                Err(e) => reject(&mut rejected, span, e),
            }
        }
    }

    // 宿主序列拒绝了这个时间时，标注也不落地
    let candles_stale = rejected.contains(&SeriesId::Candles);
    if let Some(marker) = signal_marker(time, &record.signal, palette, config.chart.compact_signal_labels)
        .filter(|_| !candles_stale)
    {
        if ctx.registry_mut().add_marker(SeriesId::Candles, marker) {
            markers_added += 1;
            if !touched.contains(&SeriesId::Candles) {
                touched.push(SeriesId::Candles);
            }
        }
    }

    if record.volatility_spike
        && !rejected.contains(&SPIKE_SERIES)
        && ctx.registry_mut().add_marker(SPIKE_SERIES, spike_marker(time, palette))
    {
        markers_added += 1;
        if !touched.contains(&SPIKE_SERIES) {
            touched.push(SPIKE_SERIES);
        }
    }

    // 过期推送不能顶替图上最新的一根
    if !candles_stale && (rejected.is_empty() || !touched.is_empty()) {
        ctx.set_latest(Some(record));
    }

    let stats = ctx.stats_mut();
    stats.ticks_applied += 1;
    stats.markers_added += markers_added;

    debug!(target: "TickMerger", time, touched = touched.len(), rejected = rejected.len(), "实时推送已合并");

    TickOutcome::Applied { time, touched, rejected }
}

fn reject(rejected: &mut Vec<SeriesId>, id: SeriesId, e: AppError) {
    warn!(target: "TickMerger", series = %id, error_type = e.get_error_type_summary(), "{}", e);
    rejected.push(id);
}
