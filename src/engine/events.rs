// src/engine/events.rs
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::klchart::{
    ChartSnapshot, LegendContext, LoadReport, PointerState, RenderedLegend, SeriesDelta, SessionStats,
    TickOutcome, ViewCommand,
};
use crate::klcommon::{ChartTime, Result};

/// 驱动 ChartEngine 状态变更的唯一事件源
#[derive(Debug)]
pub enum ChartEvent {
    /// 历史批次（JSON数组原文）
    LoadHistory {
        payload: String,
        reply: oneshot::Sender<Result<LoadReport>>,
    },
    /// 实时推送原文；空字符串是心跳
    Tick {
        payload: String,
        reply: Option<oneshot::Sender<TickOutcome>>,
    },
    /// 外部断线通知
    Disconnected,
    /// 指针移动或离开绘图区
    Pointer {
        pointer: PointerState,
        reply: Option<oneshot::Sender<LegendContext>>,
    },
    /// 窗口尺寸变化
    Resize { width: u32, height: u32 },
    Snapshot { reply: oneshot::Sender<ChartSnapshot> },
    Status { reply: oneshot::Sender<EngineStatus> },
}

/// 状态更新结构，用于增量状态推送
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    /// 单调递增的发布序号
    pub version: u64,
    /// 历史重新加载后为 true，客户端应重新拉取完整快照
    pub reset: bool,
    /// 最近一次重置所在的发布序号，后续增量沿用，
    /// 错过 reset 更新的客户端据此发现需要重新拉取快照
    pub reset_version: u64,
    /// 本次更新中发生变化的序列
    pub deltas: Arc<Vec<SeriesDelta>>,
    pub price_line_color: String,
    pub legend: Option<Arc<RenderedLegend>>,
    pub connected: bool,
    pub view_commands: Arc<Vec<ViewCommand>>,
}

/// 引擎运行状态
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub symbol: String,
    pub connected: bool,
    pub version: u64,
    pub latest_time: Option<ChartTime>,
    pub total_points: usize,
    pub stats: SessionStats,
}
