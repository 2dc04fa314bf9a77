//! 图表上下文
//!
//! 显式持有所有序列句柄、云图投影器和"最新记录"单元。历史加载、实时合并和
//! 图例解析都通过它读写状态，没有任何进程级单例。

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::klchart::{
    cloud::CloudProjector,
    legend::{self, LegendContext, PointerState},
    registry::SeriesRegistry,
    snapshot::{self, LoadReport},
    tick::{self, TickOutcome},
};
use crate::klcommon::{ChartConfig, ChartRecord, Result};

/// 交给图表控件执行的视图指令，与数据更新无关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ViewCommand {
    /// 把可见范围适配到全部内容
    FitContent,
    /// 窗口尺寸变化，原样转发
    Resize { width: u32, height: u32 },
}

/// 会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub loads: u64,
    pub failed_loads: u64,
    pub ticks_applied: u64,
    pub ticks_dropped: u64,
    pub heartbeats: u64,
    pub markers_added: u64,
}

#[derive(Debug, Clone)]
pub struct ChartContext {
    config: Arc<ChartConfig>,
    registry: SeriesRegistry,
    projector: CloudProjector,
    latest: Option<ChartRecord>,
    connected: bool,
    view_commands: Vec<ViewCommand>,
    stats: SessionStats,
}

impl ChartContext {
    /// 唯一的初始化入口
    pub fn new(config: Arc<ChartConfig>) -> Self {
        let registry = SeriesRegistry::new(&config);
        let projector = CloudProjector::from_session(&config.chart);
        info!(
            target: "ChartContext",
            symbol = %config.chart.symbol,
            interval_minutes = config.chart.bar_interval_minutes,
            displacement_secs = projector.displacement(),
            "图表上下文已创建"
        );
        Self {
            config,
            registry,
            projector,
            latest: None,
            connected: false,
            view_commands: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub(crate) fn config_handle(&self) -> Arc<ChartConfig> {
        Arc::clone(&self.config)
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut SeriesRegistry {
        &mut self.registry
    }

    pub fn projector(&self) -> CloudProjector {
        self.projector
    }

    /// 图例回退使用的最新记录
    pub fn latest(&self) -> Option<&ChartRecord> {
        self.latest.as_ref()
    }

    pub(crate) fn set_latest(&mut self, record: Option<ChartRecord>) {
        self.latest = record;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn mark_connected(&mut self) {
        if !self.connected {
            info!(target: "ChartContext", "实时通道已连接");
        }
        self.connected = true;
    }

    /// 外部断线通知
    pub fn mark_disconnected(&mut self) {
        if self.connected {
            info!(target: "ChartContext", "实时通道已断开");
        }
        self.connected = false;
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }

    pub(crate) fn push_view_command(&mut self, command: ViewCommand) {
        self.view_commands.push(command);
    }

    /// 取走所有待执行的视图指令
    pub fn drain_view_commands(&mut self) -> Vec<ViewCommand> {
        std::mem::take(&mut self.view_commands)
    }

    /// 加载一份历史批次（JSON数组）
    pub fn load_history(&mut self, payload: &str) -> Result<LoadReport> {
        snapshot::load(self, payload)
    }

    /// 合并一条实时推送，从不向上抛错
    pub fn apply_tick(&mut self, payload: &str) -> TickOutcome {
        tick::merge_payload(self, payload)
    }

    /// 根据指针位置解析图例
    pub fn legend(&self, pointer: &PointerState) -> LegendContext {
        legend::resolve(self, pointer)
    }

    /// 窗口尺寸变化，原样转发给图表控件
    pub fn resize(&mut self, width: u32, height: u32) {
        self.push_view_command(ViewCommand::Resize { width, height });
    }
}
