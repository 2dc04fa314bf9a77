// src/engine/mod.rs
pub mod events;
pub mod tracker;


use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use events::{ChartEvent, EngineStatus, StateUpdate};
use tracker::DirtyTracker;

use crate::klchart::{
    ChartContext, ChartSnapshot, LegendContext, LoadReport, PointerState, TickOutcome,
};
use crate::klcommon::{AppError, ChartConfig, Result};

/// 单写者引擎：独占 `ChartContext`，所有修改都经过事件队列串行执行
pub struct ChartEngine {
    ctx: ChartContext,
    pointer: PointerState,
    dirty_tracker: DirtyTracker,
    version: u64,
    reset_version: u64,
    last_connected: bool,

    // 通信
    event_rx: mpsc::Receiver<ChartEvent>,
    state_watch_tx: watch::Sender<StateUpdate>,
}

impl ChartEngine {
    pub fn new(
        config: Arc<ChartConfig>,
        event_rx: mpsc::Receiver<ChartEvent>,
        state_watch_tx: watch::Sender<StateUpdate>,
    ) -> Self {
        Self {
            ctx: ChartContext::new(config),
            pointer: PointerState::left(),
            dirty_tracker: DirtyTracker::new(),
            version: 0,
            reset_version: 0,
            last_connected: false,
            event_rx,
            state_watch_tx,
        }
    }

    /// 创建通道并在后台任务中启动引擎
    pub fn spawn(config: Arc<ChartConfig>) -> (EngineHandle, watch::Receiver<StateUpdate>, JoinHandle<()>) {
        let capacity = config.server.channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (state_watch_tx, state_watch_rx) = watch::channel(StateUpdate::default());
        let engine = ChartEngine::new(config, event_rx, state_watch_tx);
        let join = tokio::spawn(engine.run());
        (EngineHandle::new(event_tx), state_watch_rx, join)
    }

    pub async fn run(mut self) {
        info!(target: "ChartEngine", "图表引擎已启动");
        while let Some(event) = self.event_rx.recv().await {
            self.handle_event(event);
        }
        info!(target: "ChartEngine", version = self.version, "事件通道已关闭，图表引擎退出");
    }

    fn handle_event(&mut self, event: ChartEvent) {
        match event {
            ChartEvent::LoadHistory { payload, reply } => {
                let result = self.ctx.load_history(&payload);
                if result.is_ok() {
                    self.dirty_tracker.mark_all();
                    self.publish(true);
                }
                if reply.send(result).is_err() {
                    debug!(target: "ChartEngine", "历史加载的请求方已放弃等待");
                }
            }
            ChartEvent::Tick { payload, reply } => {
                let outcome = self.ctx.apply_tick(&payload);
                if let TickOutcome::Applied { touched, .. } = &outcome {
                    for id in touched {
                        self.dirty_tracker.mark_dirty(*id);
                    }
                }
                if !self.dirty_tracker.is_empty() || self.ctx.is_connected() != self.last_connected {
                    self.publish(false);
                }
                if let Some(reply) = reply {
                    reply.send(outcome).ok();
                }
            }
            ChartEvent::Disconnected => {
                self.ctx.mark_disconnected();
                if self.last_connected {
                    self.publish(false);
                }
            }
            ChartEvent::Pointer { pointer, reply } => {
                self.pointer = pointer;
                if let Some(reply) = reply {
                    reply.send(self.ctx.legend(&pointer)).ok();
                }
                self.publish(false);
            }
            ChartEvent::Resize { width, height } => {
                debug!(target: "ChartEngine", width, height, "转发窗口尺寸变化");
                self.ctx.resize(width, height);
                self.publish(false);
            }
            ChartEvent::Snapshot { reply } => {
                reply.send(self.ctx.registry().snapshot()).ok();
            }
            ChartEvent::Status { reply } => {
                reply.send(self.status()).ok();
            }
        }
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            symbol: self.ctx.config().chart.symbol.clone(),
            connected: self.ctx.is_connected(),
            version: self.version,
            latest_time: self.ctx.latest().map(|r| r.time),
            total_points: self.ctx.registry().total_points(),
            stats: self.ctx.stats(),
        }
    }

    fn publish(&mut self, reset: bool) {
        let dirty = self.dirty_tracker.collect_and_reset();
        let deltas: Vec<_> = dirty.into_iter().map(|id| self.ctx.registry().delta(id)).collect();
        let legend = self.ctx.legend(&self.pointer).render();
        let view_commands = self.ctx.drain_view_commands();

        self.version += 1;
        if reset {
            self.reset_version = self.version;
        }
        self.last_connected = self.ctx.is_connected();

        let update = StateUpdate {
            version: self.version,
            reset,
            reset_version: self.reset_version,
            deltas: Arc::new(deltas),
            price_line_color: self.ctx.registry().price_line_color().to_string(),
            legend: Some(Arc::new(legend)),
            connected: self.last_connected,
            view_commands: Arc::new(view_commands),
        };
        // 没有订阅者时也要保留最新值
        self.state_watch_tx.send_replace(update);
    }
}

/// 引擎的发送端句柄，可在任意任务间克隆
#[derive(Clone, Debug)]
pub struct EngineHandle {
    event_tx: mpsc::Sender<ChartEvent>,
}

impl EngineHandle {
    pub fn new(event_tx: mpsc::Sender<ChartEvent>) -> Self {
        Self { event_tx }
    }

    async fn send(&self, event: ChartEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| AppError::ChannelError("图表引擎事件通道已关闭".to_string()))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ChartEvent) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| AppError::ChannelError("图表引擎未回复请求".to_string()))
    }

    pub async fn load_history(&self, payload: String) -> Result<LoadReport> {
        self.request(|reply| ChartEvent::LoadHistory { payload, reply }).await?
    }

    /// 投递一条推送，不等待处理结果
    pub async fn tick(&self, payload: String) -> Result<()> {
        self.send(ChartEvent::Tick { payload, reply: None }).await
    }

    pub async fn tick_and_wait(&self, payload: String) -> Result<TickOutcome> {
        self.request(|reply| ChartEvent::Tick { payload, reply: Some(reply) }).await
    }

    pub async fn pointer(&self, pointer: PointerState) -> Result<LegendContext> {
        self.request(|reply| ChartEvent::Pointer { pointer, reply: Some(reply) }).await
    }

    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.send(ChartEvent::Resize { width, height }).await
    }

    pub async fn disconnected(&self) -> Result<()> {
        if let Err(e) = self.send(ChartEvent::Disconnected).await {
            warn!(target: "ChartEngine", "无法投递断线通知: {}", e);
            return Err(e);
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<ChartSnapshot> {
        self.request(|reply| ChartEvent::Snapshot { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        self.request(|reply| ChartEvent::Status { reply }).await
    }
}
