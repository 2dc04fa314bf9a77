use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineHandle, StateUpdate};
use crate::klchart::{LegendContext, PointerState, RenderedLegend};
use crate::klcommon::{AppError, ChartTime};

/// Web层共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub state_rx: watch::Receiver<StateUpdate>,
}

/// 错误响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_type: &'static str,
}

/// 把 `AppError` 转成 HTTP 响应
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::MalformedPayload(_)
            | AppError::JsonError(_)
            | AppError::MissingTime { .. }
            | AppError::OutOfOrder { .. }
            | AppError::StaleUpdate { .. } => StatusCode::BAD_REQUEST,
            AppError::ChannelError(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            error_type: self.0.get_error_type_summary(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// POST /api/history，请求体为历史记录 JSON 数组
pub async fn history_handler(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    info!(target: "WebServer", bytes = body.len(), "收到历史数据");
    match state.engine.load_history(body).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!(target: "WebServer", error_type = e.get_error_type_summary(), "历史数据加载被拒绝: {}", e);
            ApiError(e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LegendQuery {
    pub time: Option<ChartTime>,
}

#[derive(Debug, Serialize)]
pub struct LegendResponse {
    pub context: LegendContext,
    pub rendered: RenderedLegend,
}

/// GET /api/legend?time=，不带 time 表示指针离开绘图区
pub async fn legend_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LegendQuery>,
) -> ApiResult<LegendResponse> {
    let context = state.engine.pointer(PointerState { time: query.time }).await?;
    let rendered = context.render();
    Ok(Json(LegendResponse { context, rendered }))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub width: u32,
    pub height: u32,
}

/// POST /api/resize
pub async fn resize_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResizeRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    state.engine.resize(request.width, request.height).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/snapshot
pub async fn snapshot_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /api/status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /ws/feed，实时行情源连接；每个文本帧是一条推送
pub async fn feed_ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = state.engine.clone();
    ws.on_upgrade(move |socket| handle_feed_socket(socket, engine))
}

async fn handle_feed_socket(mut socket: WebSocket, engine: EngineHandle) {
    info!(target: "WebServer", "实时行情源已连接");
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = engine.tick(text).await {
                    error!(target: "WebServer", "推送无法投递到图表引擎: {}", e);
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(target: "WebServer", error = ?e, "实时行情连接异常");
                break;
            }
        }
    }
    engine.disconnected().await.ok();
    info!(target: "WebServer", "实时行情源已断开");
}

/// GET /ws/view，向渲染端推送 StateUpdate
pub async fn view_ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let state_rx = state.state_rx.clone();
    ws.on_upgrade(move |socket| handle_view_socket(socket, state_rx))
}

async fn handle_view_socket(mut socket: WebSocket, mut state_rx: watch::Receiver<StateUpdate>) {
    // 先推送当前状态
    let current = state_rx.borrow_and_update().clone();
    if !push_update(&mut socket, &current).await {
        return;
    }

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = state_rx.borrow_and_update().clone();
                if !push_update(&mut socket, &update).await {
                    break;
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(target: "WebServer", "渲染端已断开");
}

async fn push_update(socket: &mut WebSocket, update: &StateUpdate) -> bool {
    let json = match serde_json::to_string(update) {
        Ok(json) => json,
        Err(e) => {
            error!(target: "WebServer", "状态更新序列化失败: {}", e);
            return false;
        }
    };
    socket.send(Message::Text(json)).await.is_ok()
}
