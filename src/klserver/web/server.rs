// Web服务器实现
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{get, get_service, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::engine::{EngineHandle, StateUpdate};
use crate::klcommon::{AppError, Result, ServerConfig};

use super::handlers::{self, AppState};

/// 组装路由
pub fn build_router(engine: EngineHandle, state_rx: watch::Receiver<StateUpdate>, static_dir: &str) -> Router {
    let app_state = Arc::new(AppState { engine, state_rx });

    Router::new()
        .route("/api/history", post(handlers::history_handler))
        .route("/api/legend", get(handlers::legend_handler))
        .route("/api/resize", post(handlers::resize_handler))
        .route("/api/snapshot", get(handlers::snapshot_handler))
        .route("/api/status", get(handlers::status_handler))
        .route("/ws/feed", get(handlers::feed_ws_handler))
        .route("/ws/view", get(handlers::view_ws_handler))
        // 其他请求都交给静态文件服务
        .fallback_service(get_service(ServeDir::new(static_dir)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// 在已绑定的监听器上运行服务
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    match axum::serve(listener, app).await {
        Ok(_) => {
            info!(target: "WebServer", "Web服务器已关闭");
            Ok(())
        }
        Err(e) => {
            error!(target: "WebServer", error = ?e, "Web服务器错误");
            Err(AppError::WebServerError(format!("Web服务器错误: {}", e)))
        }
    }
}

/// 启动Web服务器
pub async fn start_web_server(
    config: &ServerConfig,
    engine: EngineHandle,
    state_rx: watch::Receiver<StateUpdate>,
) -> Result<()> {
    let addr: SocketAddr = config.bind_addr.parse()?;
    let app = build_router(engine, state_rx, &config.static_dir);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::WebServerError(format!("绑定地址失败: {}", e)))?;

    info!(target: "WebServer", addr = %addr, static_dir = %config.static_dir, "Web服务器启动在 http://{}", addr);
    serve(listener, app).await
}
