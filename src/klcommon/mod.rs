// 导出共享模块
pub mod config;
pub mod error;
pub mod logging_setup;
pub mod models;

// 重新导出常用类型，方便使用
pub use config::{ChartConfig, LoggingConfig, PaletteConfig, PaneConfig, ScaleMargins, ServerConfig, SessionConfig};
pub use error::{AppError, Result};
pub use models::{
    Bar, ChartRecord, ChartTime, HasTime, IndicatorPoint, IndicatorValues, Marker, MarkerPosition,
    MarkerShape, RawRecord, RawTime, SeriesId, SignalKind, StructuredTime,
};
