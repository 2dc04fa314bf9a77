use thiserror::Error;
use std::net::AddrParseError;

use crate::klcommon::models::{ChartTime, SeriesId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing time in record{}", .index.map(|i| format!(" #{}", i)).unwrap_or_default())]
    MissingTime { index: Option<usize> },

    #[error("Out of order history: record #{index} time {time} is not after {previous}")]
    OutOfOrder {
        index: usize,
        time: ChartTime,
        previous: ChartTime,
    },

    #[error("Stale update on {series}: time {time} is older than latest {latest}")]
    StaleUpdate {
        series: SeriesId,
        time: ChartTime,
        latest: ChartTime,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Address parse error: {0}")]
    AddrParseError(#[from] AddrParseError),

    #[error("Web server error: {0}")]
    WebServerError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl AppError {
    /// 获取错误类型的简洁摘要，作为结构化日志字段用于错误聚合
    pub fn get_error_type_summary(&self) -> &'static str {
        match self {
            // 载荷解析相关
            AppError::MalformedPayload(_) |
            AppError::JsonError(_) => "chart_payload_malformed",
            AppError::MissingTime { .. } => "chart_record_time_missing",
            AppError::OutOfOrder { .. } => "chart_history_out_of_order",

            // 序列更新相关
            AppError::StaleUpdate { .. } => "chart_series_update_stale",

            // 系统资源相关
            AppError::IoError(_) => "chart_file_operation_failed",
            AppError::ChannelError(_) => "chart_engine_pipeline_failed",

            // 配置与服务相关
            AppError::ConfigError(_) => "chart_service_configuration_invalid",
            AppError::AddrParseError(_) => "chart_server_address_invalid",
            AppError::WebServerError(_) => "chart_api_server_failed",
        }
    }

    /// 检查错误是否值得整体重试
    ///
    /// 历史加载失败后调用方可以重试整个批次；载荷本身有问题时重试没有意义
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::IoError(_) |
            AppError::ChannelError(_) => true,

            AppError::MalformedPayload(_) |
            AppError::JsonError(_) |
            AppError::MissingTime { .. } |
            AppError::OutOfOrder { .. } |
            AppError::StaleUpdate { .. } |
            AppError::ConfigError(_) |
            AppError::AddrParseError(_) |
            AppError::WebServerError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_time_message_includes_index_when_known() {
        assert_eq!(AppError::MissingTime { index: Some(3) }.to_string(), "Missing time in record #3");
        assert_eq!(AppError::MissingTime { index: None }.to_string(), "Missing time in record");
    }

    #[test]
    fn payload_errors_are_not_retryable() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.get_error_type_summary(), "chart_payload_malformed");
        assert!(!err.is_retryable());
        assert!(AppError::ChannelError("closed".into()).is_retryable());
    }
}
