// 导出服务器相关模块
pub mod web;

// 重新导出一些常用模块，方便使用
pub use self::web::{build_router, serve, start_web_server};
