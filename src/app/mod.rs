// ==========================================
// 设备维修管理 - 应用层
// ==========================================
// 职责: 组装各层实例, 提供 JSON 命令入口
// ==========================================

pub mod commands;
pub mod state;

// 重导出
pub use commands::map_api_error;
pub use state::{get_default_db_path, AppState};
