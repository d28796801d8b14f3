// ==========================================
// 设备维修管理 - 配置层
// ==========================================
// 职责: 系统配置管理 (指标默认值 / OEE 输入 / 编号前缀)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod reliability_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use reliability_config_trait::{ConfigResult, ReliabilityConfigReader};
