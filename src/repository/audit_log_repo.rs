// ==========================================
// 设备维修管理 - 审计日志数据仓储
// ==========================================
// 依据: audit_log 表
// 红线: 审计日志只追加 (无 update / delete)
// ==========================================

mod core;
mod queries;


pub use self::core::AuditLogRepository;
pub(crate) use self::core::insert_audit;
