// ==========================================
// 设备维修管理 - 领域层错误类型
// ==========================================

use thiserror::Error;

/// 领域不变量错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("不变量违反: {0}")]
    InvariantViolation(String),

    #[error("周期定义非法: {0}")]
    InvalidPeriod(String),

    #[error("触发条件非法: {0}")]
    InvalidTrigger(String),
}
