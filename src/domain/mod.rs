// ==========================================
// 设备维修管理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、不变量
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit_log;
pub mod document_sequence;
pub mod error;
pub mod indicator;
pub mod maintenance_plan;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use audit_log::{AuditAction, AuditLog};
pub use document_sequence::{DocumentSequence, SequenceAllocation};
pub use error::DomainError;
pub use indicator::{IndicatorPolicy, IndicatorSnapshot, IndicatorSnapshotView};
pub use maintenance_plan::{
    MaintenancePlan, NextDue, Period, PeriodUnit, PlanAdvance, PlanTrigger,
};
pub use types::{
    Operator, OperatorRole, PlanKind, Priority, WorkOrderStatus, WorkOrderType, SYSTEM_ACTOR,
};
pub use work_order::{Execution, HistoryFilter, WorkOrder};
