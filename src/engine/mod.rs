// ==========================================
// 设备维修管理 - 引擎层
// ==========================================
// 职责: 指标计算 + 周期性保养排程, 不拼 SQL
// 红线: Engine 不拼 SQL, 数据访问只经由 ports 中的 trait
// ==========================================

pub mod indicator_aggregator;
pub mod metrics;
pub mod ports;
pub mod recurrence;
pub mod repositories;
pub mod schedule_generator;
pub mod scheduling_driver;

// 重导出核心引擎
pub use indicator_aggregator::{EquipmentIndicator, IndicatorAggregator};
pub use ports::{AuditSink, HistoryStore, SchedulingStore, SqliteHistoryStore};
pub use recurrence::{NextDueResult, RecurrenceCalculator, RecurrenceError};
pub use repositories::MaintenanceRepositories;
pub use schedule_generator::{
    GeneratedWorkOrder, GenerationReport, PlanGenerationError, ScheduleGenerator,
};
pub use scheduling_driver::{GenerationSummary, SchedulingDriver, SchedulingError};
