// ==========================================
// 设备维修管理 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供应用层命令 / CLI 调用
// ==========================================

pub mod error;
pub mod indicator_api;
pub mod plan_api;
pub mod scheduling_api;
pub mod sequence_api;
pub mod work_order_api;

// 重导出核心类型
pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use indicator_api::{EquipmentIndicatorInfo, IndicatorApi};
pub use plan_api::{CreatePlanRequest, PlanApi};
pub use scheduling_api::SchedulingApi;
pub use sequence_api::{SequenceApi, SequenceResetResult};
pub use work_order_api::{CreateWorkOrderRequest, RecordExecutionRequest, WorkOrderApi};
