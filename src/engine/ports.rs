// ==========================================
// 设备维修管理 - 引擎层数据端口
// ==========================================
// 职责: 定义引擎所需的数据访问 trait, 实现依赖倒置
// 说明: Engine 层定义 trait, Repository 层提供 SQLite 实现
// 红线: 计划推进必须支持条件更新 (CAS) 语义
// ==========================================

use crate::domain::audit_log::AuditLog;
use crate::domain::document_sequence::SequenceAllocation;
use crate::domain::maintenance_plan::{MaintenancePlan, PlanAdvance};
use crate::domain::work_order::{Execution, HistoryFilter, WorkOrder};
use crate::repository::error::RepositoryResult;
use crate::repository::{
    AuditLogRepository, ExecutionRepository, MaintenancePlanRepository, WorkOrderRepository,
};
use chrono::NaiveDateTime;
use std::sync::Arc;

// ==========================================
// SchedulingStore - 排程数据端口
// ==========================================
pub trait SchedulingStore: Send + Sync {
    /// 自动生成候选计划 (激活 + 时间触发 + 已到期)
    fn list_auto_due(&self, now: NaiveDateTime) -> RepositoryResult<Vec<MaintenancePlan>>;

    /// 原子生成: CAS 推进计划 + 分配编号 + 插入工单
    ///
    /// CAS 未命中时返回 `RepositoryError::PlanAdvanceConflict`
    fn generate_work_order(
        &self,
        advance: &PlanAdvance,
        template: WorkOrder,
        doc_type: &str,
        default_prefix: &str,
    ) -> RepositoryResult<(WorkOrder, SequenceAllocation)>;
}

// ==========================================
// AuditSink - 审计日志端口 (只追加)
// ==========================================
pub trait AuditSink: Send + Sync {
    fn append(&self, log: &AuditLog) -> RepositoryResult<()>;
}

// ==========================================
// HistoryStore - 维修历史端口 (只读)
// ==========================================
pub trait HistoryStore: Send + Sync {
    fn load_work_orders(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<WorkOrder>>;
    fn load_executions(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<Execution>>;
}

// ==========================================
// SQLite 实现
// ==========================================

impl SchedulingStore for MaintenancePlanRepository {
    fn list_auto_due(&self, now: NaiveDateTime) -> RepositoryResult<Vec<MaintenancePlan>> {
        MaintenancePlanRepository::list_auto_due(self, now)
    }

    fn generate_work_order(
        &self,
        advance: &PlanAdvance,
        template: WorkOrder,
        doc_type: &str,
        default_prefix: &str,
    ) -> RepositoryResult<(WorkOrder, SequenceAllocation)> {
        MaintenancePlanRepository::generate_work_order(
            self,
            advance,
            template,
            doc_type,
            default_prefix,
        )
    }
}

impl AuditSink for AuditLogRepository {
    fn append(&self, log: &AuditLog) -> RepositoryResult<()> {
        self.insert(log).map(|_| ())
    }
}

/// 工单仓储 + 执行记录仓储组合的历史端口
pub struct SqliteHistoryStore {
    work_order_repo: Arc<WorkOrderRepository>,
    execution_repo: Arc<ExecutionRepository>,
}

impl SqliteHistoryStore {
    pub fn new(
        work_order_repo: Arc<WorkOrderRepository>,
        execution_repo: Arc<ExecutionRepository>,
    ) -> Self {
        Self {
            work_order_repo,
            execution_repo,
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_work_orders(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<WorkOrder>> {
        self.work_order_repo.list(filter)
    }

    fn load_executions(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<Execution>> {
        self.execution_repo.list(filter)
    }
}
