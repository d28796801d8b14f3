// ==========================================
// 设备维修管理 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合排程 / 指标引擎所需的所有 Repository
// 说明: 所有仓储共享同一个连接, 便于一次构造、整体注入
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::engine::ports::SqliteHistoryStore;
use crate::repository::{
    AuditLogRepository, DocumentSequenceRepository, ExecutionRepository,
    MaintenancePlanRepository, WorkOrderRepository,
};

/// 维修管理仓储集合
///
/// # 包含的仓储
/// - `plan_repo`: 保养计划 (含原子生成事务)
/// - `work_order_repo`: 工单
/// - `execution_repo`: 执行记录
/// - `sequence_repo`: 单据编号序列
/// - `audit_repo`: 审计日志
#[derive(Clone)]
pub struct MaintenanceRepositories {
    pub plan_repo: Arc<MaintenancePlanRepository>,
    pub work_order_repo: Arc<WorkOrderRepository>,
    pub execution_repo: Arc<ExecutionRepository>,
    pub sequence_repo: Arc<DocumentSequenceRepository>,
    pub audit_repo: Arc<AuditLogRepository>,
}

impl MaintenanceRepositories {
    /// 基于同一连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            plan_repo: Arc::new(MaintenancePlanRepository::new(conn.clone())),
            work_order_repo: Arc::new(WorkOrderRepository::new(conn.clone())),
            execution_repo: Arc::new(ExecutionRepository::new(conn.clone())),
            sequence_repo: Arc::new(DocumentSequenceRepository::new(conn.clone())),
            audit_repo: Arc::new(AuditLogRepository::new(conn)),
        }
    }

    /// 历史数据端口 (指标聚合使用)
    pub fn history_store(&self) -> SqliteHistoryStore {
        SqliteHistoryStore::new(self.work_order_repo.clone(), self.execution_repo.clone())
    }
}
