// ==========================================
// 设备维修管理 - 工单 API
// ==========================================
// 职责: 人工工单新建 / 关闭 / 执行记录登记 / 查询
// 红线: 编号分配与工单插入同一事务, 插入失败不消耗编号
// 红线: 执行记录只追加
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ReliabilityConfigReader;
use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::types::{Priority, WorkOrderType};
use crate::domain::work_order::{Execution, HistoryFilter, WorkOrder};
use crate::i18n::t_with_args;
use crate::repository::{AuditLogRepository, ExecutionRepository, WorkOrderRepository};

/// 新建工单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkOrderRequest {
    pub order_type: WorkOrderType,
    pub equipment_tag: String,
    pub title: String,
    pub requester: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    /// 申请时间 (缺省为当前时间)
    #[serde(default)]
    pub requested_at: Option<NaiveDateTime>,
}

/// 执行记录登记请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordExecutionRequest {
    pub work_order_code: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    #[serde(default)]
    pub labor_cost: f64,
    #[serde(default)]
    pub material_cost: f64,
    #[serde(default)]
    pub third_party_cost: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

// ==========================================
// WorkOrderApi - 工单 API
// ==========================================
pub struct WorkOrderApi {
    work_order_repo: Arc<WorkOrderRepository>,
    execution_repo: Arc<ExecutionRepository>,
    audit_repo: Arc<AuditLogRepository>,
    config: Arc<dyn ReliabilityConfigReader>,
}

impl WorkOrderApi {
    pub fn new(
        work_order_repo: Arc<WorkOrderRepository>,
        execution_repo: Arc<ExecutionRepository>,
        audit_repo: Arc<AuditLogRepository>,
        config: Arc<dyn ReliabilityConfigReader>,
    ) -> Self {
        Self {
            work_order_repo,
            execution_repo,
            audit_repo,
            config,
        }
    }

    /// 新建工单 (编号按工单类型分配)
    pub async fn create(&self, request: CreateWorkOrderRequest) -> ApiResult<WorkOrder> {
        if request.equipment_tag.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备位号不能为空".to_string()));
        }
        if request.requester.trim().is_empty() {
            return Err(ApiError::InvalidInput("申请人不能为空".to_string()));
        }
        for (field, value) in [
            ("estimated_hours", request.estimated_hours),
            ("estimated_cost", request.estimated_cost),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ApiError::InvalidInput(format!("{}非法: {}", field, v)));
                }
            }
        }

        let doc_type = request.order_type.as_str();
        let prefix = self
            .config
            .get_sequence_prefix(doc_type)
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {}", e)))?;

        let mut template = WorkOrder::new_open(
            String::new(),
            0,
            request.order_type,
            request.equipment_tag.trim().to_string(),
            request.title,
            request.requester.trim().to_string(),
            request
                .requested_at
                .unwrap_or_else(|| Utc::now().naive_utc()),
        );
        template.priority = request.priority.unwrap_or(Priority::Medium);
        template.estimated_hours = request.estimated_hours;
        template.estimated_cost = request.estimated_cost;

        let (work_order, _) = self
            .work_order_repo
            .insert_with_allocation(template, doc_type, &prefix)?;

        tracing::info!(
            code = %work_order.code,
            equipment_tag = %work_order.equipment_tag,
            order_type = %work_order.order_type,
            "工单已创建"
        );
        Ok(work_order)
    }

    /// 按编号查询
    pub fn get(&self, code: &str) -> ApiResult<WorkOrder> {
        self.work_order_repo
            .find_by_code(code.trim())?
            .ok_or_else(|| ApiError::NotFound(format!("工单{}不存在", code)))
    }

    /// 按过滤条件查询
    pub fn list(&self, filter: &HistoryFilter) -> ApiResult<Vec<WorkOrder>> {
        Ok(self.work_order_repo.list(filter)?)
    }

    /// 关闭工单 (closed_at 与状态同时写入, 写审计)
    pub fn close(
        &self,
        code: &str,
        operator: &str,
        closed_at: Option<NaiveDateTime>,
    ) -> ApiResult<WorkOrder> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let work_order = self.get(code)?;
        let closed_at = closed_at.unwrap_or_else(|| Utc::now().naive_utc());
        if closed_at < work_order.requested_at {
            return Err(ApiError::BusinessRuleViolation(format!(
                "工单{}关闭时间{}早于申请时间{}",
                work_order.code, closed_at, work_order.requested_at
            )));
        }

        self.work_order_repo
            .close(&work_order.work_order_id, closed_at)?;

        let audit = AuditLog::new(
            operator.trim(),
            AuditAction::WorkOrderClosed,
            t_with_args("audit.work_order_closed", &[("code", work_order.code.as_str())]),
            closed_at,
        )
        .with_tag(work_order.equipment_tag.clone());
        self.audit_repo.insert(&audit)?;

        tracing::info!(code = %work_order.code, operator = %operator, "工单已关闭");
        self.get(code)
    }

    /// 登记执行记录
    pub fn record_execution(&self, request: RecordExecutionRequest) -> ApiResult<Execution> {
        let work_order = self.get(&request.work_order_code)?;

        let mut execution = Execution::new(
            work_order.work_order_id,
            request.started_at,
            request.finished_at,
            request.labor_cost,
            request.material_cost,
            request.third_party_cost,
        )?;
        if let Some(notes) = request.notes {
            execution = execution.with_notes(notes);
        }

        self.execution_repo.insert(&execution)?;
        tracing::debug!(
            code = %work_order.code,
            duration_hours = execution.duration_hours(),
            total_cost = execution.total_cost(),
            "执行记录已登记"
        );
        Ok(execution)
    }
}
