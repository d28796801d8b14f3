// ==========================================
// 设备维修管理 - 保养计划 API
// ==========================================
// 职责: 计划新建 / 查询 / 停用 / 到期预览
// 红线: 退役计划只停用, 不删除; 新建与停用均写审计
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::maintenance_plan::{MaintenancePlan, NextDue, PlanTrigger};
use crate::domain::types::{PlanKind, Priority};
use crate::engine::recurrence::RecurrenceCalculator;
use crate::i18n::t_with_args;
use crate::repository::{AuditLogRepository, MaintenancePlanRepository};

/// 单次预览的最大到期时刻数
pub const MAX_FORECAST_COUNT: usize = 366;

/// 新建计划请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub code: String,
    pub title: String,
    pub kind: PlanKind,
    pub equipment_tag: String,
    pub trigger: PlanTrigger,
    pub estimated_hours: f64,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// 首次到期时刻 (缺省为立即到期)
    #[serde(default)]
    pub first_due: Option<NaiveDateTime>,
    pub operator: String,
}

// ==========================================
// PlanApi - 保养计划 API
// ==========================================
pub struct PlanApi {
    plan_repo: Arc<MaintenancePlanRepository>,
    audit_repo: Arc<AuditLogRepository>,
}

impl PlanApi {
    pub fn new(
        plan_repo: Arc<MaintenancePlanRepository>,
        audit_repo: Arc<AuditLogRepository>,
    ) -> Self {
        Self {
            plan_repo,
            audit_repo,
        }
    }

    /// 新建保养计划
    ///
    /// # 错误
    /// - `InvalidInput`: 编码 / 位号 / 操作人为空
    /// - `ValidationError`: 周期或触发条件非法
    /// - `BusinessRuleViolation`: 编码重复
    pub fn create_plan(&self, request: CreatePlanRequest) -> ApiResult<MaintenancePlan> {
        if request.code.trim().is_empty() {
            return Err(ApiError::InvalidInput("计划编码不能为空".to_string()));
        }
        if request.equipment_tag.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备位号不能为空".to_string()));
        }
        if request.operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let next_due = request
            .first_due
            .map(NextDue::Scheduled)
            .unwrap_or(NextDue::DueImmediately);
        let plan = MaintenancePlan::new(
            request.code.trim(),
            request.title,
            request.kind,
            request.equipment_tag.trim(),
            request.trigger,
            request.estimated_hours,
        )
        .with_next_due(next_due)
        .with_priority(request.priority.unwrap_or(Priority::Medium));

        self.plan_repo.insert(&plan)?;

        let audit = AuditLog::new(
            request.operator.trim(),
            AuditAction::PlanCreated,
            t_with_args("audit.plan_created", &[("plan", plan.code.as_str())]),
            plan.created_at,
        )
        .with_tag(plan.equipment_tag.clone())
        .with_payload(&plan);
        self.audit_repo.insert(&audit)?;

        tracing::info!(
            plan_code = %plan.code,
            kind = %plan.kind,
            trigger = plan.trigger.type_str(),
            "保养计划已创建"
        );
        Ok(plan)
    }

    /// 按编码查询计划
    pub fn get_plan(&self, code: &str) -> ApiResult<MaintenancePlan> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("计划编码不能为空".to_string()));
        }
        self.plan_repo
            .find_by_code(code.trim())?
            .ok_or_else(|| ApiError::NotFound(format!("保养计划{}不存在", code)))
    }

    /// 查询计划列表
    pub fn list_plans(&self, active_only: bool) -> ApiResult<Vec<MaintenancePlan>> {
        Ok(self.plan_repo.list(active_only)?)
    }

    /// 停用计划
    ///
    /// # 返回
    /// - `Ok(true)`: 本次停用
    /// - `Ok(false)`: 原本已停用 (不重复审计)
    pub fn deactivate_plan(&self, code: &str, operator: &str) -> ApiResult<bool> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let plan = self.get_plan(code)?;
        let now = Utc::now().naive_utc();

        let changed = self.plan_repo.deactivate(&plan.plan_id, now)?;
        if changed {
            let audit = AuditLog::new(
                operator.trim(),
                AuditAction::PlanDeactivated,
                t_with_args("audit.plan_deactivated", &[("plan", plan.code.as_str())]),
                now,
            )
            .with_tag(plan.equipment_tag.clone());
            self.audit_repo.insert(&audit)?;

            tracing::info!(plan_code = %plan.code, operator = %operator, "保养计划已停用");
        }
        Ok(changed)
    }

    /// 预览接下来 count 个到期时刻 (仅时间触发计划)
    pub fn forecast(
        &self,
        code: &str,
        count: usize,
        now: Option<NaiveDateTime>,
    ) -> ApiResult<Vec<NaiveDateTime>> {
        if count == 0 || count > MAX_FORECAST_COUNT {
            return Err(ApiError::InvalidInput(format!(
                "预览数量须在 1..={} 之间: {}",
                MAX_FORECAST_COUNT, count
            )));
        }
        let plan = self.get_plan(code)?;
        if !plan.active {
            return Err(ApiError::BusinessRuleViolation(format!(
                "保养计划{}已停用",
                plan.code
            )));
        }

        let now = now.unwrap_or_else(|| Utc::now().naive_utc());
        Ok(RecurrenceCalculator::forecast(&plan, now, count)?)
    }
}
