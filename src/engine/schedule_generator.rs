// ==========================================
// 设备维修管理 - 保养工单生成引擎
// ==========================================
// 职责: 到期计划 → 每个到期周期恰好一张工单 + 推进下次到期
// 红线: 每个计划每个到期周期至多一张工单 (并发触发下同样成立)
// 红线: 单个计划失败不中断批次, 记录错误继续下一个
// 红线: 并发冲突 (CAS 未命中) 视为“已由其他轮次处理”, 不记为错误
// ==========================================
// 原子单元 (SchedulingStore::generate_work_order):
//   CAS 推进 next_execution → 分配编号 → 插入工单, 同一事务
// 审计在提交后追加, 失败时工单保留, 以错误形式上报
// ==========================================

use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::document_sequence::default_prefix;
use crate::domain::maintenance_plan::{MaintenancePlan, NextDue, PlanAdvance};
use crate::domain::types::SYSTEM_ACTOR;
use crate::domain::work_order::WorkOrder;
use crate::engine::ports::{AuditSink, SchedulingStore};
use crate::engine::recurrence::RecurrenceCalculator;
use crate::i18n::t_with_args;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// 生成结果
// ==========================================

/// 已生成的工单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedWorkOrder {
    pub work_order_id: String,
    pub code: String,
    pub plan_id: String,
    pub plan_code: String,
    pub equipment_tag: String,
    pub due_at: NaiveDateTime,
    pub next_due: NaiveDateTime,
    pub skipped_cycles: u32,
}

/// 计划级错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanGenerationError {
    pub plan_id: String,
    pub plan_code: String,
    pub reason: String,
    /// 工单已创建 (需人工核对, 如审计追加失败)
    pub work_order_created: bool,
}

/// 批次生成报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub created: Vec<GeneratedWorkOrder>,
    pub errors: Vec<PlanGenerationError>,
    pub skipped_conflicts: usize, // 已由其他轮次处理
    pub skipped_not_due: usize,   // 停用 / 非时间触发 / 未到期
}

impl GenerationReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

// ==========================================
// ScheduleGenerator - 保养工单生成引擎
// ==========================================
pub struct ScheduleGenerator {
    store: Arc<dyn SchedulingStore>,
    audit: Arc<dyn AuditSink>,
    prefixes: HashMap<String, String>, // 单据类型 → 编号前缀 (缺省取内置映射)
}

impl ScheduleGenerator {
    pub fn new(store: Arc<dyn SchedulingStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            prefixes: HashMap::new(),
        }
    }

    /// 注入已解析的编号前缀
    pub fn with_prefixes(mut self, prefixes: HashMap<String, String>) -> Self {
        self.prefixes = prefixes;
        self
    }

    fn prefix_for(&self, doc_type: &str) -> String {
        self.prefixes
            .get(doc_type)
            .cloned()
            .unwrap_or_else(|| default_prefix(doc_type))
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 为到期计划生成工单
    ///
    /// # 参数
    /// - `plans`: 候选计划 (通常来自 `SchedulingStore::list_auto_due`)
    /// - `now`: 本轮生成时刻
    #[instrument(skip(self, plans), fields(plans = plans.len()))]
    pub fn generate_due(&self, plans: &[MaintenancePlan], now: NaiveDateTime) -> GenerationReport {
        let mut report = GenerationReport::default();

        for plan in plans {
            if !plan.is_auto_due(now) {
                tracing::debug!(plan_code = %plan.code, active = plan.active, "计划未到期或不参与自动生成, 跳过");
                report.skipped_not_due += 1;
                continue;
            }
            self.generate_one(plan, now, &mut report);
        }

        tracing::info!(
            created = report.created.len(),
            errors = report.errors.len(),
            skipped_conflicts = report.skipped_conflicts,
            "保养工单生成完成"
        );
        report
    }

    fn generate_one(&self, plan: &MaintenancePlan, now: NaiveDateTime, report: &mut GenerationReport) {
        // 1. 本周期到期时刻 + 下次到期 (锚定到期时刻, 不用执行时刻)
        let due_instant = plan.next_due.due_instant(now);
        let advance_result = match RecurrenceCalculator::advance_after(plan, due_instant, now) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(plan_code = %plan.code, error = %e, "计算下次到期失败");
                report.errors.push(PlanGenerationError {
                    plan_id: plan.plan_id.clone(),
                    plan_code: plan.code.clone(),
                    reason: e.to_string(),
                    work_order_created: false,
                });
                return;
            }
        };
        if advance_result.skipped_cycles > 0 {
            tracing::warn!(
                plan_code = %plan.code,
                due_at = %due_instant,
                skipped_cycles = advance_result.skipped_cycles,
                "计划逾期多个周期, 跳过的周期不补生成"
            );
        }

        // 2. 工单模板 (编号在事务内填入)
        let order_type = plan.kind.work_order_type();
        let doc_type = order_type.as_str();
        let mut template = WorkOrder::new_open(
            String::new(),
            0,
            order_type,
            plan.equipment_tag.clone(),
            plan.title.clone(),
            SYSTEM_ACTOR.to_string(),
            now,
        );
        template.priority = plan.priority;
        template.estimated_hours = Some(plan.estimated_hours);
        template.plan_id = Some(plan.plan_id.clone());
        template.due_at = Some(due_instant);

        let advance = PlanAdvance {
            plan_id: plan.plan_id.clone(),
            plan_code: plan.code.clone(),
            expected: plan.next_due,
            next: NextDue::Scheduled(advance_result.next_due),
            executed_at: now,
        };

        // 3. 原子单元
        let work_order = match self.store.generate_work_order(
            &advance,
            template,
            doc_type,
            &self.prefix_for(doc_type),
        ) {
            Ok((work_order, _allocation)) => work_order,
            Err(e) if e.is_conflict() => {
                tracing::info!(plan_code = %plan.code, "计划已由其他生成轮次推进, 跳过");
                report.skipped_conflicts += 1;
                return;
            }
            Err(e) => {
                tracing::error!(plan_code = %plan.code, error = %e, "生成保养工单失败");
                report.errors.push(PlanGenerationError {
                    plan_id: plan.plan_id.clone(),
                    plan_code: plan.code.clone(),
                    reason: e.to_string(),
                    work_order_created: false,
                });
                return;
            }
        };

        tracing::info!(
            plan_code = %plan.code,
            work_order = %work_order.code,
            due_at = %due_instant,
            next_due = %advance_result.next_due,
            "已生成保养工单并推进计划"
        );

        // 4. 审计 (提交后追加)
        let description = t_with_args(
            "audit.work_order_generated",
            &[("code", work_order.code.as_str()), ("plan", plan.code.as_str())],
        );
        let audit = AuditLog::new(SYSTEM_ACTOR, AuditAction::WorkOrderGenerated, description, now)
            .with_tag(plan.equipment_tag.clone())
            .with_payload(&json!({
                "work_order_id": work_order.work_order_id,
                "code": work_order.code,
                "plan_id": plan.plan_id,
                "plan_code": plan.code,
                "due_at": due_instant,
                "next_due": advance_result.next_due,
            }));
        if let Err(e) = self.audit.append(&audit) {
            tracing::error!(plan_code = %plan.code, work_order = %work_order.code, error = %e, "审计日志写入失败, 工单已保留");
            report.errors.push(PlanGenerationError {
                plan_id: plan.plan_id.clone(),
                plan_code: plan.code.clone(),
                reason: format!("工单{}已生成, 审计日志写入失败: {}", work_order.code, e),
                work_order_created: true,
            });
        }

        report.created.push(GeneratedWorkOrder {
            work_order_id: work_order.work_order_id,
            code: work_order.code,
            plan_id: plan.plan_id.clone(),
            plan_code: plan.code.clone(),
            equipment_tag: plan.equipment_tag.clone(),
            due_at: due_instant,
            next_due: advance_result.next_due,
            skipped_cycles: advance_result.skipped_cycles,
        });
    }
}
