// ==========================================
// 设备维修管理 - 排程驱动器
// ==========================================
// 职责: 编排一轮完整生成 (加载到期计划 → 生成 → 汇总)
// 触发: 定时任务 (cron) 或人工“立即生成”
// 红线: 无常驻状态, 每次调用运行至完成; 状态全部持久化
// 红线: 幂等, 成功一轮后立即重跑且无新到期计划时 created_count = 0
// ==========================================

use crate::config::ReliabilityConfigReader;
use crate::domain::types::PlanKind;
use crate::engine::ports::{AuditSink, SchedulingStore};
use crate::engine::schedule_generator::{
    GeneratedWorkOrder, GenerationReport, PlanGenerationError, ScheduleGenerator,
};
use crate::repository::error::RepositoryError;
use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// SchedulingError - 驱动器错误
// ==========================================
// 数据访问失败由调用方 / 调度基础设施重试, 驱动器内部不重试
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("加载到期计划失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("读取配置失败: {0}")]
    Config(String),

    #[error("生成任务执行失败: {0}")]
    Join(String),
}

// ==========================================
// GenerationSummary - 一轮生成的汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub run_id: String,
    pub now: NaiveDateTime,
    pub candidate_count: usize,
    pub created_count: usize,
    pub created: Vec<GeneratedWorkOrder>,
    pub skipped_conflicts: usize,
    pub errors: Vec<PlanGenerationError>,
}

impl GenerationSummary {
    fn from_report(run_id: String, now: NaiveDateTime, candidates: usize, report: GenerationReport) -> Self {
        Self {
            run_id,
            now,
            candidate_count: candidates,
            created_count: report.created.len(),
            created: report.created,
            skipped_conflicts: report.skipped_conflicts,
            errors: report.errors,
        }
    }
}

// ==========================================
// SchedulingDriver - 排程驱动器
// ==========================================
pub struct SchedulingDriver {
    store: Arc<dyn SchedulingStore>,
    audit: Arc<dyn AuditSink>,
    config: Arc<dyn ReliabilityConfigReader>,
}

impl SchedulingDriver {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        audit: Arc<dyn AuditSink>,
        config: Arc<dyn ReliabilityConfigReader>,
    ) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// 执行一轮生成
    ///
    /// # 参数
    /// - `now_override`: 指定本轮时刻 (测试 / 补跑); 缺省取当前 UTC 时间
    pub async fn run_pass(
        &self,
        now_override: Option<NaiveDateTime>,
    ) -> Result<GenerationSummary, SchedulingError> {
        let now = truncate_to_seconds(now_override.unwrap_or_else(|| Utc::now().naive_utc()));
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, now = %now, "开始保养工单生成");

        // 1. 编号前缀 (配置覆写)
        let mut prefixes = HashMap::new();
        for kind in [PlanKind::Preventive, PlanKind::Lubrication] {
            let doc_type = kind.work_order_type().as_str();
            let prefix = self
                .config
                .get_sequence_prefix(doc_type)
                .await
                .map_err(|e| SchedulingError::Config(e.to_string()))?;
            prefixes.insert(doc_type.to_string(), prefix);
        }

        // 2. 同步数据库工作放到阻塞线程池
        let store = self.store.clone();
        let generator = ScheduleGenerator::new(self.store.clone(), self.audit.clone())
            .with_prefixes(prefixes);

        let (candidates, report) = tokio::task::spawn_blocking(move || {
            let plans = store.list_auto_due(now)?;
            let report = generator.generate_due(&plans, now);
            Ok::<_, RepositoryError>((plans.len(), report))
        })
        .await
        .map_err(|e| SchedulingError::Join(e.to_string()))??;

        let summary = GenerationSummary::from_report(run_id, now, candidates, report);
        tracing::info!(
            run_id = %summary.run_id,
            candidates = summary.candidate_count,
            created = summary.created_count,
            skipped_conflicts = summary.skipped_conflicts,
            errors = summary.errors.len(),
            "保养工单生成结束"
        );
        Ok(summary)
    }
}

/// 存储精度为秒
fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
