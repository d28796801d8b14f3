// ==========================================
// 设备维修管理 - 指标聚合引擎
// ==========================================
// 职责: 工单 + 执行记录 → 指标快照
// 红线: 只读报表, 无副作用
// 红线: 样本缺失退化为策略默认值, 不报错 (看板必须有值)
// ==========================================
// 输入: 工单列表 + 执行记录 (由 HistoryStore 按过滤条件提供)
// 输出: IndicatorSnapshot (全精度)
// ==========================================

use crate::domain::indicator::{IndicatorPolicy, IndicatorSnapshot};
use crate::domain::work_order::{Execution, HistoryFilter, WorkOrder};
use crate::engine::metrics;
use crate::engine::ports::HistoryStore;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

// ==========================================
// EquipmentIndicator - 单台设备指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentIndicator {
    pub equipment_tag: String,
    pub snapshot: IndicatorSnapshot,
}

// ==========================================
// IndicatorAggregator - 指标聚合引擎
// ==========================================
pub struct IndicatorAggregator {
    policy: IndicatorPolicy,
}

impl IndicatorAggregator {
    pub fn new(policy: IndicatorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &IndicatorPolicy {
        &self.policy
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算指标快照
    ///
    /// 规则:
    /// - 申请时间 / 开始时间晚于 now 的记录不参与计算
    /// - 积压 = 状态 ∉ {CLOSED, CANCELLED}, 工时取预计工时之和
    /// - MTBF 样本 = 已关闭纠正性工单的申请时间
    /// - MTTR 样本 = 工时 > 0 的执行记录
    #[instrument(skip_all, fields(work_orders = work_orders.len(), executions = executions.len()))]
    pub fn compute_snapshot(
        &self,
        work_orders: &[WorkOrder],
        executions: &[Execution],
        now: NaiveDateTime,
    ) -> IndicatorSnapshot {
        let visible: Vec<&WorkOrder> = work_orders
            .iter()
            .filter(|wo| wo.requested_at <= now)
            .collect();

        // 1. 积压
        let backlog: Vec<&&WorkOrder> = visible.iter().filter(|wo| wo.status.is_backlog()).collect();
        let backlog_hours: f64 = backlog
            .iter()
            .filter_map(|wo| wo.estimated_hours)
            .filter(|h| h.is_finite() && *h > 0.0)
            .sum();

        // 2. MTBF (输入已按申请时间排序时, 稳定排序保持插入顺序)
        let failure_timestamps: Vec<NaiveDateTime> = visible
            .iter()
            .filter(|wo| wo.is_closed_failure())
            .map(|wo| wo.requested_at)
            .collect();
        let mtbf = metrics::mtbf_hours(&failure_timestamps, self.policy.default_mtbf_hours);

        // 3. MTTR
        let durations: Vec<f64> = executions
            .iter()
            .filter(|e| e.started_at <= now)
            .map(Execution::duration_hours)
            .collect();
        let mttr = metrics::mttr_hours(&durations, self.policy.default_mttr_hours);

        // 4. 派生指标
        let availability = metrics::availability_pct(mtbf.hours, mttr.hours);
        let reliability =
            metrics::reliability_pct(mtbf.hours, self.policy.reliability_horizon_hours);
        let oee = metrics::oee_pct(
            availability,
            self.policy.oee_performance_pct,
            self.policy.oee_quality_pct,
        );

        if mtbf.defaulted || mttr.defaulted {
            tracing::debug!(
                failures = mtbf.samples,
                executions = mttr.samples,
                mtbf_defaulted = mtbf.defaulted,
                mttr_defaulted = mttr.defaulted,
                "指标样本不足, 使用策略默认值"
            );
        }

        IndicatorSnapshot {
            mtbf_hours: mtbf.hours,
            mttr_hours: mttr.hours,
            availability_pct: availability,
            reliability_pct: reliability,
            oee_pct: oee,
            backlog_count: backlog.len(),
            backlog_hours,
            backlog_weeks: metrics::backlog_weeks(backlog_hours, self.policy.hours_per_week),
            failure_count: mtbf.samples,
            execution_count: mttr.samples,
            mtbf_defaulted: mtbf.defaulted,
            mttr_defaulted: mttr.defaulted,
            computed_at: now,
        }
    }

    /// 按设备位号分组计算 (按位号升序)
    pub fn compute_by_tag(
        &self,
        work_orders: &[WorkOrder],
        executions: &[Execution],
        now: NaiveDateTime,
    ) -> Vec<EquipmentIndicator> {
        let tag_of: HashMap<&str, &str> = work_orders
            .iter()
            .map(|wo| (wo.work_order_id.as_str(), wo.equipment_tag.as_str()))
            .collect();

        let mut grouped: BTreeMap<&str, (Vec<WorkOrder>, Vec<Execution>)> = BTreeMap::new();
        for wo in work_orders {
            grouped
                .entry(wo.equipment_tag.as_str())
                .or_default()
                .0
                .push(wo.clone());
        }
        for exec in executions {
            if let Some(tag) = tag_of.get(exec.work_order_id.as_str()) {
                grouped.entry(*tag).or_default().1.push(exec.clone());
            }
        }

        grouped
            .into_iter()
            .map(|(tag, (orders, execs))| EquipmentIndicator {
                equipment_tag: tag.to_string(),
                snapshot: self.compute_snapshot(&orders, &execs, now),
            })
            .collect()
    }

    /// 通过数据端口加载历史并计算快照
    pub fn load_snapshot(
        &self,
        store: &dyn HistoryStore,
        filter: &HistoryFilter,
        now: NaiveDateTime,
    ) -> RepositoryResult<IndicatorSnapshot> {
        let work_orders = store.load_work_orders(filter)?;
        let executions = store.load_executions(filter)?;
        Ok(self.compute_snapshot(&work_orders, &executions, now))
    }

    /// 通过数据端口加载历史并按设备分组计算
    pub fn load_by_tag(
        &self,
        store: &dyn HistoryStore,
        filter: &HistoryFilter,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<EquipmentIndicator>> {
        let work_orders = store.load_work_orders(filter)?;
        let executions = store.load_executions(filter)?;
        Ok(self.compute_by_tag(&work_orders, &executions, now))
    }
}

impl Default for IndicatorAggregator {
    fn default() -> Self {
        Self::new(IndicatorPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::round1;
    use crate::domain::types::{WorkOrderStatus, WorkOrderType};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn order(
        tag: &str,
        order_type: WorkOrderType,
        status: WorkOrderStatus,
        requested_at: &str,
        estimated_hours: Option<f64>,
    ) -> WorkOrder {
        let mut wo = WorkOrder::new_open(
            format!("WO-{}", requested_at),
            1,
            order_type,
            tag.to_string(),
            "test".to_string(),
            "alice".to_string(),
            ts(requested_at),
        );
        wo.status = status;
        if status == WorkOrderStatus::Closed {
            wo.closed_at = Some(ts(requested_at));
        }
        wo.estimated_hours = estimated_hours;
        wo
    }

    fn execution(wo: &WorkOrder, start: &str, end: &str) -> Execution {
        Execution::new(wo.work_order_id.clone(), ts(start), ts(end), 0.0, 0.0, 0.0).unwrap()
    }

    #[test]
    fn test_empty_history_uses_defaults() {
        let aggregator = IndicatorAggregator::default();
        let snapshot = aggregator.compute_snapshot(&[], &[], ts("2025-03-01 00:00:00"));

        assert_eq!(snapshot.backlog_count, 0);
        assert_eq!(snapshot.backlog_hours, 0.0);
        assert!(snapshot.mtbf_defaulted);
        assert!(snapshot.mttr_defaulted);
        assert_eq!(snapshot.mtbf_hours, 720.0);
        assert_eq!(snapshot.mttr_hours, 4.0);
        assert_eq!(round1(snapshot.availability_pct), 99.4);
        assert_eq!(round1(snapshot.reliability_pct), 79.2);
    }

    #[test]
    fn test_backlog_excludes_closed_and_cancelled() {
        let aggregator = IndicatorAggregator::default();
        let orders = vec![
            order("P-101", WorkOrderType::Preventive, WorkOrderStatus::Open, "2025-01-01 00:00:00", Some(30.0)),
            order("P-101", WorkOrderType::Corrective, WorkOrderStatus::AwaitingMaterial, "2025-01-02 00:00:00", Some(50.0)),
            order("P-101", WorkOrderType::Corrective, WorkOrderStatus::Closed, "2025-01-03 00:00:00", Some(99.0)),
            order("P-101", WorkOrderType::Inspection, WorkOrderStatus::Cancelled, "2025-01-04 00:00:00", Some(99.0)),
            order("P-101", WorkOrderType::Inspection, WorkOrderStatus::InProgress, "2025-01-05 00:00:00", None),
        ];

        let snapshot = aggregator.compute_snapshot(&orders, &[], ts("2025-03-01 00:00:00"));
        assert_eq!(snapshot.backlog_count, 3);
        assert_eq!(snapshot.backlog_hours, 80.0);
        assert_eq!(snapshot.backlog_weeks, 2.0);
    }

    #[test]
    fn test_mtbf_from_closed_corrective_only() {
        let aggregator = IndicatorAggregator::default();
        let orders = vec![
            order("P-101", WorkOrderType::Corrective, WorkOrderStatus::Closed, "2025-01-01 00:00:00", None),
            order("P-101", WorkOrderType::Corrective, WorkOrderStatus::Open, "2025-01-02 00:00:00", None),
            order("P-101", WorkOrderType::Preventive, WorkOrderStatus::Closed, "2025-01-03 00:00:00", None),
            order("P-101", WorkOrderType::Corrective, WorkOrderStatus::Closed, "2025-01-11 00:00:00", None),
        ];

        let snapshot = aggregator.compute_snapshot(&orders, &[], ts("2025-03-01 00:00:00"));
        assert!(!snapshot.mtbf_defaulted);
        assert_eq!(snapshot.failure_count, 2);
        assert!((snapshot.mtbf_hours - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_mttr_from_positive_executions() {
        let aggregator = IndicatorAggregator::default();
        let wo = order("P-101", WorkOrderType::Corrective, WorkOrderStatus::Closed, "2025-01-01 00:00:00", None);
        let execs = vec![
            execution(&wo, "2025-01-01 08:00:00", "2025-01-01 10:00:00"),
            execution(&wo, "2025-01-01 11:00:00", "2025-01-01 11:00:00"),
            execution(&wo, "2025-01-02 08:00:00", "2025-01-02 14:00:00"),
        ];

        let snapshot = aggregator.compute_snapshot(&[wo], &execs, ts("2025-03-01 00:00:00"));
        assert!(!snapshot.mttr_defaulted);
        assert_eq!(snapshot.execution_count, 2);
        assert!((snapshot.mttr_hours - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_records_after_now_are_ignored() {
        let aggregator = IndicatorAggregator::default();
        let orders = vec![order(
            "P-101",
            WorkOrderType::Corrective,
            WorkOrderStatus::Open,
            "2025-05-01 00:00:00",
            Some(10.0),
        )];
        let snapshot = aggregator.compute_snapshot(&orders, &[], ts("2025-03-01 00:00:00"));
        assert_eq!(snapshot.backlog_count, 0);
    }

    #[test]
    fn test_compute_by_tag_groups_executions() {
        let aggregator = IndicatorAggregator::default();
        let a = order("A-1", WorkOrderType::Corrective, WorkOrderStatus::Open, "2025-01-01 00:00:00", Some(8.0));
        let b = order("B-2", WorkOrderType::Corrective, WorkOrderStatus::Open, "2025-01-02 00:00:00", Some(4.0));
        let execs = vec![execution(&b, "2025-01-02 08:00:00", "2025-01-02 09:00:00")];

        let result = aggregator.compute_by_tag(&[b.clone(), a.clone()], &execs, ts("2025-03-01 00:00:00"));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].equipment_tag, "A-1");
        assert!(result[0].snapshot.mttr_defaulted);
        assert_eq!(result[1].equipment_tag, "B-2");
        assert_eq!(result[1].snapshot.execution_count, 1);
        assert!((result[1].snapshot.mttr_hours - 1.0).abs() < 1e-9);
    }
}
