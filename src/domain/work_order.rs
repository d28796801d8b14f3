// ==========================================
// 设备维修管理 - 工单 / 执行记录领域模型
// ==========================================
// 红线: closed_at 有值 当且仅当 status = CLOSED
// 红线: 执行记录只追加, 不修改
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::{Priority, WorkOrderStatus, WorkOrderType, SYSTEM_ACTOR};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// WorkOrder - 工单
// ==========================================
// 对齐: work_order 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    // ===== 标识 =====
    pub work_order_id: String, // 工单ID (UUID)
    pub code: String,          // 单据编号 (如 PRV-000012; 序列重置后可能复用)
    pub number: i64,           // 序列号 (来自单据编号序列)

    // ===== 分类 =====
    pub order_type: WorkOrderType,
    pub priority: Priority,
    pub equipment_tag: String, // 设备位号
    pub title: String,

    // ===== 状态 =====
    pub status: WorkOrderStatus,
    pub requester: String,              // 申请人 (系统生成为 SYSTEM)
    pub requested_at: NaiveDateTime,    // 申请时间
    pub closed_at: Option<NaiveDateTime>, // 关闭时间

    // ===== 工时与成本 =====
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,

    // ===== 计划来源 (自动生成时) =====
    pub plan_id: Option<String>,        // 来源保养计划
    pub due_at: Option<NaiveDateTime>,  // 对应的到期时刻 (每个周期至多一张工单)
}

impl WorkOrder {
    /// 创建新的待处理工单 (编号由调用方从序列分配)
    pub fn new_open(
        code: String,
        number: i64,
        order_type: WorkOrderType,
        equipment_tag: String,
        title: String,
        requester: String,
        requested_at: NaiveDateTime,
    ) -> Self {
        Self {
            work_order_id: Uuid::new_v4().to_string(),
            code,
            number,
            order_type,
            priority: Priority::Medium,
            equipment_tag,
            title,
            status: WorkOrderStatus::Open,
            requester,
            requested_at,
            closed_at: None,
            estimated_hours: None,
            actual_hours: None,
            estimated_cost: None,
            actual_cost: None,
            plan_id: None,
            due_at: None,
        }
    }

    /// 校验工单不变量
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.code.trim().is_empty() {
            return Err(DomainError::InvariantViolation(
                "工单编号不能为空".to_string(),
            ));
        }

        match (self.status, self.closed_at) {
            (WorkOrderStatus::Closed, None) => Err(DomainError::InvariantViolation(format!(
                "工单{}状态为CLOSED但缺少closed_at",
                self.code
            ))),
            (status, Some(_)) if status != WorkOrderStatus::Closed => {
                Err(DomainError::InvariantViolation(format!(
                    "工单{}状态为{}但存在closed_at",
                    self.code, status
                )))
            }
            _ => Ok(()),
        }
    }

    /// 是否为故障工单 (MTBF 样本: 纠正性 + 已关闭)
    pub fn is_closed_failure(&self) -> bool {
        self.order_type == WorkOrderType::Corrective && self.status == WorkOrderStatus::Closed
    }

    /// 是否由排程引擎自动生成
    pub fn is_system_generated(&self) -> bool {
        self.requester == SYSTEM_ACTOR
    }
}

// ==========================================
// Execution - 执行记录
// ==========================================
// 对齐: execution 表
// 工时 = end - start, 总成本 = 各成本分量之和 (派生值, 不单独存储)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: String,
    pub work_order_id: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,

    // ===== 成本分量 =====
    pub labor_cost: f64,
    pub material_cost: f64,
    pub third_party_cost: f64,

    pub notes: Option<String>,
}

impl Execution {
    /// 创建执行记录
    ///
    /// # 错误
    /// - 结束时间早于开始时间
    /// - 成本分量为负或非有限值
    pub fn new(
        work_order_id: String,
        started_at: NaiveDateTime,
        finished_at: NaiveDateTime,
        labor_cost: f64,
        material_cost: f64,
        third_party_cost: f64,
    ) -> Result<Self, DomainError> {
        let execution = Self {
            execution_id: Uuid::new_v4().to_string(),
            work_order_id,
            started_at,
            finished_at,
            labor_cost,
            material_cost,
            third_party_cost,
            notes: None,
        };
        execution.validate()?;
        Ok(execution)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// 校验执行记录不变量
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.finished_at < self.started_at {
            return Err(DomainError::InvariantViolation(format!(
                "执行记录结束时间{}早于开始时间{}",
                self.finished_at, self.started_at
            )));
        }

        for (name, value) in [
            ("labor_cost", self.labor_cost),
            ("material_cost", self.material_cost),
            ("third_party_cost", self.third_party_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::InvariantViolation(format!(
                    "成本分量{}非法: {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// 执行工时 (小时)
    pub fn duration_hours(&self) -> f64 {
        (self.finished_at - self.started_at).num_seconds() as f64 / 3600.0
    }

    /// 总成本
    pub fn total_cost(&self) -> f64 {
        self.labor_cost + self.material_cost + self.third_party_cost
    }
}

// ==========================================
// HistoryFilter - 历史查询过滤条件
// ==========================================
// 日期区间作用于工单申请时间 / 执行开始时间, 两端均包含
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub equipment_tag: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self {
            equipment_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// 判断时间点是否落在日期区间内
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn make_order(status: WorkOrderStatus, closed_at: Option<NaiveDateTime>) -> WorkOrder {
        let mut wo = WorkOrder::new_open(
            "OS-000001".to_string(),
            1,
            WorkOrderType::Corrective,
            "P-101".to_string(),
            "泵密封泄漏".to_string(),
            "alice".to_string(),
            ts("2025-03-01 08:00:00"),
        );
        wo.status = status;
        wo.closed_at = closed_at;
        wo
    }

    #[test]
    fn test_closed_at_iff_closed() {
        assert!(make_order(WorkOrderStatus::Open, None).validate().is_ok());
        assert!(make_order(WorkOrderStatus::Closed, Some(ts("2025-03-01 10:00:00")))
            .validate()
            .is_ok());
        assert!(make_order(WorkOrderStatus::Closed, None).validate().is_err());
        assert!(make_order(WorkOrderStatus::InProgress, Some(ts("2025-03-01 10:00:00")))
            .validate()
            .is_err());
    }

    #[test]
    fn test_execution_derived_values() {
        let exec = Execution::new(
            "wo-1".to_string(),
            ts("2025-03-01 08:00:00"),
            ts("2025-03-01 11:30:00"),
            100.0,
            50.5,
            0.0,
        )
        .unwrap();

        assert!((exec.duration_hours() - 3.5).abs() < 1e-9);
        assert!((exec.total_cost() - 150.5).abs() < 1e-9);
    }

    #[test]
    fn test_execution_rejects_inverted_interval() {
        let result = Execution::new(
            "wo-1".to_string(),
            ts("2025-03-01 11:00:00"),
            ts("2025-03-01 08:00:00"),
            0.0,
            0.0,
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_execution_rejects_negative_cost() {
        let result = Execution::new(
            "wo-1".to_string(),
            ts("2025-03-01 08:00:00"),
            ts("2025-03-01 09:00:00"),
            -1.0,
            0.0,
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_history_filter_contains() {
        let filter = HistoryFilter {
            equipment_tag: None,
            date_from: NaiveDate::from_ymd_opt(2025, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 31),
        };
        assert!(filter.contains(ts("2025-03-01 00:00:00")));
        assert!(filter.contains(ts("2025-03-31 23:59:59")));
        assert!(!filter.contains(ts("2025-04-01 00:00:00")));
        assert!(HistoryFilter::default().contains(ts("1999-01-01 00:00:00")));
    }
}
