// ==========================================
// 设备维修管理 - 保养计划领域模型
// ==========================================
// 预防性保养计划 / 润滑计划 共用同一模型, 以 PlanKind 区分
// 触发条件为带标签的联合体: 时间 / 运行周期 / 状态条件
// 到期状态显式建模: DueImmediately | Scheduled(ts), NULL 只出现在存储边界
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::{PlanKind, Priority};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// 周期单位 (Period Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodUnit {
    Days,
    Weeks,
    Months, // 日历月 (非固定30天)
    Years,
}

impl PeriodUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Days => "DAYS",
            PeriodUnit::Weeks => "WEEKS",
            PeriodUnit::Months => "MONTHS",
            PeriodUnit::Years => "YEARS",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DAYS" | "DAY" => Some(PeriodUnit::Days),
            "WEEKS" | "WEEK" => Some(PeriodUnit::Weeks),
            "MONTHS" | "MONTH" => Some(PeriodUnit::Months),
            "YEARS" | "YEAR" => Some(PeriodUnit::Years),
            _ => None,
        }
    }
}

// ==========================================
// Period - 周期
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub value: u32,
    pub unit: PeriodUnit,
}

impl Period {
    pub fn new(value: u32, unit: PeriodUnit) -> Self {
        Self { value, unit }
    }

    pub fn days(value: u32) -> Self {
        Self::new(value, PeriodUnit::Days)
    }

    pub fn weeks(value: u32) -> Self {
        Self::new(value, PeriodUnit::Weeks)
    }

    pub fn months(value: u32) -> Self {
        Self::new(value, PeriodUnit::Months)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.value == 0 {
            return Err(DomainError::InvalidPeriod(format!(
                "周期值必须大于0: {} {}",
                self.value,
                self.unit.as_str()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

// ==========================================
// PlanTrigger - 触发条件
// ==========================================
// TIME 由排程引擎自动计算到期时间
// CYCLE / CONDITION 依赖外部计数/监测数据, 不参与自动生成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTrigger {
    Time { period: Period },
    Cycle { threshold: u32, counter_unit: String },
    Condition { rule: String },
}

impl PlanTrigger {
    pub fn type_str(&self) -> &'static str {
        match self {
            PlanTrigger::Time { .. } => "TIME",
            PlanTrigger::Cycle { .. } => "CYCLE",
            PlanTrigger::Condition { .. } => "CONDITION",
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self, PlanTrigger::Time { .. })
    }

    /// 校验触发条件定义
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            PlanTrigger::Time { period } => period.validate(),
            PlanTrigger::Cycle {
                threshold,
                counter_unit,
            } => {
                if *threshold == 0 {
                    return Err(DomainError::InvalidTrigger(
                        "运行周期阈值必须大于0".to_string(),
                    ));
                }
                if counter_unit.trim().is_empty() {
                    return Err(DomainError::InvalidTrigger(
                        "运行周期计数单位不能为空".to_string(),
                    ));
                }
                Ok(())
            }
            PlanTrigger::Condition { rule } => {
                if rule.trim().is_empty() {
                    return Err(DomainError::InvalidTrigger(
                        "状态条件规则不能为空".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ==========================================
// NextDue - 下次到期状态
// ==========================================
// 存储层 next_execution = NULL 映射为 DueImmediately (预防性/润滑计划一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "at", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextDue {
    DueImmediately,
    Scheduled(NaiveDateTime),
}

impl NextDue {
    /// 从存储列还原
    pub fn from_column(value: Option<NaiveDateTime>) -> Self {
        match value {
            Some(ts) => NextDue::Scheduled(ts),
            None => NextDue::DueImmediately,
        }
    }

    /// 转换为存储列
    pub fn to_column(&self) -> Option<NaiveDateTime> {
        match self {
            NextDue::DueImmediately => None,
            NextDue::Scheduled(ts) => Some(*ts),
        }
    }

    /// 在 now 时刻是否到期
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        match self {
            NextDue::DueImmediately => true,
            NextDue::Scheduled(ts) => *ts <= now,
        }
    }

    /// 本周期的到期时刻 (立即到期时以 now 为锚点)
    pub fn due_instant(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            NextDue::DueImmediately => now,
            NextDue::Scheduled(ts) => *ts,
        }
    }
}

// ==========================================
// MaintenancePlan - 保养计划
// ==========================================
// 对齐: maintenance_plan 表
// 红线: 退役计划只停用, 不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub plan_id: String,
    pub code: String, // 计划编码 (唯一)
    pub title: String,
    pub kind: PlanKind,
    pub equipment_tag: String,
    pub priority: Priority,
    pub trigger: PlanTrigger,
    pub next_due: NextDue,
    pub last_execution: Option<NaiveDateTime>,
    pub active: bool,
    pub estimated_hours: f64, // 预计工时, 生成工单时复制
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MaintenancePlan {
    /// 创建新计划 (默认激活, 立即到期)
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        kind: PlanKind,
        equipment_tag: impl Into<String>,
        trigger: PlanTrigger,
        estimated_hours: f64,
    ) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            plan_id: Uuid::new_v4().to_string(),
            code: code.into(),
            title: title.into(),
            kind,
            equipment_tag: equipment_tag.into(),
            priority: Priority::Medium,
            trigger,
            next_due: NextDue::DueImmediately,
            last_execution: None,
            active: true,
            estimated_hours,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_next_due(mut self, next_due: NextDue) -> Self {
        self.next_due = next_due;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// 校验计划定义
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.code.trim().is_empty() {
            return Err(DomainError::InvariantViolation(
                "计划编码不能为空".to_string(),
            ));
        }
        if !self.estimated_hours.is_finite() || self.estimated_hours < 0.0 {
            return Err(DomainError::InvariantViolation(format!(
                "计划{}预计工时非法: {}",
                self.code, self.estimated_hours
            )));
        }
        self.trigger.validate()
    }

    /// 是否参与自动生成 (激活 + 时间触发 + 已到期)
    pub fn is_auto_due(&self, now: NaiveDateTime) -> bool {
        self.active && self.trigger.is_time_based() && self.next_due.is_due(now)
    }
}

// ==========================================
// PlanAdvance - 计划推进请求
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct PlanAdvance {
    pub plan_id: String,
    pub plan_code: String,
    pub expected: NextDue,          // 读取时的到期状态 (乐观锁比较值)
    pub next: NextDue,              // 推进后的到期状态
    pub executed_at: NaiveDateTime, // 写入 last_execution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_next_due_column_mapping() {
        assert_eq!(NextDue::from_column(None), NextDue::DueImmediately);
        let t = ts("2025-01-31 08:00:00");
        assert_eq!(NextDue::from_column(Some(t)), NextDue::Scheduled(t));
        assert_eq!(NextDue::Scheduled(t).to_column(), Some(t));
        assert_eq!(NextDue::DueImmediately.to_column(), None);
    }

    #[test]
    fn test_next_due_is_due() {
        let now = ts("2025-02-01 00:00:00");
        assert!(NextDue::DueImmediately.is_due(now));
        assert!(NextDue::Scheduled(now).is_due(now));
        assert!(NextDue::Scheduled(ts("2025-01-01 00:00:00")).is_due(now));
        assert!(!NextDue::Scheduled(ts("2025-02-01 00:00:01")).is_due(now));
        assert_eq!(NextDue::DueImmediately.due_instant(now), now);
    }

    #[test]
    fn test_trigger_validation() {
        assert!(PlanTrigger::Time {
            period: Period::days(0)
        }
        .validate()
        .is_err());
        assert!(PlanTrigger::Time {
            period: Period::months(1)
        }
        .validate()
        .is_ok());
        assert!(PlanTrigger::Cycle {
            threshold: 500,
            counter_unit: "HOURS".to_string()
        }
        .validate()
        .is_ok());
        assert!(PlanTrigger::Condition {
            rule: "  ".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_inactive_plan_never_auto_due() {
        let now = ts("2025-02-01 00:00:00");
        let mut plan = MaintenancePlan::new(
            "PM-001",
            "月度检查",
            PlanKind::Preventive,
            "P-101",
            PlanTrigger::Time {
                period: Period::months(1),
            },
            2.0,
        );
        assert!(plan.is_auto_due(now));

        plan.active = false;
        assert!(!plan.is_auto_due(now));
    }

    #[test]
    fn test_cycle_plan_not_auto_due() {
        let now = ts("2025-02-01 00:00:00");
        let plan = MaintenancePlan::new(
            "LUB-001",
            "轴承润滑",
            PlanKind::Lubrication,
            "M-201",
            PlanTrigger::Cycle {
                threshold: 500,
                counter_unit: "HOURS".to_string(),
            },
            0.5,
        );
        assert!(!plan.is_auto_due(now));
    }
}
