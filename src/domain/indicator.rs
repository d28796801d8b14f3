// ==========================================
// 设备维修管理 - 可靠性指标领域模型
// ==========================================
// 指标快照为派生值对象, 不持久化, 每次按需从工单/执行历史重算
// 内部保持全精度, 仅在展示边界保留一位小数
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// IndicatorPolicy - 指标计算策略常量
// ==========================================
// 样本不足时的默认值是策略常量, 不是计算结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPolicy {
    pub default_mtbf_hours: f64,        // 故障样本 < 2 时的 MTBF
    pub default_mttr_hours: f64,        // 无有效执行工时时的 MTTR
    pub hours_per_week: f64,            // 积压周数换算
    pub reliability_horizon_hours: f64, // R(t) 的任务时间 t
    pub oee_performance_pct: f64,       // OEE 性能率 (外部输入)
    pub oee_quality_pct: f64,           // OEE 质量率 (外部输入)
}

impl Default for IndicatorPolicy {
    fn default() -> Self {
        Self {
            default_mtbf_hours: 720.0,
            default_mttr_hours: 4.0,
            hours_per_week: 40.0,
            reliability_horizon_hours: 168.0,
            oee_performance_pct: 100.0,
            oee_quality_pct: 100.0,
        }
    }
}

// ==========================================
// IndicatorSnapshot - 指标快照 (全精度)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    // ===== 可靠性 =====
    pub mtbf_hours: f64,
    pub mttr_hours: f64,
    pub availability_pct: f64,
    pub reliability_pct: f64,
    pub oee_pct: f64,

    // ===== 积压 =====
    pub backlog_count: usize,
    pub backlog_hours: f64,
    pub backlog_weeks: f64,

    // ===== 样本说明 =====
    pub failure_count: usize,   // 参与 MTBF 的故障工单数
    pub execution_count: usize, // 参与 MTTR 的执行记录数
    pub mtbf_defaulted: bool,   // MTBF 是否取策略默认值
    pub mttr_defaulted: bool,   // MTTR 是否取策略默认值

    pub computed_at: NaiveDateTime,
}

impl IndicatorSnapshot {
    /// 转换为展示视图 (一位小数)
    pub fn to_view(&self) -> IndicatorSnapshotView {
        IndicatorSnapshotView {
            mtbf_hours: round1(self.mtbf_hours),
            mttr_hours: round1(self.mttr_hours),
            availability_pct: round1(self.availability_pct),
            reliability_pct: round1(self.reliability_pct),
            oee_pct: round1(self.oee_pct),
            backlog_count: self.backlog_count,
            backlog_hours: round1(self.backlog_hours),
            backlog_weeks: round1(self.backlog_weeks),
            failure_count: self.failure_count,
            execution_count: self.execution_count,
            mtbf_defaulted: self.mtbf_defaulted,
            mttr_defaulted: self.mttr_defaulted,
            computed_at: self.computed_at,
        }
    }
}

// ==========================================
// IndicatorSnapshotView - 指标快照 (展示)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshotView {
    pub mtbf_hours: f64,
    pub mttr_hours: f64,
    pub availability_pct: f64,
    pub reliability_pct: f64,
    pub oee_pct: f64,
    pub backlog_count: usize,
    pub backlog_hours: f64,
    pub backlog_weeks: f64,
    pub failure_count: usize,
    pub execution_count: usize,
    pub mtbf_defaulted: bool,
    pub mttr_defaulted: bool,
    pub computed_at: NaiveDateTime,
}

/// 保留一位小数 (四舍五入, 远离零)
pub fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}
