// ==========================================
// 设备维修管理 - 到期时间计算引擎
// ==========================================
// 职责: 由计划周期 + 锚点计算下次到期时刻
// 红线: 月/年按日历月相加 (1月31日 + 1个月 = 2月28/29日), 不按固定30天
// 红线: 多周期补算基于同一锚点 (anchor + k × period), 避免月末漂移累积
// ==========================================
// TIME 触发: 自动计算
// CYCLE / CONDITION 触发: 依赖外部计数/监测数据, 返回 AwaitingUsageFeed
// ==========================================

use crate::domain::maintenance_plan::{MaintenancePlan, NextDue, Period, PeriodUnit, PlanTrigger};
use chrono::{Duration, Months, NaiveDateTime};
use thiserror::Error;

/// 单次补算允许跳过的最大周期数
pub const MAX_CATCH_UP_CYCLES: u32 = 100_000;

// ==========================================
// RecurrenceError - 到期计算错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecurrenceError {
    #[error("周期定义非法: {0}")]
    InvalidPeriod(String),

    #[error("触发类型{trigger_type}依赖外部计数数据, 不自动计算到期时间")]
    AwaitingUsageFeed { trigger_type: String },

    #[error("到期时间超出可表示范围: anchor={anchor}, period={period}")]
    Overflow { anchor: NaiveDateTime, period: String },
}

// ==========================================
// NextDueResult - 推进结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextDueResult {
    pub next_due: NaiveDateTime,
    pub skipped_cycles: u32, // 因逾期跳过的周期数 (不补生成)
}

// ==========================================
// RecurrenceCalculator - 到期时间计算器
// ==========================================
pub struct RecurrenceCalculator;

impl RecurrenceCalculator {
    /// 锚点 + k 个周期
    pub fn add_periods(
        anchor: NaiveDateTime,
        period: &Period,
        cycles: u32,
    ) -> Result<NaiveDateTime, RecurrenceError> {
        period
            .validate()
            .map_err(|e| RecurrenceError::InvalidPeriod(e.to_string()))?;

        let overflow = || RecurrenceError::Overflow {
            anchor,
            period: period.to_string(),
        };
        let steps = u64::from(period.value) * u64::from(cycles);

        match period.unit {
            PeriodUnit::Days | PeriodUnit::Weeks => {
                let days = if period.unit == PeriodUnit::Weeks {
                    steps.checked_mul(7).ok_or_else(overflow)?
                } else {
                    steps
                };
                let days = i64::try_from(days).map_err(|_| overflow())?;
                let delta = Duration::try_days(days).ok_or_else(overflow)?;
                anchor.checked_add_signed(delta).ok_or_else(overflow)
            }
            PeriodUnit::Months | PeriodUnit::Years => {
                let months = if period.unit == PeriodUnit::Years {
                    steps.checked_mul(12).ok_or_else(overflow)?
                } else {
                    steps
                };
                let months = u32::try_from(months).map_err(|_| overflow())?;
                anchor
                    .checked_add_months(Months::new(months))
                    .ok_or_else(overflow)
            }
        }
    }

    /// 计划的时间周期 (非时间触发返回 AwaitingUsageFeed)
    pub fn time_period(plan: &MaintenancePlan) -> Result<Period, RecurrenceError> {
        match &plan.trigger {
            PlanTrigger::Time { period } => {
                period
                    .validate()
                    .map_err(|e| RecurrenceError::InvalidPeriod(e.to_string()))?;
                Ok(*period)
            }
            other => {
                other
                    .validate()
                    .map_err(|e| RecurrenceError::InvalidPeriod(e.to_string()))?;
                Err(RecurrenceError::AwaitingUsageFeed {
                    trigger_type: other.type_str().to_string(),
                })
            }
        }
    }

    /// 下次到期 = 锚点 + 1 个周期
    pub fn next_due(
        plan: &MaintenancePlan,
        anchor: NaiveDateTime,
    ) -> Result<NaiveDateTime, RecurrenceError> {
        let period = Self::time_period(plan)?;
        Self::add_periods(anchor, &period, 1)
    }

    /// 消费一个到期时刻后的下次到期
    ///
    /// 以本周期到期时刻 (而非执行时刻) 为锚点, 保持节奏不漂移;
    /// 逾期多个周期时逐周期前进直到严格晚于 now, 被跳过的周期不补生成
    pub fn advance_after(
        plan: &MaintenancePlan,
        due_instant: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<NextDueResult, RecurrenceError> {
        let period = Self::time_period(plan)?;

        let mut cycles: u32 = 1;
        loop {
            let candidate = Self::add_periods(due_instant, &period, cycles)?;
            if candidate > now {
                return Ok(NextDueResult {
                    next_due: candidate,
                    skipped_cycles: cycles - 1,
                });
            }
            if cycles >= MAX_CATCH_UP_CYCLES {
                return Err(RecurrenceError::Overflow {
                    anchor: due_instant,
                    period: period.to_string(),
                });
            }
            cycles += 1;
        }
    }

    /// 预测接下来 count 个到期时刻 (计划预览)
    ///
    /// 立即到期的计划以 now 为首个到期时刻
    pub fn forecast(
        plan: &MaintenancePlan,
        now: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<NaiveDateTime>, RecurrenceError> {
        let period = Self::time_period(plan)?;
        let first = match plan.next_due {
            NextDue::DueImmediately => now,
            NextDue::Scheduled(ts) => ts,
        };

        (0..count)
            .map(|k| {
                let cycles = u32::try_from(k).map_err(|_| RecurrenceError::Overflow {
                    anchor: first,
                    period: period.to_string(),
                })?;
                if cycles == 0 {
                    Ok(first)
                } else {
                    Self::add_periods(first, &period, cycles)
                }
            })
            .collect()
    }
}
