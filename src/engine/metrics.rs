// ==========================================
// 设备维修管理 - 可靠性指标基础函数
// ==========================================
// 职责: MTBF / MTTR / 可用率 / 可靠度 / OEE / 积压周数
// 红线: 纯函数, 无 I/O, 不抛错 (非法输入退化为安全值)
// 红线: 内部保持全精度, 取整只在展示边界
// ==========================================

use chrono::NaiveDateTime;

// ==========================================
// MetricEstimate - 带样本说明的估计值
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricEstimate {
    pub hours: f64,
    pub samples: usize,  // 参与计算的样本数
    pub defaulted: bool, // 是否取策略默认值
}

impl MetricEstimate {
    fn computed(hours: f64, samples: usize) -> Self {
        Self {
            hours,
            samples,
            defaulted: false,
        }
    }

    fn default_policy(hours: f64, samples: usize) -> Self {
        Self {
            hours,
            samples,
            defaulted: true,
        }
    }
}

/// 百分比钳制到 [0, 100], NaN 视为 0
pub fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// MTBF: 故障时间点相邻间隔的平均值 (小时)
///
/// - 输入按时间升序稳定排序 (同一时刻保持原顺序)
/// - 少于 2 个故障点时取 `default_hours` (策略常量, 非计算结果)
pub fn mtbf_hours(failure_timestamps: &[NaiveDateTime], default_hours: f64) -> MetricEstimate {
    let count = failure_timestamps.len();
    if count < 2 {
        return MetricEstimate::default_policy(default_hours, count);
    }

    let mut sorted = failure_timestamps.to_vec();
    sorted.sort();

    let total_hours: f64 = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
        .sum();

    MetricEstimate::computed(total_hours / (count - 1) as f64, count)
}

/// MTTR: 正工时执行记录的平均工时 (小时)
///
/// 无有效工时时取 `default_hours`
pub fn mttr_hours(durations_hours: &[f64], default_hours: f64) -> MetricEstimate {
    let positive: Vec<f64> = durations_hours
        .iter()
        .copied()
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect();

    if positive.is_empty() {
        return MetricEstimate::default_policy(default_hours, 0);
    }

    let mean = positive.iter().sum::<f64>() / positive.len() as f64;
    MetricEstimate::computed(mean, positive.len())
}

/// 可用率 (%) = MTBF / (MTBF + MTTR) × 100
///
/// MTTR ≤ 0 退化为 100
pub fn availability_pct(mtbf_hours: f64, mttr_hours: f64) -> f64 {
    if !(mttr_hours > 0.0) {
        return 100.0;
    }
    let denominator = mtbf_hours + mttr_hours;
    if !(denominator > 0.0) {
        return 0.0;
    }
    clamp_pct(mtbf_hours / denominator * 100.0)
}

/// 可靠度 R(t) (%) = exp(-t / MTBF) × 100
///
/// MTBF ≤ 0 返回 0
pub fn reliability_pct(mtbf_hours: f64, elapsed_hours: f64) -> f64 {
    if !(mtbf_hours > 0.0) {
        return 0.0;
    }
    clamp_pct((-elapsed_hours / mtbf_hours).exp() * 100.0)
}

/// OEE (%) = 可用率 × 性能率 × 质量率 (各输入先钳制到 [0, 100])
pub fn oee_pct(availability: f64, performance: f64, quality: f64) -> f64 {
    let a = clamp_pct(availability) / 100.0;
    let p = clamp_pct(performance) / 100.0;
    let q = clamp_pct(quality) / 100.0;
    a * p * q * 100.0
}

/// 积压周数 = 积压工时 / 每周工时
///
/// 每周工时 ≤ 0 返回 0
pub fn backlog_weeks(backlog_hours: f64, hours_per_week: f64) -> f64 {
    if !(hours_per_week > 0.0) || !backlog_hours.is_finite() {
        return 0.0;
    }
    backlog_hours / hours_per_week
}
