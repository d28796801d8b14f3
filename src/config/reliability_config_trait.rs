// ==========================================
// 设备维修管理 - 可靠性配置读取 Trait
// ==========================================
// 职责: 定义指标计算 / 排程生成所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::indicator::IndicatorPolicy;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ReliabilityConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ReliabilityConfigReader: Send + Sync {
    // ===== 指标默认值 =====

    /// 无故障样本时的 MTBF (小时)
    ///
    /// # 默认值
    /// - 720
    async fn get_default_mtbf_hours(&self) -> ConfigResult<f64>;

    /// 无执行样本时的 MTTR (小时)
    ///
    /// # 默认值
    /// - 4
    async fn get_default_mttr_hours(&self) -> ConfigResult<f64>;

    /// 每周可用工时 (积压周数换算)
    ///
    /// # 默认值
    /// - 40
    async fn get_hours_per_week(&self) -> ConfigResult<f64>;

    /// 可靠度计算时域 (小时)
    ///
    /// # 默认值
    /// - 168 (一周)
    async fn get_reliability_horizon_hours(&self) -> ConfigResult<f64>;

    // ===== OEE 输入 =====

    /// 性能率 (%)
    ///
    /// # 默认值
    /// - 100
    async fn get_oee_performance_pct(&self) -> ConfigResult<f64>;

    /// 质量率 (%)
    ///
    /// # 默认值
    /// - 100
    async fn get_oee_quality_pct(&self) -> ConfigResult<f64>;

    // ===== 单据编号 =====

    /// 单据类型的编号前缀
    ///
    /// # 默认值
    /// - 内置映射 (PREVENTIVE → PRV, LUBRICATION → LUB, ...)
    async fn get_sequence_prefix(&self, doc_type: &str) -> ConfigResult<String>;

    // ===== 组合读取 =====

    /// 一次读取全部指标参数
    async fn get_indicator_policy(&self) -> ConfigResult<IndicatorPolicy> {
        Ok(IndicatorPolicy {
            default_mtbf_hours: self.get_default_mtbf_hours().await?,
            default_mttr_hours: self.get_default_mttr_hours().await?,
            hours_per_week: self.get_hours_per_week().await?,
            reliability_horizon_hours: self.get_reliability_horizon_hours().await?,
            oee_performance_pct: self.get_oee_performance_pct().await?,
            oee_quality_pct: self.get_oee_quality_pct().await?,
        })
    }
}
