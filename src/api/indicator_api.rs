// ==========================================
// 设备维修管理 - 可靠性指标 API
// ==========================================
// 职责: 按过滤窗口 (设备位号 / 日期区间) 返回指标快照
// 红线: 快照按需计算, 不落库
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ReliabilityConfigReader;
use crate::domain::indicator::{IndicatorPolicy, IndicatorSnapshot};
use crate::domain::work_order::HistoryFilter;
use crate::engine::indicator_aggregator::IndicatorAggregator;
use crate::engine::ports::HistoryStore;

/// 单台设备的指标视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentIndicatorInfo {
    pub equipment_tag: String,
    pub snapshot: IndicatorSnapshot,
}

// ==========================================
// IndicatorApi - 可靠性指标 API
// ==========================================
pub struct IndicatorApi {
    history: Arc<dyn HistoryStore>,
    config: Arc<dyn ReliabilityConfigReader>,
}

impl IndicatorApi {
    pub fn new(history: Arc<dyn HistoryStore>, config: Arc<dyn ReliabilityConfigReader>) -> Self {
        Self { history, config }
    }

    /// 计算过滤窗口内的指标快照
    pub async fn snapshot(
        &self,
        filter: HistoryFilter,
        now: Option<NaiveDateTime>,
    ) -> ApiResult<IndicatorSnapshot> {
        validate_filter(&filter)?;
        let aggregator = IndicatorAggregator::new(self.load_policy().await?);
        let now = now.unwrap_or_else(|| Utc::now().naive_utc());
        let history = self.history.clone();

        let snapshot = tokio::task::spawn_blocking(move || {
            aggregator.load_snapshot(history.as_ref(), &filter, now)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("指标计算任务失败: {}", e)))??;

        Ok(snapshot)
    }

    /// 按设备位号分组计算 (位号升序)
    pub async fn snapshot_by_tag(
        &self,
        filter: HistoryFilter,
        now: Option<NaiveDateTime>,
    ) -> ApiResult<Vec<EquipmentIndicatorInfo>> {
        validate_filter(&filter)?;
        let aggregator = IndicatorAggregator::new(self.load_policy().await?);
        let now = now.unwrap_or_else(|| Utc::now().naive_utc());
        let history = self.history.clone();

        let grouped = tokio::task::spawn_blocking(move || {
            aggregator.load_by_tag(history.as_ref(), &filter, now)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("指标计算任务失败: {}", e)))??;

        Ok(grouped
            .into_iter()
            .map(|item| EquipmentIndicatorInfo {
                equipment_tag: item.equipment_tag,
                snapshot: item.snapshot,
            })
            .collect())
    }

    async fn load_policy(&self) -> ApiResult<IndicatorPolicy> {
        self.config
            .get_indicator_policy()
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {}", e)))
    }
}

fn validate_filter(filter: &HistoryFilter) -> ApiResult<()> {
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
        if from > to {
            return Err(ApiError::InvalidInput(format!(
                "日期区间非法: {} 晚于 {}",
                from, to
            )));
        }
    }
    if let Some(tag) = &filter.equipment_tag {
        if tag.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备位号不能为空".to_string()));
        }
    }
    Ok(())
}
