// ==========================================
// 设备维修管理 - 排程 API
// ==========================================
// 职责: 触发一轮保养工单生成 (cron / 人工“立即生成”)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::api::error::ApiResult;
use crate::config::ReliabilityConfigReader;
use crate::engine::ports::{AuditSink, SchedulingStore};
use crate::engine::scheduling_driver::{GenerationSummary, SchedulingDriver};

pub struct SchedulingApi {
    driver: SchedulingDriver,
}

impl SchedulingApi {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        audit: Arc<dyn AuditSink>,
        config: Arc<dyn ReliabilityConfigReader>,
    ) -> Self {
        Self {
            driver: SchedulingDriver::new(store, audit, config),
        }
    }

    /// 执行一轮生成
    ///
    /// # 参数
    /// - `now`: 本轮时刻覆写 (缺省取当前 UTC 时间)
    ///
    /// # 返回
    /// - `Ok(GenerationSummary)`: 含 created_count 与逐计划错误
    /// - `Err(ApiError)`: 到期计划无法加载 (整轮失败, 由调用方重试)
    pub async fn run_generation(&self, now: Option<NaiveDateTime>) -> ApiResult<GenerationSummary> {
        Ok(self.driver.run_pass(now).await?)
    }
}
