// ==========================================
// 设备维修管理 - 应用命令
// ==========================================
// 职责: 对外命令入口 (cron / 人工触发 / 看板查询), 统一返回 JSON 字符串
// 错误: 序列化为 {"code": ..., "message": ...}
// ==========================================

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::app::state::AppState;
use crate::domain::types::{Operator, OperatorRole};
use crate::domain::work_order::HistoryFilter;

// ==========================================
// 公共工具：错误映射、日期解析
// ==========================================

/// 将ApiError转换为JSON字符串
pub fn map_api_error(err: ApiError) -> String {
    let body = err.to_body();
    serde_json::to_string(&body).unwrap_or_else(|_| err.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("序列化失败: {}", e))
}

/// 解析日期 (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| map_api_error(ApiError::InvalidInput(format!("日期格式错误（应为YYYY-MM-DD）: {}", e))))
}

/// 解析时刻 (YYYY-MM-DD HH:MM:SS 或 YYYY-MM-DDTHH:MM:SS)
pub fn parse_timestamp(ts_str: &str) -> Result<NaiveDateTime, String> {
    let raw = ts_str.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| {
            map_api_error(ApiError::InvalidInput(format!(
                "时间格式错误（应为YYYY-MM-DD HH:MM:SS）: {}",
                e
            )))
        })
}

// ==========================================
// 排程命令
// ==========================================

/// 执行一轮保养工单生成
///
/// # 参数
/// - now: 本轮时刻覆写 (可选, 用于测试 / 补跑)
///
/// # 返回
/// GenerationSummary JSON (含 created_count / errors)
pub async fn run_generation(state: &AppState, now: Option<String>) -> Result<String, String> {
    let now = now.as_deref().map(parse_timestamp).transpose()?;
    let summary = state
        .scheduling_api
        .run_generation(now)
        .await
        .map_err(map_api_error)?;
    to_json(&summary)
}

// ==========================================
// 指标命令
// ==========================================

fn build_filter(
    equipment_tag: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
) -> Result<HistoryFilter, String> {
    Ok(HistoryFilter {
        equipment_tag,
        date_from: date_from.as_deref().map(parse_date).transpose()?,
        date_to: date_to.as_deref().map(parse_date).transpose()?,
    })
}

/// 查询指标快照 (展示视图, 一位小数)
pub async fn get_indicator_snapshot(
    state: &AppState,
    equipment_tag: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
) -> Result<String, String> {
    let filter = build_filter(equipment_tag, date_from, date_to)?;
    let snapshot = state
        .indicator_api
        .snapshot(filter, None)
        .await
        .map_err(map_api_error)?;
    to_json(&snapshot.to_view())
}

/// 按设备位号查询指标 (展示视图)
pub async fn list_indicators_by_tag(
    state: &AppState,
    date_from: Option<String>,
    date_to: Option<String>,
) -> Result<String, String> {
    let filter = build_filter(None, date_from, date_to)?;
    let items = state
        .indicator_api
        .snapshot_by_tag(filter, None)
        .await
        .map_err(map_api_error)?;

    let views: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            serde_json::json!({
                "equipment_tag": item.equipment_tag,
                "snapshot": item.snapshot.to_view(),
            })
        })
        .collect();
    to_json(&views)
}

// ==========================================
// 历史导入命令
// ==========================================

/// 导入维修历史 (工单 CSV, 可选执行记录 CSV)
///
/// # 返回
/// ImportReport 数组 JSON (逐文件, 含被拒绝的行)
pub async fn import_history(
    state: &AppState,
    work_orders_path: String,
    executions_path: Option<String>,
    operator: String,
) -> Result<String, String> {
    if operator.trim().is_empty() {
        return Err(map_api_error(ApiError::InvalidInput("操作人不能为空".to_string())));
    }
    let importer = state.history_importer.clone();

    let reports = tokio::task::spawn_blocking(move || {
        let mut reports = vec![importer.import_work_orders(Path::new(&work_orders_path), &operator)?];
        if let Some(path) = executions_path {
            reports.push(importer.import_executions(Path::new(&path), &operator)?);
        }
        Ok::<_, ApiError>(reports)
    })
    .await
    .map_err(|e| map_api_error(ApiError::InternalError(format!("导入任务失败: {}", e))))?
    .map_err(map_api_error)?;

    to_json(&reports)
}

// ==========================================
// 单据编号命令
// ==========================================

/// 归零单据编号序列 (管理员)
pub async fn reset_sequence(
    state: &AppState,
    doc_type: String,
    operator: String,
    role: String,
) -> Result<String, String> {
    let role = OperatorRole::from_db_str(&role).ok_or_else(|| {
        map_api_error(ApiError::InvalidInput(format!("未知角色: {}", role)))
    })?;
    let operator = Operator::new(operator, role);
    let result = state
        .sequence_api
        .reset(&doc_type, &operator)
        .map_err(map_api_error)?;
    to_json(&result)
}

/// 查询全部单据编号序列
pub async fn list_sequences(state: &AppState) -> Result<String, String> {
    let sequences = state.sequence_api.list().map_err(map_api_error)?;
    to_json(&sequences)
}
