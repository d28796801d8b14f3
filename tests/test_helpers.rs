// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、独立连接的 AppState、测试数据构造
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use cmms_reliability::app::AppState;
use cmms_reliability::db::open_and_migrate;
use cmms_reliability::domain::types::PlanKind;
use cmms_reliability::domain::{MaintenancePlan, NextDue, Period, PlanTrigger};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();

    // 建表后立即关闭, 各测试按需打开自己的连接
    open_and_migrate(&db_path)?;

    Ok((temp_file, db_path))
}

/// 基于独立连接创建 AppState (模拟独立进程)
pub fn open_state(db_path: &str) -> AppState {
    let conn = open_and_migrate(db_path).unwrap();
    AppState::from_connection(db_path.to_string(), Arc::new(Mutex::new(conn))).unwrap()
}

/// 解析时间戳 (YYYY-MM-DD HH:MM:SS)
pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// 构造时间触发的预防性保养计划
pub fn time_plan(code: &str, tag: &str, period: Period, next_due: NextDue) -> MaintenancePlan {
    MaintenancePlan::new(
        code,
        format!("{} 定期保养", tag),
        PlanKind::Preventive,
        tag,
        PlanTrigger::Time { period },
        2.0,
    )
    .with_next_due(next_due)
}
