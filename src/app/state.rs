// ==========================================
// 设备维修管理 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个连接; 跨进程并发由 SQLite 事务保证
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{IndicatorApi, PlanApi, SchedulingApi, SequenceApi, WorkOrderApi};
use crate::config::config_manager::ConfigManager;
use crate::config::ReliabilityConfigReader;
use crate::engine::MaintenanceRepositories;
use crate::importer::HistoryImporter;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CMMS_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排程API (生成触发入口)
    pub scheduling_api: Arc<SchedulingApi>,

    /// 指标API
    pub indicator_api: Arc<IndicatorApi>,

    /// 保养计划API
    pub plan_api: Arc<PlanApi>,

    /// 工单API
    pub work_order_api: Arc<WorkOrderApi>,

    /// 单据编号API
    pub sequence_api: Arc<SequenceApi>,

    /// 维修历史导入器
    pub history_importer: Arc<HistoryImporter>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 仓储集合
    pub repositories: MaintenanceRepositories,
}

impl AppState {
    /// 创建新的AppState实例 (打开数据库并补齐表结构)
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_and_migrate(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已打开的连接创建 (测试 / 内存库)
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let repositories = MaintenanceRepositories::from_connection(conn.clone());
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config: Arc<dyn ReliabilityConfigReader> = config_manager.clone();

        let scheduling_api = Arc::new(SchedulingApi::new(
            repositories.plan_repo.clone(),
            repositories.audit_repo.clone(),
            config.clone(),
        ));
        let indicator_api = Arc::new(IndicatorApi::new(
            Arc::new(repositories.history_store()),
            config.clone(),
        ));
        let plan_api = Arc::new(PlanApi::new(
            repositories.plan_repo.clone(),
            repositories.audit_repo.clone(),
        ));
        let work_order_api = Arc::new(WorkOrderApi::new(
            repositories.work_order_repo.clone(),
            repositories.execution_repo.clone(),
            repositories.audit_repo.clone(),
            config.clone(),
        ));
        let sequence_api = Arc::new(SequenceApi::new(
            repositories.sequence_repo.clone(),
            config,
        ));
        let history_importer = Arc::new(HistoryImporter::new(
            repositories.work_order_repo.clone(),
            repositories.execution_repo.clone(),
            repositories.sequence_repo.clone(),
            repositories.audit_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            scheduling_api,
            indicator_api,
            plan_api,
            work_order_api,
            sequence_api,
            history_importer,
            config_manager,
            repositories,
        })
    }
}

/// 获取默认数据库路径
///
/// 顺序: 环境变量 CMMS_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("cmms-reliability");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => return dir.join("cmms.db").to_string_lossy().to_string(),
            Err(e) => {
                tracing::warn!("无法创建数据目录 {}: {}, 使用当前目录", dir.display(), e);
            }
        }
    }

    "./cmms.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_from_in_memory_connection() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let state =
            AppState::from_connection(":memory:".to_string(), Arc::new(Mutex::new(conn))).unwrap();
        assert!(state.plan_api.list_plans(false).unwrap().is_empty());
    }
}
