// ==========================================
// 设备维修管理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::reliability_config_trait::{ConfigResult, ReliabilityConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::document_sequence::{default_prefix, normalize_doc_type};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取数值配置; 缺失时取默认值, 格式错误时告警并取默认值
    fn get_f64_or_default(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default,
                    "数值配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// ReliabilityConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ReliabilityConfigReader for ConfigManager {
    async fn get_default_mtbf_hours(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::DEFAULT_MTBF_HOURS, 720.0)
    }

    async fn get_default_mttr_hours(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::DEFAULT_MTTR_HOURS, 4.0)
    }

    async fn get_hours_per_week(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::HOURS_PER_WEEK, 40.0)
    }

    async fn get_reliability_horizon_hours(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::RELIABILITY_HORIZON_HOURS, 168.0)
    }

    async fn get_oee_performance_pct(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::OEE_PERFORMANCE_PCT, 100.0)
    }

    async fn get_oee_quality_pct(&self) -> ConfigResult<f64> {
        self.get_f64_or_default(config_keys::OEE_QUALITY_PCT, 100.0)
    }

    async fn get_sequence_prefix(&self, doc_type: &str) -> ConfigResult<String> {
        let key = format!("{}{}", config_keys::SEQUENCE_PREFIX, normalize_doc_type(doc_type));
        match self.get_config_value(&key)? {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Ok(default_prefix(doc_type)),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 指标默认值
    pub const DEFAULT_MTBF_HOURS: &str = "default_mtbf_hours";
    pub const DEFAULT_MTTR_HOURS: &str = "default_mttr_hours";
    pub const HOURS_PER_WEEK: &str = "hours_per_week";
    pub const RELIABILITY_HORIZON_HOURS: &str = "reliability_horizon_hours";

    // OEE
    pub const OEE_PERFORMANCE_PCT: &str = "oee_performance_pct";
    pub const OEE_QUALITY_PCT: &str = "oee_quality_pct";

    // 单据编号前缀 (sequence_prefix/<TYPE>)
    pub const SEQUENCE_PREFIX: &str = "sequence_prefix/";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorPolicy;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = setup();
        let policy = config.get_indicator_policy().await.unwrap();
        assert_eq!(policy, IndicatorPolicy::default());
        assert_eq!(config.get_sequence_prefix("preventive").await.unwrap(), "PRV");
    }

    #[tokio::test]
    async fn test_overrides_are_read() {
        let config = setup();
        config
            .set_global_config_value(config_keys::HOURS_PER_WEEK, "37.5")
            .unwrap();
        config
            .set_global_config_value("sequence_prefix/PREVENTIVE", "PM")
            .unwrap();

        assert_eq!(config.get_hours_per_week().await.unwrap(), 37.5);
        assert_eq!(config.get_sequence_prefix("PREVENTIVE").await.unwrap(), "PM");
    }

    #[tokio::test]
    async fn test_malformed_value_falls_back() {
        let config = setup();
        config
            .set_global_config_value(config_keys::DEFAULT_MTBF_HOURS, "abc")
            .unwrap();
        assert_eq!(config.get_default_mtbf_hours().await.unwrap(), 720.0);
    }

    #[test]
    fn test_snapshot_contains_overrides() {
        let config = setup();
        config
            .set_global_config_value(config_keys::OEE_QUALITY_PCT, "98")
            .unwrap();
        let snapshot = config.get_config_snapshot().unwrap();
        assert!(snapshot.contains("oee_quality_pct"));
    }
}
