use crate::db::format_ts;
use crate::domain::audit_log::AuditLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AuditLogRepository - 审计日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    /// 创建新的审计日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加审计日志
    ///
    /// # 返回
    /// - `Ok(audit_id)`: 成功插入
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &AuditLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_audit(&conn, log)?;
        Ok(log.audit_id.clone())
    }

    /// 批量追加审计日志 (单事务)
    pub fn batch_insert(&self, logs: &[AuditLog]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for log in logs {
            insert_audit(&tx, log)?;
        }

        tx.commit()?;
        Ok(logs.len())
    }
}

/// 在给定连接(或事务)上追加审计日志
pub(crate) fn insert_audit(conn: &Connection, log: &AuditLog) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO audit_log (
            audit_id, actor, action, description, tag, payload_json, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            log.audit_id,
            log.actor,
            log.action,
            log.description,
            log.tag,
            log.payload_json.as_ref().map(|v| v.to_string()),
            format_ts(&log.created_at),
        ],
    )?;
    Ok(())
}
