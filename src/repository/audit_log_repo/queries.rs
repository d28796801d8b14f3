use super::core::AuditLogRepository;
use crate::db::{format_ts, parse_ts};
use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const AUDIT_COLUMNS: &str =
    "audit_id, actor, action, description, tag, payload_json, created_at";

impl AuditLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 audit_id 查询
    pub fn find_by_id(&self, audit_id: &str) -> RepositoryResult<Option<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM audit_log WHERE audit_id = ?1", AUDIT_COLUMNS);

        match conn.query_row(&sql, params![audit_id], map_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询最近的审计日志 (按时间倒序)
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_log ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            AUDIT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 按操作类型查询 (按时间倒序)
    pub fn list_by_action(
        &self,
        action: AuditAction,
        limit: usize,
    ) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM audit_log
               WHERE action = ?1
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?2"#,
            AUDIT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![action.as_str(), limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询时间范围内的审计日志
    pub fn list_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM audit_log
               WHERE created_at BETWEEN ?1 AND ?2
               ORDER BY created_at DESC, rowid DESC"#,
            AUDIT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(
                params![format_ts(&start_time), format_ts(&end_time)],
                map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 统计审计日志数量
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// 映射数据库行到AuditLog对象
fn map_row(row: &Row) -> SqliteResult<AuditLog> {
    let payload_json: Option<String> = row.get(5)?;

    Ok(AuditLog {
        audit_id: row.get(0)?,
        actor: row.get(1)?,
        action: row.get(2)?,
        description: row.get(3)?,
        tag: row.get(4)?,
        // 损坏的 JSON 不影响日志读取
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}
