// ==========================================
// 设备维修管理 - 单据编号序列数据仓储
// ==========================================
// 红线: 分配必须是存储层原子自增 (单条 UPSERT ... RETURNING)
//       禁止“先读后写”, 多进程/多连接并发下同一类型不得重号
// ==========================================

use crate::db::parse_ts;
use crate::domain::audit_log::AuditLog;
use crate::domain::document_sequence::{normalize_doc_type, DocumentSequence, SequenceAllocation};
use crate::repository::audit_log_repo::insert_audit;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

// ==========================================
// DocumentSequenceRepository - 单据编号序列仓储
// ==========================================
pub struct DocumentSequenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentSequenceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 分配下一个编号
    ///
    /// # 参数
    /// - `doc_type`: 单据类型 (分区键, 大小写不敏感)
    /// - `default_prefix`: 类型首次出现时使用的前缀 (已有行保持原前缀)
    pub fn allocate(
        &self,
        doc_type: &str,
        default_prefix: &str,
    ) -> RepositoryResult<SequenceAllocation> {
        let conn = self.get_conn()?;
        allocate_next(&conn, doc_type, default_prefix)
    }

    /// 查询当前序列状态
    pub fn find(&self, doc_type: &str) -> RepositoryResult<Option<DocumentSequence>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            r#"SELECT doc_type, prefix, last_number, updated_at
               FROM document_sequence WHERE doc_type = ?1"#,
            params![normalize_doc_type(doc_type)],
            map_sequence_row,
        ) {
            Ok(seq) => Ok(Some(seq)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部序列
    pub fn list_all(&self) -> RepositoryResult<Vec<DocumentSequence>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT doc_type, prefix, last_number, updated_at
               FROM document_sequence ORDER BY doc_type"#,
        )?;
        let rows = stmt
            .query_map([], map_sequence_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 将计数器抬升到不低于 `number` (历史导入后避免新分配与已导入编号重号)
    ///
    /// 只增不减; 类型不存在时以 `default_prefix` 建行
    pub fn raise_to(&self, doc_type: &str, default_prefix: &str, number: i64) -> RepositoryResult<i64> {
        let key = normalize_doc_type(doc_type);
        if key.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "doc_type".to_string(),
                message: "单据类型不能为空".to_string(),
            });
        }

        let conn = self.get_conn()?;
        let last: i64 = conn.query_row(
            r#"INSERT INTO document_sequence (doc_type, prefix, last_number, updated_at)
               VALUES (?1, ?2, ?3, datetime('now'))
               ON CONFLICT(doc_type) DO UPDATE
                 SET last_number = MAX(last_number, excluded.last_number),
                     updated_at = datetime('now')
               RETURNING last_number"#,
            params![key, default_prefix, number.max(0)],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    /// 将序列计数器归零 (破坏性管理操作, 权限校验与审计由调用方负责)
    ///
    /// # 返回
    /// - `Ok(previous_last_number)`: 归零前的编号
    /// - `Err(NotFound)`: 类型不存在
    pub fn reset(&self, doc_type: &str) -> RepositoryResult<i64> {
        self.reset_inner(doc_type, None::<fn(i64) -> AuditLog>)
    }

    /// 归零并在同一事务内写入审计日志
    ///
    /// `make_audit` 以归零前的编号构造审计记录; 审计写入失败时归零一并回滚
    pub fn reset_audited<F>(&self, doc_type: &str, make_audit: F) -> RepositoryResult<i64>
    where
        F: FnOnce(i64) -> AuditLog,
    {
        self.reset_inner(doc_type, Some(make_audit))
    }

    fn reset_inner<F>(&self, doc_type: &str, make_audit: Option<F>) -> RepositoryResult<i64>
    where
        F: FnOnce(i64) -> AuditLog,
    {
        let key = normalize_doc_type(doc_type);
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: i64 = match tx.query_row(
            "SELECT last_number FROM document_sequence WHERE doc_type = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(n) => n,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(RepositoryError::NotFound {
                    entity: "DocumentSequence".to_string(),
                    id: key,
                })
            }
            Err(e) => return Err(e.into()),
        };

        tx.execute(
            r#"UPDATE document_sequence
               SET last_number = 0, updated_at = datetime('now')
               WHERE doc_type = ?1"#,
            params![key],
        )?;

        if let Some(make_audit) = make_audit {
            insert_audit(&tx, &make_audit(previous))?;
        }

        tx.commit()?;
        Ok(previous)
    }
}

/// 在给定连接(或事务)上原子分配下一个编号
///
/// 单条 UPSERT ... RETURNING:
/// - 类型不存在时插入 last_number = 1
/// - 已存在时 last_number = last_number + 1
pub(crate) fn allocate_next(
    conn: &Connection,
    doc_type: &str,
    default_prefix: &str,
) -> RepositoryResult<SequenceAllocation> {
    let key = normalize_doc_type(doc_type);
    if key.is_empty() {
        return Err(RepositoryError::FieldValueError {
            field: "doc_type".to_string(),
            message: "单据类型不能为空".to_string(),
        });
    }

    let (prefix, number): (String, i64) = conn.query_row(
        r#"INSERT INTO document_sequence (doc_type, prefix, last_number, updated_at)
           VALUES (?1, ?2, 1, datetime('now'))
           ON CONFLICT(doc_type) DO UPDATE
             SET last_number = last_number + 1,
                 updated_at = datetime('now')
           RETURNING prefix, last_number"#,
        params![key, default_prefix],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(SequenceAllocation {
        doc_type: key,
        prefix,
        number,
    })
}

fn map_sequence_row(row: &rusqlite::Row) -> rusqlite::Result<DocumentSequence> {
    Ok(DocumentSequence {
        doc_type: row.get(0)?,
        prefix: row.get(1)?,
        last_number: row.get(2)?,
        updated_at: parse_ts(3, &row.get::<_, String>(3)?)?,
    })
}
