// ==========================================
// 设备维修管理 - 执行记录数据仓储
// ==========================================
// 红线: 执行记录只追加 (无 update / delete)
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::work_order::{Execution, HistoryFilter};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ExecutionRepository - 执行记录仓储
// ==========================================
pub struct ExecutionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExecutionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加执行记录
    ///
    /// # 错误
    /// - `ValidationError`: 结束早于开始 / 成本分量非法
    /// - `ForeignKeyViolation`: 工单不存在
    pub fn insert(&self, execution: &Execution) -> RepositoryResult<String> {
        execution.validate()?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO execution (
                execution_id, work_order_id, started_at, finished_at,
                labor_cost, material_cost, third_party_cost, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                execution.execution_id,
                execution.work_order_id,
                format_ts(&execution.started_at),
                format_ts(&execution.finished_at),
                execution.labor_cost,
                execution.material_cost,
                execution.third_party_cost,
                execution.notes,
            ],
        )?;

        Ok(execution.execution_id.clone())
    }

    /// 按过滤条件查询 (设备位号取自所属工单, 日期作用于开始时间)
    pub fn list(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<Execution>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"SELECT e.execution_id, e.work_order_id, e.started_at, e.finished_at,
                      e.labor_cost, e.material_cost, e.third_party_cost, e.notes
               FROM execution e
               JOIN work_order w ON w.work_order_id = e.work_order_id
               WHERE 1 = 1"#,
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(tag) = &filter.equipment_tag {
            sql.push_str(" AND w.equipment_tag = ?");
            args.push(Value::Text(tag.clone()));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND e.started_at >= ?");
            args.push(Value::Text(format!("{} 00:00:00", from.format("%Y-%m-%d"))));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND e.started_at <= ?");
            args.push(Value::Text(format!("{} 23:59:59", to.format("%Y-%m-%d"))));
        }
        sql.push_str(" ORDER BY e.started_at ASC, e.rowid ASC");

        let mut stmt = conn.prepare(&sql)?;
        let executions = stmt
            .query_map(params_from_iter(args), map_execution_row)?
            .collect::<Result<Vec<Execution>, _>>()?;

        Ok(executions)
    }

    /// 查询工单的全部执行记录
    pub fn list_by_work_order(&self, work_order_id: &str) -> RepositoryResult<Vec<Execution>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT execution_id, work_order_id, started_at, finished_at,
                      labor_cost, material_cost, third_party_cost, notes
               FROM execution
               WHERE work_order_id = ?1
               ORDER BY started_at ASC, rowid ASC"#,
        )?;

        let executions = stmt
            .query_map(params![work_order_id], map_execution_row)?
            .collect::<Result<Vec<Execution>, _>>()?;

        Ok(executions)
    }
}

fn map_execution_row(row: &rusqlite::Row) -> rusqlite::Result<Execution> {
    Ok(Execution {
        execution_id: row.get(0)?,
        work_order_id: row.get(1)?,
        started_at: parse_ts(2, &row.get::<_, String>(2)?)?,
        finished_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        labor_cost: row.get(4)?,
        material_cost: row.get(5)?,
        third_party_cost: row.get(6)?,
        notes: row.get(7)?,
    })
}
