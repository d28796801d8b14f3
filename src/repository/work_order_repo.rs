// ==========================================
// 设备维修管理 - 工单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: closed_at 与 status 同一条 UPDATE 写入
// ==========================================

use crate::db::{format_ts, parse_opt_ts, parse_ts};
use crate::domain::document_sequence::SequenceAllocation;
use crate::domain::types::{Priority, WorkOrderStatus, WorkOrderType};
use crate::domain::work_order::{HistoryFilter, WorkOrder};
use crate::repository::document_sequence_repo::allocate_next;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

const WORK_ORDER_COLUMNS: &str = r#"
    work_order_id, code, number, order_type, priority, equipment_tag, title,
    status, requester, requested_at, closed_at,
    estimated_hours, actual_hours, estimated_cost, actual_cost,
    plan_id, due_at
"#;

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    /// 创建新的WorkOrderRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入工单 (写入前校验不变量)
    pub fn insert(&self, work_order: &WorkOrder) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_work_order(&conn, work_order)?;
        Ok(work_order.work_order_id.clone())
    }

    /// 分配单据编号并插入工单 (同一 IMMEDIATE 事务, 插入失败时编号不被消耗)
    pub fn insert_with_allocation(
        &self,
        template: WorkOrder,
        doc_type: &str,
        default_prefix: &str,
    ) -> RepositoryResult<(WorkOrder, SequenceAllocation)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let allocation = allocate_next(&tx, doc_type, default_prefix)?;
        let mut work_order = template;
        work_order.code = allocation.code();
        work_order.number = allocation.number;
        insert_work_order(&tx, &work_order)?;

        tx.commit()?;
        Ok((work_order, allocation))
    }

    /// 按ID查询
    pub fn find_by_id(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_order WHERE work_order_id = ?1",
            WORK_ORDER_COLUMNS
        );

        match conn.query_row(&sql, params![work_order_id], map_work_order_row) {
            Ok(wo) => Ok(Some(wo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按单据编号查询
    ///
    /// 序列重置后编号可能复用, 多条同号工单时返回最后写入的一条
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_order WHERE code = ?1 ORDER BY rowid DESC LIMIT 1",
            WORK_ORDER_COLUMNS
        );

        match conn.query_row(&sql, params![code], map_work_order_row) {
            Ok(wo) => Ok(Some(wo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按过滤条件查询 (按申请时间升序, 同一时刻按插入顺序)
    pub fn list(&self, filter: &HistoryFilter) -> RepositoryResult<Vec<WorkOrder>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM work_order WHERE 1 = 1", WORK_ORDER_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        if let Some(tag) = &filter.equipment_tag {
            sql.push_str(" AND equipment_tag = ?");
            args.push(Value::Text(tag.clone()));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND requested_at >= ?");
            args.push(Value::Text(format!("{} 00:00:00", from.format("%Y-%m-%d"))));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND requested_at <= ?");
            args.push(Value::Text(format!("{} 23:59:59", to.format("%Y-%m-%d"))));
        }
        sql.push_str(" ORDER BY requested_at ASC, rowid ASC");

        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(args), map_work_order_row)?
            .collect::<Result<Vec<WorkOrder>, _>>()?;

        Ok(orders)
    }

    /// 查询计划生成的工单
    pub fn list_by_plan(&self, plan_id: &str) -> RepositoryResult<Vec<WorkOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_order WHERE plan_id = ?1 ORDER BY due_at ASC, rowid ASC",
            WORK_ORDER_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params![plan_id], map_work_order_row)?
            .collect::<Result<Vec<WorkOrder>, _>>()?;

        Ok(orders)
    }

    /// 关闭工单
    ///
    /// # 错误
    /// - `NotFound`: 工单不存在
    /// - `ValidationError`: 工单已关闭或已取消
    pub fn close(&self, work_order_id: &str, closed_at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE work_order
               SET status = 'CLOSED', closed_at = ?1
               WHERE work_order_id = ?2 AND status NOT IN ('CLOSED', 'CANCELLED')"#,
            params![format_ts(&closed_at), work_order_id],
        )?;

        if rows == 0 {
            return Err(self.explain_missing_update(&conn, work_order_id));
        }
        Ok(())
    }

    /// 更新未关闭工单的状态 (CLOSED 只能通过 close 设置)
    pub fn update_status(
        &self,
        work_order_id: &str,
        status: WorkOrderStatus,
    ) -> RepositoryResult<()> {
        if status == WorkOrderStatus::Closed {
            return Err(RepositoryError::ValidationError(
                "关闭工单请使用 close(), 以同时写入 closed_at".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE work_order SET status = ?1
               WHERE work_order_id = ?2 AND status NOT IN ('CLOSED', 'CANCELLED')"#,
            params![status.as_str(), work_order_id],
        )?;

        if rows == 0 {
            return Err(self.explain_missing_update(&conn, work_order_id));
        }
        Ok(())
    }

    /// 统计工单数量
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM work_order", [], |row| row.get(0))?;
        Ok(count)
    }

    /// 区分“记录不存在”与“状态不允许”
    fn explain_missing_update(&self, conn: &Connection, work_order_id: &str) -> RepositoryError {
        let status: Result<String, _> = conn.query_row(
            "SELECT status FROM work_order WHERE work_order_id = ?1",
            params![work_order_id],
            |row| row.get(0),
        );

        match status {
            Ok(status) => RepositoryError::ValidationError(format!(
                "工单{}状态为{}, 不允许变更",
                work_order_id, status
            )),
            Err(_) => RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: work_order_id.to_string(),
            },
        }
    }
}

/// 在给定连接(或事务)上插入工单
pub(crate) fn insert_work_order(conn: &Connection, work_order: &WorkOrder) -> RepositoryResult<()> {
    work_order.validate()?;

    conn.execute(
        r#"INSERT INTO work_order (
            work_order_id, code, number, order_type, priority, equipment_tag, title,
            status, requester, requested_at, closed_at,
            estimated_hours, actual_hours, estimated_cost, actual_cost,
            plan_id, due_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"#,
        params![
            work_order.work_order_id,
            work_order.code,
            work_order.number,
            work_order.order_type.as_str(),
            work_order.priority.as_str(),
            work_order.equipment_tag,
            work_order.title,
            work_order.status.as_str(),
            work_order.requester,
            format_ts(&work_order.requested_at),
            work_order.closed_at.as_ref().map(format_ts),
            work_order.estimated_hours,
            work_order.actual_hours,
            work_order.estimated_cost,
            work_order.actual_cost,
            work_order.plan_id,
            work_order.due_at.as_ref().map(format_ts),
        ],
    )?;

    Ok(())
}

/// 映射数据库行到WorkOrder对象
fn map_work_order_row(row: &rusqlite::Row) -> rusqlite::Result<WorkOrder> {
    let order_type_str: String = row.get(3)?;
    let order_type = WorkOrderType::from_db_str(&order_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知工单类型: {}", order_type_str).into(),
        )
    })?;

    let status_str: String = row.get(7)?;
    let status = WorkOrderStatus::from_db_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("未知工单状态: {}", status_str).into(),
        )
    })?;

    Ok(WorkOrder {
        work_order_id: row.get(0)?,
        code: row.get(1)?,
        number: row.get(2)?,
        order_type,
        priority: Priority::from_db_str(&row.get::<_, String>(4)?),
        equipment_tag: row.get(5)?,
        title: row.get(6)?,
        status,
        requester: row.get(8)?,
        requested_at: parse_ts(9, &row.get::<_, String>(9)?)?,
        closed_at: parse_opt_ts(10, row.get(10)?)?,
        estimated_hours: row.get(11)?,
        actual_hours: row.get(12)?,
        estimated_cost: row.get(13)?,
        actual_cost: row.get(14)?,
        plan_id: row.get(15)?,
        due_at: parse_opt_ts(16, row.get(16)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work_order::Execution;
    use crate::repository::execution_repo::ExecutionRepository;
    use chrono::NaiveDate;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn setup() -> (Arc<Mutex<Connection>>, WorkOrderRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), WorkOrderRepository::new(conn))
    }

    fn template(tag: &str, order_type: WorkOrderType, requested_at: &str) -> WorkOrder {
        WorkOrder::new_open(
            String::new(),
            0,
            order_type,
            tag.to_string(),
            "泵密封泄漏".to_string(),
            "alice".to_string(),
            ts(requested_at),
        )
    }

    #[test]
    fn test_insert_with_allocation_assigns_code() {
        let (_, repo) = setup();
        let (wo, alloc) = repo
            .insert_with_allocation(
                template("P-101", WorkOrderType::Corrective, "2025-03-01 08:00:00"),
                "CORRECTIVE",
                "COR",
            )
            .unwrap();
        assert_eq!(alloc.number, 1);
        assert_eq!(wo.code, "COR-000001");

        let loaded = repo.find_by_code("COR-000001").unwrap().unwrap();
        assert_eq!(loaded, wo);
    }

    #[test]
    fn test_close_sets_closed_at_with_status() {
        let (_, repo) = setup();
        let (wo, _) = repo
            .insert_with_allocation(
                template("P-101", WorkOrderType::Corrective, "2025-03-01 08:00:00"),
                "CORRECTIVE",
                "COR",
            )
            .unwrap();

        repo.update_status(&wo.work_order_id, WorkOrderStatus::InProgress)
            .unwrap();
        repo.close(&wo.work_order_id, ts("2025-03-01 12:00:00"))
            .unwrap();

        let loaded = repo.find_by_id(&wo.work_order_id).unwrap().unwrap();
        assert_eq!(loaded.status, WorkOrderStatus::Closed);
        assert_eq!(loaded.closed_at, Some(ts("2025-03-01 12:00:00")));

        // 已关闭工单不可再变更
        assert!(matches!(
            repo.close(&wo.work_order_id, ts("2025-03-02 12:00:00")),
            Err(RepositoryError::ValidationError(_))
        ));
        assert!(matches!(
            repo.close("missing", ts("2025-03-02 12:00:00")),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_status_rejects_closed() {
        let (_, repo) = setup();
        assert!(matches!(
            repo.update_status("any", WorkOrderStatus::Closed),
            Err(RepositoryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_list_applies_filter() {
        let (conn, repo) = setup();
        for (tag, at) in [
            ("P-101", "2025-02-28 23:00:00"),
            ("P-101", "2025-03-01 00:00:00"),
            ("P-102", "2025-03-15 08:00:00"),
            ("P-101", "2025-03-31 23:59:59"),
            ("P-101", "2025-04-01 00:00:00"),
        ] {
            repo.insert_with_allocation(template(tag, WorkOrderType::Corrective, at), "CORRECTIVE", "COR")
                .unwrap();
        }

        let filter = HistoryFilter {
            equipment_tag: Some("P-101".to_string()),
            date_from: NaiveDate::from_ymd_opt(2025, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 31),
        };
        let orders = repo.list(&filter).unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders[0].requested_at < orders[1].requested_at);
        assert_eq!(repo.count().unwrap(), 5);

        // 执行记录按所属工单的设备位号过滤
        let exec_repo = ExecutionRepository::new(conn);
        let exec = Execution::new(
            orders[0].work_order_id.clone(),
            ts("2025-03-01 08:00:00"),
            ts("2025-03-01 10:00:00"),
            10.0,
            0.0,
            0.0,
        )
        .unwrap();
        exec_repo.insert(&exec).unwrap();
        assert_eq!(exec_repo.list(&filter).unwrap().len(), 1);
        assert!(exec_repo.list(&HistoryFilter::for_tag("P-102")).unwrap().is_empty());
        assert_eq!(
            exec_repo.list_by_work_order(&orders[0].work_order_id).unwrap()[0].duration_hours(),
            2.0
        );
    }

    #[test]
    fn test_storage_rejects_closed_without_closed_at() {
        let (_, repo) = setup();
        let mut wo = template("P-101", WorkOrderType::Corrective, "2025-03-01 08:00:00");
        wo.code = "COR-000099".to_string();
        wo.status = WorkOrderStatus::Closed;
        assert!(matches!(repo.insert(&wo), Err(RepositoryError::ValidationError(_))));
    }
}
