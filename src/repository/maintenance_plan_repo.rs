// ==========================================
// 设备维修管理 - 保养计划数据仓储
// ==========================================
// 红线: 计划推进使用乐观锁 (next_execution 比较后更新)
// 红线: 推进计划 + 分配编号 + 插入工单 在同一个 IMMEDIATE 事务内完成
//       任一步失败整体回滚, 编号不被消耗
// ==========================================

use crate::db::{format_ts, parse_opt_ts, parse_ts};
use crate::domain::document_sequence::SequenceAllocation;
use crate::domain::maintenance_plan::{
    MaintenancePlan, NextDue, Period, PeriodUnit, PlanAdvance, PlanTrigger,
};
use crate::domain::types::{PlanKind, Priority};
use crate::domain::work_order::WorkOrder;
use crate::repository::document_sequence_repo::allocate_next;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::work_order_repo::insert_work_order;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

const PLAN_COLUMNS: &str = r#"
    plan_id, code, title, plan_kind, equipment_tag, priority,
    trigger_type, period_value, period_unit, cycle_threshold, cycle_unit, condition_rule,
    next_execution, last_execution, active, estimated_hours, created_at, updated_at
"#;

// ==========================================
// MaintenancePlanRepository - 保养计划仓储
// ==========================================
pub struct MaintenancePlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaintenancePlanRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建计划
    ///
    /// # 错误
    /// - `ValidationError`: 周期/触发条件非法
    /// - `UniqueConstraintViolation`: 计划编码重复
    pub fn insert(&self, plan: &MaintenancePlan) -> RepositoryResult<String> {
        plan.validate()?;

        let (period_value, period_unit, cycle_threshold, cycle_unit, condition_rule) =
            trigger_columns(&plan.trigger);

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO maintenance_plan (
                plan_id, code, title, plan_kind, equipment_tag, priority,
                trigger_type, period_value, period_unit, cycle_threshold, cycle_unit, condition_rule,
                next_execution, last_execution, active, estimated_hours, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"#,
            params![
                plan.plan_id,
                plan.code,
                plan.title,
                plan.kind.as_str(),
                plan.equipment_tag,
                plan.priority.as_str(),
                plan.trigger.type_str(),
                period_value,
                period_unit,
                cycle_threshold,
                cycle_unit,
                condition_rule,
                plan.next_due.to_column().as_ref().map(format_ts),
                plan.last_execution.as_ref().map(format_ts),
                plan.active,
                plan.estimated_hours,
                format_ts(&plan.created_at),
                format_ts(&plan.updated_at),
            ],
        )?;

        Ok(plan.plan_id.clone())
    }

    /// 按ID查询
    pub fn find_by_id(&self, plan_id: &str) -> RepositoryResult<Option<MaintenancePlan>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM maintenance_plan WHERE plan_id = ?1", PLAN_COLUMNS);

        match conn.query_row(&sql, params![plan_id], map_plan_row) {
            Ok(plan) => Ok(Some(plan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按计划编码查询
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<MaintenancePlan>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM maintenance_plan WHERE code = ?1", PLAN_COLUMNS);

        match conn.query_row(&sql, params![code], map_plan_row) {
            Ok(plan) => Ok(Some(plan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询计划列表
    pub fn list(&self, active_only: bool) -> RepositoryResult<Vec<MaintenancePlan>> {
        let conn = self.get_conn()?;
        let sql = if active_only {
            format!(
                "SELECT {} FROM maintenance_plan WHERE active = 1 ORDER BY code",
                PLAN_COLUMNS
            )
        } else {
            format!("SELECT {} FROM maintenance_plan ORDER BY code", PLAN_COLUMNS)
        };

        let mut stmt = conn.prepare(&sql)?;
        let plans = stmt
            .query_map([], map_plan_row)?
            .collect::<Result<Vec<MaintenancePlan>, _>>()?;
        Ok(plans)
    }

    /// 查询自动生成候选: 激活 + 时间触发 + (未排期 或 已到期)
    pub fn list_auto_due(&self, now: NaiveDateTime) -> RepositoryResult<Vec<MaintenancePlan>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM maintenance_plan
               WHERE active = 1
                 AND trigger_type = 'TIME'
                 AND (next_execution IS NULL OR next_execution <= ?1)
               ORDER BY next_execution IS NOT NULL, next_execution, code"#,
            PLAN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let plans = stmt
            .query_map(params![format_ts(&now)], map_plan_row)?
            .collect::<Result<Vec<MaintenancePlan>, _>>()?;
        Ok(plans)
    }

    /// 停用计划 (不删除)
    ///
    /// # 返回
    /// - `Ok(true)`: 本次由激活变为停用
    /// - `Ok(false)`: 原本已停用
    pub fn deactivate(&self, plan_id: &str, at: NaiveDateTime) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE maintenance_plan SET active = 0, updated_at = ?1 WHERE plan_id = ?2 AND active = 1",
            params![format_ts(&at), plan_id],
        )?;
        if rows > 0 {
            return Ok(true);
        }

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM maintenance_plan WHERE plan_id = ?1",
            params![plan_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MaintenancePlan".to_string(),
                id: plan_id.to_string(),
            });
        }
        Ok(false)
    }

    /// 为到期计划生成工单 (原子单元)
    ///
    /// 事务内顺序:
    /// 1. 乐观锁推进 next_execution (比较值为读取时的到期状态)
    /// 2. 在同一事务内分配单据编号
    /// 3. 以模板填入编号后插入工单
    ///
    /// # 错误
    /// - `PlanAdvanceConflict`: 计划已被其他生成轮次推进 / 已停用
    /// - `UniqueConstraintViolation`: 同一计划同一到期时刻工单已存在
    pub fn generate_work_order(
        &self,
        advance: &PlanAdvance,
        template: WorkOrder,
        doc_type: &str,
        default_prefix: &str,
    ) -> RepositoryResult<(WorkOrder, SequenceAllocation)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let expected_col = advance.expected.to_column().as_ref().map(format_ts);
        let rows = tx.execute(
            r#"UPDATE maintenance_plan
               SET next_execution = ?1, last_execution = ?2, updated_at = ?2
               WHERE plan_id = ?3
                 AND active = 1
                 AND trigger_type = 'TIME'
                 AND next_execution IS ?4"#,
            params![
                advance.next.to_column().as_ref().map(format_ts),
                format_ts(&advance.executed_at),
                advance.plan_id,
                expected_col,
            ],
        )?;

        if rows == 0 {
            // tx drop 即回滚
            return Err(RepositoryError::PlanAdvanceConflict {
                plan_code: advance.plan_code.clone(),
                expected: expected_col.unwrap_or_else(|| "NULL".to_string()),
            });
        }

        let allocation = allocate_next(&tx, doc_type, default_prefix)?;

        let mut work_order = template;
        work_order.code = allocation.code();
        work_order.number = allocation.number;
        insert_work_order(&tx, &work_order)?;

        tx.commit()?;
        Ok((work_order, allocation))
    }
}

type TriggerColumns = (
    Option<u32>,
    Option<&'static str>,
    Option<u32>,
    Option<String>,
    Option<String>,
);

fn trigger_columns(trigger: &PlanTrigger) -> TriggerColumns {
    match trigger {
        PlanTrigger::Time { period } => (Some(period.value), Some(period.unit.as_str()), None, None, None),
        PlanTrigger::Cycle {
            threshold,
            counter_unit,
        } => (None, None, Some(*threshold), Some(counter_unit.clone()), None),
        PlanTrigger::Condition { rule } => (None, None, None, None, Some(rule.clone())),
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

/// 映射数据库行到MaintenancePlan对象
fn map_plan_row(row: &rusqlite::Row) -> rusqlite::Result<MaintenancePlan> {
    let kind_str: String = row.get(3)?;
    let kind = PlanKind::from_db_str(&kind_str)
        .ok_or_else(|| conversion_error(3, format!("未知计划类型: {}", kind_str)))?;

    let trigger_type: String = row.get(6)?;
    let trigger = match trigger_type.as_str() {
        "TIME" => {
            let value: u32 = row.get(7)?;
            let unit_str: String = row.get(8)?;
            let unit = PeriodUnit::from_db_str(&unit_str)
                .ok_or_else(|| conversion_error(8, format!("未知周期单位: {}", unit_str)))?;
            PlanTrigger::Time {
                period: Period::new(value, unit),
            }
        }
        "CYCLE" => PlanTrigger::Cycle {
            threshold: row.get(9)?,
            counter_unit: row.get(10)?,
        },
        "CONDITION" => PlanTrigger::Condition { rule: row.get(11)? },
        other => return Err(conversion_error(6, format!("未知触发类型: {}", other))),
    };

    Ok(MaintenancePlan {
        plan_id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        kind,
        equipment_tag: row.get(4)?,
        priority: Priority::from_db_str(&row.get::<_, String>(5)?),
        trigger,
        next_due: NextDue::from_column(parse_opt_ts(12, row.get(12)?)?),
        last_execution: parse_opt_ts(13, row.get(13)?)?,
        active: row.get(14)?,
        estimated_hours: row.get(15)?,
        created_at: parse_ts(16, &row.get::<_, String>(16)?)?,
        updated_at: parse_ts(17, &row.get::<_, String>(17)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{WorkOrderType, SYSTEM_ACTOR};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn setup() -> (Arc<Mutex<Connection>>, MaintenancePlanRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), MaintenancePlanRepository::new(conn))
    }

    fn monthly_plan(code: &str) -> MaintenancePlan {
        MaintenancePlan::new(
            code,
            "月度检查",
            PlanKind::Preventive,
            "P-101",
            PlanTrigger::Time {
                period: Period::months(1),
            },
            2.0,
        )
    }

    fn template(plan: &MaintenancePlan, due: NaiveDateTime) -> WorkOrder {
        let mut wo = WorkOrder::new_open(
            String::new(),
            0,
            WorkOrderType::Preventive,
            plan.equipment_tag.clone(),
            plan.title.clone(),
            SYSTEM_ACTOR.to_string(),
            due,
        );
        wo.plan_id = Some(plan.plan_id.clone());
        wo.due_at = Some(due);
        wo
    }

    #[test]
    fn test_insert_and_find_round_trip() {
        let (_, repo) = setup();
        let plan = monthly_plan("PM-001").with_next_due(NextDue::Scheduled(ts("2025-01-31 08:00:00")));
        repo.insert(&plan).unwrap();

        let loaded = repo.find_by_code("PM-001").unwrap().unwrap();
        assert_eq!(loaded.plan_id, plan.plan_id);
        assert_eq!(loaded.trigger, plan.trigger);
        assert_eq!(loaded.next_due, plan.next_due);
        assert!(loaded.active);
    }

    #[test]
    fn test_cycle_trigger_round_trip() {
        let (_, repo) = setup();
        let plan = MaintenancePlan::new(
            "LUB-001",
            "轴承润滑",
            PlanKind::Lubrication,
            "M-201",
            PlanTrigger::Cycle {
                threshold: 500,
                counter_unit: "HOURS".to_string(),
            },
            0.5,
        );
        repo.insert(&plan).unwrap();

        let loaded = repo.find_by_id(&plan.plan_id).unwrap().unwrap();
        assert_eq!(loaded.trigger, plan.trigger);
        assert_eq!(loaded.kind, PlanKind::Lubrication);
    }

    #[test]
    fn test_insert_rejects_zero_period() {
        let (_, repo) = setup();
        let mut plan = monthly_plan("PM-BAD");
        plan.trigger = PlanTrigger::Time {
            period: Period::days(0),
        };
        assert!(matches!(
            repo.insert(&plan),
            Err(RepositoryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_list_auto_due_filters_inactive_and_future() {
        let (_, repo) = setup();
        let now = ts("2025-02-01 00:00:00");

        let due = monthly_plan("PM-DUE").with_next_due(NextDue::Scheduled(ts("2025-01-31 00:00:00")));
        let unscheduled = monthly_plan("PM-NEW");
        let future = monthly_plan("PM-FUT").with_next_due(NextDue::Scheduled(ts("2025-03-01 00:00:00")));
        let mut inactive = monthly_plan("PM-OFF");
        inactive.active = false;

        for plan in [&due, &unscheduled, &future, &inactive] {
            repo.insert(plan).unwrap();
        }

        let codes: Vec<String> = repo
            .list_auto_due(now)
            .unwrap()
            .into_iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(codes, vec!["PM-NEW".to_string(), "PM-DUE".to_string()]);
    }

    #[test]
    fn test_deactivate() {
        let (_, repo) = setup();
        let plan = monthly_plan("PM-001");
        repo.insert(&plan).unwrap();

        let at = ts("2025-02-01 00:00:00");
        assert!(repo.deactivate(&plan.plan_id, at).unwrap());
        assert!(!repo.deactivate(&plan.plan_id, at).unwrap());
        assert!(!repo.find_by_id(&plan.plan_id).unwrap().unwrap().active);
        assert!(matches!(
            repo.deactivate("missing", at),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_generate_work_order_advances_plan() {
        let (_, repo) = setup();
        let due = ts("2025-01-31 08:00:00");
        let plan = monthly_plan("PM-001").with_next_due(NextDue::Scheduled(due));
        repo.insert(&plan).unwrap();

        let advance = PlanAdvance {
            plan_id: plan.plan_id.clone(),
            plan_code: plan.code.clone(),
            expected: plan.next_due,
            next: NextDue::Scheduled(ts("2025-02-28 08:00:00")),
            executed_at: ts("2025-02-01 00:00:00"),
        };
        let (wo, allocation) = repo
            .generate_work_order(&advance, template(&plan, due), "PREVENTIVE", "PRV")
            .unwrap();

        assert_eq!(allocation.number, 1);
        assert_eq!(wo.code, "PRV-000001");

        let reloaded = repo.find_by_id(&plan.plan_id).unwrap().unwrap();
        assert_eq!(reloaded.next_due, advance.next);
        assert_eq!(reloaded.last_execution, Some(advance.executed_at));
    }

    #[test]
    fn test_stale_advance_conflicts_without_consuming_number() {
        let (conn, repo) = setup();
        let due = ts("2025-01-31 08:00:00");
        let plan = monthly_plan("PM-001").with_next_due(NextDue::Scheduled(due));
        repo.insert(&plan).unwrap();

        let advance = PlanAdvance {
            plan_id: plan.plan_id.clone(),
            plan_code: plan.code.clone(),
            expected: plan.next_due,
            next: NextDue::Scheduled(ts("2025-02-28 08:00:00")),
            executed_at: ts("2025-02-01 00:00:00"),
        };
        repo.generate_work_order(&advance, template(&plan, due), "PREVENTIVE", "PRV")
            .unwrap();

        // 第二次使用同一比较值: 计划已推进
        let err = repo
            .generate_work_order(&advance, template(&plan, due), "PREVENTIVE", "PRV")
            .unwrap_err();
        assert!(err.is_conflict());

        let last: i64 = conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT last_number FROM document_sequence WHERE doc_type = 'PREVENTIVE'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(last, 1);
    }

    #[test]
    fn test_unscheduled_plan_matches_null_expected() {
        let (_, repo) = setup();
        let plan = monthly_plan("PM-NEW");
        repo.insert(&plan).unwrap();

        let now = ts("2025-02-01 00:00:00");
        let advance = PlanAdvance {
            plan_id: plan.plan_id.clone(),
            plan_code: plan.code.clone(),
            expected: NextDue::DueImmediately,
            next: NextDue::Scheduled(ts("2025-03-01 00:00:00")),
            executed_at: now,
        };
        assert!(repo
            .generate_work_order(&advance, template(&plan, now), "PREVENTIVE", "PRV")
            .is_ok());
    }
}
