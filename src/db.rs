// ==========================================
// 设备维修管理 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 多进程/多连接并发写入时由 SQLite 排队而不是报错
// - 建表幂等 (CREATE ... IF NOT EXISTS)
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 10_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库时间戳格式 (UTC)
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 存在
pub fn open_and_migrate(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表 (幂等)
///
/// 说明：
/// - work_order(plan_id, due_at) 唯一索引: 同一计划同一到期时刻至多一张工单（存储层兜底）
/// - work_order.code 仅普通索引: 序列重置后允许编号复用, 身份以 work_order_id 为准
/// - document_sequence 每种单据类型一行
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS maintenance_plan (
            plan_id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            plan_kind TEXT NOT NULL,
            equipment_tag TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'MEDIUM',
            trigger_type TEXT NOT NULL,
            period_value INTEGER,
            period_unit TEXT,
            cycle_threshold INTEGER,
            cycle_unit TEXT,
            condition_rule TEXT,
            next_execution TEXT,
            last_execution TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            estimated_hours REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_plan_due
          ON maintenance_plan(active, trigger_type, next_execution);

        CREATE TABLE IF NOT EXISTS work_order (
            work_order_id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            number INTEGER NOT NULL,
            order_type TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'MEDIUM',
            equipment_tag TEXT NOT NULL,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            requester TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            closed_at TEXT,
            estimated_hours REAL,
            actual_hours REAL,
            estimated_cost REAL,
            actual_cost REAL,
            plan_id TEXT REFERENCES maintenance_plan(plan_id),
            due_at TEXT,
            CHECK ((status = 'CLOSED') = (closed_at IS NOT NULL))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_work_order_plan_cycle
          ON work_order(plan_id, due_at) WHERE plan_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_work_order_code ON work_order(code);
        CREATE INDEX IF NOT EXISTS idx_work_order_status ON work_order(status);
        CREATE INDEX IF NOT EXISTS idx_work_order_type_ts ON work_order(order_type, requested_at);
        CREATE INDEX IF NOT EXISTS idx_work_order_tag_ts ON work_order(equipment_tag, requested_at);

        CREATE TABLE IF NOT EXISTS execution (
            execution_id TEXT PRIMARY KEY,
            work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            labor_cost REAL NOT NULL DEFAULT 0,
            material_cost REAL NOT NULL DEFAULT 0,
            third_party_cost REAL NOT NULL DEFAULT 0,
            notes TEXT,
            CHECK (finished_at >= started_at)
        );

        CREATE INDEX IF NOT EXISTS idx_execution_work_order ON execution(work_order_id);
        CREATE INDEX IF NOT EXISTS idx_execution_started ON execution(started_at);

        CREATE TABLE IF NOT EXISTS document_sequence (
            doc_type TEXT PRIMARY KEY,
            prefix TEXT NOT NULL,
            last_number INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            audit_id TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            description TEXT NOT NULL,
            tag TEXT,
            payload_json TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_log(created_at);
        CREATE INDEX IF NOT EXISTS idx_audit_action_ts ON audit_log(action, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 时间戳 → 数据库文本
pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 数据库文本 → 时间戳 (用于 row 映射, 错误转换为 FromSqlConversionFailure)
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 可空时间戳列
pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}
