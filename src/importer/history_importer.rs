// ==========================================
// 设备维修管理 - 维修历史导入器
// ==========================================
// 职责: 从旧系统导出的 CSV 导入工单 / 执行记录, 供指标看板初始化
// 红线: 逐行校验不变量, 问题行记入拒绝清单, 不中止整个文件
// 红线: 导入后抬升编号序列, 新分配不得与已导入编号重号
// ==========================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::types::{Priority, WorkOrderStatus, WorkOrderType};
use crate::domain::work_order::{Execution, WorkOrder};
use crate::i18n::t_with_args;
use crate::importer::csv_parser::{CsvParser, RawRecord};
use crate::importer::error::ImportResult;
use crate::repository::{
    AuditLogRepository, DocumentSequenceRepository, ExecutionRepository, WorkOrderRepository,
};

/// 工单文件必需列
pub const WORK_ORDER_COLUMNS: &[&str] = &[
    "code",
    "order_type",
    "equipment_tag",
    "status",
    "requested_at",
];

/// 执行记录文件必需列
pub const EXECUTION_COLUMNS: &[&str] = &["work_order_code", "started_at", "finished_at"];

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowReject {
    pub line: u64,
    pub reason: String,
}

/// 单个文件的导入报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub source: String,
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RowReject>,
}

impl ImportReport {
    fn new(source: &str, total_rows: usize) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            total_rows,
            imported: 0,
            rejected: Vec::new(),
        }
    }

    fn reject(&mut self, line: u64, reason: impl Into<String>) {
        self.rejected.push(RowReject {
            line,
            reason: reason.into(),
        });
    }
}

// ==========================================
// HistoryImporter - 维修历史导入器
// ==========================================
pub struct HistoryImporter {
    work_order_repo: Arc<WorkOrderRepository>,
    execution_repo: Arc<ExecutionRepository>,
    sequence_repo: Arc<DocumentSequenceRepository>,
    audit_repo: Arc<AuditLogRepository>,
}

impl HistoryImporter {
    pub fn new(
        work_order_repo: Arc<WorkOrderRepository>,
        execution_repo: Arc<ExecutionRepository>,
        sequence_repo: Arc<DocumentSequenceRepository>,
        audit_repo: Arc<AuditLogRepository>,
    ) -> Self {
        Self {
            work_order_repo,
            execution_repo,
            sequence_repo,
            audit_repo,
        }
    }

    /// 导入工单 CSV
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn import_work_orders(&self, path: &Path, operator: &str) -> ImportResult<ImportReport> {
        let records = CsvParser::parse_file(path)?;
        CsvParser::require_columns(&records, WORK_ORDER_COLUMNS)?;
        self.import_work_order_records(&records, &path.display().to_string(), operator)
    }

    /// 导入执行记录 CSV (所属工单须已存在)
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn import_executions(&self, path: &Path, operator: &str) -> ImportResult<ImportReport> {
        let records = CsvParser::parse_file(path)?;
        CsvParser::require_columns(&records, EXECUTION_COLUMNS)?;
        self.import_execution_records(&records, &path.display().to_string(), operator)
    }

    fn import_work_order_records(
        &self,
        records: &[RawRecord],
        source: &str,
        operator: &str,
    ) -> ImportResult<ImportReport> {
        let mut report = ImportReport::new(source, records.len());
        // doc_type → (前缀, 最大编号)
        let mut highest: HashMap<String, (String, i64)> = HashMap::new();

        for record in records {
            let work_order = match map_work_order(record) {
                Ok(wo) => wo,
                Err(reason) => {
                    report.reject(record.line, reason);
                    continue;
                }
            };

            // 重复导入同一编号视为行错误 (存储层允许重置后的编号复用)
            if self.work_order_repo.find_by_code(&work_order.code)?.is_some() {
                report.reject(record.line, format!("工单编号{}已存在", work_order.code));
                continue;
            }

            match self.work_order_repo.insert(&work_order) {
                Ok(_) => {
                    report.imported += 1;
                    if let Some((prefix, number)) = split_code(&work_order.code) {
                        let entry = highest
                            .entry(work_order.order_type.as_str().to_string())
                            .or_insert_with(|| (prefix.to_string(), 0));
                        entry.1 = entry.1.max(number);
                    }
                }
                Err(e) if e.is_row_level() => report.reject(record.line, e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        for (doc_type, (prefix, number)) in &highest {
            let last = self.sequence_repo.raise_to(doc_type, prefix, *number)?;
            tracing::debug!(doc_type = %doc_type, last_number = last, "导入后编号序列已抬升");
        }

        self.finish(&report, operator)?;
        Ok(report)
    }

    fn import_execution_records(
        &self,
        records: &[RawRecord],
        source: &str,
        operator: &str,
    ) -> ImportResult<ImportReport> {
        let mut report = ImportReport::new(source, records.len());
        let mut work_order_ids: HashMap<String, Option<String>> = HashMap::new();

        for record in records {
            let code = record.get("work_order_code").unwrap_or_default().to_string();
            if !work_order_ids.contains_key(&code) {
                let id = self
                    .work_order_repo
                    .find_by_code(&code)?
                    .map(|wo| wo.work_order_id);
                work_order_ids.insert(code.clone(), id);
            }
            let Some(Some(work_order_id)) = work_order_ids.get(&code) else {
                report.reject(record.line, format!("工单{}不存在", code));
                continue;
            };

            let execution = match map_execution(record, work_order_id) {
                Ok(exec) => exec,
                Err(reason) => {
                    report.reject(record.line, reason);
                    continue;
                }
            };

            match self.execution_repo.insert(&execution) {
                Ok(_) => report.imported += 1,
                Err(e) if e.is_row_level() => report.reject(record.line, e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        self.finish(&report, operator)?;
        Ok(report)
    }

    /// 写入审计并输出汇总日志
    fn finish(&self, report: &ImportReport, operator: &str) -> ImportResult<()> {
        let imported = report.imported.to_string();
        let rejected = report.rejected.len().to_string();
        let audit = AuditLog::new(
            operator,
            AuditAction::HistoryImported,
            t_with_args(
                "audit.history_imported",
                &[
                    ("source", report.source.as_str()),
                    ("imported", imported.as_str()),
                    ("rejected", rejected.as_str()),
                ],
            ),
            Utc::now().naive_utc(),
        )
        .with_payload(report);
        self.audit_repo.insert(&audit)?;

        if report.rejected.is_empty() {
            tracing::info!(
                batch_id = %report.batch_id,
                imported = report.imported,
                "维修历史导入完成"
            );
        } else {
            tracing::warn!(
                batch_id = %report.batch_id,
                imported = report.imported,
                rejected = report.rejected.len(),
                "维修历史导入完成, 存在被拒绝的行"
            );
        }
        Ok(())
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_work_order(record: &RawRecord) -> Result<WorkOrder, String> {
    let code = required(record, "code")?;
    let order_type_raw = required(record, "order_type")?;
    let order_type = WorkOrderType::from_db_str(order_type_raw)
        .ok_or_else(|| format!("未知工单类型: {}", order_type_raw))?;
    let status_raw = required(record, "status")?;
    let status = WorkOrderStatus::from_db_str(status_raw)
        .ok_or_else(|| format!("未知工单状态: {}", status_raw))?;

    let requested_at = parse_timestamp("requested_at", required(record, "requested_at")?)?;
    let closed_at = record
        .get("closed_at")
        .map(|raw| parse_timestamp("closed_at", raw))
        .transpose()?;

    let mut work_order = WorkOrder::new_open(
        code.to_string(),
        split_code(code).map(|(_, n)| n).unwrap_or(0),
        order_type,
        required(record, "equipment_tag")?.to_string(),
        record.get("title").unwrap_or_default().to_string(),
        record.get("requester").unwrap_or("IMPORT").to_string(),
        requested_at,
    );
    work_order.status = status;
    work_order.closed_at = closed_at;
    work_order.priority = record
        .get("priority")
        .map(Priority::from_db_str)
        .unwrap_or(Priority::Medium);
    work_order.estimated_hours = optional_amount(record, "estimated_hours")?;
    work_order.actual_hours = optional_amount(record, "actual_hours")?;
    work_order.estimated_cost = optional_amount(record, "estimated_cost")?;
    work_order.actual_cost = optional_amount(record, "actual_cost")?;

    if let Some(closed) = closed_at {
        if closed < requested_at {
            return Err(format!("closed_at {} 早于 requested_at {}", closed, requested_at));
        }
    }
    work_order.validate().map_err(|e| e.to_string())?;
    Ok(work_order)
}

fn map_execution(record: &RawRecord, work_order_id: &str) -> Result<Execution, String> {
    let started_at = parse_timestamp("started_at", required(record, "started_at")?)?;
    let finished_at = parse_timestamp("finished_at", required(record, "finished_at")?)?;

    let execution = Execution::new(
        work_order_id.to_string(),
        started_at,
        finished_at,
        optional_amount(record, "labor_cost")?.unwrap_or(0.0),
        optional_amount(record, "material_cost")?.unwrap_or(0.0),
        optional_amount(record, "third_party_cost")?.unwrap_or(0.0),
    )
    .map_err(|e| e.to_string())?;

    Ok(match record.get("notes") {
        Some(notes) => execution.with_notes(notes),
        None => execution,
    })
}

fn required<'a>(record: &'a RawRecord, column: &str) -> Result<&'a str, String> {
    record
        .get(column)
        .ok_or_else(|| format!("字段{}为空", column))
}

fn optional_amount(record: &RawRecord, column: &str) -> Result<Option<f64>, String> {
    match record.get(column) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
            _ => Err(format!("字段{}数值非法: {}", column, raw)),
        },
    }
}

/// 支持 `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD` (零点)
fn parse_timestamp(column: &str, raw: &str) -> Result<NaiveDateTime, String> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("字段{}时间格式错误: {}", column, raw))
}

/// 拆分单据编号为 (前缀, 序号), 如 COR-000042 → ("COR", 42)
fn split_code(code: &str) -> Option<(&str, i64)> {
    let (prefix, digits) = code.rsplit_once('-')?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| (prefix, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit_log::AuditAction;
    use rusqlite::Connection;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    struct Fixture {
        importer: HistoryImporter,
        work_order_repo: Arc<WorkOrderRepository>,
        execution_repo: Arc<ExecutionRepository>,
        sequence_repo: Arc<DocumentSequenceRepository>,
        audit_repo: Arc<AuditLogRepository>,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let work_order_repo = Arc::new(WorkOrderRepository::new(conn.clone()));
        let execution_repo = Arc::new(ExecutionRepository::new(conn.clone()));
        let sequence_repo = Arc::new(DocumentSequenceRepository::new(conn.clone()));
        let audit_repo = Arc::new(AuditLogRepository::new(conn));
        Fixture {
            importer: HistoryImporter::new(
                work_order_repo.clone(),
                execution_repo.clone(),
                sequence_repo.clone(),
                audit_repo.clone(),
            ),
            work_order_repo,
            execution_repo,
            sequence_repo,
            audit_repo,
        }
    }

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_split_code() {
        assert_eq!(split_code("COR-000042"), Some(("COR", 42)));
        assert_eq!(split_code("OT-2024-000007"), Some(("OT-2024", 7)));
        assert_eq!(split_code("LEGACY42"), None);
        assert_eq!(split_code("COR-"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("t", "2025-03-01 08:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2025-03-01T08:00:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("t", "2025-03-01").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("t", "03/01/2025").is_err());
    }

    #[test]
    fn test_import_rejects_bad_rows_without_aborting() {
        let fx = setup();
        let file = csv_file(&[
            "code,order_type,equipment_tag,title,status,requester,requested_at,closed_at,estimated_hours",
            "COR-000010,CORRECTIVE,P-101,机封泄漏,CLOSED,alice,2025-01-05 08:00:00,2025-01-05 12:00:00,4",
            "COR-000011,CORRECTIVE,P-101,轴承异响,CLOSED,alice,2025-01-20 08:00:00,,2",
            "COR-000012,UNKNOWN,P-101,?,OPEN,alice,2025-01-21 08:00:00,,",
            "COR-000013,CORRECTIVE,P-102,振动超标,OPEN,bob,2025-02-01,,8",
            "COR-000010,CORRECTIVE,P-101,重复,OPEN,alice,2025-02-02 08:00:00,,",
        ]);

        let report = fx
            .importer
            .import_work_orders(file.path(), "admin")
            .unwrap();
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.imported, 2);
        let lines: Vec<u64> = report.rejected.iter().map(|r| r.line).collect();
        // 第 3 行: CLOSED 缺少 closed_at; 第 4 行: 未知类型; 第 6 行: 编号重复
        assert_eq!(lines, vec![3, 4, 6]);

        let imported = fx.work_order_repo.find_by_code("COR-000013").unwrap().unwrap();
        assert_eq!(imported.number, 13);
        assert_eq!(imported.estimated_hours, Some(8.0));

        // 序列抬升到已导入的最大编号
        assert_eq!(
            fx.sequence_repo.find("CORRECTIVE").unwrap().unwrap().last_number,
            13
        );
        assert_eq!(
            fx.audit_repo
                .list_by_action(AuditAction::HistoryImported, 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_import_executions_requires_existing_work_order() {
        let fx = setup();
        let orders = csv_file(&[
            "code,order_type,equipment_tag,status,requested_at",
            "COR-000001,CORRECTIVE,P-101,OPEN,2025-01-05 08:00:00",
        ]);
        fx.importer.import_work_orders(orders.path(), "admin").unwrap();

        let executions = csv_file(&[
            "work_order_code,started_at,finished_at,labor_cost,material_cost,notes",
            "COR-000001,2025-01-05 09:00:00,2025-01-05 11:30:00,100,50,更换机封",
            "COR-000099,2025-01-05 09:00:00,2025-01-05 11:30:00,,,",
            "COR-000001,2025-01-06 11:00:00,2025-01-06 09:00:00,,,",
        ]);
        let report = fx
            .importer
            .import_executions(executions.path(), "admin")
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.rejected.len(), 2);

        let wo = fx.work_order_repo.find_by_code("COR-000001").unwrap().unwrap();
        let stored = fx.execution_repo.list_by_work_order(&wo.work_order_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].duration_hours(), 2.5);
        assert_eq!(stored[0].total_cost(), 150.0);
        assert_eq!(stored[0].notes.as_deref(), Some("更换机封"));
    }

    #[test]
    fn test_missing_required_column_aborts_file() {
        let fx = setup();
        let file = csv_file(&["code,equipment_tag", "COR-000001,P-101"]);
        assert!(fx.importer.import_work_orders(file.path(), "admin").is_err());
        assert_eq!(fx.work_order_repo.count().unwrap(), 0);
    }
}
