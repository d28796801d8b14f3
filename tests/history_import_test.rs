// ==========================================
// 历史导入端到端测试
// ==========================================
// 职责: 导入旧系统 CSV 后, 新编号不与已导入编号冲突, 指标可直接计算
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod history_import_test {
    use std::io::Write;

    use cmms_reliability::api::CreateWorkOrderRequest;
    use cmms_reliability::domain::types::WorkOrderType;
    use cmms_reliability::domain::HistoryFilter;
    use cmms_reliability::AuditAction;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, open_state, ts};

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_imported_history_feeds_indicators_and_numbering() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let orders = csv_file(&[
            "code,order_type,equipment_tag,status,requester,requested_at,closed_at",
            "COR-000101,CORRECTIVE,P-101,CLOSED,legacy,2024-12-01 00:00:00,2024-12-01 06:00:00",
            "COR-000102,CORRECTIVE,P-101,CLOSED,legacy,2024-12-11 00:00:00,2024-12-11 06:00:00",
        ]);
        let executions = csv_file(&[
            "work_order_code,started_at,finished_at",
            "COR-000101,2024-12-01 01:00:00,2024-12-01 03:00:00",
            "COR-000102,2024-12-11 01:00:00,2024-12-11 05:00:00",
        ]);

        let report = state
            .history_importer
            .import_work_orders(orders.path(), "migration")
            .unwrap();
        assert_eq!(report.imported, 2);
        assert!(report.rejected.is_empty());
        let report = state
            .history_importer
            .import_executions(executions.path(), "migration")
            .unwrap();
        assert_eq!(report.imported, 2);

        // 指标: 故障间隔 240 小时, 平均修复 3 小时
        let snapshot = state
            .indicator_api
            .snapshot(HistoryFilter::for_tag("P-101"), Some(ts("2025-01-01 00:00:00")))
            .await
            .unwrap();
        assert!((snapshot.mtbf_hours - 240.0).abs() < 1e-9);
        assert!((snapshot.mttr_hours - 3.0).abs() < 1e-9);

        // 新建工单编号接在已导入编号之后
        let created = state
            .work_order_api
            .create(CreateWorkOrderRequest {
                order_type: WorkOrderType::Corrective,
                equipment_tag: "P-101".to_string(),
                title: "密封泄漏".to_string(),
                requester: "operator".to_string(),
                priority: None,
                estimated_hours: Some(4.0),
                estimated_cost: None,
                requested_at: Some(ts("2025-01-02 08:00:00")),
            })
            .await
            .unwrap();
        assert_eq!(created.code, "COR-000103");

        let logs = state
            .repositories
            .audit_repo
            .list_by_action(AuditAction::HistoryImported, 10)
            .unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let result = state
            .history_importer
            .import_work_orders(std::path::Path::new("/nonexistent/orders.csv"), "migration");
        assert!(result.is_err());
    }
}
