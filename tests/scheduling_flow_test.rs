// ==========================================
// 保养工单生成端到端测试
// ==========================================
// 职责: 验证生成轮次的幂等性、到期推进与多连接并发安全
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod scheduling_flow_test {
    use cmms_reliability::domain::types::{Operator, OperatorRole};
    use cmms_reliability::domain::{NextDue, Period};
    use cmms_reliability::engine::{GenerationSummary, SchedulingDriver};

    use crate::test_helpers::{create_test_db, open_state, time_plan, ts};

    async fn run(state: &cmms_reliability::app::AppState, now: &str) -> GenerationSummary {
        state
            .scheduling_api
            .run_generation(Some(ts(now)))
            .await
            .unwrap()
    }

    // ==========================================
    // 基本生成
    // ==========================================

    #[tokio::test]
    async fn test_inactive_plan_never_generates() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let mut plan = time_plan("PM-OFF", "P-101", Period::days(7), NextDue::DueImmediately);
        plan.active = false;
        state.repositories.plan_repo.insert(&plan).unwrap();

        let summary = run(&state, "2025-03-01 06:00:00").await;
        assert_eq!(summary.created_count, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(state.repositories.work_order_repo.count().unwrap(), 0);

        let stored = state.repositories.plan_repo.find_by_code("PM-OFF").unwrap().unwrap();
        assert_eq!(stored.next_due, NextDue::DueImmediately);
    }

    #[tokio::test]
    async fn test_due_plan_generates_once_and_rerun_is_idempotent() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let plan = time_plan(
            "PM-EOM",
            "P-101",
            Period::months(1),
            NextDue::Scheduled(ts("2025-01-31 08:00:00")),
        );
        state.repositories.plan_repo.insert(&plan).unwrap();

        let first = run(&state, "2025-01-31 08:00:00").await;
        assert_eq!(first.created_count, 1);
        let generated = &first.created[0];
        assert_eq!(generated.code, "PRV-000001");
        assert_eq!(generated.due_at, ts("2025-01-31 08:00:00"));
        // 月末锚点: 1 月 31 日 + 1 个月 = 2 月最后一天
        assert_eq!(generated.next_due, ts("2025-02-28 08:00:00"));

        let again = run(&state, "2025-01-31 08:00:00").await;
        assert_eq!(again.created_count, 0);
        assert_eq!(state.repositories.work_order_repo.count().unwrap(), 1);

        let stored = state.repositories.plan_repo.find_by_code("PM-EOM").unwrap().unwrap();
        assert_eq!(stored.next_due, NextDue::Scheduled(ts("2025-02-28 08:00:00")));
        assert_eq!(stored.last_execution, Some(ts("2025-01-31 08:00:00")));

        let work_orders = state
            .repositories
            .work_order_repo
            .list_by_plan(&plan.plan_id)
            .unwrap();
        assert_eq!(work_orders.len(), 1);
        assert_eq!(work_orders[0].estimated_hours, Some(2.0));
    }

    #[tokio::test]
    async fn test_overdue_plan_skips_missed_cycles() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let plan = time_plan(
            "PM-WEEK",
            "C-201",
            Period::weeks(1),
            NextDue::Scheduled(ts("2025-01-01 00:00:00")),
        );
        state.repositories.plan_repo.insert(&plan).unwrap();

        let summary = run(&state, "2025-02-01 00:00:00").await;
        assert_eq!(summary.created_count, 1);
        let generated = &summary.created[0];
        assert_eq!(generated.due_at, ts("2025-01-01 00:00:00"));
        assert_eq!(generated.next_due, ts("2025-02-05 00:00:00"));
        assert_eq!(generated.skipped_cycles, 4);
    }

    #[tokio::test]
    async fn test_generation_is_audited() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let plan = time_plan("PM-AUD", "P-301", Period::days(30), NextDue::DueImmediately);
        state.repositories.plan_repo.insert(&plan).unwrap();

        let summary = run(&state, "2025-05-01 06:00:00").await;
        assert_eq!(summary.created_count, 1);

        let logs = state
            .repositories
            .audit_repo
            .list_by_action(cmms_reliability::AuditAction::WorkOrderGenerated, 10)
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actor, cmms_reliability::SYSTEM_ACTOR);
        assert_eq!(logs[0].tag.as_deref(), Some("P-301"));
    }

    #[tokio::test]
    async fn test_generation_continues_after_sequence_reset() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let plan_a = time_plan("PM-A", "P-101", Period::weeks(1), NextDue::DueImmediately);
        state.repositories.plan_repo.insert(&plan_a).unwrap();
        let first = run(&state, "2025-03-01 00:00:00").await;
        assert_eq!(first.created[0].code, "PRV-000001");

        let admin = Operator::new("alice", OperatorRole::Admin);
        state.sequence_api.reset("PREVENTIVE", &admin).unwrap();

        // 归零后复用已签发的编号, 生成不受影响
        let plan_b = time_plan("PM-B", "P-102", Period::weeks(1), NextDue::DueImmediately);
        state.repositories.plan_repo.insert(&plan_b).unwrap();
        let second = run(&state, "2025-03-02 00:00:00").await;
        assert_eq!(second.created_count, 1);
        assert!(second.errors.is_empty());
        assert_eq!(second.created[0].code, "PRV-000001");

        let plan_c = time_plan("PM-C", "P-103", Period::weeks(1), NextDue::DueImmediately);
        state.repositories.plan_repo.insert(&plan_c).unwrap();
        let third = run(&state, "2025-03-03 00:00:00").await;
        assert_eq!(third.created_count, 1);
        assert_eq!(third.created[0].code, "PRV-000002");

        // 同号工单按最后写入的一条查询
        let latest = state
            .repositories
            .work_order_repo
            .find_by_code("PRV-000001")
            .unwrap()
            .unwrap();
        assert_eq!(latest.plan_id.as_deref(), Some(plan_b.plan_id.as_str()));
        assert_eq!(state.repositories.work_order_repo.count().unwrap(), 3);
    }

    // ==========================================
    // 并发
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_passes_create_exactly_one_work_order() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let setup = open_state(&db_path);

        let plan = time_plan(
            "PM-RACE",
            "K-401",
            Period::days(7),
            NextDue::Scheduled(ts("2025-03-01 00:00:00")),
        );
        setup.repositories.plan_repo.insert(&plan).unwrap();

        // 两个独立连接, 模拟两个进程同时触发
        let a = open_state(&db_path);
        let b = open_state(&db_path);
        let now = Some(ts("2025-03-02 00:00:00"));

        let (ra, rb) = futures::join!(
            a.scheduling_api.run_generation(now),
            b.scheduling_api.run_generation(now)
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(ra.created_count + rb.created_count, 1);
        assert!(ra.errors.is_empty() && rb.errors.is_empty());

        let work_orders = setup
            .repositories
            .work_order_repo
            .list_by_plan(&plan.plan_id)
            .unwrap();
        assert_eq!(work_orders.len(), 1);
        assert_eq!(work_orders[0].due_at, Some(ts("2025-03-01 00:00:00")));

        let stored = setup.repositories.plan_repo.find_by_code("PM-RACE").unwrap().unwrap();
        assert_eq!(stored.next_due, NextDue::Scheduled(ts("2025-03-08 00:00:00")));
    }

    #[tokio::test]
    async fn test_driver_can_be_built_from_ports() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = open_state(&db_path);

        let driver = SchedulingDriver::new(
            state.repositories.plan_repo.clone(),
            state.repositories.audit_repo.clone(),
            state.config_manager.clone(),
        );
        let summary = driver.run_pass(Some(ts("2025-03-01 00:00:00"))).await.unwrap();
        assert_eq!(summary.candidate_count, 0);
    }
}
