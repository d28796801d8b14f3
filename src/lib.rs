// ==========================================
// 设备维修管理 - 可靠性指标与周期性保养排程 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 指标按需计算 (不落库) + 保养工单批量生成 (幂等, 并发安全)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装与命令入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Operator, OperatorRole, PlanKind, Priority, WorkOrderStatus, WorkOrderType, SYSTEM_ACTOR,
};

// 领域实体
pub use domain::{
    AuditAction, AuditLog, DocumentSequence, Execution, HistoryFilter, IndicatorPolicy,
    IndicatorSnapshot, IndicatorSnapshotView, MaintenancePlan, NextDue, Period, PeriodUnit,
    PlanTrigger, SequenceAllocation, WorkOrder,
};

// 引擎
pub use engine::{
    IndicatorAggregator, RecurrenceCalculator, ScheduleGenerator, SchedulingDriver,
};

// API
pub use api::{ApiError, IndicatorApi, PlanApi, SchedulingApi, SequenceApi, WorkOrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "设备维修管理 - 可靠性与排程引擎";
