// ==========================================
// 设备维修管理 - 审计日志领域模型
// ==========================================
// 红线: 自动生成工单 / 序列重置 / 计划停用 必须留痕
// 审计日志只追加
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// AuditLog - 审计日志
// ==========================================
// 对齐: audit_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub audit_id: String,
    pub actor: String,               // 操作人 (自动生成为 SYSTEM)
    pub action: String,              // 操作类型 (存储为字符串)
    pub description: String,         // 描述 (本地化文本)
    pub tag: Option<String>,         // 设备位号
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub created_at: NaiveDateTime,
}

// ==========================================
// AuditAction - 审计操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    WorkOrderGenerated, // 排程自动生成工单
    WorkOrderClosed,    // 工单关闭
    PlanCreated,        // 新建保养计划
    PlanDeactivated,    // 保养计划停用
    SequenceReset,      // 单据编号序列重置 (特权操作)
    HistoryImported,    // 历史数据导入
}

impl AuditAction {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::WorkOrderGenerated => "WORK_ORDER_GENERATED",
            AuditAction::WorkOrderClosed => "WORK_ORDER_CLOSED",
            AuditAction::PlanCreated => "PLAN_CREATED",
            AuditAction::PlanDeactivated => "PLAN_DEACTIVATED",
            AuditAction::SequenceReset => "SEQUENCE_RESET",
            AuditAction::HistoryImported => "HISTORY_IMPORTED",
        }
    }

    /// 从字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "WORK_ORDER_GENERATED" => Some(AuditAction::WorkOrderGenerated),
            "WORK_ORDER_CLOSED" => Some(AuditAction::WorkOrderClosed),
            "PLAN_CREATED" => Some(AuditAction::PlanCreated),
            "PLAN_DEACTIVATED" => Some(AuditAction::PlanDeactivated),
            "SEQUENCE_RESET" => Some(AuditAction::SequenceReset),
            "HISTORY_IMPORTED" => Some(AuditAction::HistoryImported),
            _ => None,
        }
    }
}

impl AuditLog {
    /// 创建新的审计日志
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        description: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4().to_string(),
            actor: actor.into(),
            action: action.as_str().to_string(),
            description: description.into(),
            tag: None,
            payload_json: None,
            created_at,
        }
    }

    /// 设置设备位号
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 解析操作类型
    pub fn action_type(&self) -> Option<AuditAction> {
        AuditAction::from_db_str(&self.action)
    }
}
