// ==========================================
// 设备维修管理 - 领域类型定义
// ==========================================
// 工单类型 / 工单状态 / 优先级 / 保养计划类别 / 操作员角色
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单类型 (Work Order Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderType {
    Corrective,  // 纠正性维修 (故障)
    Preventive,  // 预防性维修
    Predictive,  // 预测性维修
    Inspection,  // 点检
    Improvement, // 改善
    Lubrication, // 润滑
}

impl WorkOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderType::Corrective => "CORRECTIVE",
            WorkOrderType::Preventive => "PREVENTIVE",
            WorkOrderType::Predictive => "PREDICTIVE",
            WorkOrderType::Inspection => "INSPECTION",
            WorkOrderType::Improvement => "IMPROVEMENT",
            WorkOrderType::Lubrication => "LUBRICATION",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CORRECTIVE" => Some(WorkOrderType::Corrective),
            "PREVENTIVE" => Some(WorkOrderType::Preventive),
            "PREDICTIVE" => Some(WorkOrderType::Predictive),
            "INSPECTION" => Some(WorkOrderType::Inspection),
            "IMPROVEMENT" => Some(WorkOrderType::Improvement),
            "LUBRICATION" => Some(WorkOrderType::Lubrication),
            _ => None,
        }
    }
}

impl fmt::Display for WorkOrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 工单状态 (Work Order Status)
// ==========================================
// 红线: closed_at 有值 当且仅当 status = CLOSED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Open,             // 待处理
    InProgress,       // 执行中
    AwaitingMaterial, // 待料
    AwaitingApproval, // 待审批
    Closed,           // 已关闭
    Cancelled,        // 已取消
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "OPEN",
            WorkOrderStatus::InProgress => "IN_PROGRESS",
            WorkOrderStatus::AwaitingMaterial => "AWAITING_MATERIAL",
            WorkOrderStatus::AwaitingApproval => "AWAITING_APPROVAL",
            WorkOrderStatus::Closed => "CLOSED",
            WorkOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(WorkOrderStatus::Open),
            "IN_PROGRESS" => Some(WorkOrderStatus::InProgress),
            "AWAITING_MATERIAL" => Some(WorkOrderStatus::AwaitingMaterial),
            "AWAITING_APPROVAL" => Some(WorkOrderStatus::AwaitingApproval),
            "CLOSED" => Some(WorkOrderStatus::Closed),
            "CANCELLED" => Some(WorkOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 是否计入积压 (未关闭且未取消)
    pub fn is_backlog(&self) -> bool {
        !matches!(self, WorkOrderStatus::Closed | WorkOrderStatus::Cancelled)
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 优先级 (Priority)
// ==========================================
// 顺序: Low < Medium < High < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    /// 从字符串解析 (未知值回退为 MEDIUM)
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Priority::Low,
            "HIGH" => Priority::High,
            "URGENT" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 保养计划类别 (Plan Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanKind {
    Preventive,  // 预防性保养计划
    Lubrication, // 润滑计划
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Preventive => "PREVENTIVE",
            PlanKind::Lubrication => "LUBRICATION",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PREVENTIVE" => Some(PlanKind::Preventive),
            "LUBRICATION" => Some(PlanKind::Lubrication),
            _ => None,
        }
    }

    /// 计划生成的工单类型 (同时作为单据编号序列的类型键)
    pub fn work_order_type(&self) -> WorkOrderType {
        match self {
            PlanKind::Preventive => WorkOrderType::Preventive,
            PlanKind::Lubrication => WorkOrderType::Lubrication,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 操作员角色 (Operator Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorRole {
    Technician, // 技术员
    Planner,    // 计划员
    Admin,      // 管理员 (可执行序列重置等特权操作)
}

impl OperatorRole {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TECHNICIAN" => Some(OperatorRole::Technician),
            "PLANNER" => Some(OperatorRole::Planner),
            "ADMIN" => Some(OperatorRole::Admin),
            _ => None,
        }
    }
}

/// 操作员 (调用方身份, 由外部认证层提供)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    pub role: OperatorRole,
}

impl Operator {
    pub fn new(name: impl Into<String>, role: OperatorRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == OperatorRole::Admin
    }
}

/// 系统自动操作的执行人标识
pub const SYSTEM_ACTOR: &str = "SYSTEM";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_backlog() {
        assert!(WorkOrderStatus::Open.is_backlog());
        assert!(WorkOrderStatus::AwaitingMaterial.is_backlog());
        assert!(!WorkOrderStatus::Closed.is_backlog());
        assert!(!WorkOrderStatus::Cancelled.is_backlog());
    }

    #[test]
    fn test_db_str_parsing() {
        assert_eq!(
            WorkOrderType::from_db_str("corrective"),
            Some(WorkOrderType::Corrective)
        );
        assert_eq!(WorkOrderType::from_db_str("UNKNOWN"), None);
        assert_eq!(
            WorkOrderStatus::from_db_str("IN_PROGRESS"),
            Some(WorkOrderStatus::InProgress)
        );
        assert_eq!(Priority::from_db_str("???"), Priority::Medium);
    }

    #[test]
    fn test_plan_kind_maps_to_work_order_type() {
        assert_eq!(
            PlanKind::Lubrication.work_order_type(),
            WorkOrderType::Lubrication
        );
        assert_eq!(
            PlanKind::Preventive.work_order_type().as_str(),
            "PREVENTIVE"
        );
    }
}
