// ==========================================
// 设备维修管理 - 单据编号序列 API
// ==========================================
// 职责: 编号分配 / 查询 / 归零 (特权)
// 红线: 归零仅限管理员, 每次归零写审计 + warn 日志
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ReliabilityConfigReader;
use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::document_sequence::{
    normalize_doc_type, DocumentSequence, SequenceAllocation,
};
use crate::domain::types::Operator;
use crate::i18n::t_with_args;
use crate::repository::DocumentSequenceRepository;

/// 归零结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResetResult {
    pub doc_type: String,
    pub previous_number: i64,
    pub operator: String,
}

// ==========================================
// SequenceApi - 单据编号序列 API
// ==========================================
pub struct SequenceApi {
    sequence_repo: Arc<DocumentSequenceRepository>,
    config: Arc<dyn ReliabilityConfigReader>,
}

impl SequenceApi {
    pub fn new(
        sequence_repo: Arc<DocumentSequenceRepository>,
        config: Arc<dyn ReliabilityConfigReader>,
    ) -> Self {
        Self {
            sequence_repo,
            config,
        }
    }

    /// 分配下一个编号 (前缀取配置覆写或默认前缀)
    pub async fn allocate(&self, doc_type: &str) -> ApiResult<SequenceAllocation> {
        let doc_type = require_doc_type(doc_type)?;
        let prefix = self
            .config
            .get_sequence_prefix(&doc_type)
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {}", e)))?;

        let allocation = self.sequence_repo.allocate(&doc_type, &prefix)?;
        tracing::debug!(
            doc_type = %allocation.doc_type,
            number = allocation.number,
            "单据编号已分配"
        );
        Ok(allocation)
    }

    /// 查询单个类型的当前状态
    pub fn current(&self, doc_type: &str) -> ApiResult<DocumentSequence> {
        let doc_type = require_doc_type(doc_type)?;
        self.sequence_repo
            .find(&doc_type)?
            .ok_or_else(|| ApiError::NotFound(format!("单据类型{}尚无编号序列", doc_type)))
    }

    /// 查询全部序列
    pub fn list(&self) -> ApiResult<Vec<DocumentSequence>> {
        Ok(self.sequence_repo.list_all()?)
    }

    /// 归零序列 (下一次分配重新从 1 开始)
    ///
    /// # 错误
    /// - `PermissionDenied`: 操作员不是管理员
    /// - `NotFound`: 类型不存在
    pub fn reset(&self, doc_type: &str, operator: &Operator) -> ApiResult<SequenceResetResult> {
        let doc_type = require_doc_type(doc_type)?;

        if !operator.is_admin() {
            tracing::warn!(
                doc_type = %doc_type,
                operator = %operator.name,
                "非管理员尝试归零单据编号序列, 已拒绝"
            );
            return Err(ApiError::PermissionDenied(format!(
                "归零单据编号序列{}需要管理员权限",
                doc_type
            )));
        }

        let now = Utc::now().naive_utc();
        let previous = self.sequence_repo.reset_audited(&doc_type, |previous| {
            let previous_str = previous.to_string();
            AuditLog::new(
                operator.name.clone(),
                AuditAction::SequenceReset,
                t_with_args(
                    "audit.sequence_reset",
                    &[("doc_type", doc_type.as_str()), ("previous", previous_str.as_str())],
                ),
                now,
            )
            .with_payload(&serde_json::json!({
                "doc_type": doc_type,
                "previous_number": previous,
            }))
        })?;

        tracing::warn!(
            doc_type = %doc_type,
            previous_number = previous,
            operator = %operator.name,
            "单据编号序列已归零"
        );

        Ok(SequenceResetResult {
            doc_type,
            previous_number: previous,
            operator: operator.name.clone(),
        })
    }
}

fn require_doc_type(doc_type: &str) -> ApiResult<String> {
    let key = normalize_doc_type(doc_type);
    if key.is_empty() {
        return Err(ApiError::InvalidInput("单据类型不能为空".to_string()));
    }
    Ok(key)
}
