// ==========================================
// 设备维修管理 - 单据编号序列领域模型
// ==========================================
// 每种单据类型一行: prefix + last_number (单调递增计数器)
// 红线: 同一类型的两次分配不得得到相同编号
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 编号补零位数
pub const SEQUENCE_NUMBER_WIDTH: usize = 6;

// ==========================================
// DocumentSequence - 单据编号序列
// ==========================================
// 对齐: document_sequence 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSequence {
    pub doc_type: String,    // 单据类型 (分区键)
    pub prefix: String,      // 编号前缀
    pub last_number: i64,    // 最近一次分配的编号
    pub updated_at: NaiveDateTime,
}

// ==========================================
// SequenceAllocation - 一次分配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAllocation {
    pub doc_type: String,
    pub prefix: String,
    pub number: i64,
}

impl SequenceAllocation {
    /// 人类可读的单据编号 (如 PRV-000012)
    pub fn code(&self) -> String {
        format_document_code(&self.prefix, self.number)
    }
}

/// 格式化单据编号
pub fn format_document_code(prefix: &str, number: i64) -> String {
    format!(
        "{}-{:0width$}",
        prefix,
        number,
        width = SEQUENCE_NUMBER_WIDTH
    )
}

/// 单据类型的默认前缀 (可通过配置 sequence_prefix/<TYPE> 覆写)
pub fn default_prefix(doc_type: &str) -> String {
    match doc_type.trim().to_uppercase().as_str() {
        "PREVENTIVE" => "PRV".to_string(),
        "LUBRICATION" => "LUB".to_string(),
        "CORRECTIVE" => "COR".to_string(),
        "PREDICTIVE" => "PRD".to_string(),
        "INSPECTION" => "INS".to_string(),
        "IMPROVEMENT" => "IMP".to_string(),
        other => other.chars().take(3).collect(),
    }
}

/// 规范化单据类型键 (去空白 + 大写)
pub fn normalize_doc_type(doc_type: &str) -> String {
    doc_type.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_document_code() {
        assert_eq!(format_document_code("PRV", 12), "PRV-000012");
        assert_eq!(format_document_code("LUB", 1234567), "LUB-1234567");
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(default_prefix("preventive"), "PRV");
        assert_eq!(default_prefix("LUBRICATION"), "LUB");
        assert_eq!(default_prefix("PURCHASE"), "PUR");
    }

    #[test]
    fn test_allocation_code() {
        let alloc = SequenceAllocation {
            doc_type: "PREVENTIVE".to_string(),
            prefix: "PRV".to_string(),
            number: 7,
        };
        assert_eq!(alloc.code(), "PRV-000007");
    }
}
