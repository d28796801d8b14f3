// ==========================================
// 设备维修管理 - CSV 解析
// ==========================================
// 输出: 每行一个 {表头 → 去空白后的值} 映射, 附带源文件行号
// 完全空白的行跳过
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 一行原始记录
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: u64, // 源文件行号 (表头为第 1 行)
    pub fields: HashMap<String, String>,
}

impl RawRecord {
    /// 取非空字段
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    pub fn parse_file(path: &Path) -> ImportResult<Vec<RawRecord>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        Self::parse_reader(file)
    }

    /// 解析任意来源的 CSV 内容
    pub fn parse_reader<R: Read>(source: R) -> ImportResult<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            // 短行缺失的列补空串, 多余的列忽略
            let fields: HashMap<String, String> = headers
                .iter()
                .enumerate()
                .map(|(idx, h)| {
                    let value = record.get(idx).unwrap_or("").trim().to_string();
                    (h.clone(), value)
                })
                .collect();

            if fields.values().all(|v| v.is_empty()) {
                continue;
            }
            records.push(RawRecord { line, fields });
        }

        Ok(records)
    }

    /// 校验必需列
    pub fn require_columns(records: &[RawRecord], columns: &[&str]) -> ImportResult<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        for column in columns {
            if !first.fields.contains_key(*column) {
                return Err(ImportError::MissingColumn((*column).to_string()));
            }
        }
        Ok(())
    }
}
