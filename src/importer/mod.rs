// ==========================================
// 设备维修管理 - 导入层
// ==========================================
// 职责: 外部维修历史导入 (旧系统 CSV 导出)
// ==========================================

pub mod csv_parser;
pub mod error;
pub mod history_importer;

// 重导出核心类型
pub use csv_parser::{CsvParser, RawRecord};
pub use error::{ImportError, ImportResult};
pub use history_importer::{HistoryImporter, ImportReport, RowReject};
