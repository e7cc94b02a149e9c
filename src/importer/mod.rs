// ==========================================
// 订单履约后台 - 导入层
// ==========================================
// 职责: 外部订单表格 → 规范化订单行
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

// 模块声明
pub mod carrier;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod header_alias;
pub mod header_detector;
pub mod order_importer;

// 重导出核心类型
pub use carrier::{normalize_carrier, normalize_carrier_str};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{ColumnMapping, MappedRow, RowFieldMapper};
pub use file_parser::{CsvGridParser, ExcelGridParser, Grid, GridParser, UniversalGridParser};
pub use header_alias::{normalize_header, resolve_header};
pub use header_detector::{
    detect_by_alias_table, detect_by_required_headers, locate_column, HeaderDetection,
};
pub use order_importer::{OrderImportReport, OrderImporter};
