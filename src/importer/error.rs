// ==========================================
// 订单履约后台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("表格无数据行: {0}")]
    EmptySheet(String),

    // ===== 表头/映射错误 =====
    #[error("未找到表头行（扫描前 {scanned} 行）")]
    HeaderRowNotFound { scanned: usize },

    #[error("缺少必需列: {0}")]
    MissingRequiredColumn(String),

    // ===== 数据库错误 =====
    #[error("数据库写入失败: {0}")]
    DatabaseError(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

impl From<crate::repository::RepositoryError> for ImportError {
    fn from(err: crate::repository::RepositoryError) -> Self {
        ImportError::DatabaseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
