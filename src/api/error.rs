// ==========================================
// 订单履约后台 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/导入错误为调用方可区分的类别
// 类别: 校验 / 未找到（不泄露跨租户存在性）/ 瞬时失败（可重试）/ 存储失败
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入与业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    /// 不存在，或不属于当前租户（两者不区分）
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 冲突重试耗尽或数据库忙，调用方可稍后重试
    #[error("暂时无法完成，请稍后重试: {0}")]
    TransientFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 调用方是否可以原样重试
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::TransientFailure(_))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }

            // 并发控制错误
            RepositoryError::RetryExhausted {
                operation,
                attempts,
                last_error,
            } => ApiError::TransientFailure(format!(
                "{} 重试 {} 次仍冲突: {}",
                operation, attempts, last_error
            )),
            RepositoryError::DatabaseBusy(msg) => ApiError::TransientFailure(msg),

            // 数据库错误
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件{}不存在", path)),
            ImportError::UnsupportedFormat(_) | ImportError::MissingRequiredColumn(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            ImportError::DatabaseError(msg) => ApiError::DatabaseError(msg),
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::InternalError(format!("后台任务失败: {}", err))
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
