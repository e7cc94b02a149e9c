// ==========================================
// 订单履约后台 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 唯一约束 / 外键 / 忙锁 需要从 rusqlite 错误中区分出来，
//       批次编号重试依赖这个分类
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 并发控制错误 =====
    #[error("重试次数耗尽: operation={operation}, attempts={attempts}, last_error={last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否可通过重试解决（编号冲突 / 忙锁）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::UniqueConstraintViolation(_) | RepositoryError::DatabaseBusy(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
            {
                RepositoryError::DatabaseBusy(err.to_string())
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
