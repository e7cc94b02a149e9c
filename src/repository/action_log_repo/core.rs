use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, tenant_id, action_type, action_ts, actor,
                target_ids, payload_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                log.tenant_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                serde_json::to_string(&log.target_ids)?,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }
}
