use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::domain::types::TenantId;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, tenant_id, action_type, action_ts, actor, target_ids, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE action_id = ?",
            LOG_COLUMNS
        ))?;

        match stmt.query_row(params![action_id], map_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询租户最近的操作日志
    pub fn list_recent(&self, tenant_id: TenantId, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE tenant_id = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![tenant_id, limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询涉及某订单行的操作日志
    pub fn list_by_target(&self, tenant_id: TenantId, row_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM action_log
            WHERE tenant_id = ?
              AND EXISTS (SELECT 1 FROM json_each(action_log.target_ids) WHERE json_each.value = ?)
            ORDER BY action_ts DESC, rowid DESC
            "#,
            LOG_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![tenant_id, row_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 按操作类型统计租户日志条数
    pub fn count_by_type(&self, tenant_id: TenantId, action_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE tenant_id = ? AND action_type = ?",
            params![tenant_id, action_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_row(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let ts_raw: String = row.get(3)?;
    let action_ts = NaiveDateTime::parse_from_str(&ts_raw, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let target_raw: String = row.get(5)?;
    let target_ids: Vec<i64> = serde_json::from_str(&target_raw).unwrap_or_default();

    let payload_raw: Option<String> = row.get(6)?;
    let payload_json = payload_raw.and_then(|s| serde_json::from_str(&s).ok());

    Ok(ActionLog {
        action_id: row.get(0)?,
        tenant_id: row.get(1)?,
        action_type: row.get(2)?,
        action_ts,
        actor: row.get(4)?,
        target_ids,
        payload_json,
        detail: row.get(7)?,
    })
}
