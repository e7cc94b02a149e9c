// ==========================================
// 订单履约后台 - 发注批次数据仓储
// ==========================================
// 红线: 批次号 = 同 (tenant, vendor, batch_date) 下最大号 + 1，不复用、不重排
// 并发: BEGIN IMMEDIATE 串行化编号；唯一约束冲突 / 忙锁时整体重试
// 红线: 只挂接本租户且尚未批次化的行；一行也挂不上时不留下空批次
// ==========================================

use crate::domain::types::{RowId, TenantId};
use crate::domain::vendor::{BatchAssignment, OrderBatch};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_util::{build_id_in_sql, dedup_ids};
use chrono::{Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const BATCH_COLUMNS: &str = "id, tenant_id, purchase_vendor_id, batch_number, batch_date, created_at";

/// 重试退避基数（毫秒）
const RETRY_BACKOFF_MS: u64 = 15;

fn map_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderBatch> {
    Ok(OrderBatch {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        purchase_vendor_id: row.get(2)?,
        batch_number: row.get(3)?,
        batch_date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub struct OrderBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderBatchRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 批次分配
    // ==========================================

    /// 分配发注批次（带冲突重试）
    ///
    /// # 参数
    /// - vendor_id: 采购供应商（必须属于该租户）
    /// - row_ids: 待挂接的订单行
    /// - batch_date: 批次日期（本地日历日）
    /// - max_retries: 冲突后的最大重试次数
    ///
    /// # 返回
    /// - Ok(BatchAssignment): 新批次 + 实际挂接的行
    /// - Err(NotFound): 供应商不存在，或没有任何可挂接的行
    /// - Err(RetryExhausted): 冲突重试耗尽
    pub fn assign_batch(
        &self,
        tenant_id: TenantId,
        vendor_id: i64,
        row_ids: &[RowId],
        batch_date: NaiveDate,
        max_retries: u32,
    ) -> RepositoryResult<BatchAssignment> {
        let row_ids = dedup_ids(row_ids);
        if row_ids.is_empty() {
            return Err(RepositoryError::ValidationError(
                "订单行 id 列表不能为空".to_string(),
            ));
        }

        let mut attempt: u32 = 0;
        loop {
            match self.try_assign(tenant_id, vendor_id, &row_ids, batch_date) {
                Ok((batch, linked_row_ids)) => {
                    info!(
                        tenant_id,
                        vendor_id,
                        batch_number = batch.batch_number,
                        batch_date = %batch.batch_date,
                        linked = linked_row_ids.len(),
                        retries = attempt,
                        "发注批次已分配"
                    );
                    return Ok(BatchAssignment {
                        batch,
                        linked_row_ids,
                        retries: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        tenant_id,
                        vendor_id,
                        attempt,
                        error = %e,
                        "批次编号冲突，重试"
                    );
                    std::thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64));
                }
                Err(e) if e.is_retryable() => {
                    return Err(RepositoryError::RetryExhausted {
                        operation: "assign_batch".to_string(),
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 单次分配尝试（一个 IMMEDIATE 事务）
    fn try_assign(
        &self,
        tenant_id: TenantId,
        vendor_id: i64,
        row_ids: &[RowId],
        batch_date: NaiveDate,
    ) -> RepositoryResult<(OrderBatch, Vec<RowId>)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let vendor_exists: bool = tx
            .query_row(
                "SELECT 1 FROM purchase_vendor WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, vendor_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !vendor_exists {
            return Err(RepositoryError::not_found("purchase_vendor", vendor_id));
        }

        let next_number: i64 = tx.query_row(
            r#"
            SELECT COALESCE(MAX(batch_number), 0) + 1 FROM order_batch
            WHERE tenant_id = ?1 AND purchase_vendor_id = ?2 AND batch_date = ?3
            "#,
            params![tenant_id, vendor_id, batch_date],
            |row| row.get(0),
        )?;

        let created_at = Local::now().naive_local();
        tx.execute(
            r#"
            INSERT INTO order_batch (tenant_id, purchase_vendor_id, batch_number, batch_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![tenant_id, vendor_id, next_number, batch_date, created_at],
        )?;
        let batch_id = tx.last_insert_rowid();

        let (sql, values) = build_id_in_sql(
            r#"
            UPDATE order_row
            SET order_batch_id = ?,
                purchase_vendor_id = COALESCE(purchase_vendor_id, ?),
                is_ordered = 1,
                updated_at = ?
            WHERE tenant_id = ? AND order_batch_id IS NULL
            "#,
            vec![
                Value::Integer(batch_id),
                Value::Integer(vendor_id),
                Value::Text(created_at.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
                Value::Integer(tenant_id),
            ],
            "id",
            row_ids,
            "RETURNING id",
        );
        let mut linked: Vec<RowId> = {
            let mut stmt = tx.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        if linked.is_empty() {
            // 事务随 tx 丢弃回滚，不留下空批次
            return Err(RepositoryError::not_found(
                "order_row",
                format!("{} 个未挂批次的行", row_ids.len()),
            ));
        }
        linked.sort_unstable();

        tx.commit()?;
        debug!(batch_id, next_number, "批次事务已提交");

        Ok((
            OrderBatch {
                id: batch_id,
                tenant_id,
                purchase_vendor_id: vendor_id,
                batch_number: next_number,
                batch_date,
                created_at,
            },
            linked,
        ))
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, tenant_id: TenantId, id: i64) -> RepositoryResult<Option<OrderBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                &format!(
                    "SELECT {} FROM order_batch WHERE tenant_id = ?1 AND id = ?2",
                    BATCH_COLUMNS
                ),
                params![tenant_id, id],
                map_batch,
            )
            .optional()?;
        Ok(batch)
    }

    /// 列出某供应商的批次（可选限定日期），按日期、批次号升序
    pub fn list_for_vendor(
        &self,
        tenant_id: TenantId,
        vendor_id: i64,
        batch_date: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<OrderBatch>> {
        let conn = self.get_conn()?;
        let mut sql = format!(
            "SELECT {} FROM order_batch WHERE tenant_id = ?1 AND purchase_vendor_id = ?2",
            BATCH_COLUMNS
        );
        if batch_date.is_some() {
            sql.push_str(" AND batch_date = ?3");
        }
        sql.push_str(" ORDER BY batch_date, batch_number");

        let mut stmt = conn.prepare(&sql)?;
        let batches = match batch_date {
            Some(date) => stmt
                .query_map(params![tenant_id, vendor_id, date], map_batch)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![tenant_id, vendor_id], map_batch)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (OrderBatchRepository, Arc<Mutex<Connection>>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO tenant (id, name) VALUES (1, 'a'), (2, 'b');
            INSERT INTO purchase_vendor (id, tenant_id, name, created_at)
                VALUES (10, 1, 'V1', '2025-01-01 00:00:00'),
                       (11, 1, 'V2', '2025-01-01 00:00:00'),
                       (20, 2, 'V1', '2025-01-01 00:00:00');
            INSERT INTO order_upload (upload_id, tenant_id, file_name, row_count, header_row_index, created_at)
                VALUES ('u1', 1, 'f.csv', 4, 0, '2025-01-01 00:00:00');
            INSERT INTO order_row (id, upload_id, tenant_id, fields, created_at, updated_at) VALUES
                (1, 'u1', 1, '{}', '2025-01-01 00:00:00', '2025-01-01 00:00:00'),
                (2, 'u1', 1, '{}', '2025-01-01 00:00:00', '2025-01-01 00:00:00'),
                (3, 'u1', 1, '{}', '2025-01-01 00:00:00', '2025-01-01 00:00:00'),
                (4, 'u1', 1, '{}', '2025-01-01 00:00:00', '2025-01-01 00:00:00');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (OrderBatchRepository::from_connection(conn.clone()), conn)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    #[test]
    fn test_numbers_increase_per_vendor_per_day() {
        let (repo, _) = setup();

        let first = repo.assign_batch(1, 10, &[1], day(), 3).unwrap();
        let second = repo.assign_batch(1, 10, &[2], day(), 3).unwrap();
        let other_vendor = repo.assign_batch(1, 11, &[3], day(), 3).unwrap();
        let next_day = repo
            .assign_batch(1, 10, &[4], day().succ_opt().unwrap(), 3)
            .unwrap();

        assert_eq!(first.batch.batch_number, 1);
        assert_eq!(second.batch.batch_number, 2);
        assert_eq!(other_vendor.batch.batch_number, 1);
        assert_eq!(next_day.batch.batch_number, 1);
    }

    #[test]
    fn test_already_batched_rows_are_not_relinked() {
        let (repo, _) = setup();
        let first = repo.assign_batch(1, 10, &[1, 2], day(), 3).unwrap();
        let second = repo.assign_batch(1, 10, &[2, 3], day(), 3).unwrap();

        assert_eq!(first.linked_row_ids, vec![1, 2]);
        assert_eq!(second.linked_row_ids, vec![3]);
    }

    #[test]
    fn test_no_linkable_rows_leaves_no_batch() {
        let (repo, conn) = setup();
        repo.assign_batch(1, 10, &[1], day(), 3).unwrap();

        let result = repo.assign_batch(1, 10, &[1, 999], day(), 3);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));

        let count: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM order_batch", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_foreign_vendor_is_not_found() {
        let (repo, _) = setup();
        let result = repo.assign_batch(1, 20, &[1], day(), 3);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_list_for_vendor() {
        let (repo, _) = setup();
        repo.assign_batch(1, 10, &[1], day(), 3).unwrap();
        repo.assign_batch(1, 10, &[2], day(), 3).unwrap();

        let batches = repo.list_for_vendor(1, 10, Some(day())).unwrap();
        let numbers: Vec<i64> = batches.iter().map(|b| b.batch_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(repo.list_for_vendor(2, 10, None).unwrap().is_empty());
    }
}
