// ==========================================
// 订单履约后台 - 订单行数据仓储
// ==========================================
// 红线: 所有读写在同一语句内同时匹配 tenant_id 与 id
// 红线: fields 以 JSON 文本整体存储，任何更新路径都保留未知键
// 红线: order_batch_id 只由批次分配写入，本仓储不清除、不改派
// ==========================================

use crate::domain::order_row::{FieldMap, NewOrderRow, OrderRow, OrderUpload};
use crate::domain::types::{OrderStatus, RowId, TenantId};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_util::{build_id_in_sql, dedup_ids, text_list_param};
use chrono::{Local, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::debug;

const ROW_COLUMNS: &str = "id, upload_id, tenant_id, fields, purchase_vendor_id, \
                           order_batch_id, is_ordered, created_at, updated_at";

/// 时间戳参数（与 rusqlite chrono 存储格式一致）
fn ts_value(ts: &NaiveDateTime) -> Value {
    Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

fn map_order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    let raw_fields: String = row.get(3)?;
    let fields = FieldMap::from_json(&raw_fields).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(OrderRow {
        id: row.get(0)?,
        upload_id: row.get(1)?,
        tenant_id: row.get(2)?,
        fields,
        purchase_vendor_id: row.get(4)?,
        order_batch_id: row.get(5)?,
        is_ordered: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// 订单行查询条件
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub upload_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub order_batch_id: Option<i64>,
    pub purchase_vendor_id: Option<i64>,
    pub is_ordered: Option<bool>,
    pub limit: Option<usize>,
}

// ==========================================
// OrderRowRepository - 订单行仓储
// ==========================================
pub struct OrderRowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRowRepository {
    /// 创建新的仓储实例（独立连接）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入：导入
    // ==========================================

    /// 在一个事务内写入上传批次与全部订单行
    ///
    /// # 返回
    /// - 新行 id（与 rows 顺序一致）
    pub fn insert_upload(
        &self,
        upload: &OrderUpload,
        rows: &[NewOrderRow],
    ) -> RepositoryResult<Vec<RowId>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO order_upload (
                upload_id, tenant_id, file_name, row_count, header_row_index, uploaded_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                upload.upload_id,
                upload.tenant_id,
                upload.file_name,
                upload.row_count,
                upload.header_row_index,
                upload.uploaded_by,
                upload.created_at,
            ],
        )?;

        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO order_row (
                    upload_id, tenant_id, fields, purchase_vendor_id, is_ordered, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    upload.upload_id,
                    upload.tenant_id,
                    row.fields.to_json()?,
                    row.purchase_vendor_id,
                    upload.created_at,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        debug!(upload_id = %upload.upload_id, rows = ids.len(), "上传批次已写入");
        Ok(ids)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_upload(
        &self,
        tenant_id: TenantId,
        upload_id: &str,
    ) -> RepositoryResult<Option<OrderUpload>> {
        let conn = self.get_conn()?;
        let upload = conn
            .query_row(
                r#"
                SELECT upload_id, tenant_id, file_name, row_count, header_row_index, uploaded_by, created_at
                FROM order_upload WHERE tenant_id = ?1 AND upload_id = ?2
                "#,
                params![tenant_id, upload_id],
                |row| {
                    Ok(OrderUpload {
                        upload_id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        file_name: row.get(2)?,
                        row_count: row.get(3)?,
                        header_row_index: row.get(4)?,
                        uploaded_by: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(upload)
    }

    pub fn find_by_id(&self, tenant_id: TenantId, id: RowId) -> RepositoryResult<Option<OrderRow>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM order_row WHERE tenant_id = ?1 AND id = ?2",
                    ROW_COLUMNS
                ),
                params![tenant_id, id],
                map_order_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_by_ids(&self, tenant_id: TenantId, ids: &[RowId]) -> RepositoryResult<Vec<OrderRow>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let (sql, values) = build_id_in_sql(
            &format!("SELECT {} FROM order_row WHERE tenant_id = ?", ROW_COLUMNS),
            vec![Value::Integer(tenant_id)],
            "id",
            &ids,
            "ORDER BY id",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_order_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 按条件列出订单行（id 升序）
    pub fn list(&self, tenant_id: TenantId, filter: &RowFilter) -> RepositoryResult<Vec<OrderRow>> {
        let mut sql = format!("SELECT {} FROM order_row WHERE tenant_id = ?", ROW_COLUMNS);
        let mut values = vec![Value::Integer(tenant_id)];

        if let Some(upload_id) = &filter.upload_id {
            sql.push_str(" AND upload_id = ?");
            values.push(Value::Text(upload_id.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND json_extract(fields, '$.orderStatus') = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(batch_id) = filter.order_batch_id {
            sql.push_str(" AND order_batch_id = ?");
            values.push(Value::Integer(batch_id));
        }
        if let Some(vendor_id) = filter.purchase_vendor_id {
            sql.push_str(" AND purchase_vendor_id = ?");
            values.push(Value::Integer(vendor_id));
        }
        if let Some(flag) = filter.is_ordered {
            sql.push_str(" AND is_ordered = ?");
            values.push(Value::Integer(flag as i64));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_order_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 按订单号查找行 id（同一订单号可能对应多行）
    ///
    /// # 返回
    /// - (订单号, 行 id) 列表，id 升序
    pub fn find_ids_by_order_numbers(
        &self,
        tenant_id: TenantId,
        order_numbers: &[String],
    ) -> RepositoryResult<Vec<(String, RowId)>> {
        if order_numbers.is_empty() {
            return Ok(Vec::new());
        }

        let values = vec![Value::Integer(tenant_id), text_list_param(order_numbers)?];

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(json_extract(fields, '$.orderNumber') AS TEXT), id
            FROM order_row
            WHERE tenant_id = ?
              AND CAST(json_extract(fields, '$.orderNumber') AS TEXT)
                  IN (SELECT value FROM json_each(?))
            ORDER BY id
            "#,
        )?;
        let pairs = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    // ==========================================
    // 写入：状态 / 字段
    // ==========================================

    /// 单语句批量改状态
    ///
    /// # 参数
    /// - skip_status: 处于该状态的行不更新（用于保护终态）
    ///
    /// # 返回
    /// - 实际被更新的行 id（非本租户/不存在/被跳过的行不在其中）
    pub fn update_status(
        &self,
        tenant_id: TenantId,
        ids: &[RowId],
        status: OrderStatus,
        skip_status: Option<OrderStatus>,
    ) -> RepositoryResult<Vec<RowId>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Local::now().naive_local();
        let mut prefix = String::from(
            "UPDATE order_row SET fields = json_set(fields, '$.orderStatus', ?), updated_at = ? \
             WHERE tenant_id = ?",
        );
        let mut leading = vec![
            Value::Text(status.as_str().to_string()),
            ts_value(&now),
            Value::Integer(tenant_id),
        ];
        if let Some(skip) = skip_status {
            prefix.push_str(" AND COALESCE(json_extract(fields, '$.orderStatus'), '') <> ?");
            leading.push(Value::Text(skip.as_str().to_string()));
        }

        let (sql, values) = build_id_in_sql(&prefix, leading, "id", &ids, "RETURNING id");
        self.execute_returning_ids(&sql, &values)
    }

    /// 批量设置发注标记
    pub fn set_ordered(
        &self,
        tenant_id: TenantId,
        ids: &[RowId],
        is_ordered: bool,
    ) -> RepositoryResult<Vec<RowId>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Local::now().naive_local();
        let (sql, values) = build_id_in_sql(
            "UPDATE order_row SET is_ordered = ?, updated_at = ? WHERE tenant_id = ?",
            vec![
                Value::Integer(is_ordered as i64),
                ts_value(&now),
                Value::Integer(tenant_id),
            ],
            "id",
            &ids,
            "RETURNING id",
        );
        self.execute_returning_ids(&sql, &values)
    }

    /// 租户范围内批量删除
    pub fn delete_rows(&self, tenant_id: TenantId, ids: &[RowId]) -> RepositoryResult<Vec<RowId>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let (sql, values) = build_id_in_sql(
            "DELETE FROM order_row WHERE tenant_id = ?",
            vec![Value::Integer(tenant_id)],
            "id",
            &ids,
            "RETURNING id",
        );
        self.execute_returning_ids(&sql, &values)
    }

    /// 单行字段合并（读-改-写，同一事务）
    ///
    /// # 参数
    /// - patch: 要合并的字段（浅合并，后写覆盖）
    /// - protected: 不允许被补丁覆盖的键
    /// - purchase_vendor_id: 若提供则同时更新采购供应商（已挂批次的行不改）
    ///
    /// # 返回
    /// - Some(合并后的字段)
    /// - None: 行不存在或不属于该租户
    pub fn apply_patch(
        &self,
        tenant_id: TenantId,
        row_id: RowId,
        patch: &FieldMap,
        protected: &[&str],
        purchase_vendor_id: Option<i64>,
    ) -> RepositoryResult<Option<FieldMap>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let current = match Self::read_fields(&tx, tenant_id, row_id)? {
            Some(fields) => fields,
            None => return Ok(None),
        };

        let mut fields = current;
        fields.merge_guarded(patch, protected);

        // 已挂批次的行保持原采购供应商
        tx.execute(
            r#"
            UPDATE order_row
            SET fields = ?1,
                purchase_vendor_id = CASE
                    WHEN order_batch_id IS NULL THEN COALESCE(?2, purchase_vendor_id)
                    ELSE purchase_vendor_id
                END,
                updated_at = ?3
            WHERE tenant_id = ?4 AND id = ?5
            "#,
            params![
                fields.to_json()?,
                purchase_vendor_id,
                Local::now().naive_local(),
                tenant_id,
                row_id
            ],
        )?;
        tx.commit()?;
        Ok(Some(fields))
    }

    /// 多行字段合并，全有或全无
    ///
    /// 任一行不存在（或不属于该租户）时整体回滚并返回 NotFound；
    /// 已取消的行只写入非状态字段
    pub fn apply_patches_atomic(
        &self,
        tenant_id: TenantId,
        patches: &[(RowId, FieldMap)],
    ) -> RepositoryResult<Vec<RowId>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Local::now().naive_local();

        let mut updated = Vec::with_capacity(patches.len());
        for (row_id, patch) in patches {
            let mut fields = Self::read_fields(&tx, tenant_id, *row_id)?
                .ok_or_else(|| RepositoryError::not_found("order_row", row_id))?;
            fields.merge_guarded(patch, &[]);

            tx.execute(
                "UPDATE order_row SET fields = ?1, updated_at = ?2 WHERE tenant_id = ?3 AND id = ?4",
                params![fields.to_json()?, now, tenant_id, row_id],
            )?;
            updated.push(*row_id);
        }

        tx.commit()?;
        Ok(updated)
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn read_fields(
        conn: &Connection,
        tenant_id: TenantId,
        row_id: RowId,
    ) -> RepositoryResult<Option<FieldMap>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT fields FROM order_row WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, row_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(FieldMap::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    fn execute_returning_ids(&self, sql: &str, values: &[Value]) -> RepositoryResult<Vec<RowId>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_row::field_keys;

    fn setup() -> OrderRowRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn.execute_batch("INSERT INTO tenant (id, name) VALUES (1, 'a'), (2, 'b');")
            .unwrap();
        OrderRowRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn upload(repo: &OrderRowRepository, tenant_id: TenantId, names: &[&str]) -> Vec<RowId> {
        let upload = OrderUpload {
            upload_id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            file_name: "orders.csv".to_string(),
            row_count: names.len() as i64,
            header_row_index: 0,
            uploaded_by: None,
            created_at: Local::now().naive_local(),
        };
        let rows: Vec<NewOrderRow> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut fields = FieldMap::new();
                fields.insert(field_keys::ORDER_NUMBER, format!("ORD-{}", i + 1));
                fields.insert(field_keys::PRODUCT_NAME, *name);
                fields.insert("사은품", "스티커");
                NewOrderRow {
                    fields,
                    purchase_vendor_id: None,
                }
            })
            .collect();
        repo.insert_upload(&upload, &rows).unwrap()
    }

    #[test]
    fn test_insert_and_find_roundtrip_keeps_unknown_keys() {
        let repo = setup();
        let ids = upload(&repo, 1, &["사과", "배"]);
        assert_eq!(ids.len(), 2);

        let row = repo.find_by_id(1, ids[0]).unwrap().unwrap();
        assert_eq!(row.product_name(), Some("사과".to_string()));
        assert_eq!(row.fields.get_text("사은품"), Some("스티커".to_string()));
        assert!(!row.is_ordered);
        assert!(row.order_batch_id.is_none());
    }

    #[test]
    fn test_tenant_scoping_on_read_and_write() {
        let repo = setup();
        let ids = upload(&repo, 1, &["사과"]);

        assert!(repo.find_by_id(2, ids[0]).unwrap().is_none());
        let updated = repo
            .update_status(2, &ids, OrderStatus::Shipping, None)
            .unwrap();
        assert!(updated.is_empty());
        assert!(repo.delete_rows(2, &ids).unwrap().is_empty());
        assert!(repo.find_by_id(1, ids[0]).unwrap().is_some());
    }

    #[test]
    fn test_update_status_skips_protected_status() {
        let repo = setup();
        let ids = upload(&repo, 1, &["사과", "배"]);
        repo.update_status(1, &ids[..1], OrderStatus::Cancelled, None)
            .unwrap();

        let updated = repo
            .update_status(1, &ids, OrderStatus::Supplying, Some(OrderStatus::Cancelled))
            .unwrap();
        assert_eq!(updated, vec![ids[1]]);

        let first = repo.find_by_id(1, ids[0]).unwrap().unwrap();
        assert_eq!(first.status(), Some(OrderStatus::Cancelled));
        assert_eq!(first.fields.get_text("사은품"), Some("스티커".to_string()));
    }

    #[test]
    fn test_apply_patch_protects_keys() {
        let repo = setup();
        let ids = upload(&repo, 1, &["Xyz"]);

        let mut patch = FieldMap::new();
        patch.insert(field_keys::PRODUCT_NAME, "Catalog Name");
        patch.insert(field_keys::MAPPING_CODE, "C-1");
        let merged = repo
            .apply_patch(1, ids[0], &patch, &[field_keys::PRODUCT_NAME], None)
            .unwrap()
            .unwrap();

        assert_eq!(merged.get_text(field_keys::PRODUCT_NAME), Some("Xyz".to_string()));
        assert_eq!(merged.get_text(field_keys::MAPPING_CODE), Some("C-1".to_string()));
        assert!(repo.apply_patch(2, ids[0], &patch, &[], None).unwrap().is_none());
    }

    #[test]
    fn test_atomic_patches_roll_back_on_missing_row() {
        let repo = setup();
        let ids = upload(&repo, 1, &["사과"]);

        let mut patch = FieldMap::new();
        patch.insert(field_keys::TRACKING_NUMBER, "T-1");
        let result = repo.apply_patches_atomic(1, &[(ids[0], patch.clone()), (99_999, patch)]);

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
        let row = repo.find_by_id(1, ids[0]).unwrap().unwrap();
        assert!(row.fields.get(field_keys::TRACKING_NUMBER).is_none());
    }

    #[test]
    fn test_find_ids_by_order_numbers_and_list_filter() {
        let repo = setup();
        let ids = upload(&repo, 1, &["사과", "배", "감"]);

        let pairs = repo
            .find_ids_by_order_numbers(1, &["ORD-2".to_string(), "NOPE".to_string()])
            .unwrap();
        assert_eq!(pairs, vec![("ORD-2".to_string(), ids[1])]);

        repo.set_ordered(1, &ids[..2], true).unwrap();
        let ordered = repo
            .list(
                1,
                &RowFilter {
                    is_ordered: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ordered.len(), 2);
    }
}
