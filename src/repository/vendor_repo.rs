// ==========================================
// 订单履约后台 - 采购供应商数据仓储
// ==========================================
// 约束: 供应商名租户内唯一（重复插入返回 UniqueConstraintViolation）
// 存储: submit_types 以逗号分隔文本保存
// ==========================================

use crate::domain::types::{SubmitType, TenantId};
use crate::domain::vendor::{NewPurchaseVendor, PurchaseVendor};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const VENDOR_COLUMNS: &str =
    "id, tenant_id, name, contact_name, phone, email, submit_types, created_at";

fn map_vendor(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseVendor> {
    let submit_types: String = row.get(6)?;
    Ok(PurchaseVendor {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        contact_name: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        submit_types: SubmitType::decode_set(&submit_types),
        created_at: row.get(7)?,
    })
}

pub struct PurchaseVendorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PurchaseVendorRepository {
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

    /// 新建供应商
    pub fn insert(&self, tenant_id: TenantId, vendor: &NewPurchaseVendor) -> RepositoryResult<i64> {
        let name = vendor.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::ValidationError("供应商名不能为空".to_string()));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO purchase_vendor (
                tenant_id, name, contact_name, phone, email, submit_types, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                tenant_id,
                name,
                vendor.contact_name,
                vendor.phone,
                vendor.email,
                SubmitType::encode_set(&vendor.submit_types),
                Local::now().naive_local(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: i64,
    ) -> RepositoryResult<Option<PurchaseVendor>> {
        let conn = self.get_conn()?;
        let vendor = conn
            .query_row(
                &format!(
                    "SELECT {} FROM purchase_vendor WHERE tenant_id = ?1 AND id = ?2",
                    VENDOR_COLUMNS
                ),
                params![tenant_id, id],
                map_vendor,
            )
            .optional()?;
        Ok(vendor)
    }

    pub fn find_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> RepositoryResult<Option<PurchaseVendor>> {
        let conn = self.get_conn()?;
        let vendor = conn
            .query_row(
                &format!(
                    "SELECT {} FROM purchase_vendor WHERE tenant_id = ?1 AND name = ?2",
                    VENDOR_COLUMNS
                ),
                params![tenant_id, name.trim()],
                map_vendor,
            )
            .optional()?;
        Ok(vendor)
    }

    pub fn list_by_tenant(&self, tenant_id: TenantId) -> RepositoryResult<Vec<PurchaseVendor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM purchase_vendor WHERE tenant_id = ?1 ORDER BY name",
            VENDOR_COLUMNS
        ))?;
        let vendors = stmt
            .query_map(params![tenant_id], map_vendor)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vendors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> PurchaseVendorRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn.execute_batch("INSERT INTO tenant (id, name) VALUES (1, 'a'), (2, 'b');")
            .unwrap();
        PurchaseVendorRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn vendor(name: &str) -> NewPurchaseVendor {
        NewPurchaseVendor {
            name: name.to_string(),
            submit_types: vec![SubmitType::Email, SubmitType::Download],
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_find_by_name() {
        let repo = setup();
        let id = repo.insert(1, &vendor("청과상회")).unwrap();

        let found = repo.find_by_name(1, " 청과상회 ").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.submit_types.len(), 2);
        assert!(repo.find_by_name(2, "청과상회").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_per_tenant_rejected() {
        let repo = setup();
        repo.insert(1, &vendor("청과상회")).unwrap();

        assert!(matches!(
            repo.insert(1, &vendor("청과상회")),
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
        // 其他租户可以同名
        assert!(repo.insert(2, &vendor("청과상회")).is_ok());
    }
}
