// ==========================================
// 订单履约后台 - 商品目录数据仓储
// ==========================================
// 约束: (tenant_id, name, code, carrier_type) 唯一，carrier_type 空值存为 ''
// 红线: Repository 不做业务逻辑，只做数据映射
// ==========================================

use crate::domain::product::{NewProduct, Product};
use crate::domain::types::TenantId;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const PRODUCT_COLUMNS: &str = "id, tenant_id, code, name, marketplace_name, sale_price, \
                               vendor_name, carrier_type, package_count, tax_type, category, \
                               postage_fee, carrier_company, created_at";

fn map_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let carrier_type: String = row.get(7)?;
    Ok(Product {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        marketplace_name: row.get(4)?,
        sale_price: row.get(5)?,
        vendor_name: row.get(6)?,
        carrier_type: if carrier_type.is_empty() {
            None
        } else {
            Some(carrier_type)
        },
        package_count: row.get(8)?,
        tax_type: row.get(9)?,
        category: row.get(10)?,
        postage_fee: row.get(11)?,
        carrier_company: row.get(12)?,
        created_at: row.get(13)?,
    })
}

// ==========================================
// ProductRepository - 商品目录仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
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

    /// 插入或更新商品（按 (tenant, name, code, carrier_type) 唯一键）
    ///
    /// # 返回
    /// - 商品 id（已存在时返回原 id）
    pub fn upsert(&self, tenant_id: TenantId, product: &NewProduct) -> RepositoryResult<i64> {
        if product.code.trim().is_empty() || product.name.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "商品编码与商品名不能为空".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let id: i64 = conn.query_row(
            r#"
            INSERT INTO product (
                tenant_id, code, name, marketplace_name, sale_price, vendor_name, carrier_type,
                package_count, tax_type, category, postage_fee, carrier_company, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (tenant_id, name, code, carrier_type) DO UPDATE SET
                marketplace_name = excluded.marketplace_name,
                sale_price = excluded.sale_price,
                vendor_name = excluded.vendor_name,
                package_count = excluded.package_count,
                tax_type = excluded.tax_type,
                category = excluded.category,
                postage_fee = excluded.postage_fee,
                carrier_company = excluded.carrier_company
            RETURNING id
            "#,
            params![
                tenant_id,
                product.code.trim(),
                product.name.trim(),
                product.marketplace_name,
                product.sale_price,
                product.vendor_name,
                product.carrier_type.as_deref().unwrap_or(""),
                product.package_count,
                product.tax_type,
                product.category,
                product.postage_fee,
                product.carrier_company,
                Local::now().naive_local(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(&self, tenant_id: TenantId, id: i64) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let product = conn
            .query_row(
                &format!(
                    "SELECT {} FROM product WHERE tenant_id = ?1 AND id = ?2",
                    PRODUCT_COLUMNS
                ),
                params![tenant_id, id],
                map_product,
            )
            .optional()?;
        Ok(product)
    }

    /// 按映射编码查找（编码不唯一，可能返回多条）
    pub fn find_by_code(&self, tenant_id: TenantId, code: &str) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM product WHERE tenant_id = ?1 AND code = ?2 ORDER BY id",
            PRODUCT_COLUMNS
        ))?;
        let products = stmt
            .query_map(params![tenant_id, code.trim()], map_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// 列出租户全部商品（id 升序）
    pub fn list_by_tenant(&self, tenant_id: TenantId) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM product WHERE tenant_id = ?1 ORDER BY id",
            PRODUCT_COLUMNS
        ))?;
        let products = stmt
            .query_map(params![tenant_id], map_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ProductRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn.execute_batch("INSERT INTO tenant (id, name) VALUES (1, 'a'), (2, 'b');")
            .unwrap();
        ProductRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn apple(price: f64) -> NewProduct {
        NewProduct {
            code: "AP-500".to_string(),
            name: "Fresh Apple 500g".to_string(),
            sale_price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_same_key_updates_in_place() {
        let repo = setup();
        let first = repo.upsert(1, &apple(1000.0)).unwrap();
        let second = repo.upsert(1, &apple(1200.0)).unwrap();

        assert_eq!(first, second);
        let products = repo.list_by_tenant(1).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].sale_price, Some(1200.0));
        assert_eq!(products[0].carrier_type, None);
    }

    #[test]
    fn test_same_code_different_carrier_type_is_separate() {
        let repo = setup();
        repo.upsert(1, &apple(1000.0)).unwrap();
        let mut direct = apple(1000.0);
        direct.carrier_type = Some("직배송".to_string());
        repo.upsert(1, &direct).unwrap();

        assert_eq!(repo.find_by_code(1, "AP-500").unwrap().len(), 2);
    }

    #[test]
    fn test_tenant_isolation() {
        let repo = setup();
        let id = repo.upsert(1, &apple(1000.0)).unwrap();
        assert!(repo.find_by_id(2, id).unwrap().is_none());
        assert!(repo.list_by_tenant(2).unwrap().is_empty());
    }

    #[test]
    fn test_blank_code_rejected() {
        let repo = setup();
        let mut product = apple(1.0);
        product.code = "  ".to_string();
        assert!(matches!(
            repo.upsert(1, &product),
            Err(RepositoryError::ValidationError(_))
        ));
    }
}
