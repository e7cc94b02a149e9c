// ==========================================
// 订单履约后台 - 商品目录 / 采购供应商 API
// ==========================================
// 职责: 商品维护与检索（精确优先 + 模糊兜底）、供应商维护
// ==========================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::config::settings::PipelineSettings;
use crate::domain::order_row::FieldMap;
use crate::domain::product::{NewProduct, Product};
use crate::domain::types::TenantId;
use crate::domain::vendor::{NewPurchaseVendor, PurchaseVendor};
use crate::engine::product_matcher::{dedupe_for_selection, ProductMatch, ProductMatcher};
use crate::repository::error::RepositoryError;
use crate::repository::product_repo::ProductRepository;
use crate::repository::vendor_repo::PurchaseVendorRepository;

pub struct CatalogApi {
    product_repo: Arc<ProductRepository>,
    vendor_repo: Arc<PurchaseVendorRepository>,
    matcher: ProductMatcher,
}

impl CatalogApi {
    pub fn new(
        product_repo: Arc<ProductRepository>,
        vendor_repo: Arc<PurchaseVendorRepository>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            product_repo,
            vendor_repo,
            matcher: ProductMatcher::from_settings(settings),
        }
    }

    // ==========================================
    // 商品
    // ==========================================

    /// 插入或更新商品
    pub fn upsert_product(&self, tenant_id: TenantId, product: &NewProduct) -> ApiResult<i64> {
        let id = self.product_repo.upsert(tenant_id, product)?;
        debug!(tenant_id, product_id = id, code = %product.code, "商品已写入");
        Ok(id)
    }

    pub fn get_product(&self, tenant_id: TenantId, product_id: i64) -> ApiResult<Product> {
        self.product_repo
            .find_by_id(tenant_id, product_id)?
            .ok_or_else(|| RepositoryError::not_found("product", product_id).into())
    }

    pub fn list_products(&self, tenant_id: TenantId) -> ApiResult<Vec<Product>> {
        Ok(self.product_repo.list_by_tenant(tenant_id)?)
    }

    /// 选择列表（同编码只保留一条，优先有电商整合工具商品名的）
    pub fn list_for_selection(&self, tenant_id: TenantId) -> ApiResult<Vec<Product>> {
        let products = self.product_repo.list_by_tenant(tenant_id)?;
        Ok(dedupe_for_selection(&products))
    }

    /// 按商品名模糊检索；无候选时返回空列表
    pub fn search_products(&self, tenant_id: TenantId, query: &str) -> ApiResult<Vec<ProductMatch>> {
        let catalog = self.product_repo.list_by_tenant(tenant_id)?;
        let matches = self.matcher.search(query, &catalog);
        info!(
            tenant_id,
            catalog = catalog.len(),
            candidates = matches.len(),
            "商品检索完成"
        );
        Ok(matches)
    }

    /// 为一行订单解析商品：精确（productId / 编码）优先，否则取模糊最高分
    pub fn resolve_for_row(&self, tenant_id: TenantId, fields: &FieldMap) -> ApiResult<Option<Product>> {
        let catalog = self.product_repo.list_by_tenant(tenant_id)?;
        Ok(self.matcher.best_for_row(fields, &catalog).cloned())
    }

    // ==========================================
    // 采购供应商
    // ==========================================

    /// 新增供应商（租户内名称唯一）
    pub fn create_vendor(&self, tenant_id: TenantId, vendor: &NewPurchaseVendor) -> ApiResult<i64> {
        match self.vendor_repo.insert(tenant_id, vendor) {
            Ok(id) => Ok(id),
            Err(RepositoryError::UniqueConstraintViolation(_)) => Err(ApiError::BusinessRuleViolation(
                format!("供应商 {} 已存在", vendor.name.trim()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_vendor(&self, tenant_id: TenantId, vendor_id: i64) -> ApiResult<PurchaseVendor> {
        self.vendor_repo
            .find_by_id(tenant_id, vendor_id)?
            .ok_or_else(|| RepositoryError::not_found("purchase_vendor", vendor_id).into())
    }

    pub fn find_vendor_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> ApiResult<Option<PurchaseVendor>> {
        Ok(self.vendor_repo.find_by_name(tenant_id, name)?)
    }

    pub fn list_vendors(&self, tenant_id: TenantId) -> ApiResult<Vec<PurchaseVendor>> {
        Ok(self.vendor_repo.list_by_tenant(tenant_id)?)
    }
}
