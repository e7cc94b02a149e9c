// ==========================================
// 订单履约后台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 连接: 大部分仓储共享一个连接；发注批次仓储使用独立连接（编号事务不与其他写互相阻塞）
// ==========================================

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::api::{
    ApiResult, CatalogApi, DeliveryImportApi, DispatchApi, ImportApi, OrderRowApi, TenantScope,
};
use crate::config::config_manager::ConfigManager;
use crate::config::settings::PipelineSettings;
use crate::config::tenant_resolver::{ConfigDefaultTenant, DefaultTenantResolver};
use crate::domain::types::TenantId;
use crate::importer::file_parser::UniversalGridParser;
use crate::importer::order_importer::OrderImporter;
use crate::repository::{
    ActionLogRepository, OrderBatchRepository, OrderRowRepository, ProductRepository,
    PurchaseVendorRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时读取的配置快照
    pub settings: PipelineSettings,

    /// 配置管理器（读写 config_kv）
    pub config_manager: Arc<ConfigManager>,

    /// 默认租户解析器
    pub tenant_resolver: Arc<dyn DefaultTenantResolver>,

    /// 订单行API
    pub order_row_api: Arc<OrderRowApi>,

    /// 发注批次API
    pub dispatch_api: Arc<DispatchApi>,

    /// 商品目录 / 供应商API
    pub catalog_api: Arc<CatalogApi>,

    /// 订单导入API
    pub import_api: Arc<ImportApi>,

    /// 运单号导入API
    pub delivery_import_api: Arc<DeliveryImportApi>,

    /// 操作日志仓储（用于审计查询）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开共享连接并建库（幂等）
    /// 2. 读取配置快照
    /// 3. 初始化所有Repository与API
    pub async fn new(db_path: String) -> Result<Self, String> {
        info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("建库失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let settings = PipelineSettings::load(config_manager.as_ref())
            .await
            .map_err(|e| format!("配置读取失败: {}", e))?;
        info!(?settings, "配置快照已加载");

        // ==========================================
        // Repository层
        // ==========================================
        let row_repo = Arc::new(OrderRowRepository::from_connection(conn.clone()));
        let product_repo = Arc::new(ProductRepository::from_connection(conn.clone()));
        let vendor_repo = Arc::new(PurchaseVendorRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let batch_repo = Arc::new(
            OrderBatchRepository::new(&db_path)
                .map_err(|e| format!("无法创建OrderBatchRepository: {}", e))?,
        );

        // ==========================================
        // API层
        // ==========================================
        let order_row_api = Arc::new(OrderRowApi::new(
            row_repo.clone(),
            product_repo.clone(),
            vendor_repo.clone(),
            action_log_repo.clone(),
            settings.clone(),
        ));
        let dispatch_api = Arc::new(DispatchApi::new(
            batch_repo,
            row_repo.clone(),
            action_log_repo.clone(),
            settings.clone(),
        ));
        let catalog_api = Arc::new(CatalogApi::new(product_repo, vendor_repo, &settings));
        let import_api = Arc::new(ImportApi::new(
            OrderImporter::new(
                Box::new(UniversalGridParser),
                row_repo.clone(),
                settings.clone(),
            ),
            order_row_api.clone(),
            action_log_repo.clone(),
        ));
        let delivery_import_api = Arc::new(DeliveryImportApi::new(
            Box::new(UniversalGridParser),
            row_repo,
            order_row_api.clone(),
        ));

        let tenant_resolver: Arc<dyn DefaultTenantResolver> =
            Arc::new(ConfigDefaultTenant::from_settings(&settings));

        info!("AppState初始化成功");
        Ok(Self {
            db_path,
            settings,
            config_manager,
            tenant_resolver,
            order_row_api,
            dispatch_api,
            catalog_api,
            import_api,
            delivery_import_api,
            action_log_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// 解析本次调用的租户（显式优先，否则默认租户）
    pub fn resolve_tenant(&self, explicit: Option<TenantId>) -> ApiResult<TenantId> {
        TenantScope::resolve(explicit, self.tenant_resolver.as_ref()).map(|s| s.tenant_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::config::config_manager::{config_keys, ConfigScope};
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_app_state_builds_on_fresh_db() {
        let file = NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).await.unwrap();
        assert_eq!(state.get_db_path(), db_path);
        assert_eq!(state.settings, PipelineSettings::default());
        assert!(matches!(
            state.resolve_tenant(None),
            Err(ApiError::ValidationError(_))
        ));
        assert_eq!(state.resolve_tenant(Some(4)).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_default_tenant_from_config() {
        let file = NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();
        {
            let state = AppState::new(db_path.clone()).await.unwrap();
            state
                .config_manager
                .set_config_value(ConfigScope::Global, config_keys::DEFAULT_TENANT_ID, "3")
                .unwrap();
        }

        let state = AppState::new(db_path).await.unwrap();
        assert_eq!(state.resolve_tenant(None).unwrap(), 3);
    }
}
