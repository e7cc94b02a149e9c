// ==========================================
// 订单履约后台 - API 层
// ==========================================
// 职责: 提供业务 API 接口（导入、订单行状态机、发注批次、商品目录）
// ==========================================

pub mod catalog_api;
pub mod delivery_import_api;
pub mod dispatch_api;
pub mod error;
pub mod import_api;
pub mod order_row_api;
pub mod tenant_scope;

// 重导出核心类型
pub use catalog_api::CatalogApi;
pub use delivery_import_api::{DeliveryImportApi, TrackingImportReport};
pub use dispatch_api::DispatchApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse};
pub use order_row_api::{
    BulkUpdateResult, CodeMappingReport, CodeMappingUpdate, OrderRowApi, RowWriteFailure,
};
pub use tenant_scope::TenantScope;
