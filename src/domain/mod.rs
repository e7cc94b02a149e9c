// ==========================================
// 订单履约后台 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、字段合并语义
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod order_row;
pub mod product;
pub mod types;
pub mod vendor;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use order_row::{
    field_keys, DeliveryInfoUpdate, FieldMap, FieldValue, NewOrderRow, OrderRow, OrderUpload,
};
pub use product::{NewProduct, Product, ProductMapping};
pub use types::{OrderStatus, RowId, SubmitType, TenantId};
pub use vendor::{BatchAssignment, NewPurchaseVendor, OrderBatch, PurchaseVendor};
