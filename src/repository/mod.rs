// ==========================================
// 订单履约后台 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 每条读写语句都带 tenant_id 条件
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod order_batch_repo;
pub mod order_row_repo;
pub mod product_repo;
pub mod sql_util;
pub mod vendor_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_batch_repo::OrderBatchRepository;
pub use order_row_repo::{OrderRowRepository, RowFilter};
pub use product_repo::ProductRepository;
pub use vendor_repo::PurchaseVendorRepository;
