// ==========================================
// 订单履约后台 - 应用层
// ==========================================
// 职责: 装配仓储、配置与 API，供入口程序调用
// ==========================================

pub mod state;

// 重导出
pub use crate::db::get_default_db_path;
pub use state::AppState;
