// ==========================================
// 订单履约后台 - 引擎层
// ==========================================
// 职责: 商品编码匹配、订单行状态规则
// 红线: Engine 不拼 SQL，不访问存储
// ==========================================

pub mod product_matcher;
pub mod row_state;

// 重导出核心引擎
pub use product_matcher::{dedupe_for_selection, ExactMatchKind, ProductMatch, ProductMatcher};
pub use row_state::{
    apply_mapping, delivery_patch, mapping_patch, plan_status_update, StatusUpdatePlan,
    MAPPING_PROTECTED_FIELDS,
};
