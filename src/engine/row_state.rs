// ==========================================
// 订单履约后台 - 订单行状态规则
// ==========================================
// 状态链: 未设置 → 공급중 → 발주서 다운 → 사방넷 다운 → 배송중
// 取消: 任意状态可进入 취소；취소 为终态
// 映射: 编码映射负载写入时保护 productName（客户原始输入）
// 约束: 纯函数，不访问存储
// ==========================================

use crate::domain::order_row::{field_keys, DeliveryInfoUpdate, FieldMap};
use crate::domain::product::ProductMapping;
use crate::domain::types::OrderStatus;
use crate::importer::carrier::normalize_carrier;

/// 编码映射时不允许覆盖的字段
pub const MAPPING_PROTECTED_FIELDS: &[&str] = &[field_keys::PRODUCT_NAME];

/// 批量改状态计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdatePlan {
    pub target: OrderStatus,
    /// 处于该状态的行不参与更新（终态保护）
    pub skip_status: Option<OrderStatus>,
}

/// 为批量改状态生成执行计划
///
/// - 目标为 취소：无条件覆盖（幂等）
/// - 其他目标：已取消的行保持 취소
pub fn plan_status_update(target: OrderStatus) -> StatusUpdatePlan {
    let skip_status = if OrderStatus::can_transition(Some(OrderStatus::Cancelled), target) {
        None
    } else {
        Some(OrderStatus::Cancelled)
    };
    StatusUpdatePlan {
        target,
        skip_status,
    }
}

/// 编码映射负载 → 字段补丁（不含 productName）
pub fn mapping_patch(mapping: &ProductMapping) -> FieldMap {
    let mut patch = mapping.to_patch();
    for key in MAPPING_PROTECTED_FIELDS {
        patch.remove(key);
    }
    patch
}

/// 配送信息 → 字段补丁（承运商名归一化）
pub fn delivery_patch(update: &DeliveryInfoUpdate) -> FieldMap {
    let normalized = DeliveryInfoUpdate {
        carrier: normalize_carrier(update.carrier.as_deref()),
        ..update.clone()
    };
    normalized.to_patch()
}

/// 把映射负载合并进行字段（保护 productName）
pub fn apply_mapping(fields: &mut FieldMap, mapping: &ProductMapping) -> Vec<String> {
    fields.merge_except(&mapping_patch(mapping), MAPPING_PROTECTED_FIELDS)
}
