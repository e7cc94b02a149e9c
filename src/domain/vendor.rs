// ==========================================
// 订单履约后台 - 采购供应商与发注批次
// ==========================================
// 约束: 供应商名租户内唯一
// 约束: (tenant_id, purchase_vendor_id, batch_number, batch_date) 唯一，
//       批次号按供应商按日从 1 递增，不复用、不重排
// ==========================================

use crate::domain::types::{SubmitType, TenantId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// PurchaseVendor - 采购供应商
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseVendor {
    pub id: i64,
    pub tenant_id: TenantId,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub submit_types: Vec<SubmitType>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPurchaseVendor {
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub submit_types: Vec<SubmitType>,
}

// ==========================================
// OrderBatch - 发注批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBatch {
    pub id: i64,
    pub tenant_id: TenantId,
    pub purchase_vendor_id: i64,
    pub batch_number: i64,
    pub batch_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

/// 批次分配结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAssignment {
    pub batch: OrderBatch,
    /// 实际挂到该批次的行（已批次化/非本租户的行被排除）
    pub linked_row_ids: Vec<i64>,
    /// 编号冲突后重试的次数
    pub retries: u32,
}
