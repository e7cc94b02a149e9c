// ==========================================
// 订单履约后台 - 商品领域模型
// ==========================================
// 职责: 商品目录记录、显示名派生、映射负载生成
// 约束: code 不全局唯一，(name, code, carrier_type) 三元组唯一
// ==========================================

use crate::domain::order_row::{field_keys, FieldMap, FieldValue};
use crate::domain::types::TenantId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 商品目录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub tenant_id: TenantId,
    pub code: String,                     // 映射编码
    pub name: String,                     // 商品名
    pub marketplace_name: Option<String>, // 电商整合工具中的商品名（可选）
    pub sale_price: Option<f64>,
    pub vendor_name: Option<String>,      // 采购供应商名
    pub carrier_type: Option<String>,     // 配送类型（如 택배/직배송）
    pub package_count: Option<i64>,       // 合包数量
    pub tax_type: Option<String>,         // 课税类型
    pub category: Option<String>,
    pub postage_fee: Option<f64>,         // 运费
    pub carrier_company: Option<String>,  // 默认承运商
    pub created_at: NaiveDateTime,
}

impl Product {
    /// 显示名：优先使用非空的电商整合工具商品名
    pub fn display_name(&self) -> &str {
        match self.marketplace_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    pub fn has_marketplace_name(&self) -> bool {
        self.marketplace_name
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    /// 生成映射负载（写入订单行的字段）
    pub fn to_mapping(&self) -> ProductMapping {
        ProductMapping {
            product_id: Some(self.id),
            code: self.code.clone(),
            carrier_type: self.carrier_type.clone(),
            package_count: self.package_count,
            sale_price: self.sale_price,
            carrier_company: self.carrier_company.clone(),
            postage_fee: self.postage_fee,
            vendor_name: self.vendor_name.clone(),
            mapped_product_name: Some(self.display_name().to_string()),
            extra: FieldMap::new(),
        }
    }
}

/// 新商品（id 由存储分配）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub marketplace_name: Option<String>,
    pub sale_price: Option<f64>,
    pub vendor_name: Option<String>,
    pub carrier_type: Option<String>,
    pub package_count: Option<i64>,
    pub tax_type: Option<String>,
    pub category: Option<String>,
    pub postage_fee: Option<f64>,
    pub carrier_company: Option<String>,
}

// ==========================================
// ProductMapping - 编码映射负载
// ==========================================
// 红线: 负载写入订单行时不得覆盖行自身的 productName（客户原始输入）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductMapping {
    pub product_id: Option<i64>,
    pub code: String,
    pub carrier_type: Option<String>,
    pub package_count: Option<i64>,
    pub sale_price: Option<f64>,
    pub carrier_company: Option<String>,
    pub postage_fee: Option<f64>,
    pub vendor_name: Option<String>,
    pub mapped_product_name: Option<String>,
    /// 额外字段（原样写入）
    #[serde(default)]
    pub extra: FieldMap,
}

impl ProductMapping {
    /// 转为字段补丁；productName 永远不在补丁中
    pub fn to_patch(&self) -> FieldMap {
        let mut patch = self.extra.clone();
        patch.insert(field_keys::MAPPING_CODE, self.code.clone());
        if let Some(id) = self.product_id {
            patch.insert(field_keys::PRODUCT_ID, id);
        }
        let optional: [(&str, FieldValue); 7] = [
            (field_keys::CARRIER_TYPE, self.carrier_type.clone().into()),
            (field_keys::PACKAGE_COUNT, self.package_count.into()),
            (field_keys::SALE_PRICE, self.sale_price.into()),
            (field_keys::CARRIER, self.carrier_company.clone().into()),
            (field_keys::POSTAGE_FEE, self.postage_fee.into()),
            (field_keys::VENDOR_NAME, self.vendor_name.clone().into()),
            (
                field_keys::MAPPED_PRODUCT_NAME,
                self.mapped_product_name.clone().into(),
            ),
        ];
        for (key, value) in optional {
            if !value.is_null() {
                patch.insert(key, value);
            }
        }
        patch.remove(field_keys::PRODUCT_NAME);
        patch
    }
}
