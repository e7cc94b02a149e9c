// ==========================================
// 订单履约后台 - 订单行领域模型
// ==========================================
// 职责: 上传订单行（开放字段表）及其字段合并语义
// 红线: fields 的键集合是开放的，任何更新路径都不得丢弃未知键
// ==========================================

use crate::domain::types::{OrderStatus, RowId, TenantId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// 规范字段键
// ==========================================
// 表头别名解析后的标准键；未识别的表头按原文保留为键
pub mod field_keys {
    pub const ORDER_NUMBER: &str = "orderNumber";
    pub const PRODUCT_NAME: &str = "productName";
    pub const OPTION_NAME: &str = "optionName";
    pub const MAPPING_CODE: &str = "code";
    pub const PRODUCT_ID: &str = "productId";
    pub const QUANTITY: &str = "quantity";
    pub const ORDERER_NAME: &str = "ordererName";
    pub const RECIPIENT_NAME: &str = "recipientName";
    pub const RECIPIENT_PHONE: &str = "recipientPhone";
    pub const POSTAL_CODE: &str = "postalCode";
    pub const ADDRESS: &str = "address";
    pub const DELIVERY_MESSAGE: &str = "deliveryMessage";
    pub const SHOP_NAME: &str = "shopName";
    pub const SALE_PRICE: &str = "salePrice";
    pub const CARRIER: &str = "carrier";
    pub const TRACKING_NUMBER: &str = "trackingNumber";
    pub const ORDER_STATUS: &str = "orderStatus";

    // 商品映射写入的字段
    pub const CARRIER_TYPE: &str = "carrierType";
    pub const PACKAGE_COUNT: &str = "packageCount";
    pub const POSTAGE_FEE: &str = "postageFee";
    pub const VENDOR_NAME: &str = "vendorName";
    pub const MAPPED_PRODUCT_NAME: &str = "mappedProductName";
}

// ==========================================
// FieldValue - 字段标量值
// ==========================================
// 存储格式: JSON 标量（null / bool / 整数 / 小数 / 字符串）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// 空值判定：Null 或去空白后为空字符串
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 以文本形式读取（整数型小数不带 ".0"）；Null 返回 None
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            FieldValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Text(s) => s.trim().replace(',', "").parse::<i64>().ok(),
            _ => None,
        }
    }

    /// 将表格单元格文本转为数值（可解析时），否则保留文本
    ///
    /// 千分位逗号会被去除："12,000" → 12000
    pub fn numeric_or_text(raw: &str) -> FieldValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FieldValue::Text(String::new());
        }
        let compact = trimmed.replace(',', "");
        if let Ok(i) = compact.parse::<i64>() {
            return FieldValue::Integer(i);
        }
        match compact.parse::<f64>() {
            Ok(f) if f.is_finite() => FieldValue::Float(f),
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text().unwrap_or_default())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

// ==========================================
// FieldMap - 开放字段表
// ==========================================
// 合并语义: 浅合并，按键后写覆盖；未出现在补丁中的键保持不变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// 读取文本值（去首尾空白，空串视为 None）
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(|v| v.as_text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// 所有值均为空
    pub fn is_blank(&self) -> bool {
        self.0.values().all(|v| v.is_blank())
    }

    /// 浅合并补丁，返回被写入的键
    pub fn merge(&mut self, patch: &FieldMap) -> Vec<String> {
        self.merge_except(patch, &[])
    }

    /// 浅合并补丁，但跳过 protected 中列出的键（保留当前值）
    pub fn merge_except(&mut self, patch: &FieldMap, protected: &[&str]) -> Vec<String> {
        let mut written = Vec::with_capacity(patch.len());
        for (key, value) in patch.iter() {
            if protected.contains(&key.as_str()) {
                continue;
            }
            self.0.insert(key.clone(), value.clone());
            written.push(key.clone());
        }
        written
    }

    /// 订单行补丁合并：在 merge_except 基础上，处于终态的行不接受 orderStatus 改写
    ///
    /// 其余字段（承运商、运单号等）照常写入
    pub fn merge_guarded(&mut self, patch: &FieldMap, protected: &[&str]) -> Vec<String> {
        let status_frozen = self.order_status().is_some_and(|s| s.is_terminal());
        if !status_frozen {
            return self.merge_except(patch, protected);
        }

        let mut guarded: Vec<&str> = protected.to_vec();
        guarded.push(field_keys::ORDER_STATUS);
        self.merge_except(patch, &guarded)
    }

    /// 当前订单状态（未设置或非法值返回 None）
    pub fn order_status(&self) -> Option<OrderStatus> {
        self.get_text(field_keys::ORDER_STATUS)
            .and_then(|s| OrderStatus::parse(&s))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<FieldMap> {
        serde_json::from_str(raw)
    }
}

impl FromIterator<(String, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        FieldMap(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, FieldValue>> for FieldMap {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        FieldMap(map)
    }
}

// ==========================================
// OrderRow - 上传订单行
// ==========================================
// 红线: order_batch_id 一经设置不再清除或改派（取消只改状态字段）
// 对齐: order_row 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: RowId,
    pub upload_id: String,
    pub tenant_id: TenantId,
    pub fields: FieldMap,
    pub purchase_vendor_id: Option<i64>,
    pub order_batch_id: Option<i64>,
    pub is_ordered: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl OrderRow {
    pub fn status(&self) -> Option<OrderStatus> {
        self.fields.order_status()
    }

    pub fn product_name(&self) -> Option<String> {
        self.fields.get_text(field_keys::PRODUCT_NAME)
    }

    pub fn mapping_code(&self) -> Option<String> {
        self.fields.get_text(field_keys::MAPPING_CODE)
    }

    pub fn is_batched(&self) -> bool {
        self.order_batch_id.is_some()
    }
}

/// 待写入的新订单行（id 由存储分配）
#[derive(Debug, Clone)]
pub struct NewOrderRow {
    pub fields: FieldMap,
    pub purchase_vendor_id: Option<i64>,
}

// ==========================================
// OrderUpload - 表格上传批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpload {
    pub upload_id: String,
    pub tenant_id: TenantId,
    pub file_name: String,
    pub row_count: i64,
    pub header_row_index: i64,
    pub uploaded_by: Option<String>,
    pub created_at: NaiveDateTime,
}

// ==========================================
// DeliveryInfoUpdate - 配送信息更新项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfoUpdate {
    pub row_id: RowId,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub order_status: Option<OrderStatus>,
}

impl DeliveryInfoUpdate {
    /// 转为字段补丁（仅包含提供的键）
    pub fn to_patch(&self) -> FieldMap {
        let mut patch = FieldMap::new();
        if let Some(carrier) = &self.carrier {
            patch.insert(field_keys::CARRIER, carrier.clone());
        }
        if let Some(tracking) = &self.tracking_number {
            patch.insert(field_keys::TRACKING_NUMBER, tracking.clone());
        }
        if let Some(status) = self.order_status {
            patch.insert(field_keys::ORDER_STATUS, status.as_str());
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(field_keys::PRODUCT_NAME, "Xyz");
        fields.insert(field_keys::MAPPING_CODE, "OLD");
        fields.insert("사은품", "스티커");
        fields
    }

    #[test]
    fn test_merge_is_shallow_last_write_wins() {
        let mut fields = sample_fields();
        let mut patch = FieldMap::new();
        patch.insert(field_keys::MAPPING_CODE, "NEW");
        patch.insert(field_keys::QUANTITY, 2i64);

        let written = fields.merge(&patch);

        assert_eq!(written.len(), 2);
        assert_eq!(fields.get_text(field_keys::MAPPING_CODE), Some("NEW".to_string()));
        assert_eq!(fields.get(field_keys::QUANTITY), Some(&FieldValue::Integer(2)));
        // 未知键保留
        assert_eq!(fields.get_text("사은품"), Some("스티커".to_string()));
    }

    #[test]
    fn test_merge_except_keeps_protected_key() {
        let mut fields = sample_fields();
        let mut patch = FieldMap::new();
        patch.insert(field_keys::PRODUCT_NAME, "Catalog Name");
        patch.insert(field_keys::MAPPING_CODE, "NEW");

        fields.merge_except(&patch, &[field_keys::PRODUCT_NAME]);

        assert_eq!(fields.get_text(field_keys::PRODUCT_NAME), Some("Xyz".to_string()));
        assert_eq!(fields.get_text(field_keys::MAPPING_CODE), Some("NEW".to_string()));
    }

    #[test]
    fn test_merge_guarded_freezes_terminal_status() {
        let mut fields = sample_fields();
        fields.insert(field_keys::ORDER_STATUS, "취소");
        let mut patch = FieldMap::new();
        patch.insert(field_keys::ORDER_STATUS, "배송중");
        patch.insert(field_keys::TRACKING_NUMBER, "111");

        let written = fields.merge_guarded(&patch, &[]);

        assert_eq!(written, vec![field_keys::TRACKING_NUMBER.to_string()]);
        assert_eq!(fields.order_status(), Some(OrderStatus::Cancelled));
        assert_eq!(fields.get_text(field_keys::TRACKING_NUMBER), Some("111".to_string()));
    }

    #[test]
    fn test_merge_guarded_passes_status_on_live_rows() {
        let mut fields = sample_fields();
        fields.insert(field_keys::ORDER_STATUS, "공급중");
        let mut patch = FieldMap::new();
        patch.insert(field_keys::ORDER_STATUS, "배송중");
        patch.insert(field_keys::PRODUCT_NAME, "Catalog Name");

        fields.merge_guarded(&patch, &[field_keys::PRODUCT_NAME]);

        assert_eq!(fields.order_status(), Some(OrderStatus::Shipping));
        assert_eq!(fields.get_text(field_keys::PRODUCT_NAME), Some("Xyz".to_string()));
    }

    #[test]
    fn test_json_keeps_scalar_kinds() {
        let mut fields = FieldMap::new();
        fields.insert("a", 3i64);
        fields.insert("b", 2.5f64);
        fields.insert("c", true);
        fields.insert("d", FieldValue::Null);
        fields.insert("e", "text");

        let json = fields.to_json().unwrap();
        let back = FieldMap::from_json(&json).unwrap();

        assert_eq!(back.get("a"), Some(&FieldValue::Integer(3)));
        assert_eq!(back.get("b"), Some(&FieldValue::Float(2.5)));
        assert_eq!(back.get("c"), Some(&FieldValue::Bool(true)));
        assert_eq!(back.get("d"), Some(&FieldValue::Null));
        assert_eq!(back.get("e"), Some(&FieldValue::text("text")));
    }

    #[test]
    fn test_numeric_or_text() {
        assert_eq!(FieldValue::numeric_or_text("12,000"), FieldValue::Integer(12000));
        assert_eq!(FieldValue::numeric_or_text(" 1.5 "), FieldValue::Float(1.5));
        assert_eq!(FieldValue::numeric_or_text("A-01"), FieldValue::text("A-01"));
        assert_eq!(FieldValue::Float(3.0).as_text(), Some("3".to_string()));
    }

    #[test]
    fn test_order_status_from_fields() {
        let mut fields = FieldMap::new();
        assert_eq!(fields.order_status(), None);
        fields.insert(field_keys::ORDER_STATUS, "배송중");
        assert_eq!(fields.order_status(), Some(OrderStatus::Shipping));
    }
}
