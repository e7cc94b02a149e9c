// ==========================================
// 订单履约后台 - 行字段映射器
// ==========================================
// 职责: 表头行 + 数据行 → FieldMap
// 规则:
// - 可识别表头 → 规范键；不可识别的非空表头按原文作为键（保留未知字段）
// - 同一规范键出现多列时，只有第一列使用规范键，其余列保留原表头
// - 数量/金额类字段尽量转为数值；承运商字段做归一化
// - 全空行跳过
// ==========================================

use crate::domain::order_row::{field_keys, FieldMap, FieldValue};
use crate::importer::carrier::normalize_carrier;
use crate::importer::header_alias::resolve_header;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 需要转数值的规范字段
const NUMERIC_FIELDS: &[&str] = &[field_keys::QUANTITY, field_keys::SALE_PRICE];

/// 列映射说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column_index: usize,
    pub header: String,
    pub key: String,
    /// 是否解析为规范字段
    pub canonical: bool,
}

/// 已映射的数据行（row_number 为表格中的 1 起行号）
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub row_number: usize,
    pub fields: FieldMap,
}

/// 行字段映射器
#[derive(Debug, Clone)]
pub struct RowFieldMapper {
    columns: Vec<ColumnMapping>,
}

impl RowFieldMapper {
    /// 根据表头行构建列映射
    pub fn from_header_row(header_row: &[String]) -> Self {
        let mut used_keys: HashSet<String> = HashSet::new();
        let mut columns = Vec::with_capacity(header_row.len());

        for (column_index, raw) in header_row.iter().enumerate() {
            let header = raw.trim().to_string();
            if header.is_empty() {
                continue;
            }

            let (mut key, mut canonical) = match resolve_header(&header) {
                Some(field) => (field.to_string(), true),
                None => (header.clone(), false),
            };

            if used_keys.contains(&key) {
                // 重复列：退回原表头，再冲突则带列号
                canonical = false;
                key = if used_keys.contains(&header) {
                    format!("{}_{}", header, column_index + 1)
                } else {
                    header.clone()
                };
            }

            used_keys.insert(key.clone());
            columns.push(ColumnMapping {
                column_index,
                header,
                key,
                canonical,
            });
        }

        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// 未识别为规范字段的表头
    pub fn unmapped_headers(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.canonical)
            .map(|c| c.header.clone())
            .collect()
    }

    /// 映射单行；全空行返回 None
    pub fn map_row(&self, cells: &[String]) -> Option<FieldMap> {
        let mut fields = FieldMap::new();

        for column in &self.columns {
            let raw = cells
                .get(column.column_index)
                .map(|s| s.trim())
                .unwrap_or("");

            let value = if column.canonical && column.key == field_keys::CARRIER {
                normalize_carrier(Some(raw))
                    .map(FieldValue::Text)
                    .unwrap_or(FieldValue::Null)
            } else if column.canonical && NUMERIC_FIELDS.contains(&column.key.as_str()) {
                FieldValue::numeric_or_text(raw)
            } else {
                FieldValue::text(raw)
            };

            fields.insert(column.key.clone(), value);
        }

        if fields.is_blank() {
            None
        } else {
            Some(fields)
        }
    }

    /// 映射表头之后的全部数据行
    pub fn map_rows(&self, grid: &[Vec<String>], header_row_index: usize) -> Vec<MappedRow> {
        grid.iter()
            .enumerate()
            .skip(header_row_index + 1)
            .filter_map(|(idx, cells)| {
                self.map_row(cells).map(|fields| MappedRow {
                    row_number: idx + 1,
                    fields,
                })
            })
            .collect()
    }
}
