// ==========================================
// 订单履约后台 - 运单号表格导入 API
// ==========================================
// 流程: 解析网格 → 按必需表头（订单号 + 运单号）定位表头行 → 读取 (订单号, 承运商, 运单号)
//       → 订单号解析为本租户订单行 → 一次全有或全无的配送信息更新（状态置 배송중）
// 说明: 找不到的订单号只报告，不报错
// ==========================================

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::ApiResult;
use crate::api::order_row_api::OrderRowApi;
use crate::domain::order_row::{field_keys, DeliveryInfoUpdate};
use crate::domain::types::{OrderStatus, RowId, TenantId};
use crate::importer::error::ImportError;
use crate::importer::file_parser::GridParser;
use crate::importer::header_alias::aliases_of;
use crate::importer::header_detector::{
    detect_by_required_headers, locate_column, DEFAULT_REQUIRED_SCAN_ROWS,
};
use crate::repository::order_row_repo::OrderRowRepository;

/// 运单号导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingImportReport {
    pub header_row_index: usize,
    pub updated_ids: Vec<RowId>,
    /// 表格中有、但租户内找不到的订单号
    pub unmatched_order_numbers: Vec<String>,
    /// 订单号或运单号为空而跳过的数据行数
    pub skipped_rows: usize,
}

/// 表格中的一条运单记录
#[derive(Debug, Clone)]
struct TrackingEntry {
    carrier: Option<String>,
    tracking_number: String,
}

pub struct DeliveryImportApi {
    parser: Box<dyn GridParser>,
    row_repo: Arc<OrderRowRepository>,
    row_api: Arc<OrderRowApi>,
}

impl DeliveryImportApi {
    pub fn new(
        parser: Box<dyn GridParser>,
        row_repo: Arc<OrderRowRepository>,
        row_api: Arc<OrderRowApi>,
    ) -> Self {
        Self {
            parser,
            row_repo,
            row_api,
        }
    }

    /// 导入运单号表格
    ///
    /// # 返回
    /// - Err(ImportError::MissingRequiredColumn): 前 6 行内没有同时包含订单号与运单号的表头
    /// - Err(NotFound): 匹配到的行在写入前被删除（整批不写入）
    pub fn import_tracking_sheet(
        &self,
        tenant_id: TenantId,
        file_path: &Path,
        actor: &str,
    ) -> ApiResult<TrackingImportReport> {
        let grid = self.parser.parse_grid(file_path)?;

        let order_aliases = aliases_of(field_keys::ORDER_NUMBER);
        let tracking_aliases = aliases_of(field_keys::TRACKING_NUMBER);
        let header = detect_by_required_headers(
            &grid,
            &[order_aliases, tracking_aliases],
            DEFAULT_REQUIRED_SCAN_ROWS,
        );
        if !header.satisfied {
            return Err(ImportError::MissingRequiredColumn("주문번호 / 운송장번호".to_string()).into());
        }

        let header_row = &grid[header.row_index];
        let (order_col, tracking_col) = match (
            locate_column(header_row, order_aliases),
            locate_column(header_row, tracking_aliases),
        ) {
            (Some(o), Some(t)) => (o, t),
            _ => {
                return Err(
                    ImportError::MissingRequiredColumn("주문번호 / 운송장번호".to_string()).into(),
                )
            }
        };
        let carrier_col = locate_column(header_row, aliases_of(field_keys::CARRIER));

        // 同一订单号多次出现时以最后一条为准
        let mut order_numbers: Vec<String> = Vec::new();
        let mut entries: HashMap<String, TrackingEntry> = HashMap::new();
        let mut skipped_rows = 0usize;
        for row in grid.iter().skip(header.row_index + 1) {
            let cell = |idx: usize| row.get(idx).map(|c| c.trim()).unwrap_or("");
            let order_number = cell(order_col);
            let tracking_number = cell(tracking_col);
            if order_number.is_empty() || tracking_number.is_empty() {
                if row.iter().any(|c| !c.trim().is_empty()) {
                    skipped_rows += 1;
                }
                continue;
            }

            let entry = TrackingEntry {
                carrier: carrier_col
                    .map(cell)
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_string()),
                tracking_number: tracking_number.to_string(),
            };
            if entries.insert(order_number.to_string(), entry).is_none() {
                order_numbers.push(order_number.to_string());
            }
        }
        debug!(
            entries = order_numbers.len(),
            skipped_rows, "运单号表格读取完成"
        );

        let matched = self
            .row_repo
            .find_ids_by_order_numbers(tenant_id, &order_numbers)?;

        let mut updates: Vec<DeliveryInfoUpdate> = Vec::with_capacity(matched.len());
        for (order_number, row_id) in &matched {
            if let Some(entry) = entries.get(order_number) {
                updates.push(DeliveryInfoUpdate {
                    row_id: *row_id,
                    carrier: entry.carrier.clone(),
                    tracking_number: Some(entry.tracking_number.clone()),
                    order_status: Some(OrderStatus::Shipping),
                });
            }
        }

        let matched_numbers: HashSet<&str> = matched.iter().map(|(n, _)| n.as_str()).collect();
        let unmatched_order_numbers: Vec<String> = order_numbers
            .iter()
            .filter(|n| !matched_numbers.contains(n.as_str()))
            .cloned()
            .collect();

        let updated_ids = if updates.is_empty() {
            Vec::new()
        } else {
            self.row_api
                .update_delivery_info(tenant_id, &updates, actor)?
                .ids
        };

        info!(
            tenant_id,
            header_row = header.row_index,
            updated = updated_ids.len(),
            unmatched = unmatched_order_numbers.len(),
            skipped_rows,
            "运单号导入完成"
        );
        Ok(TrackingImportReport {
            header_row_index: header.row_index,
            updated_ids,
            unmatched_order_numbers,
            skipped_rows,
        })
    }
}
