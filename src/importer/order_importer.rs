// ==========================================
// 订单履约后台 - 订单表格导入器
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解析网格 → 探测表头行（别名表策略）→ 字段映射 → 上传批次 + 订单行落库（单事务）
// ==========================================

use crate::config::settings::PipelineSettings;
use crate::domain::order_row::{NewOrderRow, OrderUpload};
use crate::domain::types::{RowId, TenantId};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::RowFieldMapper;
use crate::importer::file_parser::GridParser;
use crate::importer::header_detector::{detect_by_alias_table, HeaderDetection};
use crate::repository::OrderRowRepository;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderImportReport {
    pub upload_id: String,
    pub tenant_id: TenantId,
    pub file_name: String,
    pub row_ids: Vec<RowId>,
    pub header: HeaderDetection,
    /// 未识别为规范字段、按原文保留的表头
    pub unmapped_headers: Vec<String>,
    pub elapsed_ms: u64,
}

// ==========================================
// OrderImporter - 订单表格导入器
// ==========================================
pub struct OrderImporter {
    parser: Box<dyn GridParser>,
    row_repo: Arc<OrderRowRepository>,
    settings: PipelineSettings,
}

impl OrderImporter {
    /// 创建新的导入器
    ///
    /// # 参数
    /// - parser: 网格解析器
    /// - row_repo: 订单行仓储
    /// - settings: 配置快照（表头扫描行数、最小命中数）
    pub fn new(
        parser: Box<dyn GridParser>,
        row_repo: Arc<OrderRowRepository>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            parser,
            row_repo,
            settings,
        }
    }

    /// 导入一个订单表格
    ///
    /// # 返回
    /// - Ok(OrderImportReport): 上传批次 id、新行 id、表头位置
    /// - Err(ImportError): 文件/表头/落库错误（落库失败时不会留下部分行）
    #[instrument(skip(self, file_path), fields(tenant_id))]
    pub fn import_file(
        &self,
        tenant_id: TenantId,
        file_path: &Path,
        uploaded_by: Option<&str>,
    ) -> ImportResult<OrderImportReport> {
        let start_time = Instant::now();
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        info!(tenant_id, file_name = %file_name, "开始导入订单表格");

        // === 步骤 1: 解析网格 ===
        let grid = self.parser.parse_grid(file_path)?;
        debug!(rows = grid.len(), "网格解析完成");

        // === 步骤 2: 探测表头行 ===
        let header = detect_by_alias_table(
            &grid,
            self.settings.header_scan_rows,
            self.settings.header_min_matches,
        );
        if !header.satisfied {
            warn!(
                match_count = header.match_count,
                min_matches = self.settings.header_min_matches,
                "表头命中不足，按第 0 行作为表头"
            );
        }

        let header_row = grid.get(header.row_index).ok_or(ImportError::HeaderRowNotFound {
            scanned: self.settings.header_scan_rows,
        })?;

        // === 步骤 3: 字段映射 ===
        let mapper = RowFieldMapper::from_header_row(header_row);
        if mapper.columns().iter().all(|c| !c.canonical) {
            return Err(ImportError::HeaderRowNotFound {
                scanned: self.settings.header_scan_rows,
            });
        }

        let mapped = mapper.map_rows(&grid, header.row_index);
        if mapped.is_empty() {
            return Err(ImportError::EmptySheet(file_name));
        }
        let unmapped_headers = mapper.unmapped_headers();
        debug!(
            rows = mapped.len(),
            unmapped = unmapped_headers.len(),
            "字段映射完成"
        );

        // === 步骤 4: 落库（单事务）===
        let upload = OrderUpload {
            upload_id: Uuid::new_v4().to_string(),
            tenant_id,
            file_name: file_name.clone(),
            row_count: mapped.len() as i64,
            header_row_index: header.row_index as i64,
            uploaded_by: uploaded_by.map(|s| s.to_string()),
            created_at: Local::now().naive_local(),
        };
        let rows: Vec<NewOrderRow> = mapped
            .into_iter()
            .map(|m| NewOrderRow {
                fields: m.fields,
                purchase_vendor_id: None,
            })
            .collect();

        let row_ids = self.row_repo.insert_upload(&upload, &rows)?;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            tenant_id,
            upload_id = %upload.upload_id,
            rows = row_ids.len(),
            header_row = header.row_index,
            elapsed_ms,
            "订单表格导入完成"
        );

        Ok(OrderImportReport {
            upload_id: upload.upload_id,
            tenant_id,
            file_name,
            row_ids,
            header,
            unmapped_headers,
            elapsed_ms,
        })
    }
}
