// ==========================================
// 订单履约后台 - 订单导入 API
// ==========================================
// 职责: 封装订单表格导入（导入器）+ 导入后精确优先自动映射 + 审计
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::ApiResult;
use crate::api::order_row_api::OrderRowApi;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::{RowId, TenantId};
use crate::importer::order_importer::{OrderImportReport, OrderImporter};
use crate::repository::action_log_repo::ActionLogRepository;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    #[serde(flatten)]
    pub report: OrderImportReport,
    /// 导入后被精确映射的行
    pub auto_mapped_ids: Vec<RowId>,
}

pub struct ImportApi {
    importer: OrderImporter,
    row_api: Arc<OrderRowApi>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ImportApi {
    pub fn new(
        importer: OrderImporter,
        row_api: Arc<OrderRowApi>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            importer,
            row_api,
            action_log_repo,
        }
    }

    /// 导入订单表格
    ///
    /// # 参数
    /// - file_path: .xlsx / .xls / .csv 文件路径
    /// - actor: 操作人（记录为上传人）
    ///
    /// # 说明
    /// 自动映射失败不影响已落库的导入结果，只记录告警
    pub fn import_orders(
        &self,
        tenant_id: TenantId,
        file_path: &Path,
        actor: &str,
    ) -> ApiResult<ImportApiResponse> {
        let report = self.importer.import_file(tenant_id, file_path, Some(actor))?;

        let log = ActionLog::new(
            tenant_id,
            ActionType::Import,
            actor,
            report.row_ids.clone(),
            Some(serde_json::json!({
                "upload_id": report.upload_id,
                "file_name": report.file_name,
                "header_row_index": report.header.row_index,
            })),
        );
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }

        let auto_mapped_ids = match self.row_api.auto_map_exact(tenant_id, &report.row_ids, actor) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(tenant_id, upload_id = %report.upload_id, error = %e, "导入后自动映射失败");
                Vec::new()
            }
        };

        info!(
            tenant_id,
            upload_id = %report.upload_id,
            rows = report.row_ids.len(),
            auto_mapped = auto_mapped_ids.len(),
            "订单导入完成"
        );
        Ok(ImportApiResponse {
            report,
            auto_mapped_ids,
        })
    }
}
