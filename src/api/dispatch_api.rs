// ==========================================
// 订单履约后台 - 发注批次 API
// ==========================================
// 职责: 按供应商按日分配发注批次号，并把订单行挂到批次上
// 红线: 同 (租户, 供应商, 日期) 下批次号唯一且连续递增
// 并发: 编号在串行化事务内完成；冲突重试耗尽时返回瞬时失败
// ==========================================

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::settings::PipelineSettings;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order_row::OrderRow;
use crate::domain::types::{RowId, TenantId};
use crate::domain::vendor::{BatchAssignment, OrderBatch};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_batch_repo::OrderBatchRepository;
use crate::repository::order_row_repo::{OrderRowRepository, RowFilter};

pub struct DispatchApi {
    batch_repo: Arc<OrderBatchRepository>,
    row_repo: Arc<OrderRowRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    settings: PipelineSettings,
}

impl DispatchApi {
    pub fn new(
        batch_repo: Arc<OrderBatchRepository>,
        row_repo: Arc<OrderRowRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            batch_repo,
            row_repo,
            action_log_repo,
            settings,
        }
    }

    /// 分配发注批次
    ///
    /// # 参数
    /// - batch_date: 批次日期；None 时取本地当天
    ///
    /// # 返回
    /// - Ok(BatchAssignment): 新批次与实际挂接的行
    /// - Err(ValidationError): id 列表为空
    /// - Err(NotFound): 供应商不属于该租户，或没有可挂接的行
    /// - Err(TransientFailure): 编号冲突重试耗尽
    pub fn assign_batch(
        &self,
        tenant_id: TenantId,
        vendor_id: i64,
        row_ids: &[RowId],
        batch_date: Option<NaiveDate>,
        actor: &str,
    ) -> ApiResult<BatchAssignment> {
        if row_ids.is_empty() {
            return Err(ApiError::ValidationError(
                "订单行 id 列表不能为空".to_string(),
            ));
        }
        let batch_date = batch_date.unwrap_or_else(|| Local::now().date_naive());

        let assignment = self.batch_repo.assign_batch(
            tenant_id,
            vendor_id,
            row_ids,
            batch_date,
            self.settings.batch_number_max_retries,
        )?;

        info!(
            tenant_id,
            vendor_id,
            batch_id = assignment.batch.id,
            batch_number = assignment.batch.batch_number,
            linked = assignment.linked_row_ids.len(),
            skipped = row_ids.len().saturating_sub(assignment.linked_row_ids.len()),
            "发注批次分配完成"
        );

        let log = ActionLog::new(
            tenant_id,
            ActionType::BatchDispatch,
            actor,
            assignment.linked_row_ids.clone(),
            Some(serde_json::json!({
                "vendor_id": vendor_id,
                "batch_id": assignment.batch.id,
                "batch_number": assignment.batch.batch_number,
                "batch_date": assignment.batch.batch_date.to_string(),
                "retries": assignment.retries,
            })),
        );
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(error = %e, "记录操作日志失败");
        }

        Ok(assignment)
    }

    pub fn get_batch(&self, tenant_id: TenantId, batch_id: i64) -> ApiResult<OrderBatch> {
        self.batch_repo
            .find_by_id(tenant_id, batch_id)?
            .ok_or_else(|| RepositoryError::not_found("order_batch", batch_id).into())
    }

    /// 列出供应商的批次（可限定日期）
    pub fn list_batches(
        &self,
        tenant_id: TenantId,
        vendor_id: i64,
        batch_date: Option<NaiveDate>,
    ) -> ApiResult<Vec<OrderBatch>> {
        Ok(self
            .batch_repo
            .list_for_vendor(tenant_id, vendor_id, batch_date)?)
    }

    /// 列出挂在某批次上的订单行
    pub fn list_batch_rows(&self, tenant_id: TenantId, batch_id: i64) -> ApiResult<Vec<OrderRow>> {
        let batch = self.get_batch(tenant_id, batch_id)?;
        let filter = RowFilter {
            order_batch_id: Some(batch.id),
            ..Default::default()
        };
        Ok(self.row_repo.list(tenant_id, &filter)?)
    }
}
