// ==========================================
// 订单履约后台 - 订单行 API
// ==========================================
// 职责: 订单行状态机与字段写入（改状态/取消/编码映射/字段补丁/配送信息）
// 红线: 每个写操作都限定租户；跨租户的行视为不存在
// 红线: 编码映射不覆盖 productName
// 红线: 配送信息更新全有或全无
// 审计: 写操作尽力记录 ActionLog，失败只告警
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::settings::PipelineSettings;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order_row::{DeliveryInfoUpdate, FieldMap, OrderRow};
use crate::domain::product::ProductMapping;
use crate::domain::types::{OrderStatus, RowId, TenantId};
use crate::engine::product_matcher::ProductMatcher;
use crate::engine::row_state::{
    delivery_patch, mapping_patch, plan_status_update, MAPPING_PROTECTED_FIELDS,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_row_repo::{OrderRowRepository, RowFilter};
use crate::repository::product_repo::ProductRepository;
use crate::repository::vendor_repo::PurchaseVendorRepository;

// ==========================================
// 请求 / 响应类型
// ==========================================

/// 批量写入结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    pub count: usize,
    pub ids: Vec<RowId>,
}

impl BulkUpdateResult {
    fn from_ids(ids: Vec<RowId>) -> Self {
        Self {
            count: ids.len(),
            ids,
        }
    }
}

/// 单行编码映射请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMappingUpdate {
    pub row_id: RowId,
    pub mapping: ProductMapping,
}

/// 单行写入失败明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowWriteFailure {
    pub row_id: RowId,
    pub error: String,
}

/// 编码映射批量结果（区分未找到与写入失败）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeMappingReport {
    pub updated_ids: Vec<RowId>,
    pub not_found_ids: Vec<RowId>,
    pub failed: Vec<RowWriteFailure>,
}

// ==========================================
// OrderRowApi - 订单行 API
// ==========================================
pub struct OrderRowApi {
    row_repo: Arc<OrderRowRepository>,
    product_repo: Arc<ProductRepository>,
    vendor_repo: Arc<PurchaseVendorRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    settings: PipelineSettings,
}

impl OrderRowApi {
    pub fn new(
        row_repo: Arc<OrderRowRepository>,
        product_repo: Arc<ProductRepository>,
        vendor_repo: Arc<PurchaseVendorRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            row_repo,
            product_repo,
            vendor_repo,
            action_log_repo,
            settings,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_row(&self, tenant_id: TenantId, row_id: RowId) -> ApiResult<OrderRow> {
        self.row_repo
            .find_by_id(tenant_id, row_id)?
            .ok_or_else(|| RepositoryError::not_found("order_row", row_id).into())
    }

    /// 按上传批次 / 状态 / 发注批次等条件列出订单行
    pub fn list_rows(&self, tenant_id: TenantId, filter: &RowFilter) -> ApiResult<Vec<OrderRow>> {
        Ok(self.row_repo.list(tenant_id, filter)?)
    }

    // ==========================================
    // 状态
    // ==========================================

    /// 批量改状态
    ///
    /// # 规则
    /// - 单语句更新；不存在或非本租户的 id 静默排除
    /// - 已取消的行保持 취소（目标为 취소 时除外）
    ///
    /// # 返回
    /// - Ok(BulkUpdateResult): 实际更新的行
    /// - Err(NotFound): 一行都不属于该租户
    #[instrument(skip(self, row_ids), fields(rows = row_ids.len()))]
    pub fn update_status(
        &self,
        tenant_id: TenantId,
        row_ids: &[RowId],
        target: OrderStatus,
        actor: &str,
    ) -> ApiResult<BulkUpdateResult> {
        ensure_ids(row_ids)?;
        let plan = plan_status_update(target);

        let updated = self
            .row_repo
            .update_status(tenant_id, row_ids, plan.target, plan.skip_status)?;

        if updated.is_empty() {
            // 区分"全部被终态保护跳过"与"一行都不存在"
            let existing = self.row_repo.find_by_ids(tenant_id, row_ids)?;
            if existing.is_empty() {
                return Err(not_found_rows(row_ids));
            }
        }

        info!(
            tenant_id,
            target = %target,
            requested = row_ids.len(),
            updated = updated.len(),
            "批量改状态完成"
        );
        self.record(
            ActionLog::new(
                tenant_id,
                ActionType::StatusUpdate,
                actor,
                updated.clone(),
                Some(serde_json::json!({ "target": target.as_str() })),
            ),
        );
        Ok(BulkUpdateResult::from_ids(updated))
    }

    /// 取消订单行（无条件置为 취소，幂等）
    ///
    /// 返回的 id 集合包含原本已取消的行
    pub fn cancel_rows(
        &self,
        tenant_id: TenantId,
        row_ids: &[RowId],
        actor: &str,
    ) -> ApiResult<BulkUpdateResult> {
        ensure_ids(row_ids)?;
        let plan = plan_status_update(OrderStatus::Cancelled);

        let cancelled = self
            .row_repo
            .update_status(tenant_id, row_ids, plan.target, plan.skip_status)?;
        if cancelled.is_empty() {
            return Err(not_found_rows(row_ids));
        }

        info!(tenant_id, cancelled = cancelled.len(), "订单行已取消");
        self.record(ActionLog::new(
            tenant_id,
            ActionType::Cancel,
            actor,
            cancelled.clone(),
            None,
        ));
        Ok(BulkUpdateResult::from_ids(cancelled))
    }

    // ==========================================
    // 编码映射
    // ==========================================

    /// 批量编码映射（逐行写入，有界并发）
    ///
    /// # 规则
    /// - 映射负载覆盖编码、承运类型、包裹数、价格、承运商、运费等字段
    /// - productName 永远保留行自身的原始值
    /// - 负载带供应商名且租户内存在该供应商时，同时更新采购供应商
    ///
    /// # 返回
    /// - Ok(CodeMappingReport): 成功 / 未找到 / 失败 分类汇总
    /// - Err(NotFound): 所有行都不存在
    #[instrument(skip(self, updates), fields(rows = updates.len()))]
    pub async fn update_code_mapping(
        &self,
        tenant_id: TenantId,
        updates: Vec<CodeMappingUpdate>,
        actor: &str,
    ) -> ApiResult<CodeMappingReport> {
        if updates.is_empty() {
            return Err(ApiError::ValidationError(
                "编码映射列表不能为空".to_string(),
            ));
        }
        let requested: Vec<RowId> = updates.iter().map(|u| u.row_id).collect();
        let concurrency = self.settings.bulk_write_concurrency.max(1);

        let outcomes: Vec<(RowId, RepositoryResult<Option<FieldMap>>)> =
            stream::iter(updates)
                .map(|update| {
                    let row_repo = Arc::clone(&self.row_repo);
                    let vendor_repo = Arc::clone(&self.vendor_repo);
                    async move {
                        let row_id = update.row_id;
                        let joined = tokio::task::spawn_blocking(move || {
                            write_mapping(&row_repo, &vendor_repo, tenant_id, &update)
                        })
                        .await;
                        let result = match joined {
                            Ok(result) => result,
                            Err(e) => Err(RepositoryError::InternalError(e.to_string())),
                        };
                        (row_id, result)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut report = CodeMappingReport::default();
        for (row_id, outcome) in outcomes {
            match outcome {
                Ok(Some(_)) => report.updated_ids.push(row_id),
                Ok(None) => report.not_found_ids.push(row_id),
                Err(e) => {
                    warn!(tenant_id, row_id, error = %e, "编码映射写入失败");
                    report.failed.push(RowWriteFailure {
                        row_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.updated_ids.sort_unstable();
        report.not_found_ids.sort_unstable();
        report.failed.sort_by_key(|f| f.row_id);

        if report.updated_ids.is_empty() && report.failed.is_empty() {
            return Err(not_found_rows(&requested));
        }

        info!(
            tenant_id,
            updated = report.updated_ids.len(),
            not_found = report.not_found_ids.len(),
            failed = report.failed.len(),
            "批量编码映射完成"
        );
        self.record(ActionLog::new(
            tenant_id,
            ActionType::CodeMapping,
            actor,
            report.updated_ids.clone(),
            Some(serde_json::json!({
                "not_found": report.not_found_ids,
                "failed": report.failed.len(),
            })),
        ));
        Ok(report)
    }

    /// 精确优先自动映射（导入后调用）
    ///
    /// 只处理行内带 productId 或与目录编码精确相等的行；模糊候选不自动写入
    ///
    /// # 返回
    /// - 被映射的行 id
    pub fn auto_map_exact(
        &self,
        tenant_id: TenantId,
        row_ids: &[RowId],
        actor: &str,
    ) -> ApiResult<Vec<RowId>> {
        if row_ids.is_empty() {
            return Ok(Vec::new());
        }
        let catalog = self.product_repo.list_by_tenant(tenant_id)?;
        if catalog.is_empty() {
            debug!(tenant_id, "商品目录为空，跳过自动映射");
            return Ok(Vec::new());
        }

        let matcher = ProductMatcher::from_settings(&self.settings);
        let rows = self.row_repo.find_by_ids(tenant_id, row_ids)?;

        let mut mapped = Vec::new();
        for row in &rows {
            let Some((product, kind)) = matcher.resolve_exact(&row.fields, &catalog) else {
                continue;
            };
            let patch = mapping_patch(&product.to_mapping());
            if self
                .row_repo
                .apply_patch(tenant_id, row.id, &patch, MAPPING_PROTECTED_FIELDS, None)?
                .is_some()
            {
                debug!(row_id = row.id, product_id = product.id, ?kind, "自动映射");
                mapped.push(row.id);
            }
        }

        if !mapped.is_empty() {
            info!(tenant_id, mapped = mapped.len(), "导入后自动映射完成");
            self.record(ActionLog::new(
                tenant_id,
                ActionType::AutoMap,
                actor,
                mapped.clone(),
                None,
            ));
        }
        Ok(mapped)
    }

    // ==========================================
    // 字段补丁
    // ==========================================

    /// 单行字段合并（浅合并，后写覆盖）
    ///
    /// # 返回
    /// - Ok(FieldMap): 合并后的完整字段
    pub fn patch_row(
        &self,
        tenant_id: TenantId,
        row_id: RowId,
        patch: &FieldMap,
        actor: &str,
    ) -> ApiResult<FieldMap> {
        if patch.is_empty() {
            return Err(ApiError::ValidationError("字段补丁不能为空".to_string()));
        }

        let merged = self
            .row_repo
            .apply_patch(tenant_id, row_id, patch, &[], None)?
            .ok_or_else(|| ApiError::from(RepositoryError::not_found("order_row", row_id)))?;

        let keys: Vec<&String> = patch.keys().collect();
        self.record(ActionLog::new(
            tenant_id,
            ActionType::FieldPatch,
            actor,
            vec![row_id],
            Some(serde_json::json!({ "keys": keys })),
        ));
        Ok(merged)
    }

    // ==========================================
    // 配送信息
    // ==========================================

    /// 批量更新配送信息（全有或全无）
    ///
    /// # 返回
    /// - Err(NotFound): 任一行不存在，整批不写入
    #[instrument(skip(self, updates), fields(rows = updates.len()))]
    pub fn update_delivery_info(
        &self,
        tenant_id: TenantId,
        updates: &[DeliveryInfoUpdate],
        actor: &str,
    ) -> ApiResult<BulkUpdateResult> {
        if updates.is_empty() {
            return Err(ApiError::ValidationError(
                "配送信息列表不能为空".to_string(),
            ));
        }

        let patches: Vec<(RowId, FieldMap)> = updates
            .iter()
            .map(|u| (u.row_id, delivery_patch(u)))
            .collect();
        let updated = self.row_repo.apply_patches_atomic(tenant_id, &patches)?;

        info!(tenant_id, updated = updated.len(), "配送信息更新完成");
        self.record(ActionLog::new(
            tenant_id,
            ActionType::DeliveryUpdate,
            actor,
            updated.clone(),
            None,
        ));
        Ok(BulkUpdateResult::from_ids(updated))
    }

    // ==========================================
    // 发注标记 / 删除
    // ==========================================

    pub fn set_ordered_flag(
        &self,
        tenant_id: TenantId,
        row_ids: &[RowId],
        is_ordered: bool,
        actor: &str,
    ) -> ApiResult<BulkUpdateResult> {
        ensure_ids(row_ids)?;
        let updated = self.row_repo.set_ordered(tenant_id, row_ids, is_ordered)?;
        if updated.is_empty() {
            return Err(not_found_rows(row_ids));
        }

        self.record(ActionLog::new(
            tenant_id,
            ActionType::OrderedFlag,
            actor,
            updated.clone(),
            Some(serde_json::json!({ "is_ordered": is_ordered })),
        ));
        Ok(BulkUpdateResult::from_ids(updated))
    }

    pub fn bulk_delete(
        &self,
        tenant_id: TenantId,
        row_ids: &[RowId],
        actor: &str,
    ) -> ApiResult<BulkUpdateResult> {
        ensure_ids(row_ids)?;
        let deleted = self.row_repo.delete_rows(tenant_id, row_ids)?;
        if deleted.is_empty() {
            return Err(not_found_rows(row_ids));
        }

        info!(tenant_id, deleted = deleted.len(), "订单行已删除");
        self.record(ActionLog::new(
            tenant_id,
            ActionType::Delete,
            actor,
            deleted.clone(),
            None,
        ));
        Ok(BulkUpdateResult::from_ids(deleted))
    }

    // ==========================================
    // 内部工具
    // ==========================================

    /// 尽力记录操作日志
    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }
}

/// 单行编码映射写入（阻塞，运行在 spawn_blocking 中）
fn write_mapping(
    row_repo: &OrderRowRepository,
    vendor_repo: &PurchaseVendorRepository,
    tenant_id: TenantId,
    update: &CodeMappingUpdate,
) -> RepositoryResult<Option<FieldMap>> {
    let vendor_id = match update.mapping.vendor_name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            vendor_repo.find_by_name(tenant_id, name)?.map(|v| v.id)
        }
        _ => None,
    };
    let patch = mapping_patch(&update.mapping);
    row_repo.apply_patch(
        tenant_id,
        update.row_id,
        &patch,
        MAPPING_PROTECTED_FIELDS,
        vendor_id,
    )
}

fn ensure_ids(row_ids: &[RowId]) -> ApiResult<()> {
    if row_ids.is_empty() {
        return Err(ApiError::ValidationError(
            "订单行 id 列表不能为空".to_string(),
        ));
    }
    Ok(())
}

fn not_found_rows(row_ids: &[RowId]) -> ApiError {
    let unique: HashSet<&RowId> = row_ids.iter().collect();
    ApiError::NotFound(format!("订单行均不存在（共 {} 个 id）", unique.len()))
}
