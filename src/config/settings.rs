// ==========================================
// 订单履约后台 - 流水线配置快照
// ==========================================
// 职责: 启动时一次性读取配置，供同步代码路径使用
// 说明: 快照为纯数据（Send + Clone），API 层持有副本
// ==========================================

use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::domain::types::TenantId;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 流水线配置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub header_scan_rows: usize,
    pub header_min_matches: usize,
    pub fuzzy_min_rating: f64,
    pub fuzzy_max_results: usize,
    pub bulk_write_concurrency: usize,
    pub batch_number_max_retries: u32,
    pub default_tenant_id: Option<TenantId>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            header_scan_rows: 10,
            header_min_matches: 3,
            fuzzy_min_rating: 0.3,
            fuzzy_max_results: 5,
            bulk_write_concurrency: 8,
            batch_number_max_retries: 5,
            default_tenant_id: None,
        }
    }
}

impl PipelineSettings {
    /// 从配置读取器加载快照
    pub async fn load<R>(reader: &R) -> Result<Self, Box<dyn Error>>
    where
        R: PipelineConfigReader + ?Sized,
    {
        Ok(Self {
            header_scan_rows: reader.get_header_scan_rows().await?,
            header_min_matches: reader.get_header_min_matches().await?,
            fuzzy_min_rating: reader.get_fuzzy_min_rating().await?,
            fuzzy_max_results: reader.get_fuzzy_max_results().await?,
            bulk_write_concurrency: reader.get_bulk_write_concurrency().await?,
            batch_number_max_retries: reader.get_batch_number_max_retries().await?,
            default_tenant_id: reader.get_default_tenant_id().await?,
        })
    }
}
