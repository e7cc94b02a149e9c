// ==========================================
// 订单履约后台 - 流水线配置读取 Trait
// ==========================================
// 职责: 定义导入/匹配/批量写入所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::TenantId;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    // ===== 表头探测 =====

    /// 表头探测扫描行数
    ///
    /// # 默认值
    /// - 10
    async fn get_header_scan_rows(&self) -> Result<usize, Box<dyn Error>>;

    /// 别名表策略最小命中列数（低于此值回退到第 0 行）
    ///
    /// # 默认值
    /// - 3
    async fn get_header_min_matches(&self) -> Result<usize, Box<dyn Error>>;

    // ===== 商品模糊匹配 =====

    /// 相似度下限（评分 <= 下限的候选被丢弃）
    ///
    /// # 默认值
    /// - 0.3
    async fn get_fuzzy_min_rating(&self) -> Result<f64, Box<dyn Error>>;

    /// 候选最大条数
    ///
    /// # 默认值
    /// - 5
    async fn get_fuzzy_max_results(&self) -> Result<usize, Box<dyn Error>>;

    // ===== 批量写入 =====

    /// 逐行批量写入的并发上限
    ///
    /// # 默认值
    /// - 8
    async fn get_bulk_write_concurrency(&self) -> Result<usize, Box<dyn Error>>;

    /// 批次编号冲突最大重试次数
    ///
    /// # 默认值
    /// - 5
    async fn get_batch_number_max_retries(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 租户 =====

    /// 默认租户（未配置时返回 None）
    async fn get_default_tenant_id(&self) -> Result<Option<TenantId>, Box<dyn Error>>;
}
