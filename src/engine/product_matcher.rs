// ==========================================
// 订单履约后台 - 商品编码匹配引擎
// ==========================================
// 精确优先: 行内显式 productId → 映射编码精确相等
// 模糊兜底: Dice 系数（字符二元组）与租户内全部商品名比较
//   - 评分 <= 下限丢弃
//   - 按评分降序，取前 N
//   - 再按 code 去重，保留评分最高者
// 约束: 纯计算；目录由调用方一次读入
// ==========================================

use crate::config::settings::PipelineSettings;
use crate::domain::order_row::{field_keys, FieldMap};
use crate::domain::product::Product;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// 默认相似度下限
pub const DEFAULT_MIN_RATING: f64 = 0.3;

/// 默认候选条数
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// 模糊匹配候选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product: Product,
    pub rating: f64,
}

/// 精确匹配依据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExactMatchKind {
    ProductId,
    Code,
}

// ==========================================
// ProductMatcher - 商品编码匹配器
// ==========================================
#[derive(Debug, Clone)]
pub struct ProductMatcher {
    min_rating: f64,
    max_results: usize,
}

impl Default for ProductMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RATING, DEFAULT_MAX_RESULTS)
    }
}

impl ProductMatcher {
    pub fn new(min_rating: f64, max_results: usize) -> Self {
        Self {
            min_rating,
            max_results,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.fuzzy_min_rating, settings.fuzzy_max_results)
    }

    /// 相似度评分（Dice 二元组，区分大小写，忽略空白）
    pub fn rating(query: &str, name: &str) -> f64 {
        strsim::sorensen_dice(query, name)
    }

    // ==========================================
    // 精确匹配
    // ==========================================

    /// 按行字段精确匹配商品
    ///
    /// # 规则
    /// 1. 行内 productId 命中目录 id
    /// 2. 行内映射编码与目录 code 精确相等（多条同码时取第一条）
    pub fn resolve_exact<'a>(
        &self,
        fields: &FieldMap,
        catalog: &'a [Product],
    ) -> Option<(&'a Product, ExactMatchKind)> {
        if let Some(product_id) = fields.get(field_keys::PRODUCT_ID).and_then(|v| v.as_i64()) {
            if let Some(product) = catalog.iter().find(|p| p.id == product_id) {
                return Some((product, ExactMatchKind::ProductId));
            }
        }

        let code = fields.get_text(field_keys::MAPPING_CODE)?;
        catalog
            .iter()
            .find(|p| p.code == code)
            .map(|p| (p, ExactMatchKind::Code))
    }

    // ==========================================
    // 模糊匹配
    // ==========================================

    /// 按商品名模糊搜索
    ///
    /// # 返回
    /// - 评分降序的候选；没有候选时返回空列表（不是错误）
    pub fn search(&self, query: &str, catalog: &[Product]) -> Vec<ProductMatch> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ProductMatch> = catalog
            .iter()
            .map(|product| ProductMatch {
                rating: Self::rating(query, &product.name),
                product: product.clone(),
            })
            .filter(|m| m.rating > self.min_rating)
            .collect();

        // 稳定排序：同分时保留目录顺序
        scored.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.max_results);

        let mut seen_codes: HashSet<String> = HashSet::new();
        scored.retain(|m| seen_codes.insert(m.product.code.clone()));

        debug!(query, candidates = scored.len(), "商品模糊匹配完成");
        scored
    }

    /// 精确优先，失败时取模糊匹配的最高分候选
    pub fn best_for_row<'a>(&self, fields: &FieldMap, catalog: &'a [Product]) -> Option<&'a Product> {
        if let Some((product, _)) = self.resolve_exact(fields, catalog) {
            return Some(product);
        }
        let name = fields.get_text(field_keys::PRODUCT_NAME)?;
        let best = self.search(&name, catalog).into_iter().next()?;
        catalog.iter().find(|p| p.id == best.product.id)
    }
}

/// 选择列表去重：同 code 只保留一条，优先有电商整合工具商品名的那条
///
/// 输出保持各 code 首次出现的顺序
pub fn dedupe_for_selection(products: &[Product]) -> Vec<Product> {
    let mut result: Vec<Product> = Vec::new();
    for product in products {
        match result.iter_mut().find(|p| p.code == product.code) {
            Some(existing) => {
                if !existing.has_marketplace_name() && product.has_marketplace_name() {
                    *existing = product.clone();
                }
            }
            None => result.push(product.clone()),
        }
    }
    result
}
