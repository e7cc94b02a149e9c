// ==========================================
// 订单履约后台 - 表头行探测
// ==========================================
// 职责: 在表格前 N 行中定位真正的表头行
// 策略 A: 必需表头齐全（单元格包含别名即算命中），最早的完整行立即返回
// 策略 B: 别名表精确命中计数，取最高者；低于最小命中数回退到第 0 行
// 约束: 只读、确定性；短行/空行视为不命中，不报错
// ==========================================

use crate::importer::header_alias::{normalize_header, resolve_normalized};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 策略 A 默认扫描行数
pub const DEFAULT_REQUIRED_SCAN_ROWS: usize = 6;

/// 策略 B 默认扫描行数
pub const DEFAULT_ALIAS_SCAN_ROWS: usize = 10;

/// 策略 B 默认最小命中列数
pub const DEFAULT_MIN_ALIAS_MATCHES: usize = 3;

/// 探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDetection {
    /// 表头行下标（0 起）
    pub row_index: usize,
    /// 该行命中数
    pub match_count: usize,
    /// 是否满足策略的完整条件（策略 A: 全部必需表头；策略 B: 达到最小命中数）
    pub satisfied: bool,
}

impl HeaderDetection {
    fn fallback() -> Self {
        Self {
            row_index: 0,
            match_count: 0,
            satisfied: false,
        }
    }
}

// ==========================================
// 策略 A: 必需表头齐全
// ==========================================

/// 按必需表头探测表头行
///
/// # 参数
/// - grid: 表格单元格（按行）
/// - required: 必需表头，每项是一组可接受的别名
/// - max_rows: 扫描的最大行数
///
/// # 返回
/// - 第一个包含全部必需表头的行
/// - 否则命中数最多的行（并列取最早）；若最多命中也为 0，回退到第 0 行
pub fn detect_by_required_headers(
    grid: &[Vec<String>],
    required: &[&[&str]],
    max_rows: usize,
) -> HeaderDetection {
    let normalized_required: Vec<Vec<String>> = required
        .iter()
        .map(|aliases| {
            aliases
                .iter()
                .map(|a| normalize_header(a))
                .filter(|a| !a.is_empty())
                .collect()
        })
        .collect();

    let mut best = HeaderDetection::fallback();

    for (row_index, row) in grid.iter().take(max_rows).enumerate() {
        let cells: Vec<String> = row.iter().map(|c| normalize_header(c)).collect();

        let match_count = normalized_required
            .iter()
            .filter(|aliases| {
                cells.iter().any(|cell| {
                    !cell.is_empty() && aliases.iter().any(|alias| cell.contains(alias.as_str()))
                })
            })
            .count();

        if !normalized_required.is_empty() && match_count == normalized_required.len() {
            debug!(row_index, match_count, "表头行探测(必需表头): 命中完整行");
            return HeaderDetection {
                row_index,
                match_count,
                satisfied: true,
            };
        }

        if match_count > best.match_count {
            best = HeaderDetection {
                row_index,
                match_count,
                satisfied: false,
            };
        }
    }

    debug!(
        row_index = best.row_index,
        match_count = best.match_count,
        required = normalized_required.len(),
        "表头行探测(必需表头): 无完整行，使用最佳部分命中行"
    );
    best
}

// ==========================================
// 策略 B: 别名表 + 最小命中数
// ==========================================

/// 按别名表探测表头行
///
/// # 参数
/// - grid: 表格单元格（按行）
/// - max_rows: 扫描的最大行数
/// - min_matches: 最小命中列数（低于此值回退到第 0 行）
pub fn detect_by_alias_table(
    grid: &[Vec<String>],
    max_rows: usize,
    min_matches: usize,
) -> HeaderDetection {
    let mut best = HeaderDetection::fallback();

    for (row_index, row) in grid.iter().take(max_rows).enumerate() {
        let match_count = row
            .iter()
            .map(|c| normalize_header(c))
            .filter(|c| !c.is_empty() && resolve_normalized(c).is_some())
            .count();

        if match_count > best.match_count {
            best = HeaderDetection {
                row_index,
                match_count,
                satisfied: false,
            };
        }
    }

    if best.match_count < min_matches {
        debug!(
            best_row = best.row_index,
            best_count = best.match_count,
            min_matches,
            "表头行探测(别名表): 命中不足，回退到第 0 行"
        );
        return HeaderDetection {
            row_index: 0,
            match_count: best.match_count,
            satisfied: false,
        };
    }

    best.satisfied = true;
    best
}

// ==========================================
// 列定位
// ==========================================

/// 在表头行中定位包含任一别名的第一列（与策略 A 的命中规则一致）
pub fn locate_column(header_row: &[String], aliases: &[&str]) -> Option<usize> {
    let aliases: Vec<String> = aliases
        .iter()
        .map(|a| normalize_header(a))
        .filter(|a| !a.is_empty())
        .collect();
    header_row.iter().position(|cell| {
        let cell = normalize_header(cell);
        !cell.is_empty() && aliases.iter().any(|alias| cell.contains(alias.as_str()))
    })
}
