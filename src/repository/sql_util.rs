// ==========================================
// 订单履约后台 - SQL 构建工具
// ==========================================
// 职责: 批量 id 操作的 IN 子句与参数拼装
// 约束: 列表整体作为一个 JSON 数组参数绑定，经 json_each 展开；
//       参数个数与列表长度无关，不受 SQLite 变量上限约束
// ==========================================

use crate::repository::error::RepositoryResult;
use rusqlite::types::Value;

/// id 去重（保持首次出现顺序）
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// id 列表 → JSON 数组文本参数
///
/// # 示例
/// ```
/// use fulfillment_desk::repository::sql_util::id_list_param;
/// use rusqlite::types::Value;
///
/// assert_eq!(id_list_param(&[3, 1]), Value::Text("[3,1]".to_string()));
/// assert_eq!(id_list_param(&[]), Value::Text("[]".to_string()));
/// ```
pub fn id_list_param(ids: &[i64]) -> Value {
    let body: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    Value::Text(format!("[{}]", body.join(",")))
}

/// 文本列表 → JSON 数组文本参数
pub fn text_list_param(values: &[String]) -> RepositoryResult<Value> {
    Ok(Value::Text(serde_json::to_string(values)?))
}

/// 构建 `{prefix} AND {column} IN (SELECT value FROM json_each(?))` 形式的语句与参数
///
/// # 参数
/// - `prefix`: 含前置条件的语句（已带 WHERE）
/// - `leading`: 前置条件的参数
/// - `column`: IN 子句的列名
/// - `ids`: id 列表
/// - `suffix`: 追加在 IN 子句后的片段（例如 RETURNING / ORDER BY）
pub fn build_id_in_sql(
    prefix: &str,
    leading: Vec<Value>,
    column: &str,
    ids: &[i64],
    suffix: &str,
) -> (String, Vec<Value>) {
    let sql = format!(
        "{} AND {} IN (SELECT value FROM json_each(?)) {}",
        prefix, column, suffix
    );
    let mut params = leading;
    params.push(id_list_param(ids));
    (sql, params)
}
