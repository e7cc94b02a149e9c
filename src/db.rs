// ==========================================
// 订单履约后台 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 建库幂等：CREATE TABLE IF NOT EXISTS + ensure_unique_index
// - schema_version 只做提示，不做自动迁移
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FULFILLMENT_DESK_DB_PATH";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 确保唯一索引存在（幂等）
///
/// # 参数
/// - index_name: 索引名
/// - table: 表名
/// - columns: 列名列表
///
/// # 返回
/// - Ok(true): 本次新建
/// - Ok(false): 已存在，未做任何修改
/// - Err: 建索引失败（例如已有重复数据）
pub fn ensure_unique_index(
    conn: &Connection,
    index_name: &str,
    table: &str,
    columns: &[&str],
) -> rusqlite::Result<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 LIMIT 1",
            [index_name],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if exists {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "CREATE UNIQUE INDEX {} ON {} ({});",
        index_name,
        table,
        columns.join(", ")
    ))?;
    info!(index_name, table, "唯一约束已创建");
    Ok(true)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tenant (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS purchase_vendor (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenant(id),
    name TEXT NOT NULL,
    contact_name TEXT,
    phone TEXT,
    email TEXT,
    submit_types TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS product (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenant(id),
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    marketplace_name TEXT,
    sale_price REAL,
    vendor_name TEXT,
    carrier_type TEXT NOT NULL DEFAULT '',
    package_count INTEGER,
    tax_type TEXT,
    category TEXT,
    postage_fee REAL,
    carrier_company TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_batch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenant(id),
    purchase_vendor_id INTEGER NOT NULL REFERENCES purchase_vendor(id),
    batch_number INTEGER NOT NULL,
    batch_date TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_upload (
    upload_id TEXT PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES tenant(id),
    file_name TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    header_row_index INTEGER NOT NULL,
    uploaded_by TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_row (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    upload_id TEXT NOT NULL REFERENCES order_upload(upload_id) ON DELETE CASCADE,
    tenant_id INTEGER NOT NULL REFERENCES tenant(id),
    fields TEXT NOT NULL DEFAULT '{}',
    purchase_vendor_id INTEGER REFERENCES purchase_vendor(id),
    order_batch_id INTEGER REFERENCES order_batch(id),
    is_ordered INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_order_row_tenant_upload ON order_row (tenant_id, upload_id);
CREATE INDEX IF NOT EXISTS idx_order_row_tenant_batch ON order_row (tenant_id, order_batch_id);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    tenant_id INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    target_ids TEXT NOT NULL DEFAULT '[]',
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_tenant_ts ON action_log (tenant_id, action_ts);
"#;

/// 业务唯一约束：(索引名, 表, 列)
const UNIQUE_CONSTRAINTS: &[(&str, &str, &[&str])] = &[
    (
        "uq_product_tenant_name_code_carrier",
        "product",
        &["tenant_id", "name", "code", "carrier_type"],
    ),
    ("uq_vendor_tenant_name", "purchase_vendor", &["tenant_id", "name"]),
    (
        "uq_order_batch_key",
        "order_batch",
        &["tenant_id", "purchase_vendor_id", "batch_number", "batch_date"],
    ),
];

/// 建库（幂等）
///
/// 建表 → 补唯一约束 → 记录 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    for (index_name, table, columns) in UNIQUE_CONSTRAINTS {
        ensure_unique_index(conn, index_name, table, columns)?;
    }

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 高于当前代码版本"
            );
        }
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        _ => {
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
        }
    }
    Ok(())
}

/// 登记租户（已存在时不变）
pub fn ensure_tenant(conn: &Connection, tenant_id: i64, name: &str) -> rusqlite::Result<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tenant (id, name) VALUES (?1, ?2)",
        rusqlite::params![tenant_id, name],
    )?;
    if inserted > 0 {
        info!(tenant_id, name, "租户已登记");
    }
    Ok(())
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./fulfillment_desk.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("fulfillment-desk");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("fulfillment_desk.db");
        }
    }

    path.to_string_lossy().to_string()
}
