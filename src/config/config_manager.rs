// ==========================================
// 订单履约后台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 覆写: 租户 scope（tenant:{id}）优先于 global
// ==========================================

use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::TenantId;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,           // 全局
    Tenant(TenantId), // 租户
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant(id) => format!("tenant:{}", id),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 表头探测
    pub const HEADER_SCAN_ROWS: &str = "header_scan_rows";
    pub const HEADER_MIN_MATCH: &str = "header_min_match";

    // 商品模糊匹配
    pub const FUZZY_MIN_RATING: &str = "fuzzy_min_rating";
    pub const FUZZY_MAX_RESULTS: &str = "fuzzy_max_results";

    // 批量写入
    pub const BULK_WRITE_CONCURRENCY: &str = "bulk_write_concurrency";
    pub const BATCH_NUMBER_MAX_RETRIES: &str = "batch_number_max_retries";

    // 租户
    pub const DEFAULT_TENANT_ID: &str = "default_tenant_id";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    /// 读取时优先查询的租户 scope
    tenant_id: Option<TenantId>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tenant_id: None,
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self {
            conn,
            tenant_id: None,
        })
    }

    /// 返回一个优先读取租户 scope 的视图（共享同一连接）
    pub fn for_tenant(&self, tenant_id: TenantId) -> Self {
        Self {
            conn: self.conn.clone(),
            tenant_id: Some(tenant_id),
        }
    }

    /// 读取指定 scope 的配置值
    pub fn get_scoped_value(
        &self,
        scope: ConfigScope,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取生效配置值：租户 scope → global
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        if let Some(tenant_id) = self.tenant_id {
            if let Some(value) = self.get_scoped_value(ConfigScope::Tenant(tenant_id), key)? {
                return Ok(Some(value));
            }
        }
        self.get_scoped_value(ConfigScope::Global, key)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_scoped_value(ConfigScope::Global, key)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(
        &self,
        scope: ConfigScope,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope.scope_id(), key, value],
        )?;
        Ok(())
    }

    /// 获取某 scope 全部配置的快照（JSON 格式）
    pub fn get_config_snapshot(&self, scope: ConfigScope) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![scope.scope_id()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置；缺失或解析失败时回退到默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key, value = %raw, default = ?default, "配置值无法解析，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

#[async_trait]
impl PipelineConfigReader for ConfigManager {
    // ===== 表头探测 =====

    async fn get_header_scan_rows(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_parsed_or_default(config_keys::HEADER_SCAN_ROWS, 10usize)?;
        Ok(value.max(1))
    }

    async fn get_header_min_matches(&self) -> Result<usize, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::HEADER_MIN_MATCH, 3usize)
    }

    // ===== 商品模糊匹配 =====

    async fn get_fuzzy_min_rating(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_parsed_or_default(config_keys::FUZZY_MIN_RATING, 0.3f64)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            warn!(value, "fuzzy_min_rating 超出 [0, 1]，使用默认值");
            Ok(0.3)
        }
    }

    async fn get_fuzzy_max_results(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_parsed_or_default(config_keys::FUZZY_MAX_RESULTS, 5usize)?;
        Ok(value.max(1))
    }

    // ===== 批量写入 =====

    async fn get_bulk_write_concurrency(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_parsed_or_default(config_keys::BULK_WRITE_CONCURRENCY, 8usize)?;
        Ok(value.max(1))
    }

    async fn get_batch_number_max_retries(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::BATCH_NUMBER_MAX_RETRIES, 5u32)
    }

    // ===== 租户 =====

    async fn get_default_tenant_id(&self) -> Result<Option<TenantId>, Box<dyn Error>> {
        match self.get_config_value(config_keys::DEFAULT_TENANT_ID)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => match raw.trim().parse::<TenantId>() {
                Ok(id) => Ok(Some(id)),
                Err(_) => {
                    warn!(value = %raw, "default_tenant_id 无法解析，视为未配置");
                    Ok(None)
                }
            },
        }
    }
}
