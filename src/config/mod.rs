// ==========================================
// 订单履约后台 - 配置层
// ==========================================
// 职责: 系统配置管理,支持 global / 租户两级覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pipeline_config_trait;
pub mod settings;
pub mod tenant_resolver;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ConfigScope};
pub use pipeline_config_trait::PipelineConfigReader;
pub use settings::PipelineSettings;
pub use tenant_resolver::{ConfigDefaultTenant, DefaultTenantResolver, StrictTenant};
