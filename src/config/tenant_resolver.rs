// ==========================================
// 订单履约后台 - 默认租户解析
// ==========================================
// 职责: 调用方未显式给出租户时的回退策略（可注入、可关闭）
// 实现: ConfigDefaultTenant（读配置） / StrictTenant（一律拒绝）
// ==========================================

use crate::config::settings::PipelineSettings;
use crate::domain::types::TenantId;

/// 默认租户解析器
pub trait DefaultTenantResolver: Send + Sync {
    /// 返回默认租户；None 表示拒绝回退
    fn default_tenant(&self) -> Option<TenantId>;
}

/// 使用配置项 default_tenant_id 作为回退
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigDefaultTenant {
    tenant_id: Option<TenantId>,
}

impl ConfigDefaultTenant {
    pub fn new(tenant_id: Option<TenantId>) -> Self {
        Self { tenant_id }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.default_tenant_id)
    }
}

impl DefaultTenantResolver for ConfigDefaultTenant {
    fn default_tenant(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// 严格模式：必须显式给出租户
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictTenant;

impl DefaultTenantResolver for StrictTenant {
    fn default_tenant(&self) -> Option<TenantId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolvers() {
        assert_eq!(ConfigDefaultTenant::new(Some(3)).default_tenant(), Some(3));
        assert_eq!(ConfigDefaultTenant::default().default_tenant(), None);
        assert_eq!(StrictTenant.default_tenant(), None);

        let settings = PipelineSettings {
            default_tenant_id: Some(9),
            ..Default::default()
        };
        assert_eq!(ConfigDefaultTenant::from_settings(&settings).default_tenant(), Some(9));
    }
}
