// ==========================================
// 订单履约后台 - 租户作用域守卫
// ==========================================
// 规则: 显式租户优先；否则询问注入的默认租户解析器；拒绝时返回校验错误
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::tenant_resolver::DefaultTenantResolver;
use crate::domain::types::TenantId;
use tracing::debug;

/// 已解析的租户作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope(TenantId);

impl TenantScope {
    /// 解析本次调用的租户
    ///
    /// # 返回
    /// - Err(ApiError::ValidationError): 未给出租户且解析器拒绝回退
    pub fn resolve(
        explicit: Option<TenantId>,
        resolver: &dyn DefaultTenantResolver,
    ) -> ApiResult<Self> {
        if let Some(tenant_id) = explicit {
            return Ok(Self(tenant_id));
        }
        match resolver.default_tenant() {
            Some(tenant_id) => {
                debug!(tenant_id, "未显式指定租户，使用默认租户");
                Ok(Self(tenant_id))
            }
            None => Err(ApiError::ValidationError(
                "未指定租户，且未配置默认租户".to_string(),
            )),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.0
    }
}
