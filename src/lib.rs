// ==========================================
// 订单履约后台 - 核心库
// ==========================================
// 职责: 多租户订单表格归一化、订单行状态机、商品编码匹配、发注批次编号
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则（纯计算）
pub mod engine;

// 导入层 - 外部表格
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, RowId, SubmitType, TenantId};

// 领域实体
pub use domain::{
    ActionLog, ActionType, DeliveryInfoUpdate, FieldMap, FieldValue, OrderBatch, OrderRow,
    Product, ProductMapping, PurchaseVendor,
};

// 引擎
pub use engine::{ProductMatch, ProductMatcher};

// API
pub use api::{ApiError, ApiResult, DispatchApi, OrderRowApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "订单履约后台";
