// ==========================================
// 订单履约后台 - 操作日志数据仓储
// ==========================================
// 用途: 行变更审计（谁、何时、对哪些行、做了什么）
// 约束: 写入失败由调用方降级为 warn!，不影响业务操作
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
