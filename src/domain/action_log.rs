// ==========================================
// 订单履约后台 - 操作日志领域模型
// ==========================================
// 用途: 审计追踪（谁在何时对哪些订单行做了什么）
// 对齐: action_log 表
// ==========================================

use crate::domain::types::TenantId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub tenant_id: TenantId,
    pub action_type: String,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub target_ids: Vec<i64>,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    pub fn new(
        tenant_id: TenantId,
        action_type: ActionType,
        actor: &str,
        target_ids: Vec<i64>,
        payload_json: Option<JsonValue>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            action_type: action_type.to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            target_ids,
            payload_json,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Import,          // 表格导入
    AutoMap,         // 导入后自动映射
    StatusUpdate,    // 批量改状态
    Cancel,          // 取消
    CodeMapping,     // 批量编码映射
    FieldPatch,      // 单行字段修改
    DeliveryUpdate,  // 配送信息更新
    OrderedFlag,     // 发注标记切换
    Delete,          // 批量删除
    BatchDispatch,   // 发注批次分配
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::Import => "IMPORT",
            ActionType::AutoMap => "AUTO_MAP",
            ActionType::StatusUpdate => "STATUS_UPDATE",
            ActionType::Cancel => "CANCEL",
            ActionType::CodeMapping => "CODE_MAPPING",
            ActionType::FieldPatch => "FIELD_PATCH",
            ActionType::DeliveryUpdate => "DELIVERY_UPDATE",
            ActionType::OrderedFlag => "ORDERED_FLAG",
            ActionType::Delete => "DELETE",
            ActionType::BatchDispatch => "BATCH_DISPATCH",
        };
        write!(f, "{}", s)
    }
}
