// ==========================================
// 订单履约后台 - 领域类型定义
// ==========================================
// 职责: 订单状态、发注方式等枚举及其存储格式
// 约束: 状态字符串与表格/前端约定一致，不可随意改名
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 租户（公司）ID
pub type TenantId = i64;

/// 订单行 ID
pub type RowId = i64;

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 流转: 未设置 → 공급중 → 발주서 다운 → 사방넷 다운 → 배송중
// 취소 可由任意状态进入，且为终态
// 序列化格式: 韩文原值（与上传表格、row.fields 中一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "공급중")]
    Supplying, // 供货中
    #[serde(rename = "발주서 다운")]
    OrderSheetDownloaded, // 发注单已下载
    #[serde(rename = "사방넷 다운")]
    MarketplaceDownloaded, // 已下载到电商整合工具
    #[serde(rename = "배송중")]
    Shipping, // 配送中
    #[serde(rename = "취소")]
    Cancelled, // 已取消
}

impl OrderStatus {
    /// 允许通过批量接口设置的全部状态（声明顺序即流转顺序）
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Supplying,
        OrderStatus::OrderSheetDownloaded,
        OrderStatus::MarketplaceDownloaded,
        OrderStatus::Shipping,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Supplying => "공급중",
            OrderStatus::OrderSheetDownloaded => "발주서 다운",
            OrderStatus::MarketplaceDownloaded => "사방넷 다운",
            OrderStatus::Shipping => "배송중",
            OrderStatus::Cancelled => "취소",
        }
    }

    /// 解析状态字符串（忽略首尾空白）；不在固定集合内返回 None
    pub fn parse(s: &str) -> Option<OrderStatus> {
        let trimmed = s.trim();
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == trimmed)
    }

    /// 是否终态（常规流程不再流出）
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// 判断 current → next 是否允许
    ///
    /// - current 为 None（未设置）时任意目标均可
    /// - 취소 只能再次被设置为 취소（幂等）
    /// - 其余状态之间由人工批量操作驱动，不限制方向
    pub fn can_transition(current: Option<OrderStatus>, next: OrderStatus) -> bool {
        match current {
            Some(cur) if cur.is_terminal() => next == cur,
            _ => true,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 发注方式 (Submit Type)
// ==========================================
// 向采购供应商传递订单的方式，可多选
// 存储格式: 逗号分隔的大写标签，如 "DOWNLOAD,EMAIL"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitType {
    Download,  // 后台下载发注单
    Email,     // 邮件发送
    Messaging, // 即时消息发送
}

impl SubmitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitType::Download => "DOWNLOAD",
            SubmitType::Email => "EMAIL",
            SubmitType::Messaging => "MESSAGING",
        }
    }

    pub fn parse(s: &str) -> Option<SubmitType> {
        match s.trim().to_uppercase().as_str() {
            "DOWNLOAD" => Some(SubmitType::Download),
            "EMAIL" => Some(SubmitType::Email),
            "MESSAGING" | "KAKAO" => Some(SubmitType::Messaging),
            _ => None,
        }
    }

    /// 编码为存储字符串（去重，保持输入顺序）
    pub fn encode_set(types: &[SubmitType]) -> String {
        let mut seen: Vec<SubmitType> = Vec::with_capacity(types.len());
        for t in types {
            if !seen.contains(t) {
                seen.push(*t);
            }
        }
        seen.iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 从存储字符串解码（未知标签忽略）
    pub fn decode_set(raw: &str) -> Vec<SubmitType> {
        raw.split(',').filter_map(SubmitType::parse).collect()
    }
}

impl fmt::Display for SubmitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
