// ==========================================
// 订单履约后台 - 表头别名解析
// ==========================================
// 职责: 任意表格表头 → 规范字段键
// 规则: 去除全部空白 + 小写后与别名表精确比较；不做模糊匹配
// 冲突: 按字段声明顺序，先声明者优先
// ==========================================

use crate::domain::order_row::field_keys;

/// 规范字段 → 已知表头别名（声明顺序即优先级）
pub static HEADER_ALIASES: &[(&str, &[&str])] = &[
    (
        field_keys::ORDER_NUMBER,
        &["주문번호", "쇼핑몰주문번호", "주문코드", "order no", "order number", "orderNumber"],
    ),
    (
        field_keys::PRODUCT_NAME,
        &["상품명", "제품명", "품목명", "주문상품명", "product name", "productName"],
    ),
    (field_keys::OPTION_NAME, &["옵션명", "옵션", "옵션정보", "option"]),
    (
        field_keys::MAPPING_CODE,
        &["매핑코드", "상품코드", "자체상품코드", "mapping code", "code"],
    ),
    (field_keys::PRODUCT_ID, &["상품id", "product id", "productId"]),
    (field_keys::QUANTITY, &["수량", "주문수량", "qty", "quantity"]),
    (field_keys::ORDERER_NAME, &["주문자명", "주문자", "구매자명", "구매자"]),
    (
        field_keys::RECIPIENT_NAME,
        &["수취인명", "수취인", "수령인", "받는분", "받는사람"],
    ),
    (
        field_keys::RECIPIENT_PHONE,
        &["수취인연락처", "수취인전화번호", "수취인휴대폰", "받는분연락처", "연락처"],
    ),
    (field_keys::POSTAL_CODE, &["우편번호", "zipcode", "zip code"]),
    (
        field_keys::ADDRESS,
        &["주소", "수취인주소", "배송지", "배송지주소", "받는분주소"],
    ),
    (
        field_keys::DELIVERY_MESSAGE,
        &["배송메시지", "배송메세지", "배송요청사항", "요청사항"],
    ),
    (field_keys::SHOP_NAME, &["쇼핑몰명", "쇼핑몰", "판매처", "mall"]),
    (field_keys::SALE_PRICE, &["판매가", "결제금액", "판매금액", "price"]),
    (field_keys::CARRIER, &["택배사", "배송업체", "택배회사", "carrier"]),
    (
        field_keys::TRACKING_NUMBER,
        &["운송장번호", "송장번호", "운송장", "tracking number", "trackingNumber"],
    ),
    (field_keys::ORDER_STATUS, &["주문상태", "상태", "order status"]),
];

/// 表头归一化：去除全部空白字符并转小写
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 解析表头对应的规范字段键；无法识别返回 None
pub fn resolve_header(raw: &str) -> Option<&'static str> {
    let normalized = normalize_header(raw);
    if normalized.is_empty() {
        return None;
    }
    resolve_normalized(&normalized)
}

/// 对已归一化的表头解析
pub(crate) fn resolve_normalized(normalized: &str) -> Option<&'static str> {
    HEADER_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| normalize_header(a) == normalized))
        .map(|(key, _)| *key)
}

/// 某规范字段的全部别名
pub fn aliases_of(field: &str) -> &'static [&'static str] {
    HEADER_ALIASES
        .iter()
        .find(|(key, _)| *key == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}
