// ==========================================
// 订单履约后台 - 承运商名称归一化
// ==========================================
// 规则: trim + 小写后按规则表顺序做关键字包含判断，先命中者胜出
// 约束: 规则顺序是对外契约（通用关键字必须排在具体关键字之后）
// 未命中: 返回 trim 后的原文（保留大小写）
// ==========================================

/// 承运商规则：标准名 + 关键字（小写）
#[derive(Debug, Clone, Copy)]
pub struct CarrierRule {
    pub standard_name: &'static str,
    pub keywords: &'static [&'static str],
}

/// 标准承运商规则表（顺序敏感）
pub static CARRIER_RULES: &[CarrierRule] = &[
    CarrierRule {
        standard_name: "CJ대한통운",
        keywords: &["cj", "대한통운", "korex"],
    },
    CarrierRule {
        standard_name: "롯데택배",
        keywords: &["롯데", "lotte", "현대택배"],
    },
    CarrierRule {
        standard_name: "한진택배",
        keywords: &["한진", "hanjin"],
    },
    CarrierRule {
        standard_name: "우체국택배",
        keywords: &["우체국", "epost", "우편"],
    },
    CarrierRule {
        standard_name: "로젠택배",
        keywords: &["로젠", "logen"],
    },
    CarrierRule {
        standard_name: "경동택배",
        keywords: &["경동", "kdexp"],
    },
    CarrierRule {
        standard_name: "대신택배",
        keywords: &["대신"],
    },
    CarrierRule {
        standard_name: "일양로지스",
        keywords: &["일양", "ilyang"],
    },
    CarrierRule {
        standard_name: "합동택배",
        keywords: &["합동"],
    },
    CarrierRule {
        standard_name: "CU편의점택배",
        keywords: &["cu편의점", "cupost", "cu 편의점"],
    },
    CarrierRule {
        standard_name: "GS Postbox 택배",
        keywords: &["gs편의점", "gs25", "postbox", "편의점"],
    },
];

/// 归一化承运商名称
///
/// - None / 空字符串：原样返回
/// - 命中规则：返回规则标准名
/// - 未命中：返回 trim 后的原文
pub fn normalize_carrier(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() {
        return Some(raw.to_string());
    }

    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();

    let matched = CARRIER_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)));

    match matched {
        Some(rule) => Some(rule.standard_name.to_string()),
        None => Some(trimmed.to_string()),
    }
}

/// 对非 Option 输入的便捷版本
pub fn normalize_carrier_str(raw: &str) -> String {
    normalize_carrier(Some(raw)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_for_empty_and_none() {
        assert_eq!(normalize_carrier(None), None);
        assert_eq!(normalize_carrier(Some("")), Some(String::new()));
    }

    #[test]
    fn test_keyword_match_returns_standard_name() {
        assert_eq!(normalize_carrier_str("CJ 택배"), "CJ대한통운");
        assert_eq!(normalize_carrier_str(" 대한통운 "), "CJ대한통운");
        assert_eq!(normalize_carrier_str("LOTTE Global"), "롯데택배");
        assert_eq!(normalize_carrier_str("우체국 등기"), "우체국택배");
        assert_eq!(normalize_carrier_str("Hanjin"), "한진택배");
    }

    #[test]
    fn test_unmatched_returns_trimmed_original_case() {
        assert_eq!(normalize_carrier_str("  Some Freight Co "), "Some Freight Co");
    }

    #[test]
    fn test_rule_order_specific_before_generic() {
        // "cu편의점" 同时包含通用关键字 "편의점"，先声明的 CU 规则胜出
        assert_eq!(normalize_carrier_str("CU편의점택배"), "CU편의점택배");
        assert_eq!(normalize_carrier_str("GS25 반값택배"), "GS Postbox 택배");
        assert_eq!(normalize_carrier_str("편의점 택배"), "GS Postbox 택배");
    }

    #[test]
    fn test_every_keyword_maps_to_its_rule_when_no_earlier_rule_matches() {
        for (idx, rule) in CARRIER_RULES.iter().enumerate() {
            for kw in rule.keywords {
                let earlier_hit = CARRIER_RULES[..idx]
                    .iter()
                    .any(|r| r.keywords.iter().any(|k| kw.contains(k)));
                if !earlier_hit {
                    assert_eq!(normalize_carrier_str(kw), rule.standard_name, "keyword {}", kw);
                }
            }
        }
    }
}
