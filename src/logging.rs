// ==========================================
// 订单履约后台 - 日志系统
// ==========================================
// 输出: 一律写 stderr（stdout 留给命令行的 JSON 结果）
// 级别: RUST_LOG，缺省 fulfillment_desk=info,warn
// 格式: FULFILLMENT_DESK_LOG_FORMAT=json 时输出 JSON 行
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "FULFILLMENT_DESK_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str = "fulfillment_desk=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 解析格式名；未知值按文本处理
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// 初始化日志系统（进程内只调用一次）
///
/// # 示例
/// ```no_run
/// fulfillment_desk::logging::init();
/// ```
pub fn init() {
    let builder = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    match LogFormat::from_env() {
        LogFormat::Json => builder.json().flatten_event(true).init(),
        LogFormat::Text => builder.init(),
    }
}

/// 测试用：debug 级别，输出交给测试捕获；重复调用无副作用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("fulfillment_desk=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }

    #[test]
    fn test_init_test_is_repeatable() {
        init_test();
        init_test();
    }
}
