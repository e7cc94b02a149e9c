// ==========================================
// 订单履约后台 - 命令行入口
// ==========================================
// 用法:
//   fulfillment-desk import <tenant_id> <file>     导入订单表格
//   fulfillment-desk tracking <tenant_id> <file>   导入运单号表格
// 数据库: FULFILLMENT_DESK_DB_PATH 或用户数据目录
// 输出: 结果以 JSON 打印到 stdout，日志输出到 stderr
// ==========================================

use std::error::Error;
use std::path::Path;

use fulfillment_desk::app::{get_default_db_path, AppState};
use fulfillment_desk::domain::types::TenantId;
use fulfillment_desk::{db, logging};

const USAGE: &str = "用法: fulfillment-desk <import|tracking> <tenant_id> <file>";

/// 命令行操作人
const CLI_ACTOR: &str = "cli";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", fulfillment_desk::APP_NAME, fulfillment_desk::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, tenant_raw, file) = match args.as_slice() {
        [command, tenant, file] => (command.as_str(), tenant.as_str(), file.as_str()),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };
    let tenant_id: TenantId = tenant_raw
        .trim()
        .parse()
        .map_err(|_| format!("无效的 tenant_id: {}", tenant_raw))?;

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).await?;
    {
        let conn = db::open_sqlite_connection(state.get_db_path())?;
        db::ensure_tenant(&conn, tenant_id, &format!("tenant-{}", tenant_id))?;
    }

    let output = match command {
        "import" => {
            let response = state
                .import_api
                .import_orders(tenant_id, Path::new(file), CLI_ACTOR)?;
            serde_json::to_string_pretty(&response)?
        }
        "tracking" => {
            let report = state.delivery_import_api.import_tracking_sheet(
                tenant_id,
                Path::new(file),
                CLI_ACTOR,
            )?;
            serde_json::to_string_pretty(&report)?
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    };

    println!("{}", output);
    Ok(())
}
