// ==========================================
// 销售/库存智能门户 - 命令行入口
// ==========================================
// 用法: sales-stock-intel <数据库路径> <报表文件> [用户id]
// 输出: 处理报告（JSON，stdout）
// ==========================================

use anyhow::{bail, Context};
use sales_stock_intel::{logging, PortalStore, UploadOrchestrator, UploadPipeline};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("用法: {} <数据库路径> <报表文件> [用户id]", args[0]);
    }
    let db_path = &args[1];
    let file_path = &args[2];
    let user_id: i64 = match args.get(3) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("用户id无效: {}", raw))?,
        None => 0,
    };

    let data = std::fs::read(file_path).with_context(|| format!("读取文件失败: {}", file_path))?;
    let filename = std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.clone());

    let store = PortalStore::new(db_path).context("数据库初始化失败")?;
    let orchestrator = UploadOrchestrator::new(store);

    match orchestrator.process_upload(&data, user_id, &filename).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "上传处理失败");
            Err(e.into())
        }
    }
}
