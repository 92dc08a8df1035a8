// ==========================================
// 销售/库存智能门户 - 库入口
// ==========================================
// 分层:
// - domain:     领域类型（库存记录、上传报告、新鲜度）
// - pipeline:   上传对账管线（解码/规范化/解析/检测/写入协调）
// - repository: SQLite 存储层（事务作用域函数 + PortalStore）
// - db:         连接配置与表结构初始化
// - logging:    tracing 订阅器初始化
// ==========================================

pub mod db;
pub mod domain;
pub mod logging;
pub mod pipeline;
pub mod repository;

pub use pipeline::{UploadError, UploadOrchestrator, UploadPipeline};
pub use repository::PortalStore;

/// 版本号（取自 Cargo.toml）
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用名
pub const APP_NAME: &str = "销售/库存智能门户";
