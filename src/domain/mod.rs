// ==========================================
// 销售/库存智能门户 - 领域层
// ==========================================
// 职责: 定义对账管线的领域实体与传输对象
// 红线: 领域层不依赖 pipeline / repository
// ==========================================

pub mod inventory;
pub mod upload;

// 重导出核心类型
pub use inventory::{
    Branch, CanonicalRecord, ChangeEntry, ChangeType, InventoryWrite, Product, RecordKey,
};
pub use upload::{
    BranchFreshness, CreatedEntities, DateRange, FreshnessOverview, FreshnessReport,
    NewUploadHistory, UploadHistory, UploadHistoryPage, UploadReport,
};
