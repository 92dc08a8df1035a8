// ==========================================
// 销售/库存智能门户 - 上传对账管线模块
// ==========================================
// 阶段划分:
// - sheet_parser:       Reading（字节 → 行映射）
// - date_normalizer:    Normalizing（日期多格式解码）
// - row_normalizer:     Normalizing(行 → CanonicalRecord，同键累加)
// - reference_resolver: Resolving（名称 → id，缺失自动建档）
// - change_detector:    Detecting（新增/更新/未变 + 派生库存）
// - report_builder:     结果聚合
// - orchestrator:       全流程协调与事务边界
// ==========================================

pub mod change_detector;
pub mod date_normalizer;
pub mod error;
pub mod orchestrator;
pub mod reference_resolver;
pub mod report_builder;
pub mod row_normalizer;
pub mod sheet_parser;
pub mod upload_pipeline_trait;

pub use change_detector::{ChangeDetector, Classification, DerivedStock};
pub use error::{RowRejection, UploadError, UploadResult};
pub use orchestrator::{UploadOrchestrator, MAX_RECORDS};
pub use reference_resolver::ReferenceResolver;
pub use report_builder::UploadReportBuilder;
pub use row_normalizer::{NormalizedBatch, RowNormalizer};
pub use sheet_parser::{CsvSheetParser, UniversalSheetParser, XlsSheetParser, XlsxSheetParser};
pub use upload_pipeline_trait::{JitterSource, SheetParser, UploadPipeline};
