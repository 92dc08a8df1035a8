// ==========================================
// 销售/库存智能门户 - 上传对账协调器
// ==========================================
// 阶段: Reading → Normalizing → Resolving → Detecting → Writing
// 事务边界: Resolving 起的所有数据库操作在同一事务内，
//           任一步失败整体回滚（含已建档的引用实体与审计记录）
// ==========================================

use crate::domain::inventory::InventoryWrite;
use crate::domain::upload::{DateRange, NewUploadHistory, UploadReport};
use crate::pipeline::change_detector::{ChangeDetector, Classification};
use crate::pipeline::error::UploadError;
use crate::pipeline::reference_resolver::ReferenceResolver;
use crate::pipeline::row_normalizer::RowNormalizer;
use crate::pipeline::sheet_parser::UniversalSheetParser;
use crate::pipeline::upload_pipeline_trait::{SheetParser, UploadPipeline};
use crate::pipeline::report_builder::UploadReportBuilder;
use crate::repository::{inventory_repo, upload_history_repo, PortalStore};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 单次上传处理的行数上限
pub const MAX_RECORDS: usize = 10_000;

// ==========================================
// UploadOrchestrator
// ==========================================
pub struct UploadOrchestrator {
    store: PortalStore,
    sheet_parser: Box<dyn SheetParser>,
    row_normalizer: RowNormalizer,
    change_detector: ChangeDetector,
}

impl UploadOrchestrator {
    pub fn new(store: PortalStore) -> Self {
        Self {
            store,
            sheet_parser: Box::new(UniversalSheetParser),
            row_normalizer: RowNormalizer,
            change_detector: ChangeDetector::new(),
        }
    }

    /// 注入自定义组件（测试用）
    pub fn with_components(
        store: PortalStore,
        sheet_parser: Box<dyn SheetParser>,
        change_detector: ChangeDetector,
    ) -> Self {
        Self {
            store,
            sheet_parser,
            row_normalizer: RowNormalizer,
            change_detector,
        }
    }
}

#[async_trait]
impl UploadPipeline for UploadOrchestrator {
    async fn process_upload(
        &self,
        data: &[u8],
        user_id: i64,
        filename: &str,
    ) -> Result<UploadReport, UploadError> {
        let upload_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        info!(
            upload_id = %upload_id,
            filename = %filename,
            user_id = user_id,
            bytes = data.len(),
            "开始处理报表上传"
        );

        // ===== Reading: 解码表格 =====
        let mut rows = self.sheet_parser.parse_rows(data, filename)?;
        if rows.is_empty() {
            return Err(UploadError::MalformedInput(
                "表格为空或仅有表头".to_string(),
            ));
        }
        if rows.len() > MAX_RECORDS {
            warn!(
                upload_id = %upload_id,
                rows = rows.len(),
                cap = MAX_RECORDS,
                "行数超限，截断处理"
            );
            rows.truncate(MAX_RECORDS);
        }
        debug!(upload_id = %upload_id, rows = rows.len(), "表格解码完成");

        // ===== Normalizing: 行规范化（含同键累加）=====
        let batch = self.row_normalizer.normalize_batch(&rows);
        let records_processed = batch.records.len();
        debug!(
            upload_id = %upload_id,
            records = records_processed,
            valid_rows = batch.valid_rows,
            invalid_rows = batch.invalid_rows,
            "行规范化完成"
        );

        let date_range = batch
            .date_range
            .unwrap_or_else(|| DateRange::single(chrono::Utc::now().date_naive()));

        // ===== 事务边界开始 =====
        let conn = self.store.lock().map_err(UploadError::Storage)?;
        let tx = conn.unchecked_transaction().map_err(UploadError::from)?;

        // ===== Resolving: 引用实体解析与自动建档 =====
        let mut resolver = ReferenceResolver::preload(&tx)?;
        for record in &batch.records {
            resolver.observe(record);
        }
        let created = resolver
            .create_missing(&tx, &batch.records)
            .map_err(|e| UploadError::ReferenceCreation(e.to_string()))?;

        // ===== Detecting: 对照现有快照分类并派生库存 =====
        let existing = inventory_repo::load_existing_window_tx(&tx, &date_range)?;

        let mut builder = UploadReportBuilder::new();
        let mut writes: Vec<InventoryWrite> = Vec::new();

        for record in &batch.records {
            let (product_id, branch_id) = match (
                resolver.product_id(&record.item_code),
                resolver.branch_id(&record.branch_name),
            ) {
                (Some(p), Some(b)) => (p, b),
                _ => {
                    // 建档后仍无法解析（异常路径），跳过计数
                    warn!(
                        upload_id = %upload_id,
                        item_code = %record.item_code,
                        branch = %record.branch_name,
                        "引用实体解析失败，跳过该记录"
                    );
                    builder.record_skipped();
                    continue;
                }
            };

            builder.touch_branch(&record.branch_name);

            let prior = existing.get(&record.key()).copied();
            let derived = match self.change_detector.classify(record, prior) {
                Classification::Unchanged => {
                    builder.record_skipped();
                    continue;
                }
                Classification::New => {
                    let derived = self.change_detector.derive(record);
                    builder.record_new(record, derived.billing);
                    derived
                }
                Classification::Updated { previous } => {
                    let derived = self.change_detector.derive(record);
                    builder.record_updated(record, previous, derived.billing);
                    derived
                }
            };

            writes.push(InventoryWrite {
                product_id,
                branch_id,
                op_stock: derived.op_stock,
                avl_stock: derived.avl_stock,
                transit: derived.transit,
                billing: derived.billing,
                month_plan: derived.month_plan,
                demand_plan: record.demand_plan.round() as i64,
                sku_opening_stock: record.opening_stock.round() as i64,
                goods_in_transit: record.goods_in_transit.round() as i64,
                final_balance_produce: record.final_balance_to_produce.round() as i64,
                mtd_invoicing: record.mtd_invoicing.round() as i64,
                category: record.category.clone(),
            });
        }

        // ===== Writing: 分批 upsert + 审计记录，同事务提交 =====
        let written = inventory_repo::upsert_batch_tx(&tx, &writes)?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        let summary = builder.summary_json(&created, &date_range, processing_time_ms);

        upload_history_repo::insert_history_tx(
            &tx,
            &NewUploadHistory {
                user_id,
                filename: filename.to_string(),
                records_processed: records_processed as i64,
                records_new: builder.new_count() as i64,
                records_updated: builder.updated_count() as i64,
                records_skipped: builder.skipped_count() as i64,
                date_range_start: date_range.start,
                date_range_end: date_range.end,
                branches_affected: builder.branches_affected(),
                summary,
                processing_time_ms: processing_time_ms as i64,
            },
        )?;

        tx.commit().map_err(UploadError::from)?;
        // ===== 事务边界结束 =====

        let report = builder.into_report(records_processed, created, date_range, processing_time_ms);

        info!(
            upload_id = %upload_id,
            records_processed = report.records_processed,
            records_new = report.records_new,
            records_updated = report.records_updated,
            records_skipped = report.records_skipped,
            inventory_written = written,
            processing_time_ms = report.processing_time_ms,
            "报表上传处理完成"
        );

        Ok(report)
    }
}
