// ==========================================
// 销售/库存智能门户 - 上传结果报告构建器
// ==========================================
// 职责: 累计各类计数与变更明细，产出
//       (1) 返回给调用方的 UploadReport
//       (2) 存入上传历史的摘要 JSON
// 截断规则: 明细列表最多 100 条；另附按变更幅度排序的前 10 条
// ==========================================

use crate::domain::inventory::{CanonicalRecord, ChangeEntry, ChangeType};
use crate::domain::upload::{CreatedEntities, DateRange, UploadReport};
use std::collections::BTreeSet;

/// 摘要 JSON 中保留的明细上限
pub const MAX_CHANGE_ENTRIES: usize = 100;
/// 按幅度排序保留的条数
pub const TOP_CHANGES: usize = 10;
/// 显著变更阈值（绝对幅度）
pub const SIGNIFICANT_DELTA: i64 = 10;

// ==========================================
// UploadReportBuilder
// ==========================================
pub struct UploadReportBuilder {
    changes: Vec<ChangeEntry>,
    new_count: usize,
    updated_count: usize,
    skipped_count: usize,
    branches: BTreeSet<String>,
}

impl UploadReportBuilder {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            new_count: 0,
            updated_count: 0,
            skipped_count: 0,
            branches: BTreeSet::new(),
        }
    }

    /// 记录一条新增
    pub fn record_new(&mut self, record: &CanonicalRecord, new_value: i64) {
        self.new_count += 1;
        self.changes.push(ChangeEntry {
            change_type: ChangeType::New,
            product: record.item_code.clone(),
            branch: record.branch_name.clone(),
            date: record.date,
            old_value: None,
            new_value,
            change: new_value,
        });
    }

    /// 记录一条更新
    pub fn record_updated(&mut self, record: &CanonicalRecord, previous: i64, new_value: i64) {
        self.updated_count += 1;
        self.changes.push(ChangeEntry {
            change_type: ChangeType::Updated,
            product: record.item_code.clone(),
            branch: record.branch_name.clone(),
            date: record.date,
            old_value: Some(previous),
            new_value,
            change: new_value - previous,
        });
    }

    /// 记录一条跳过（未变 / 引用解析失败）
    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }

    /// 登记受影响的分支
    pub fn touch_branch(&mut self, branch_name: &str) {
        self.branches.insert(branch_name.to_string());
    }

    pub fn new_count(&self) -> usize {
        self.new_count
    }

    pub fn updated_count(&self) -> usize {
        self.updated_count
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    pub fn branches_affected(&self) -> Vec<String> {
        self.branches.iter().cloned().collect()
    }

    /// 显著变更: 更新类且绝对幅度超过阈值
    pub fn significant_changes(&self) -> Vec<ChangeEntry> {
        self.changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Updated && c.change.abs() > SIGNIFICANT_DELTA)
            .cloned()
            .collect()
    }

    /// 存入上传历史的摘要 JSON
    pub fn summary_json(
        &self,
        created: &CreatedEntities,
        date_range: &DateRange,
        processing_time_ms: u64,
    ) -> serde_json::Value {
        // 更新类按绝对幅度倒序取前 N 条
        let mut top: Vec<&ChangeEntry> = self
            .changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Updated)
            .collect();
        top.sort_by_key(|c| std::cmp::Reverse(c.change.abs()));
        top.truncate(TOP_CHANGES);

        let truncated: Vec<&ChangeEntry> =
            self.changes.iter().take(MAX_CHANGE_ENTRIES).collect();

        serde_json::json!({
            "changes": truncated,
            "topChanges": top,
            "createdEntities": created,
            "dateRange": date_range,
            "processingTimeMs": processing_time_ms,
        })
    }

    /// 拼装最终报告
    pub fn into_report(
        self,
        records_processed: usize,
        created_entities: CreatedEntities,
        date_range: DateRange,
        processing_time_ms: u64,
    ) -> UploadReport {
        let summary = format!(
            "Processed {} records in {}ms: {} new, {} updated, {} unchanged",
            records_processed,
            processing_time_ms,
            self.new_count,
            self.updated_count,
            self.skipped_count
        );
        let significant_changes = self.significant_changes();

        UploadReport {
            records_processed,
            records_new: self.new_count,
            records_updated: self.updated_count,
            records_skipped: self.skipped_count,
            date_range,
            branches_affected: self.branches.into_iter().collect(),
            created_entities,
            significant_changes,
            summary,
            processing_time_ms,
        }
    }
}

impl Default for UploadReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
