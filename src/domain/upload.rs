// ==========================================
// 销售/库存智能门户 - 上传审计领域模型
// ==========================================
// 对齐: upload_history 表
// 用途: 一次上传生成一条审计记录，只追加、从不修改
// ==========================================

use crate::domain::inventory::ChangeEntry;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// DateRange - 上传覆盖的日期区间
// ==========================================
// 说明: 仅为信息性口径；inventory 快照无日期维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// 扩展区间以包含指定日期
    pub fn expand(&mut self, date: NaiveDate) {
        if date < self.start {
            self.start = date;
        }
        if date > self.end {
            self.end = date;
        }
    }
}

// ==========================================
// CreatedEntities - 本次上传自动建档数量
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEntities {
    pub branches: usize,
    pub products: usize,
}

// ==========================================
// UploadReport - 返回给 HTTP 层的结构化结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub records_processed: usize,
    pub records_new: usize,
    pub records_updated: usize,
    pub records_skipped: usize,
    pub date_range: DateRange,
    pub branches_affected: Vec<String>,
    pub created_entities: CreatedEntities,
    pub significant_changes: Vec<ChangeEntry>,
    pub summary: String,
    pub processing_time_ms: u64,
}

// ==========================================
// UploadHistory - 上传审计记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadHistory {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub records_processed: i64,
    pub records_new: i64,
    pub records_updated: i64,
    pub records_skipped: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    pub branches_affected: Vec<String>,
    pub summary: serde_json::Value,
    pub processing_time_ms: i64,
}

/// 待插入的审计记录（id / upload_date 由存储层生成）
#[derive(Debug, Clone)]
pub struct NewUploadHistory {
    pub user_id: i64,
    pub filename: String,
    pub records_processed: i64,
    pub records_new: i64,
    pub records_updated: i64,
    pub records_skipped: i64,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub branches_affected: Vec<String>,
    pub summary: serde_json::Value,
    pub processing_time_ms: i64,
}

// ==========================================
// UploadHistoryPage - 历史分页读取结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadHistoryPage {
    pub history: Vec<UploadHistory>,
    pub total: i64,
    pub has_more: bool,
}

// ==========================================
// 数据新鲜度报告（按分支）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFreshness {
    pub branch_name: String,
    pub last_updated: Option<DateTime<Utc>>,
    /// 距最近一次写入的天数；从未写入为 None
    pub days_old: Option<i64>,
    pub total_records: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessOverview {
    pub total_branches: usize,
    pub up_to_date: usize,
    pub needs_update: usize,
    pub total_records: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub freshness: Vec<BranchFreshness>,
    pub overview: FreshnessOverview,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_expand() {
        let d = |day: u32| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let mut range = DateRange::single(d(10));
        range.expand(d(5));
        range.expand(d(20));
        range.expand(d(12)); // 区间内，不变
        assert_eq!(range.start, d(5));
        assert_eq!(range.end, d(20));
    }

    #[test]
    fn test_upload_report_camel_case() {
        let report = UploadReport {
            records_processed: 3,
            records_new: 1,
            records_updated: 1,
            records_skipped: 1,
            date_range: DateRange::single(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            branches_affected: vec!["CHENNAI".to_string()],
            created_entities: CreatedEntities::default(),
            significant_changes: vec![],
            summary: "ok".to_string(),
            processing_time_ms: 42,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("recordsProcessed").is_some());
        assert!(json.get("dateRange").is_some());
        assert!(json.get("createdEntities").is_some());
        assert!(json.get("processingTimeMs").is_some());
    }
}
