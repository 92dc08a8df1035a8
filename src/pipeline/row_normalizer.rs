// ==========================================
// 销售/库存智能门户 - 行规范化器
// ==========================================
// 职责: 把任意表头的行映射为 CanonicalRecord
// 设计: 每个逻辑字段对应一张有序别名表（数据而非代码，可穷举测试）
// 拒绝规则: 分支名为空 / 物料号为空 / 显式数量列无法解析 → 行计为无效并跳过
//           数量恰为 0 不拒绝
// ==========================================

use crate::domain::inventory::{CanonicalRecord, RecordKey};
use crate::domain::upload::DateRange;
use crate::pipeline::date_normalizer;
use crate::pipeline::error::RowRejection;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

// ==========================================
// 字段别名表（按优先级排序）
// ==========================================

pub const DATE_ALIASES: &[&str] = &["Date", "date"];

pub const BRANCH_ALIASES: &[&str] = &["Branch", "branch", "BRANCH"];

pub const ITEM_CODE_ALIASES: &[&str] = &[
    "Model", "MODEL", "Material", "MATERIAL", "Item Code", "item code", "itemcode",
];

/// 数量候选列（库存/开票/在途各口径的常见表头写法）
pub const QUANTITY_ALIASES: &[&str] = &[
    "SKU Opening stock",
    "Total",
    "Billing",
    "BILLING",
    "Final Balance in Products",
    "Sales Qty.",
    "sales qty",
    "salesqty",
    "Avl_Stock",
    "AVL_STOCK",
    "OP_Stock",
    "Transit",
    "TRANSIT",
];

pub const DEMAND_PLAN_ALIASES: &[&str] = &["Demand Plan"];
pub const OPENING_STOCK_ALIASES: &[&str] = &["SKU Opening stock"];
pub const GOODS_IN_TRANSIT_ALIASES: &[&str] = &["Goods in Transit"];
pub const FINAL_BALANCE_ALIASES: &[&str] =
    &["Final Balance to Produce", "Current Balance to Produce"];
pub const MTD_INVOICING_ALIASES: &[&str] = &["MTD Invoicing"];
pub const CATEGORY_ALIASES: &[&str] = &["Catg.", "Cat E"];
pub const STAR_RATING_ALIASES: &[&str] = &["Star Rating"];
pub const TONNAGE_ALIASES: &[&str] = &["Ton"];
pub const TECHNOLOGY_ALIASES: &[&str] = &["Technology"];

// ===== 字段缺省值 =====
pub const DEFAULT_BRANCH: &str = "CHENNAI";
pub const DEFAULT_TECHNOLOGY: &str = "Non Inv";
pub const DEFAULT_STAR_RATING: i32 = 3;
pub const DEFAULT_TONNAGE: f64 = 1.0;

// ==========================================
// NormalizedBatch - 整次上传的规范化产物
// ==========================================
// 不变式: records 中每个 (date, branch, item) 键恰好一条记录；
//         同键多行只把数量累加进 billing（唯一的合并规则）
#[derive(Debug)]
pub struct NormalizedBatch {
    /// 按首次出现顺序保存（与审计列表顺序一致）
    pub records: Vec<CanonicalRecord>,
    /// 通过校验的原始行数（含被合并的行）
    pub valid_rows: usize,
    /// 被拒绝的原始行数
    pub invalid_rows: usize,
    /// 全上传范围的最小/最大日期
    pub date_range: Option<DateRange>,
}

// ==========================================
// RowNormalizer
// ==========================================
pub struct RowNormalizer;

impl RowNormalizer {
    /// 规范化整批原始行，维护累加与日期区间
    pub fn normalize_batch(&self, rows: &[HashMap<String, String>]) -> NormalizedBatch {
        self.normalize_batch_with(rows, chrono::Utc::now().date_naive())
    }

    /// 规范化整批原始行，空日期回落到指定日期（测试用）
    pub fn normalize_batch_with(
        &self,
        rows: &[HashMap<String, String>],
        fallback_date: NaiveDate,
    ) -> NormalizedBatch {
        let mut records: Vec<CanonicalRecord> = Vec::new();
        let mut index: HashMap<RecordKey, usize> = HashMap::new();
        let mut valid_rows = 0usize;
        let mut invalid_rows = 0usize;
        let mut date_range: Option<DateRange> = None;

        for (row_idx, row) in rows.iter().enumerate() {
            let date_raw = first_present(row, DATE_ALIASES).unwrap_or_default();
            let date = date_normalizer::normalize_with(&date_raw, fallback_date);

            // 日期区间在行校验之前更新（对无效行也生效）
            match date_range.as_mut() {
                Some(range) => range.expand(date),
                None => date_range = Some(DateRange::single(date)),
            }

            match self.normalize_row(row, date) {
                Ok((record, quantity)) => {
                    let key = record.key();
                    match index.get(&key) {
                        // 同键合并: 仅累加数量
                        Some(&pos) => records[pos].billing += quantity,
                        None => {
                            index.insert(key, records.len());
                            records.push(record);
                        }
                    }
                    valid_rows += 1;
                }
                Err(reason) => {
                    warn!(row_number = row_idx + 1, reason = %reason, "行校验未通过，跳过");
                    invalid_rows += 1;
                }
            }
        }

        NormalizedBatch {
            records,
            valid_rows,
            invalid_rows,
            date_range,
        }
    }

    /// 规范化单行；返回 (记录, 本行数量) 或拒绝原因
    pub fn normalize_row(
        &self,
        row: &HashMap<String, String>,
        date: NaiveDate,
    ) -> Result<(CanonicalRecord, f64), RowRejection> {
        // 分支名: 别名解析，缺省 CHENNAI；纯空白 → 拒绝
        let branch_name = first_present(row, BRANCH_ALIASES)
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
            .trim()
            .to_uppercase();
        if branch_name.is_empty() {
            return Err(RowRejection::MissingBranch);
        }

        // 物料号: 别名解析，空 → 拒绝
        let item_code = first_present(row, ITEM_CODE_ALIASES)
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        if item_code.is_empty() {
            return Err(RowRejection::MissingItemCode);
        }

        // 数量: 别名列按序取第一个可解析值；均不可解析且存在显式数量列 → 拒绝；
        //       无数量列时回落到首个严格为正的数值列；仍无则取 0（0 不拒绝）
        let quantity = resolve_quantity(row)?;

        // 附加字段各自独立缺省
        let opening_stock = parse_f64_alias(row, OPENING_STOCK_ALIASES).unwrap_or(quantity);
        let star_rating = first_present(row, STAR_RATING_ALIASES)
            .map(|v| v.trim().trim_end_matches('*').trim().to_string())
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as i32)
            .unwrap_or(DEFAULT_STAR_RATING);
        let tonnage = first_present(row, TONNAGE_ALIASES)
            .map(|v| v.trim().trim_end_matches("Tr").trim().to_string())
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_TONNAGE);
        let technology = first_present(row, TECHNOLOGY_ALIASES)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_TECHNOLOGY.to_string());
        let category = first_present(row, CATEGORY_ALIASES)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        let record = CanonicalRecord {
            date,
            branch_name,
            item_code,
            billing: quantity,
            demand_plan: parse_f64_alias(row, DEMAND_PLAN_ALIASES).unwrap_or(0.0),
            opening_stock,
            goods_in_transit: parse_f64_alias(row, GOODS_IN_TRANSIT_ALIASES).unwrap_or(0.0),
            final_balance_to_produce: parse_f64_alias(row, FINAL_BALANCE_ALIASES).unwrap_or(0.0),
            mtd_invoicing: parse_f64_alias(row, MTD_INVOICING_ALIASES).unwrap_or(0.0),
            category,
            tonnage,
            star_rating,
            technology,
        };

        Ok((record, quantity))
    }
}

/// 按别名表顺序取第一个非空值
fn first_present(row: &HashMap<String, String>, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(value) = row.get(*alias) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
    }
    None
}

/// 按别名表顺序取第一个可解析的数值
fn parse_f64_alias(row: &HashMap<String, String>, aliases: &[&str]) -> Option<f64> {
    for alias in aliases {
        if let Some(value) = row.get(*alias) {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                return Some(parsed);
            }
        }
    }
    None
}

/// 数量解析（含兜底扫描）
fn resolve_quantity(row: &HashMap<String, String>) -> Result<f64, RowRejection> {
    let mut saw_explicit = false;
    for alias in QUANTITY_ALIASES {
        if let Some(value) = row.get(*alias) {
            if value.trim().is_empty() {
                continue;
            }
            saw_explicit = true;
            if let Ok(parsed) = value.trim().parse::<f64>() {
                return Ok(parsed);
            }
        }
    }

    // 兜底: 按表头排序做确定性扫描，取首个严格为正的数值列
    let mut headers: Vec<&String> = row.keys().collect();
    headers.sort();
    for header in headers {
        if let Some(value) = row.get(header) {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                if parsed > 0.0 {
                    return Ok(parsed);
                }
            }
        }
    }

    if saw_explicit {
        // 存在显式数量列但全部不可解析
        return Err(RowRejection::InvalidQuantity);
    }
    Ok(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_row_basic() {
        let normalizer = RowNormalizer;
        let raw = row(&[
            ("Branch", "chennai"),
            ("Model", "ac-100"),
            ("Billing", "25"),
            ("Technology", "Inverter"),
            ("Star Rating", "5*"),
            ("Ton", "1.5 Tr"),
        ]);

        let (record, qty) = normalizer.normalize_row(&raw, fallback()).unwrap();

        assert_eq!(record.branch_name, "CHENNAI");
        assert_eq!(record.item_code, "AC-100");
        assert_eq!(qty, 25.0);
        assert_eq!(record.billing, 25.0);
        assert_eq!(record.technology, "Inverter");
        assert_eq!(record.star_rating, 5);
        assert_eq!(record.tonnage, 1.5);
    }

    #[test]
    fn test_missing_item_code_rejected() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Branch", "CHENNAI"), ("Billing", "10")]);

        let result = normalizer.normalize_row(&raw, fallback());
        assert_eq!(result.unwrap_err(), RowRejection::MissingItemCode);
    }

    #[test]
    fn test_whitespace_branch_rejected() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Branch", "   "), ("Model", "AC-100"), ("Billing", "10")]);

        let result = normalizer.normalize_row(&raw, fallback());
        assert_eq!(result.unwrap_err(), RowRejection::MissingBranch);
    }

    #[test]
    fn test_missing_branch_defaults_to_chennai() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Model", "AC-100"), ("Billing", "10")]);

        let (record, _) = normalizer.normalize_row(&raw, fallback()).unwrap();
        assert_eq!(record.branch_name, DEFAULT_BRANCH);
    }

    #[test]
    fn test_zero_quantity_not_rejected() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Branch", "CHENNAI"), ("Model", "AC-100"), ("Billing", "0")]);

        let (record, qty) = normalizer.normalize_row(&raw, fallback()).unwrap();
        assert_eq!(qty, 0.0);
        assert_eq!(record.billing, 0.0);
    }

    #[test]
    fn test_unparseable_quantity_rejected() {
        let normalizer = RowNormalizer;
        let raw = row(&[
            ("Branch", "CHENNAI"),
            ("Model", "AC-100"),
            ("Billing", "N/A"),
        ]);

        let result = normalizer.normalize_row(&raw, fallback());
        assert_eq!(result.unwrap_err(), RowRejection::InvalidQuantity);
    }

    #[test]
    fn test_quantity_alias_order() {
        // SKU Opening stock 优先于 Billing
        let normalizer = RowNormalizer;
        let raw = row(&[
            ("Model", "AC-100"),
            ("SKU Opening stock", "40"),
            ("Billing", "25"),
        ]);

        let (_, qty) = normalizer.normalize_row(&raw, fallback()).unwrap();
        assert_eq!(qty, 40.0);
    }

    #[test]
    fn test_quantity_fallback_scans_positive_numeric_column() {
        // 无任何数量别名列时，回落到首个严格为正的数值列
        let normalizer = RowNormalizer;
        let raw = row(&[("Model", "AC-100"), ("Some Column", "12.5")]);

        let (_, qty) = normalizer.normalize_row(&raw, fallback()).unwrap();
        assert_eq!(qty, 12.5);
    }

    #[test]
    fn test_quantity_fallback_ignores_non_positive() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Model", "AC-100"), ("Some Column", "-3")]);

        let (_, qty) = normalizer.normalize_row(&raw, fallback()).unwrap();
        assert_eq!(qty, 0.0);
    }

    #[test]
    fn test_accumulation_same_key() {
        // 性质: 同 (date, branch, item) 两行数量 10 与 15 → 一条记录 billing = 25
        let normalizer = RowNormalizer;
        let rows = vec![
            row(&[
                ("Date", "05-03-2024"),
                ("Branch", "CHENNAI"),
                ("Model", "AC-100"),
                ("Billing", "10"),
            ]),
            row(&[
                ("Date", "05-03-2024"),
                ("Branch", "CHENNAI"),
                ("Model", "AC-100"),
                ("Billing", "15"),
            ]),
        ];

        let batch = normalizer.normalize_batch_with(&rows, fallback());

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].billing, 25.0);
        assert_eq!(batch.valid_rows, 2);
        assert_eq!(batch.invalid_rows, 0);
    }

    #[test]
    fn test_invalid_rows_counted_not_fatal() {
        let normalizer = RowNormalizer;
        let rows = vec![
            row(&[("Branch", "CHENNAI"), ("Billing", "10")]), // 缺物料号
            row(&[("Branch", "CHENNAI"), ("Model", "AC-100"), ("Billing", "5")]),
        ];

        let batch = normalizer.normalize_batch_with(&rows, fallback());

        assert_eq!(batch.valid_rows, 1);
        assert_eq!(batch.invalid_rows, 1);
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn test_date_range_tracks_min_max() {
        let normalizer = RowNormalizer;
        let rows = vec![
            row(&[("Date", "10-03-2024"), ("Model", "A"), ("Billing", "1")]),
            row(&[("Date", "01-03-2024"), ("Model", "B"), ("Billing", "1")]),
            row(&[("Date", "20-03-2024"), ("Model", "C"), ("Billing", "1")]),
        ];

        let batch = normalizer.normalize_batch_with(&rows, fallback());
        let range = batch.date_range.unwrap();

        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
    }

    #[test]
    fn test_aux_fields_default_independently() {
        let normalizer = RowNormalizer;
        let raw = row(&[("Model", "AC-100"), ("Billing", "20"), ("Demand Plan", "8")]);

        let (record, _) = normalizer.normalize_row(&raw, fallback()).unwrap();

        assert_eq!(record.demand_plan, 8.0);
        assert_eq!(record.opening_stock, 20.0); // 缺省取本行数量
        assert_eq!(record.goods_in_transit, 0.0);
        assert_eq!(record.mtd_invoicing, 0.0);
        assert_eq!(record.technology, DEFAULT_TECHNOLOGY);
        assert_eq!(record.star_rating, DEFAULT_STAR_RATING);
        assert_eq!(record.tonnage, DEFAULT_TONNAGE);
        assert_eq!(record.category, "");
    }
}
