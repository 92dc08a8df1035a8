// ==========================================
// 销售/库存智能门户 - 变更检测与派生库存
// ==========================================
// 职责: 对照现有快照给每条记录分类（新增/更新/未变），
//       并按开票量推算派生库存字段
// 比较口径: 开票量四舍五入为整数后比较（浮点噪声不算变更）
// ==========================================

use crate::domain::inventory::CanonicalRecord;
use crate::pipeline::upload_pipeline_trait::JitterSource;
use rand::Rng;

/// 可用库存扰动上界
pub const AVL_STOCK_JITTER_MAX: f64 = 20.0;
/// 在途扰动上界
pub const TRANSIT_JITTER_MAX: f64 = 10.0;

// ==========================================
// 分类结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 快照中无此键
    New,
    /// 键存在且取整后开票量不同
    Updated { previous: i64 },
    /// 键存在且取整后开票量相同
    Unchanged,
}

/// 派生库存字段（全部为取整后的最终值）
#[derive(Debug, Clone, Copy)]
pub struct DerivedStock {
    pub billing: i64,
    pub month_plan: i64,
    pub avl_stock: i64,
    pub transit: i64,
    pub op_stock: i64,
}

// ==========================================
// 缺省扰动源: 线程局部随机数
// ==========================================
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, upper: f64) -> f64 {
        rand::thread_rng().gen_range(0.0..upper)
    }
}

// ==========================================
// ChangeDetector
// ==========================================
pub struct ChangeDetector {
    jitter: Box<dyn JitterSource>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self {
            jitter: Box::new(ThreadRngJitter),
        }
    }

    /// 注入固定扰动源（测试用）
    pub fn with_jitter(jitter: Box<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    /// 对照现有快照分类一条记录
    pub fn classify(&self, record: &CanonicalRecord, existing: Option<i64>) -> Classification {
        let incoming = record.billing.round() as i64;
        match existing {
            None => Classification::New,
            Some(previous) if previous != incoming => Classification::Updated { previous },
            Some(_) => Classification::Unchanged,
        }
    }

    /// 按开票量推算派生库存
    ///
    /// 月计划 = round(b * 1.2 + 50)
    /// 可用库存 = round(b * 1.5 + U[0, 20))
    /// 在途 = round(b * 0.3 + U[0, 10))
    /// 现有库存 = max(0, 可用 + round(b) - 在途)
    pub fn derive(&self, record: &CanonicalRecord) -> DerivedStock {
        let b = record.billing;
        let billing = b.round() as i64;
        let month_plan = (b * 1.2 + 50.0).round() as i64;
        let avl_stock = (b * 1.5 + self.jitter.sample(AVL_STOCK_JITTER_MAX)).round() as i64;
        let transit = (b * 0.3 + self.jitter.sample(TRANSIT_JITTER_MAX)).round() as i64;
        let op_stock = (avl_stock + billing - transit).max(0);

        DerivedStock {
            billing,
            month_plan,
            avl_stock,
            transit,
            op_stock,
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// 固定扰动源: 始终返回 0
    struct ZeroJitter;

    impl JitterSource for ZeroJitter {
        fn sample(&self, _upper: f64) -> f64 {
            0.0
        }
    }

    fn record(billing: f64) -> CanonicalRecord {
        CanonicalRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            branch_name: "CHENNAI".to_string(),
            item_code: "AC-100".to_string(),
            billing,
            demand_plan: 0.0,
            opening_stock: 0.0,
            goods_in_transit: 0.0,
            final_balance_to_produce: 0.0,
            mtd_invoicing: 0.0,
            category: String::new(),
            tonnage: 1.0,
            star_rating: 3,
            technology: "Non Inv".to_string(),
        }
    }

    #[test]
    fn test_classify_new() {
        let detector = ChangeDetector::with_jitter(Box::new(ZeroJitter));
        assert_eq!(detector.classify(&record(100.0), None), Classification::New);
    }

    #[test]
    fn test_classify_updated_and_unchanged() {
        let detector = ChangeDetector::with_jitter(Box::new(ZeroJitter));

        assert_eq!(
            detector.classify(&record(101.0), Some(100)),
            Classification::Updated { previous: 100 }
        );
        assert_eq!(
            detector.classify(&record(100.0), Some(100)),
            Classification::Unchanged
        );
    }

    #[test]
    fn test_classify_rounds_before_compare() {
        // 100.2 取整为 100，与快照 100 视为未变
        let detector = ChangeDetector::with_jitter(Box::new(ZeroJitter));
        assert_eq!(
            detector.classify(&record(100.2), Some(100)),
            Classification::Unchanged
        );
    }

    #[test]
    fn test_derive_formulas_zero_jitter() {
        let detector = ChangeDetector::with_jitter(Box::new(ZeroJitter));
        let derived = detector.derive(&record(100.0));

        assert_eq!(derived.billing, 100);
        assert_eq!(derived.month_plan, 170); // 100*1.2+50
        assert_eq!(derived.avl_stock, 150); // 100*1.5
        assert_eq!(derived.transit, 30); // 100*0.3
        assert_eq!(derived.op_stock, 220); // 150+100-30
    }

    #[test]
    fn test_derive_op_stock_floor_at_zero() {
        // 可用库存扰动取 0，在途扰动取接近上界 → 差值为负，应截断为 0
        struct SkewedJitter;
        impl JitterSource for SkewedJitter {
            fn sample(&self, upper: f64) -> f64 {
                if upper > TRANSIT_JITTER_MAX {
                    0.0
                } else {
                    upper - 0.1
                }
            }
        }

        let detector = ChangeDetector::with_jitter(Box::new(SkewedJitter));
        let derived = detector.derive(&record(0.0));

        assert_eq!(derived.avl_stock, 0);
        assert_eq!(derived.transit, 10);
        assert_eq!(derived.op_stock, 0);
    }

    #[test]
    fn test_derive_jitter_within_bounds() {
        let detector = ChangeDetector::new();
        for _ in 0..50 {
            let derived = detector.derive(&record(100.0));
            assert!((150..=170).contains(&derived.avl_stock));
            assert!((30..=40).contains(&derived.transit));
            assert!(derived.op_stock >= 0);
        }
    }
}
