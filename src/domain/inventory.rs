// ==========================================
// 销售/库存智能门户 - 库存领域模型
// ==========================================
// 对齐: db.rs products / branches / inventory 表
// 用途: 管线写入，查询层只读
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// RecordKey - 上传批次内的自然键
// ==========================================
// 不变式: 一次上传中每个 (date, branch, item) 键至多一条 CanonicalRecord
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub date: NaiveDate,
    pub branch_name: String, // 已 TRIM + UPPER
    pub item_code: String,   // 已 TRIM + UPPER
}

// ==========================================
// CanonicalRecord - 规范化行记录
// ==========================================
// 用途: 管线中间产物（表格行 → 别名解析 → 此结构）
// 生命周期: 仅在一次上传流程内
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    // ===== 自然键 =====
    pub date: NaiveDate,
    pub branch_name: String,
    pub item_code: String,

    // ===== 数量口径 =====
    pub billing: f64, // 同键多行累加（唯一的合并规则）

    // ===== Excel 附加字段（各自独立缺省）=====
    pub demand_plan: f64,
    pub opening_stock: f64, // 缺省取本行数量
    pub goods_in_transit: f64,
    pub final_balance_to_produce: f64,
    pub mtd_invoicing: f64,
    pub category: String,

    // ===== 产品种子字段（新产品建档用）=====
    pub tonnage: f64,     // 去除 " Tr" 后缀，缺省 1.0
    pub star_rating: i32, // 去除 "*" 标记，缺省 3
    pub technology: String, // 缺省 "Non Inv"
}

impl CanonicalRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            date: self.date,
            branch_name: self.branch_name.clone(),
            item_code: self.item_code.clone(),
        }
    }
}

// ==========================================
// Product - 产品主数据
// ==========================================
// 对齐: products 表
// 说明: 上传遇到未知物料号时自动建档，本管线从不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub material: String, // 物料号（唯一，大小写不敏感）
    pub tonnage: f64,
    pub star: i32,
    pub technology: String,
    pub price: f64,
    pub factory_stock: i64,
}

// ==========================================
// Branch - 分支机构主数据
// ==========================================
// 对齐: branches 表
// 说明: 未知分支名以占位属性自动建档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub name: String, // 分支名（唯一，大小写不敏感）
    pub state: String,
    pub market_share: f64,
    pub penetration: f64,
}

// ==========================================
// InventoryWrite - 待落库的库存快照
// ==========================================
// 对齐: inventory 表（按 (product_id, branch_id) 唯一，无日期维度）
// 说明: 派生字段已计算、数值已取整，后上传者覆盖前快照
#[derive(Debug, Clone)]
pub struct InventoryWrite {
    pub product_id: i64,
    pub branch_id: i64,
    pub op_stock: i64,
    pub avl_stock: i64,
    pub transit: i64,
    pub billing: i64,
    pub month_plan: i64,
    pub demand_plan: i64,
    pub sku_opening_stock: i64,
    pub goods_in_transit: i64,
    pub final_balance_produce: i64,
    pub mtd_invoicing: i64,
    pub category: String,
}

// ==========================================
// ChangeType / ChangeEntry - 变更审计条目
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    New,
    Updated,
}

/// 一条变更审计记录（写入 upload_history.summary，并用于显著变更列表）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub product: String,
    pub branch: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<i64>,
    pub new_value: i64,
    /// 新值 − 旧值；新建记录为 0
    pub change: i64,
}
