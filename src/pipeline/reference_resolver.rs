// ==========================================
// 销售/库存智能门户 - 引用实体解析器
// ==========================================
// 职责: 把记录中的分支名/物料号映射为数据库 id，
//       缺失的实体在同一事务内自动建档
// 并发约束: 插入一律 insert-ignore 后重查 id，
//           与并行上传竞争时以数据库现有行为准
// ==========================================

use crate::domain::inventory::CanonicalRecord;
use crate::domain::upload::CreatedEntities;
use crate::repository::error::RepositoryResult;
use crate::repository::reference_repo::{self, ProductSeed};
use rusqlite::Transaction;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// 物料自动建档的分批大小
pub const PRODUCT_INSERT_BATCH_SIZE: usize = 500;

// ==========================================
// ReferenceResolver
// ==========================================
// 键一律为大写规范形式（与 CanonicalRecord 一致）
pub struct ReferenceResolver {
    products: HashMap<String, i64>,
    branches: HashMap<String, i64>,
    missing_products: BTreeSet<String>,
    missing_branches: BTreeSet<String>,
}

impl ReferenceResolver {
    /// 从数据库预加载全部现有引用实体
    pub fn preload(tx: &Transaction) -> RepositoryResult<Self> {
        let products = reference_repo::load_product_map_tx(tx)?;
        let branches = reference_repo::load_branch_map_tx(tx)?;

        debug!(
            products = products.len(),
            branches = branches.len(),
            "引用实体预加载完成"
        );

        Ok(Self {
            products,
            branches,
            missing_products: BTreeSet::new(),
            missing_branches: BTreeSet::new(),
        })
    }

    /// 登记一条记录引用的实体，缺失的进入待建集合
    pub fn observe(&mut self, record: &CanonicalRecord) {
        if !self.branches.contains_key(&record.branch_name) {
            self.missing_branches.insert(record.branch_name.clone());
        }
        if !self.products.contains_key(&record.item_code) {
            self.missing_products.insert(record.item_code.clone());
        }
    }

    /// 在事务内批量建档全部缺失实体并补全 id 映射
    ///
    /// 物料的种子属性取同一物料号首次出现的那一行
    pub fn create_missing(
        &mut self,
        tx: &Transaction,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<CreatedEntities> {
        let mut created = CreatedEntities {
            branches: 0,
            products: 0,
        };

        // ===== 分支建档 =====
        if !self.missing_branches.is_empty() {
            let names: Vec<String> = self.missing_branches.iter().cloned().collect();
            reference_repo::insert_missing_branches_tx(tx, &names)?;
            let resolved = reference_repo::requery_branch_ids_tx(tx, &names)?;
            created.branches = names.len();
            self.branches.extend(resolved);
            self.missing_branches.clear();
        }

        // ===== 物料建档（分批）=====
        if !self.missing_products.is_empty() {
            // 首次出现的行提供种子属性
            let mut seed_rows: HashMap<&str, &CanonicalRecord> = HashMap::new();
            for record in records {
                seed_rows.entry(record.item_code.as_str()).or_insert(record);
            }

            let codes: Vec<String> = self.missing_products.iter().cloned().collect();
            created.products = codes.len();

            for chunk in codes.chunks(PRODUCT_INSERT_BATCH_SIZE) {
                let seeds: Vec<ProductSeed> = chunk
                    .iter()
                    .map(|code| {
                        let source = seed_rows.get(code.as_str());
                        ProductSeed {
                            material: code.clone(),
                            tonnage: source.map(|r| r.tonnage).unwrap_or(1.0),
                            star: source.map(|r| r.star_rating).unwrap_or(3),
                            technology: source
                                .map(|r| r.technology.clone())
                                .unwrap_or_else(|| "Non Inv".to_string()),
                        }
                    })
                    .collect();

                reference_repo::insert_missing_products_tx(tx, &seeds)?;
                let resolved = reference_repo::requery_product_ids_tx(tx, chunk)?;
                self.products.extend(resolved);
            }
            self.missing_products.clear();
        }

        if created.branches > 0 || created.products > 0 {
            info!(
                new_branches = created.branches,
                new_products = created.products,
                "缺失引用实体已自动建档"
            );
        }

        Ok(created)
    }

    pub fn product_id(&self, item_code: &str) -> Option<i64> {
        self.products.get(item_code).copied()
    }

    pub fn branch_id(&self, branch_name: &str) -> Option<i64> {
        self.branches.get(branch_name).copied()
    }
}
