// ==========================================
// 销售/库存智能门户 - 库存快照存储
// ==========================================
// 写路径: 事务内分批 upsert，按 (product_id, branch_id) 唯一键
// 读路径: 上传日期窗口内的现有开票量（变更检测用）、按分支的新鲜度报告
// ==========================================

use crate::domain::inventory::{InventoryWrite, RecordKey};
use crate::domain::upload::{BranchFreshness, DateRange, FreshnessOverview, FreshnessReport};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::PortalStore;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{types::Value, Transaction};
use std::collections::HashMap;
use tracing::debug;

/// upsert 分批大小
pub const UPSERT_BATCH_SIZE: usize = 500;

/// 新鲜度判定: 不超过该天数视为最新
const FRESH_MAX_DAYS: i64 = 1;
/// 新鲜度判定: 超过该天数视为待更新
const STALE_MIN_DAYS: i64 = 3;

// ==========================================
// 事务作用域内的读写
// ==========================================

/// 加载上传日期窗口内的现有快照，键为 (写入日, 分支名, 物料号)
///
/// 写入日取 updated_at 的日期部分，与本次上传各行的表内日期比对
pub fn load_existing_window_tx(
    tx: &Transaction,
    range: &DateRange,
) -> RepositoryResult<HashMap<RecordKey, i64>> {
    let mut stmt = tx.prepare(
        "SELECT date(i.updated_at), UPPER(b.name), UPPER(p.material), i.billing \
         FROM inventory i \
         JOIN products p ON p.id = i.product_id \
         JOIN branches b ON b.id = i.branch_id \
         WHERE date(i.updated_at) BETWEEN ?1 AND ?2",
    )?;

    let rows = stmt.query_map(
        rusqlite::params![
            range.start.format("%Y-%m-%d").to_string(),
            range.end.format("%Y-%m-%d").to_string()
        ],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;

    let mut existing = HashMap::new();
    for row in rows {
        let (date_str, branch_name, item_code, billing) = row?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            RepositoryError::FieldValueError {
                field: "updated_at".to_string(),
                message: format!("日期解析失败: {}", e),
            }
        })?;
        existing.insert(
            RecordKey {
                date,
                branch_name,
                item_code,
            },
            billing,
        );
    }

    debug!(window_records = existing.len(), "日期窗口内现有快照已加载");
    Ok(existing)
}

/// 分批 upsert 库存快照；冲突时整行覆盖并刷新 updated_at
pub fn upsert_batch_tx(tx: &Transaction, writes: &[InventoryWrite]) -> RepositoryResult<usize> {
    let mut written = 0usize;
    for chunk in writes.chunks(UPSERT_BATCH_SIZE) {
        written += upsert_chunk_tx(tx, chunk)?;
    }
    Ok(written)
}

const INVENTORY_COLUMNS: usize = 13;

fn upsert_chunk_tx(tx: &Transaction, chunk: &[InventoryWrite]) -> RepositoryResult<usize> {
    if chunk.is_empty() {
        return Ok(0);
    }

    // 动态拼多行 VALUES，占位符编号全局连续
    let placeholders: Vec<String> = (0..chunk.len())
        .map(|i| {
            let base = i * INVENTORY_COLUMNS;
            let nums: Vec<String> = (1..=INVENTORY_COLUMNS)
                .map(|j| format!("?{}", base + j))
                .collect();
            format!("({})", nums.join(", "))
        })
        .collect();

    let sql = format!(
        "INSERT INTO inventory (product_id, branch_id, op_stock, avl_stock, transit, billing, \
         month_plan, demand_plan, sku_opening_stock, goods_in_transit, final_balance_produce, \
         mtd_invoicing, category) VALUES {} \
         ON CONFLICT(product_id, branch_id) DO UPDATE SET \
         op_stock = excluded.op_stock, \
         avl_stock = excluded.avl_stock, \
         transit = excluded.transit, \
         billing = excluded.billing, \
         month_plan = excluded.month_plan, \
         demand_plan = excluded.demand_plan, \
         sku_opening_stock = excluded.sku_opening_stock, \
         goods_in_transit = excluded.goods_in_transit, \
         final_balance_produce = excluded.final_balance_produce, \
         mtd_invoicing = excluded.mtd_invoicing, \
         category = excluded.category, \
         updated_at = CURRENT_TIMESTAMP",
        placeholders.join(", ")
    );

    let mut params: Vec<Value> = Vec::with_capacity(chunk.len() * INVENTORY_COLUMNS);
    for write in chunk {
        params.push(Value::from(write.product_id));
        params.push(Value::from(write.branch_id));
        params.push(Value::from(write.op_stock));
        params.push(Value::from(write.avl_stock));
        params.push(Value::from(write.transit));
        params.push(Value::from(write.billing));
        params.push(Value::from(write.month_plan));
        params.push(Value::from(write.demand_plan));
        params.push(Value::from(write.sku_opening_stock));
        params.push(Value::from(write.goods_in_transit));
        params.push(Value::from(write.final_balance_produce));
        params.push(Value::from(write.mtd_invoicing));
        params.push(Value::from(write.category.clone()));
    }

    tx.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(chunk.len())
}

// ==========================================
// PortalStore 上的新鲜度读查询
// ==========================================
impl PortalStore {
    /// 按分支统计库存数据新鲜度
    ///
    /// days_old 按 julianday 差值取整；从未写入的分支为 None，排在末尾
    pub async fn branch_freshness(&self) -> RepositoryResult<FreshnessReport> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT b.name, \
                    MAX(i.updated_at), \
                    CAST(julianday('now') - julianday(MAX(i.updated_at)) AS INTEGER), \
                    COUNT(i.id) \
             FROM branches b \
             LEFT JOIN inventory i ON i.branch_id = b.id \
             GROUP BY b.id, b.name \
             ORDER BY (MAX(i.updated_at) IS NULL), 3 ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut freshness = Vec::new();
        for row in rows {
            let (branch_name, last_updated_raw, days_old, total_records) = row?;
            let last_updated = match last_updated_raw {
                Some(raw) => Some(parse_sqlite_timestamp(&raw)?),
                None => None,
            };
            freshness.push(BranchFreshness {
                branch_name,
                last_updated,
                days_old,
                total_records,
            });
        }

        let overview = FreshnessOverview {
            total_branches: freshness.len(),
            up_to_date: freshness
                .iter()
                .filter(|f| matches!(f.days_old, Some(d) if d <= FRESH_MAX_DAYS))
                .count(),
            needs_update: freshness
                .iter()
                .filter(|f| matches!(f.days_old, Some(d) if d > STALE_MIN_DAYS) || f.days_old.is_none())
                .count(),
            total_records: freshness.iter().map(|f| f.total_records).sum(),
        };

        Ok(FreshnessReport {
            freshness,
            overview,
        })
    }
}

/// 解析 SQLite CURRENT_TIMESTAMP 文本（UTC，无时区后缀）
fn parse_sqlite_timestamp(raw: &str) -> RepositoryResult<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| RepositoryError::FieldValueError {
            field: "updated_at".to_string(),
            message: format!("时间戳解析失败: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn.execute("INSERT INTO products (material) VALUES ('AC-100')", [])
            .unwrap();
        conn.execute("INSERT INTO branches (name) VALUES ('CHENNAI')", [])
            .unwrap();
        conn
    }

    fn write(product_id: i64, branch_id: i64, billing: i64) -> InventoryWrite {
        InventoryWrite {
            product_id,
            branch_id,
            op_stock: 10,
            avl_stock: 20,
            transit: 5,
            billing,
            month_plan: 60,
            demand_plan: 0,
            sku_opening_stock: 0,
            goods_in_transit: 0,
            final_balance_produce: 0,
            mtd_invoicing: 0,
            category: String::new(),
        }
    }

    #[test]
    fn test_upsert_insert_then_overwrite() {
        let mut conn = seeded_conn();
        let tx = conn.transaction().unwrap();

        assert_eq!(upsert_batch_tx(&tx, &[write(1, 1, 100)]).unwrap(), 1);
        // 同键再写 → 覆盖而非新增
        assert_eq!(upsert_batch_tx(&tx, &[write(1, 1, 120)]).unwrap(), 1);

        let (count, billing): (i64, i64) = tx
            .query_row("SELECT COUNT(*), MAX(billing) FROM inventory", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(billing, 120);
    }

    #[test]
    fn test_load_existing_window_keys_by_write_date() {
        let mut conn = seeded_conn();
        let tx = conn.transaction().unwrap();
        upsert_batch_tx(&tx, &[write(1, 1, 100)]).unwrap();
        tx.commit().unwrap();

        let today = Utc::now().date_naive();
        let tx = conn.transaction().unwrap();
        let existing =
            load_existing_window_tx(&tx, &DateRange::single(today)).unwrap();

        assert_eq!(existing.len(), 1);
        let key = RecordKey {
            date: today,
            branch_name: "CHENNAI".to_string(),
            item_code: "AC-100".to_string(),
        };
        assert_eq!(existing.get(&key), Some(&100));
    }

    #[test]
    fn test_load_existing_window_excludes_outside_range() {
        let mut conn = seeded_conn();
        let tx = conn.transaction().unwrap();
        upsert_batch_tx(&tx, &[write(1, 1, 100)]).unwrap();
        tx.commit().unwrap();

        // 仅查询过去的窗口（不含今天）
        let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let tx = conn.transaction().unwrap();
        let existing = load_existing_window_tx(
            &tx,
            &DateRange {
                start: past,
                end: past,
            },
        )
        .unwrap();

        assert!(existing.is_empty());
    }

    #[tokio::test]
    async fn test_branch_freshness_counts() {
        let conn = seeded_conn();
        {
            let tx = conn.unchecked_transaction().unwrap();
            upsert_batch_tx(&tx, &[write(1, 1, 100)]).unwrap();
            tx.commit().unwrap();
        }
        // 从未写入的分支
        conn.execute("INSERT INTO branches (name) VALUES ('MUMBAI')", [])
            .unwrap();

        let store = PortalStore::from_connection(conn);
        let report = store.branch_freshness().await.unwrap();

        assert_eq!(report.overview.total_branches, 2);
        assert_eq!(report.overview.up_to_date, 1);
        assert_eq!(report.overview.needs_update, 1);
        assert_eq!(report.overview.total_records, 1);
        // 有数据的分支排在前，无数据的排在末尾
        assert_eq!(report.freshness[0].branch_name, "CHENNAI");
        assert!(report.freshness[1].last_updated.is_none());
    }
}
