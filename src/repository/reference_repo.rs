// ==========================================
// 销售/库存智能门户 - 引用实体存储（物料/分支）
// ==========================================
// 约定:
// - 全部函数接收 &Transaction，由调用方控制事务边界
// - 返回的映射键一律为大写规范形式
// - 插入采用 ON CONFLICT DO NOTHING，之后重查 id（对并发友好）
// ==========================================

use crate::repository::error::RepositoryResult;
use rusqlite::{types::Value, Transaction};
use std::collections::HashMap;

/// 物料建档的种子属性（取首次出现的那一行）
#[derive(Debug, Clone)]
pub struct ProductSeed {
    pub material: String,
    pub tonnage: f64,
    pub star: i32,
    pub technology: String,
}

/// 加载全部物料的 大写物料号 → id 映射
pub fn load_product_map_tx(tx: &Transaction) -> RepositoryResult<HashMap<String, i64>> {
    let mut stmt = tx.prepare("SELECT id, material FROM products")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(1)?.to_uppercase(), row.get::<_, i64>(0)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (material, id) = row?;
        map.insert(material, id);
    }
    Ok(map)
}

/// 加载全部分支的 大写分支名 → id 映射
pub fn load_branch_map_tx(tx: &Transaction) -> RepositoryResult<HashMap<String, i64>> {
    let mut stmt = tx.prepare("SELECT id, name FROM branches")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(1)?.to_uppercase(), row.get::<_, i64>(0)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (name, id) = row?;
        map.insert(name, id);
    }
    Ok(map)
}

/// 批量插入缺失分支（已存在的静默跳过）
pub fn insert_missing_branches_tx(tx: &Transaction, names: &[String]) -> RepositoryResult<()> {
    if names.is_empty() {
        return Ok(());
    }

    // 动态拼多行 VALUES
    let placeholders: Vec<String> = (0..names.len())
        .map(|i| format!("(?{})", i + 1))
        .collect();
    let sql = format!(
        "INSERT INTO branches (name) VALUES {} ON CONFLICT(name) DO NOTHING",
        placeholders.join(", ")
    );

    let params: Vec<Value> = names.iter().map(|n| Value::from(n.clone())).collect();
    tx.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(())
}

/// 重查一组分支名对应的 id
pub fn requery_branch_ids_tx(
    tx: &Transaction,
    names: &[String],
) -> RepositoryResult<HashMap<String, i64>> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 1)).collect();
    let sql = format!(
        "SELECT id, UPPER(name) FROM branches WHERE UPPER(name) IN ({})",
        placeholders.join(", ")
    );

    let params: Vec<Value> = names.iter().map(|n| Value::from(n.clone())).collect();
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
        Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (name, id) = row?;
        map.insert(name, id);
    }
    Ok(map)
}

/// 批量插入缺失物料（带种子属性，已存在的静默跳过）
pub fn insert_missing_products_tx(tx: &Transaction, seeds: &[ProductSeed]) -> RepositoryResult<()> {
    if seeds.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (0..seeds.len())
        .map(|i| {
            let base = i * 4;
            format!("(?{}, ?{}, ?{}, ?{})", base + 1, base + 2, base + 3, base + 4)
        })
        .collect();
    let sql = format!(
        "INSERT INTO products (material, tonnage, star, technology) VALUES {} \
         ON CONFLICT(material) DO NOTHING",
        placeholders.join(", ")
    );

    let mut params: Vec<Value> = Vec::with_capacity(seeds.len() * 4);
    for seed in seeds {
        params.push(Value::from(seed.material.clone()));
        params.push(Value::from(seed.tonnage));
        params.push(Value::from(seed.star as i64));
        params.push(Value::from(seed.technology.clone()));
    }
    tx.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(())
}

/// 重查一组物料号对应的 id
pub fn requery_product_ids_tx(
    tx: &Transaction,
    materials: &[String],
) -> RepositoryResult<HashMap<String, i64>> {
    if materials.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (0..materials.len())
        .map(|i| format!("?{}", i + 1))
        .collect();
    let sql = format!(
        "SELECT id, UPPER(material) FROM products WHERE UPPER(material) IN ({})",
        placeholders.join(", ")
    );

    let params: Vec<Value> = materials.iter().map(|m| Value::from(m.clone())).collect();
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
        Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (material, id) = row?;
        map.insert(material, id);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_requery_branches() {
        let mut conn = test_conn();
        let tx = conn.transaction().unwrap();

        let names = vec!["CHENNAI".to_string(), "MUMBAI".to_string()];
        insert_missing_branches_tx(&tx, &names).unwrap();
        // 重复插入静默跳过
        insert_missing_branches_tx(&tx, &names).unwrap();

        let map = requery_branch_ids_tx(&tx, &names).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("CHENNAI"));
        assert!(map.contains_key("MUMBAI"));
    }

    #[test]
    fn test_insert_products_with_seed_attributes() {
        let mut conn = test_conn();
        let tx = conn.transaction().unwrap();

        let seeds = vec![ProductSeed {
            material: "AC-100".to_string(),
            tonnage: 1.5,
            star: 5,
            technology: "Inverter".to_string(),
        }];
        insert_missing_products_tx(&tx, &seeds).unwrap();

        let map = requery_product_ids_tx(&tx, &["AC-100".to_string()]).unwrap();
        assert_eq!(map.len(), 1);

        let (tonnage, star, technology): (f64, i32, String) = tx
            .query_row(
                "SELECT tonnage, star, technology FROM products WHERE material = 'AC-100'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(tonnage, 1.5);
        assert_eq!(star, 5);
        assert_eq!(technology, "Inverter");
    }

    #[test]
    fn test_load_maps_uppercase_keys() {
        let mut conn = test_conn();
        conn.execute("INSERT INTO branches (name) VALUES ('chennai')", [])
            .unwrap();
        conn.execute("INSERT INTO products (material) VALUES ('ac-100')", [])
            .unwrap();

        let tx = conn.transaction().unwrap();
        let branches = load_branch_map_tx(&tx).unwrap();
        let products = load_product_map_tx(&tx).unwrap();

        assert!(branches.contains_key("CHENNAI"));
        assert!(products.contains_key("AC-100"));
    }
}
