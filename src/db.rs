// ==========================================
// 销售/库存智能门户 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发上传时的偶发 busy 错误
// - 建表语句集中在此处，管线各层不自带 DDL
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化对账管线依赖的表结构（幂等）
///
/// 说明：
/// - material / name 使用 NOCASE 排序规则，唯一约束大小写不敏感
/// - inventory 按 (product_id, branch_id) 唯一，无日期维度（快照语义）
/// - upload_history 只追加，branches_affected / summary 以 JSON 文本存储
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            material        TEXT NOT NULL COLLATE NOCASE UNIQUE,
            tonnage         REAL NOT NULL DEFAULT 1.0,
            star            INTEGER NOT NULL DEFAULT 3,
            technology      TEXT NOT NULL DEFAULT 'Non Inv',
            price           REAL NOT NULL DEFAULT 35000,
            factory_stock   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS branches (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL COLLATE NOCASE UNIQUE,
            state           TEXT NOT NULL DEFAULT 'Unknown',
            market_share    REAL NOT NULL DEFAULT 15,
            penetration     REAL NOT NULL DEFAULT 70
        );

        CREATE TABLE IF NOT EXISTS inventory (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id            INTEGER NOT NULL REFERENCES products(id),
            branch_id             INTEGER NOT NULL REFERENCES branches(id),
            op_stock              INTEGER NOT NULL DEFAULT 0,
            avl_stock             INTEGER NOT NULL DEFAULT 0,
            transit               INTEGER NOT NULL DEFAULT 0,
            billing               INTEGER NOT NULL DEFAULT 0,
            month_plan            INTEGER NOT NULL DEFAULT 0,
            demand_plan           INTEGER NOT NULL DEFAULT 0,
            sku_opening_stock     INTEGER NOT NULL DEFAULT 0,
            goods_in_transit      INTEGER NOT NULL DEFAULT 0,
            final_balance_produce INTEGER NOT NULL DEFAULT 0,
            mtd_invoicing         INTEGER NOT NULL DEFAULT 0,
            category              TEXT NOT NULL DEFAULT '',
            updated_at            TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (product_id, branch_id)
        );

        CREATE TABLE IF NOT EXISTS upload_history (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id             INTEGER,
            filename            TEXT,
            upload_date         TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            records_processed   INTEGER NOT NULL DEFAULT 0,
            records_new         INTEGER NOT NULL DEFAULT 0,
            records_updated     INTEGER NOT NULL DEFAULT 0,
            records_skipped     INTEGER NOT NULL DEFAULT 0,
            date_range_start    TEXT,
            date_range_end      TEXT,
            branches_affected   TEXT,
            summary             TEXT,
            processing_time_ms  INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_upload_history_user_id ON upload_history(user_id);
        CREATE INDEX IF NOT EXISTS idx_upload_history_upload_date ON upload_history(upload_date);
        CREATE INDEX IF NOT EXISTS idx_inventory_branch_id ON inventory(branch_id);
        "#,
    )?;
    Ok(())
}
