// ==========================================
// 销售/库存智能门户 - 上传历史存储
// ==========================================
// 写路径: 事务内追加审计记录（与库存写入同事务提交）
// 读路径: 按上传时间倒序的分页查询
// ==========================================

use crate::domain::upload::{NewUploadHistory, UploadHistory, UploadHistoryPage};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::PortalStore;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Transaction;
use tracing::debug;

/// 在事务内追加一条上传审计记录，返回新行 id
pub fn insert_history_tx(tx: &Transaction, record: &NewUploadHistory) -> RepositoryResult<i64> {
    let branches_json = serde_json::to_string(&record.branches_affected)?;
    let summary_json = serde_json::to_string(&record.summary)?;

    tx.execute(
        "INSERT INTO upload_history \
         (user_id, filename, upload_date, records_processed, records_new, records_updated, \
          records_skipped, date_range_start, date_range_end, branches_affected, summary, \
          processing_time_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            record.user_id,
            record.filename,
            Utc::now().to_rfc3339(),
            record.records_processed,
            record.records_new,
            record.records_updated,
            record.records_skipped,
            record.date_range_start.format("%Y-%m-%d").to_string(),
            record.date_range_end.format("%Y-%m-%d").to_string(),
            branches_json,
            summary_json,
            record.processing_time_ms,
        ],
    )?;

    let id = tx.last_insert_rowid();
    debug!(history_id = id, "上传审计记录已写入");
    Ok(id)
}

// ==========================================
// PortalStore 上的历史分页查询
// ==========================================
impl PortalStore {
    /// 按上传时间倒序分页读取历史记录
    pub async fn recent_uploads(
        &self,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<UploadHistoryPage> {
        let conn = self.lock()?;

        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM upload_history", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, filename, upload_date, records_processed, records_new, \
                    records_updated, records_skipped, date_range_start, date_range_end, \
                    branches_affected, summary, processing_time_ms \
             FROM upload_history \
             ORDER BY upload_date DESC \
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(rusqlite::params![limit, offset], |row| {
            Ok(RawHistoryRow {
                id: row.get(0)?,
                user_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                filename: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                upload_date: row.get(3)?,
                records_processed: row.get(4)?,
                records_new: row.get(5)?,
                records_updated: row.get(6)?,
                records_skipped: row.get(7)?,
                date_range_start: row.get(8)?,
                date_range_end: row.get(9)?,
                branches_affected: row.get::<_, Option<String>>(10)?,
                summary: row.get::<_, Option<String>>(11)?,
                processing_time_ms: row.get::<_, Option<i64>>(12)?.unwrap_or(0),
            })
        })?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row?.into_history()?);
        }

        let has_more = offset + (history.len() as i64) < total;

        Ok(UploadHistoryPage {
            history,
            total,
            has_more,
        })
    }
}

/// 数据库行的中间形态（JSON 列尚未解码）
struct RawHistoryRow {
    id: i64,
    user_id: i64,
    filename: String,
    upload_date: String,
    records_processed: i64,
    records_new: i64,
    records_updated: i64,
    records_skipped: i64,
    date_range_start: Option<String>,
    date_range_end: Option<String>,
    branches_affected: Option<String>,
    summary: Option<String>,
    processing_time_ms: i64,
}

impl RawHistoryRow {
    fn into_history(self) -> RepositoryResult<UploadHistory> {
        let upload_date = parse_upload_date(&self.upload_date)?;
        let branches_affected = match self.branches_affected {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        let summary = match self.summary {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => serde_json::Value::Null,
        };

        Ok(UploadHistory {
            id: self.id,
            user_id: self.user_id,
            filename: self.filename,
            upload_date,
            records_processed: self.records_processed,
            records_new: self.records_new,
            records_updated: self.records_updated,
            records_skipped: self.records_skipped,
            date_range_start: parse_opt_date(self.date_range_start.as_deref()),
            date_range_end: parse_opt_date(self.date_range_end.as_deref()),
            branches_affected,
            summary,
            processing_time_ms: self.processing_time_ms,
        })
    }
}

/// 解析上传时间（RFC3339 写入；兼容 CURRENT_TIMESTAMP 缺省格式）
fn parse_upload_date(raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .map_err(|e| RepositoryError::FieldValueError {
            field: "upload_date".to_string(),
            message: format!("时间戳解析失败: {}", e),
        })
}

fn parse_opt_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;

    fn history(filename: &str) -> NewUploadHistory {
        NewUploadHistory {
            user_id: 7,
            filename: filename.to_string(),
            records_processed: 10,
            records_new: 4,
            records_updated: 3,
            records_skipped: 3,
            date_range_start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            date_range_end: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            branches_affected: vec!["CHENNAI".to_string()],
            summary: serde_json::json!({"processingTimeMs": 12}),
            processing_time_ms: 12,
        }
    }

    #[tokio::test]
    async fn test_insert_and_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        {
            let tx = conn.unchecked_transaction().unwrap();
            insert_history_tx(&tx, &history("stock.csv")).unwrap();
            tx.commit().unwrap();
        }

        let store = PortalStore::from_connection(conn);
        let page = store.recent_uploads(10, 0).await.unwrap();

        assert_eq!(page.total, 1);
        assert!(!page.has_more);
        let entry = &page.history[0];
        assert_eq!(entry.filename, "stock.csv");
        assert_eq!(entry.user_id, 7);
        assert_eq!(entry.branches_affected, vec!["CHENNAI"]);
        assert_eq!(entry.summary["processingTimeMs"], 12);
        assert_eq!(
            entry.date_range_start,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[tokio::test]
    async fn test_pagination_has_more() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        {
            let tx = conn.unchecked_transaction().unwrap();
            for i in 0..5 {
                insert_history_tx(&tx, &history(&format!("file-{}.csv", i))).unwrap();
            }
            tx.commit().unwrap();
        }

        let store = PortalStore::from_connection(conn);

        let first = store.recent_uploads(2, 0).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.history.len(), 2);
        assert!(first.has_more);

        let last = store.recent_uploads(2, 4).await.unwrap();
        assert_eq!(last.history.len(), 1);
        assert!(!last.has_more);
    }
}
