// ==========================================
// 销售/库存智能门户 - 存储层模块
// ==========================================
// 结构:
// - PortalStore: 共享连接句柄（Arc<Mutex<Connection>>），对外的读查询入口
// - *_repo: 事务作用域内的写/查静态函数（接收 &Transaction 组合使用）
// ==========================================

pub mod error;
pub mod inventory_repo;
pub mod reference_repo;
pub mod upload_history_repo;

pub use error::{RepositoryError, RepositoryResult};

use crate::db;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

// ==========================================
// PortalStore - 共享数据库句柄
// ==========================================
#[derive(Clone)]
pub struct PortalStore {
    conn: Arc<Mutex<Connection>>,
}

impl PortalStore {
    /// 打开（必要时创建）数据库文件并初始化表结构
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)?;
        db::init_schema(&conn)?;
        info!(db_path = %db_path, "数据库已打开并完成初始化");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从既有连接构造（测试用，通常配合内存库）
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// 获取连接锁；锁中毒映射为存储层错误而非 panic
    pub(crate) fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("数据库连接锁获取失败: {}", e)))
    }
}
