// ==========================================
// 销售/库存智能门户 - 上传管线错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播策略: 行级问题不进此枚举（按行计数吸收）；
//           触及事务边界的错误向上传播并整体回滚
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 上传管线错误类型
///
/// 调用方要么得到完整的成功报告，要么得到单个带可读原因的错误；
/// 不存在部分成功的返回。
#[derive(Error, Debug)]
pub enum UploadError {
    // ===== 输入相关错误（写入前失败，无需回滚）=====
    #[error("上传文件无有效数据: {0}")]
    MalformedInput(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("表格解析失败: {0}")]
    SheetParse(String),

    // ===== 引用实体创建错误（事务内，整体回滚）=====
    #[error("引用实体创建失败: {0}")]
    ReferenceCreation(String),

    // ===== 存储错误（事务内，整体回滚）=====
    #[error("存储写入失败: {0}")]
    Storage(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>（经由存储层错误分类）
impl From<rusqlite::Error> for UploadError {
    fn from(err: rusqlite::Error) -> Self {
        UploadError::Storage(RepositoryError::from(err))
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for UploadError {
    fn from(err: csv::Error) -> Self {
        UploadError::SheetParse(format!("CSV 解析失败: {}", err))
    }
}

/// 行级拒绝原因（不作为错误传播，由批次计数吸收）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    /// 分支名为空白
    MissingBranch,
    /// 物料号缺失或为空白
    MissingItemCode,
    /// 显式数量列存在但无法解析为数值
    InvalidQuantity,
}

impl std::fmt::Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowRejection::MissingBranch => write!(f, "分支名为空"),
            RowRejection::MissingItemCode => write!(f, "物料号为空"),
            RowRejection::InvalidQuantity => write!(f, "数量无法解析为数值"),
        }
    }
}

/// Result 类型别名
pub type UploadResult<T> = Result<T, UploadError>;
