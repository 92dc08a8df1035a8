// ==========================================
// 销售/库存智能门户 - 上传管线 Trait
// ==========================================
// 职责: 定义上传管线各阶段接口（不包含实现）
// ==========================================

use crate::domain::upload::UploadReport;
use crate::pipeline::error::{UploadError, UploadResult};
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// UploadPipeline Trait
// ==========================================
// 用途: 上传对账主接口，HTTP 层的唯一入口
// 实现者: UploadOrchestrator
#[async_trait]
pub trait UploadPipeline: Send + Sync {
    /// 处理一次报表上传
    ///
    /// # 参数
    /// - data: 上传文件的原始字节（HTTP 层已完成鉴权并取出 buffer）
    /// - user_id: 已认证的用户 id（写入审计记录）
    /// - filename: 原始文件名（决定解析器、写入审计记录）
    ///
    /// # 返回
    /// - Ok(UploadReport): 完整成功报告
    /// - Err(UploadError): 单个可读错误；保证无部分写入可见
    ///
    /// # 流程（状态机）
    /// Reading → Normalizing → Resolving → Detecting → Writing →
    /// Committed | Aborted
    async fn process_upload(
        &self,
        data: &[u8],
        user_id: i64,
        filename: &str,
    ) -> Result<UploadReport, UploadError>;
}

// ==========================================
// SheetParser Trait
// ==========================================
// 用途: 表格解码接口（Reading 阶段）
// 实现者: XlsxSheetParser, XlsSheetParser, CsvSheetParser, UniversalSheetParser
pub trait SheetParser: Send + Sync {
    /// 将原始字节解码为行映射列表（HashMap<列名, 值>）
    ///
    /// # 约定
    /// - 第 0 行为表头，其后每行按表头对齐
    /// - 完全空白的行被跳过，不计入返回结果
    /// - filename 仅用于确定格式（扩展名）
    fn parse_rows(
        &self,
        data: &[u8],
        filename: &str,
    ) -> UploadResult<Vec<HashMap<String, String>>>;
}

// ==========================================
// JitterSource Trait
// ==========================================
// 用途: 派生字段的有界随机项（Detecting 阶段）
// 说明: 随机项是预测模型缺位时的占位；边界可注入，
//       测试只断言边界、不断言具体值
pub trait JitterSource: Send + Sync {
    /// 返回 [0, upper) 区间内的均匀随机数
    fn sample(&self, upper: f64) -> f64;
}
