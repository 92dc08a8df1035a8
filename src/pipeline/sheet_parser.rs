// ==========================================
// 销售/库存智能门户 - 表格解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输入: 上传文件的原始字节（HTTP 层交付 buffer，不落磁盘）
// ==========================================

use crate::pipeline::error::{UploadError, UploadResult};
use crate::pipeline::upload_pipeline_trait::SheetParser;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvSheetParser;

impl SheetParser for CsvSheetParser {
    fn parse_rows(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> UploadResult<Vec<HashMap<String, String>>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(Cursor::new(data));

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // 读取所有数据行
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct XlsxSheetParser;

impl SheetParser for XlsxSheetParser {
    fn parse_rows(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> UploadResult<Vec<HashMap<String, String>>> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))
            .map_err(|e| UploadError::SheetParse(format!("Excel 解析失败: {}", e)))?;
        first_sheet_rows(&mut workbook)
    }
}

// ==========================================
// 旧版 Excel (.xls) Parser 实现
// ==========================================
pub struct XlsSheetParser;

impl SheetParser for XlsSheetParser {
    fn parse_rows(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> UploadResult<Vec<HashMap<String, String>>> {
        let mut workbook: Xls<_> = Xls::new(Cursor::new(data))
            .map_err(|e| UploadError::SheetParse(format!("Excel 解析失败: {}", e)))?;
        first_sheet_rows(&mut workbook)
    }
}

/// 取第一个工作表并转为行映射
fn first_sheet_rows<'a, R>(workbook: &mut R) -> UploadResult<Vec<HashMap<String, String>>>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: std::fmt::Display,
{
    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet_names.first() {
        Some(name) => name.clone(),
        None => {
            return Err(UploadError::MalformedInput("Excel 文件无工作表".to_string()));
        }
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| UploadError::SheetParse(format!("Excel 解析失败: {}", e)))?;

    Ok(range_to_rows(&range))
}

/// 第一行作表头，其后每行对齐表头转为映射；完全空白的行被跳过
fn range_to_rows(range: &Range<Data>) -> Vec<HashMap<String, String>> {
    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(row) => row,
        None => return Vec::new(), // 空 sheet 由编排器按 MalformedInput 处理
    };

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let mut records = Vec::new();
    for data_row in rows {
        let mut row_map = HashMap::new();

        for (col_idx, cell) in data_row.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                row_map.insert(header.clone(), cell.to_string().trim().to_string());
            }
        }

        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }

        records.push(row_map);
    }

    records
}

// ==========================================
// 通用解析器（根据文件名扩展名自动选择）
// ==========================================
pub struct UniversalSheetParser;

impl SheetParser for UniversalSheetParser {
    fn parse_rows(
        &self,
        data: &[u8],
        filename: &str,
    ) -> UploadResult<Vec<HashMap<String, String>>> {
        let ext = filename
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvSheetParser.parse_rows(data, filename),
            "xlsx" => XlsxSheetParser.parse_rows(data, filename),
            "xls" => XlsSheetParser.parse_rows(data, filename),
            _ => Err(UploadError::UnsupportedFormat(ext)),
        }
    }
}
