// ==========================================
// 销售/库存智能门户 - 日期规范化器
// ==========================================
// 职责: 把异构的单元格日期统一为日历日期（无时间分量）
// 规则按序尝试，先命中先用:
//   1. Excel 序列日期（1 < n < 100000，纪元 1899-12-30，epoch + (n-2) 天）
//   2. DD-MM-YYYY（欧式日-月-年，不是月-日-年）
//   3. 通用格式；全部失败则取当天
// 不做任何时区换算，按天粒度比较
// ==========================================

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Excel 序列日期的有效区间（开区间）
const SERIAL_MIN: f64 = 1.0;
const SERIAL_MAX: f64 = 100_000.0;

/// 规范化单元格日期，空值/解析失败回落到当天（UTC）
pub fn normalize(raw: &str) -> NaiveDate {
    normalize_with(raw, Utc::now().date_naive())
}

/// 规范化单元格日期，回落日期由调用方指定（测试用）
pub fn normalize_with(raw: &str, fallback: NaiveDate) -> NaiveDate {
    let clean = raw.trim();
    if clean.is_empty() {
        return fallback;
    }

    // 规则 1: Excel 序列日期（最常见）
    if let Ok(n) = clean.parse::<f64>() {
        if n > SERIAL_MIN && n < SERIAL_MAX {
            if let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) {
                // 经典的差 2 序列约定；小数部分（时间）按天取整丢弃
                return epoch + Duration::days((n - 2.0).floor() as i64);
            }
        }
        // 数值但超出序列区间：落到通用解析（必然失败→fallback）
    }

    // 规则 2: DD-MM-YYYY（欧式顺序）
    if let Some(date) = parse_day_month_year(clean) {
        return date;
    }

    // 规则 3: 通用日期字符串
    parse_generic(clean).unwrap_or(fallback)
}

/// 解析 D{1,2}-M{1,2}-YYYY；月/日非法时返回 None 交给通用解析
fn parse_day_month_year(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let (d, m, y) = (parts[0], parts[1], parts[2]);
    if d.is_empty() || d.len() > 2 || m.is_empty() || m.len() > 2 || y.len() != 4 {
        return None;
    }
    if !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let day: u32 = d.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    let year: i32 = y.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 通用日期字符串解析（ISO 优先）
fn parse_generic(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y/%m/%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    None
}
