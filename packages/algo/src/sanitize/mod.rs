//! Data Sanitization
//!
//! Cleaning of loosely typed source cells.
//!
//! Functions:
//! - Finite number parsing for IRT parameters
//! - Knowledge point field splitting and quote stripping

use crate::types::ParamValue;

/// Quote characters that may wrap a knowledge point label
pub const QUOTE_CHARS: [char; 4] = ['"', '\'', '“', '”'];

/// Knowledge point delimiter
pub const KNOWLEDGE_POINT_DELIMITER: char = ',';

/// 检查数组是否包含无效值 (NaN 或 Inf)
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// 解析参数单元格为有限浮点数，无法解析时返回 None
pub fn parse_finite(value: &ParamValue) -> Option<f64> {
    let parsed = match value {
        ParamValue::Number(v) => *v,
        ParamValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    parsed.is_finite().then_some(parsed)
}

/// 去除首尾空白与包裹引号
pub fn strip_wrapping_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(&QUOTE_CHARS[..]).trim()
}

/// 清理单个知识点标签
pub fn clean_token(raw: &str) -> String {
    strip_wrapping_quotes(raw).to_string()
}

/// 拆分逗号分隔的知识点字段，保留空标签
pub fn split_knowledge_points(raw: &str) -> Vec<String> {
    strip_wrapping_quotes(raw)
        .split(KNOWLEDGE_POINT_DELIMITER)
        .map(clean_token)
        .collect()
}
