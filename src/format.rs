//! Pure display helpers shared by the widgets.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const CELL_MAX_CHARS: usize = 50;

/// `0 → "0 Bytes"`, `1536 → "1.5 KB"`, `2048 → "2 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut idx = 0;
    while idx + 1 < SIZE_UNITS.len() && bytes >= 1024u64.pow(idx as u32 + 1) {
        idx += 1;
    }
    let scaled = bytes as f64 / 1024u64.pow(idx as u32) as f64;
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[idx])
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
/// Naive timestamps are read as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Local.from_local_datetime(&naive).earliest()
}

/// Relative for the last week, absolute date otherwise. Unparseable input is
/// returned unchanged.
pub fn format_date(raw: &str, now: DateTime<Local>) -> String {
    let Some(date) = parse_timestamp(raw) else {
        return raw.to_string();
    };
    let diff_ms = (now - date).num_milliseconds().unsigned_abs();
    let day_ms = 24 * 60 * 60 * 1000;
    let diff_days = diff_ms.div_ceil(day_ms);
    match diff_days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        n if n < 7 => format!("{} days ago", n),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

/// `1234567 → "1,234,567"`.
pub fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let sign = if n < 0.0 { "-" } else { "" };
        return format!("{}{}", sign, with_thousands(n.abs() as u64));
    }
    let rounded = (n * 1000.0).round() / 1000.0;
    let sign = if rounded < 0.0 { "-" } else { "" };
    let text = format!("{}", rounded.abs());
    match text.split_once('.') {
        Some((int_part, frac)) => match int_part.parse::<u64>() {
            Ok(i) => format!("{}{}.{}", sign, with_thousands(i), frac),
            Err(_) => format!("{}{}", sign, text),
        },
        None => format!("{}{}", sign, text),
    }
}

/// `"100 rows • 4 columns"`, or `None` when either count is unknown.
pub fn format_shape(rows: Option<u64>, columns: Option<u64>) -> Option<String> {
    match (rows, columns) {
        (Some(r), Some(c)) => Some(format!("{} rows • {} columns", with_thousands(r), c)),
        _ => None,
    }
}

/// String form used for searching: strings unquoted, everything else as JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Display form of a table cell: empty → "—", numbers with separators, long text
/// truncated.
pub fn format_cell_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "—".to_string(),
        Some(Value::String(s)) if s.is_empty() => "—".to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => format_number(f),
            None => n.to_string(),
        },
        Some(other) => truncate(&cell_text(other), CELL_MAX_CHARS),
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// `"int64" → "int"`, `"object" → "object"`.
pub fn simplify_dtype(dtype: &str) -> &str {
    dtype.split("64").next().unwrap_or(dtype)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
    Other,
}

pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn file_kind(filename: &str) -> FileKind {
    match extension(filename).as_deref() {
        Some("csv") => FileKind::Csv,
        Some("xlsx") | Some("xls") => FileKind::Excel,
        _ => FileKind::Other,
    }
}

/// Badge text: the upper-cased extension.
pub fn file_badge(filename: &str) -> String {
    extension(filename)
        .map(|e| e.to_ascii_uppercase())
        .unwrap_or_else(|| "Unknown".to_string())
}
