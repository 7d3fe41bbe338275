use crate::domain::model::{MilestoneRecord, RawTable, RawValue, Record, RowRejection, ValueWarning};
use crate::utils::error::{ForecastError, Result, REQUIRED_COLUMNS};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

pub const COL_PROJECT: &str = REQUIRED_COLUMNS[0];
pub const COL_TOTAL: &str = REQUIRED_COLUMNS[1];
pub const COL_MILESTONE: &str = REQUIRED_COLUMNS[2];
pub const COL_PERCENT: &str = REQUIRED_COLUMNS[3];
pub const COL_START: &str = REQUIRED_COLUMNS[4];
pub const COL_END: &str = REQUIRED_COLUMNS[5];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// All six columns must be present; anything else in the sheet is ignored.
pub fn check_schema(headers: &[String]) -> Result<()> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h.trim() == **required))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForecastError::schema(missing))
    }
}

/// 試算表日期序號（1900 系統）轉日期，忽略時間部分
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(chrono::Days::new(serial.trunc() as u64))
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn cell_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        other => crate::core::normalizer::parse_decimal(&cell_raw(Some(other))),
    }
}

fn cell_raw(value: Option<&Value>) -> RawValue {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| RawValue::Number(Decimal::from(i)))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64).map(RawValue::Number))
            .unwrap_or(RawValue::Empty),
        Some(Value::String(s)) => RawValue::Text(s.clone()),
        // 布林值視為 1 / 0
        Some(Value::Bool(b)) => RawValue::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
        _ => RawValue::Empty,
    }
}

fn cell_date(value: Option<&Value>) -> std::result::Result<NaiveDate, String> {
    match value {
        Some(Value::String(s)) if s.trim().is_empty() => Err("is empty".to_string()),
        Some(Value::String(s)) => parse_date_text(s).ok_or_else(|| format!("'{}' is not a valid date", s)),
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(excel_serial_to_date)
            .ok_or_else(|| format!("{} is not a valid date serial", n)),
        _ => Err("is empty".to_string()),
    }
}

/// Rows parsed from the raw table.
///
/// `rejections` holds one entry per row dropped for a bad date; `warnings` lists numeric cells
/// that fell back to zero.
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub records: Vec<MilestoneRecord>,
    pub rejections: Vec<RowRejection>,
    pub warnings: Vec<ValueWarning>,
}

/// 無法解析的數值以 0 取代，保留原本的錯誤訊息
fn value_warning(row: usize, column: &str, raw: String) -> ValueWarning {
    let err = ForecastError::value_parse(row, column, raw.clone());
    tracing::warn!("⚠️ {}, read as 0. 💡 {}", err, err.recovery_suggestion());
    ValueWarning {
        row,
        column: column.to_string(),
        raw,
        message: err.to_string(),
    }
}

fn parse_record(row: usize, record: &Record, parsed: &mut ParsedRows) {
    let project = cell_text(record.get(COL_PROJECT));
    let milestone_name = cell_text(record.get(COL_MILESTONE));

    let dates = cell_date(record.get(COL_START))
        .map_err(|e| format!("'{}' {}", COL_START, e))
        .and_then(|start| {
            cell_date(record.get(COL_END))
                .map(|end| (start, end))
                .map_err(|e| format!("'{}' {}", COL_END, e))
        });
    let (start_date, end_date) = match dates {
        Ok(dates) => dates,
        Err(reason) => {
            tracing::warn!("⚠️ Row {} rejected: {}", row, reason);
            parsed.rejections.push(RowRejection {
                row,
                project,
                milestone: milestone_name,
                reason,
            });
            return;
        }
    };

    let total_value = match record.get(COL_TOTAL).and_then(cell_decimal) {
        Some(total) => total,
        None => {
            let raw = cell_text(record.get(COL_TOTAL));
            parsed.warnings.push(value_warning(row, COL_TOTAL, raw));
            Decimal::ZERO
        }
    };

    let raw_percent = cell_raw(record.get(COL_PERCENT));
    if crate::core::normalizer::parse_decimal(&raw_percent).is_none() {
        parsed.warnings.push(value_warning(row, COL_PERCENT, raw_percent.to_string()));
    }

    parsed.records.push(MilestoneRecord {
        row,
        project,
        total_value,
        milestone_name,
        raw_percent,
        start_date,
        end_date,
    });
}

/// Checks the schema, then parses every record. Row numbers count the header as row 1.
pub fn parse_rows(table: &RawTable) -> Result<ParsedRows> {
    check_schema(&table.headers)?;

    let mut parsed = ParsedRows::default();
    for (index, record) in table.records.iter().enumerate() {
        parse_record(index + 2, record, &mut parsed);
    }

    tracing::debug!(
        "Parsed {} rows ({} rejected, {} value warnings)",
        parsed.records.len(),
        parsed.rejections.len(),
        parsed.warnings.len()
    );
    Ok(parsed)
}
