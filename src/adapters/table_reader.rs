use crate::core::schema::excel_serial_to_date;
use crate::domain::model::{RawTable, Record};
use crate::utils::error::{ForecastError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Cursor;

/// 依副檔名選擇讀取方式：`.csv` 走 CSV，其餘交給 calamine 自動判斷
pub fn read_table(bytes: &[u8], file_name: &str, sheet: Option<&str>) -> Result<RawTable> {
    let is_csv = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        read_csv(bytes)
    } else {
        read_workbook(bytes, sheet)
    }
}

fn build_record(headers: &[String], cells: impl Iterator<Item = Value>) -> Option<Record> {
    let data: HashMap<String, Value> = headers
        .iter()
        .zip(cells)
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, value)| (header.clone(), value))
        .collect();

    // 整列空白就略過
    if data.values().all(Value::is_null) {
        None
    } else {
        Some(Record { data })
    }
}

/// 分號或逗號分隔，依表頭列判斷
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

pub fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cells = row.iter().map(|field| {
            if field.trim().is_empty() {
                Value::Null
            } else {
                Value::String(field.to_string())
            }
        });
        records.extend(build_record(&headers, cells));
    }

    tracing::debug!("Read {} CSV rows with {} columns", records.len(), headers.len());
    Ok(RawTable { headers, records })
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string())),
        _ => Value::Null,
    }
}

pub fn read_workbook(bytes: &[u8], sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or(ForecastError::SpreadsheetError(calamine::Error::Msg(
                "workbook has no sheets",
            )))??,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };

    let records: Vec<Record> = rows
        .filter_map(|row| build_record(&headers, row.iter().map(cell_value)))
        .collect();

    tracing::debug!(
        "Read {} rows from sheet {} with {} columns",
        records.len(),
        sheet.unwrap_or("#0"),
        headers.len()
    );
    Ok(RawTable { headers, records })
}
