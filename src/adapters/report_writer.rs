use crate::domain::model::{
    AuditStatus, ForecastMatrix, ForecastResult, ProjectAuditEntry, RowRejection, ValueWarning,
};
use crate::utils::error::{ForecastError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const PROJECTION_SHEET: &str = "Proyeccion";
pub const AUDIT_SHEET: &str = "Auditoria";
const MONEY_FORMAT: &str = "#,##0.00";
const MONEY_COLUMN_WIDTH: f64 = 15.0;

fn header_row(matrix: &ForecastMatrix) -> Vec<String> {
    let mut headers = vec![
        "Proyecto".to_string(),
        "Hito".to_string(),
        "Monto Hito".to_string(),
    ];
    headers.extend(matrix.months.iter().map(ToString::to_string));
    headers
}

/// 千分位加兩位小數，例如 `1,234,567.89`
pub fn format_amount(value: Decimal) -> String {
    let fixed = format!("{:.2}", value.round_dp(2));
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{}", sign, grouped, frac_part)
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn write_projection_sheet(sheet: &mut Worksheet, result: &ForecastResult, totals_label: &str) -> Result<()> {
    let matrix = &result.matrix;
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let amount = Format::new().set_num_format(MONEY_FORMAT);
    let total_amount = Format::new().set_num_format(MONEY_FORMAT).set_bold();

    sheet.set_name(PROJECTION_SHEET)?;
    for (col, title) in header_row(matrix).iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, title, &header)?;
    }

    for (i, row) in matrix.rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.project)?;
        sheet.write_string(r, 1, &row.milestone_name)?;
        sheet.write_number_with_format(r, 2, money(row.milestone_amount), &amount)?;
        for (j, month) in matrix.months.iter().enumerate() {
            let value = row.monthly_amounts.get(month).copied().unwrap_or_default();
            sheet.write_number_with_format(r, 3 + j as u16, money(value), &amount)?;
        }
    }

    let r = matrix.rows.len() as u32 + 1;
    sheet.write_string_with_format(r, 0, totals_label, &Format::new().set_bold())?;
    sheet.write_number_with_format(r, 2, money(matrix.totals.milestone_amount), &total_amount)?;
    for (j, month) in matrix.months.iter().enumerate() {
        let value = matrix.totals.monthly_amounts.get(month).copied().unwrap_or_default();
        sheet.write_number_with_format(r, 3 + j as u16, money(value), &total_amount)?;
    }

    sheet.set_column_width(0, 25)?;
    sheet.set_column_width(1, 25)?;
    for col in 2..3 + matrix.months.len() as u16 {
        sheet.set_column_width(col, MONEY_COLUMN_WIDTH)?;
    }
    sheet.set_freeze_panes(1, 3)?;
    Ok(())
}

fn write_audit_sheet(sheet: &mut Worksheet, entries: &[ProjectAuditEntry]) -> Result<()> {
    let header = Format::new().set_bold().set_border(FormatBorder::Thin);
    let percent = Format::new().set_num_format("0.00");

    sheet.set_name(AUDIT_SHEET)?;
    for (col, title) in ["Proyecto", "Suma %", "Hitos", "Estado"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (i, entry) in entries.iter().enumerate() {
        let r = i as u32 + 1;
        let status = match entry.status {
            AuditStatus::Balanced => "OK",
            AuditStatus::Unbalanced => "REVISAR",
        };
        sheet.write_string(r, 0, &entry.project)?;
        sheet.write_number_with_format(r, 1, money(entry.percent_total), &percent)?;
        sheet.write_number(r, 2, entry.milestones as f64)?;
        sheet.write_string(r, 3, status)?;
    }
    sheet.set_column_width(0, 25)?;
    Ok(())
}

/// Projection workbook: a `Proyeccion` sheet with the matrix and a `TOTAL MENSUAL` style row,
/// plus an `Auditoria` sheet with the per-project sums.
pub fn render_xlsx(result: &ForecastResult, totals_label: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    write_projection_sheet(workbook.add_worksheet(), result, totals_label)?;
    write_audit_sheet(workbook.add_worksheet(), &result.audit.entries)?;

    Ok(workbook.save_to_buffer()?)
}

/// Same table as the workbook, numbers written as plain 2-decimal values.
pub fn render_csv(result: &ForecastResult, totals_label: &str) -> Result<Vec<u8>> {
    let matrix = &result.matrix;
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(header_row(matrix))?;
    for row in &matrix.rows {
        let mut fields = vec![
            row.project.clone(),
            row.milestone_name.clone(),
            format!("{:.2}", row.milestone_amount),
        ];
        fields.extend(matrix.months.iter().map(|m| {
            format!("{:.2}", row.monthly_amounts.get(m).copied().unwrap_or_default())
        }));
        writer.write_record(&fields)?;
    }

    let mut totals = vec![
        totals_label.to_string(),
        String::new(),
        format!("{:.2}", matrix.totals.milestone_amount),
    ];
    totals.extend(matrix.months.iter().map(|m| {
        format!("{:.2}", matrix.totals.monthly_amounts.get(m).copied().unwrap_or_default())
    }));
    writer.write_record(&totals)?;

    writer
        .into_inner()
        .map_err(|e| ForecastError::IoError(e.into_error()))
}

#[derive(Serialize)]
struct AuditDocument<'a> {
    generated_at: String,
    projects: &'a [ProjectAuditEntry],
    rejected_rows: &'a [RowRejection],
    value_warnings: &'a [ValueWarning],
}

pub fn render_audit_json(result: &ForecastResult) -> Result<Vec<u8>> {
    let document = AuditDocument {
        generated_at: chrono::Local::now().to_rfc3339(),
        projects: &result.audit.entries,
        rejected_rows: &result.rejections,
        value_warnings: &result.warnings,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

pub fn bundle_zip(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forecast::{run_forecast, ForecastOptions};
    use crate::domain::model::{RawTable, Record};
    use crate::utils::error::REQUIRED_COLUMNS;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_result() -> ForecastResult {
        let mut record = Record::default();
        for (column, value) in REQUIRED_COLUMNS.iter().zip([
            json!("Proyecto A"),
            json!(7000),
            json!("Hito 1"),
            json!(10),
            json!("2025-01-28"),
            json!("2025-02-03"),
        ]) {
            record.data.insert(column.to_string(), value);
        }
        let table = RawTable {
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records: vec![record],
        };
        run_forecast(&table, &ForecastOptions::default()).unwrap()
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_amount(dec!(400)), "400.00");
        assert_eq!(format_amount(dec!(-1500.5)), "-1,500.50");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_render_csv_layout() {
        let csv = String::from_utf8(render_csv(&sample_result(), "TOTAL MENSUAL").unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Proyecto,Hito,Monto Hito,2025-01,2025-02");
        assert_eq!(lines[1], "Proyecto A,Hito 1,700.00,400.00,300.00");
        assert_eq!(lines[2], "TOTAL MENSUAL,,700.00,400.00,300.00");
    }

    #[test]
    fn test_render_audit_json() {
        let json: serde_json::Value =
            serde_json::from_slice(&render_audit_json(&sample_result()).unwrap()).unwrap();
        assert_eq!(json["projects"][0]["project"], "Proyecto A");
        assert_eq!(json["projects"][0]["status"], "unbalanced");
        assert!(json["rejected_rows"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_render_xlsx_produces_workbook() {
        let bytes = render_xlsx(&sample_result(), "TOTAL MENSUAL").unwrap();
        // xlsx 為 zip 容器
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_bundle_zip() {
        let files = vec![
            ("a.csv".to_string(), b"x".to_vec()),
            ("b.json".to_string(), b"{}".to_vec()),
        ];
        let bytes = bundle_zip(&files).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
    }
}
