use crate::core::amortization::build_matrix;
use crate::core::auditor::{audit_projects, DEFAULT_TOLERANCE_PCT};
use crate::core::normalizer::{resolve_all, ScaleMode};
use crate::core::schema::parse_rows;
use crate::domain::model::{ForecastResult, NormalizedMilestone, RawTable, RowRejection};
use crate::utils::error::{ForecastError, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOptions {
    pub scale_mode: ScaleMode,
    pub tolerance_pct: Decimal,
    /// 任何一列日期錯誤即中止整個執行
    pub strict_dates: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::default(),
            tolerance_pct: DEFAULT_TOLERANCE_PCT,
            strict_dates: false,
        }
    }
}

fn rejection_error(rejection: &RowRejection) -> ForecastError {
    ForecastError::date_range(rejection.row, rejection.milestone.clone(), rejection.reason.clone())
}

/// Runs the whole core on one table: schema check, row parsing, normalization, audit and
/// amortization.
///
/// Rows with bad dates are dropped and listed in `rejections`, unless `strict_dates` is set, in
/// which case the first one fails the run. Schema and computation errors always fail the run.
pub fn run_forecast(table: &RawTable, options: &ForecastOptions) -> Result<ForecastResult> {
    let parsed = parse_rows(table)?;
    let mut rejections = parsed.rejections;

    let percents = resolve_all(&parsed.records, options.scale_mode);

    let mut milestones: Vec<NormalizedMilestone> = Vec::with_capacity(parsed.records.len());
    for (record, percent) in parsed.records.into_iter().zip(percents) {
        let project = record.project.clone();
        match NormalizedMilestone::from_record(record, percent) {
            Ok(milestone) => milestones.push(milestone),
            Err(ForecastError::DateRangeError {
                row,
                milestone,
                reason,
            }) => {
                tracing::warn!("⚠️ Row {} rejected: {}", row, reason);
                rejections.push(RowRejection {
                    row,
                    project,
                    milestone,
                    reason,
                });
            }
            Err(e) => return Err(e),
        }
    }
    rejections.sort_by_key(|r| r.row);

    if options.strict_dates {
        if let Some(first) = rejections.first() {
            return Err(rejection_error(first));
        }
    }

    let audit = audit_projects(&milestones, options.tolerance_pct);
    let matrix = build_matrix(&milestones)?;

    tracing::info!(
        "Forecast ready: {} milestones, {} projects, {} months, {} rejected rows",
        matrix.rows.len(),
        audit.entries.len(),
        matrix.months.len(),
        rejections.len()
    );

    Ok(ForecastResult {
        milestones,
        audit,
        matrix,
        rejections,
        warnings: parsed.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MonthKey, Record};
    use crate::utils::error::REQUIRED_COLUMNS;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(project: &str, total: i64, hito: &str, pct: serde_json::Value, start: &str, end: &str) -> Record {
        let mut record = Record::default();
        record.data.insert("Proyecto".into(), json!(project));
        record.data.insert("Total Proyecto".into(), json!(total));
        record.data.insert("Hito".into(), json!(hito));
        record.data.insert("% del Proyecto".into(), pct);
        record.data.insert("Fecha Inicio".into(), json!(start));
        record.data.insert("Fecha Fin".into(), json!(end));
        record
    }

    fn table(records: Vec<Record>) -> RawTable {
        RawTable {
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records,
        }
    }

    #[test]
    fn test_end_to_end_projection() {
        let table = table(vec![
            row("Proyecto A", 150000, "Hito 1", json!(20), "2025-01-01", "2025-01-31"),
            row("Proyecto A ", 150000, "Hito 2", json!(80), "2025-02-01", "2025-03-31"),
            row("proyecto b", 80000, "Fase Única", json!(1.0), "2025-03-01", "2025-03-01"),
        ]);

        let result = run_forecast(&table, &ForecastOptions::default()).unwrap();

        assert_eq!(result.audit.entries.len(), 2);
        assert!(result.audit.unbalanced().next().is_none());

        let months: Vec<String> = result.matrix.months.iter().map(ToString::to_string).collect();
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);

        let rows = &result.matrix.rows;
        assert_eq!(rows[0].milestone_amount, dec!(30000));
        assert_eq!(rows[0].monthly_amounts[&MonthKey::new(2025, 1)], dec!(30000));
        assert_eq!(rows[0].monthly_amounts[&MonthKey::new(2025, 2)], Decimal::ZERO);
        assert_eq!(rows[2].project, "Proyecto B");
        assert_eq!(rows[2].monthly_amounts[&MonthKey::new(2025, 3)], dec!(80000));

        assert_eq!(result.matrix.totals.milestone_amount, dec!(230000));
    }

    #[test]
    fn test_inverted_dates_are_rejected_not_divided() {
        let table = table(vec![
            row("Proyecto A", 1000, "Hito 1", json!(50), "2025-01-01", "2025-01-10"),
            row("Proyecto A", 1000, "Hito 2", json!(50), "2025-02-10", "2025-02-01"),
        ]);

        let result = run_forecast(&table, &ForecastOptions::default()).unwrap();
        assert_eq!(result.matrix.rows.len(), 1);
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].row, 3);
        assert_eq!(result.rejections[0].milestone, "Hito 2");

        // 被拒絕的列不計入稽核
        assert_eq!(result.audit.entries[0].percent_total, dec!(50));
    }

    #[test]
    fn test_strict_dates_fail_the_run() {
        let table = table(vec![row("Proyecto A", 1000, "Hito 1", json!(50), "2025-02-10", "2025-02-01")]);
        let options = ForecastOptions {
            strict_dates: true,
            ..ForecastOptions::default()
        };

        let err = run_forecast(&table, &options).unwrap_err();
        assert!(matches!(err, ForecastError::DateRangeError { row: 2, .. }));
    }

    #[test]
    fn test_unparsable_percent_keeps_row_with_zero_amount() {
        let table = table(vec![row("Proyecto A", 1000, "Hito 1", json!("abc"), "2025-01-01", "2025-01-10")]);

        let result = run_forecast(&table, &ForecastOptions::default()).unwrap();
        assert_eq!(result.matrix.rows.len(), 1);
        assert_eq!(result.matrix.rows[0].milestone_amount, Decimal::ZERO);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_schema_error_produces_no_matrix() {
        let mut table = table(vec![]);
        table.headers.retain(|h| h != "Fecha Fin");

        let err = run_forecast(&table, &ForecastOptions::default()).unwrap_err();
        assert!(matches!(err, ForecastError::SchemaError { .. }));
    }
}
