use crate::core::auditor::project_key;
use crate::domain::model::{ForecastMatrix, MonthKey, MonthlyRow, NormalizedMilestone, TotalsRow};
use crate::utils::error::{ForecastError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// 合計列的 `project`
pub const TOTALS_PROJECT: &str = "TOTAL";
/// 匯出表格中合計列的標籤
pub const DEFAULT_TOTALS_LABEL: &str = "TOTAL MENSUAL";

const CENTS: u32 = 2;

/// 從最早開始日到最晚結束日的連續月份
pub fn month_axis(milestones: &[NormalizedMilestone]) -> Vec<MonthKey> {
    let first = milestones.iter().map(|m| m.record.start_date).min();
    let last = milestones.iter().map(|m| m.record.end_date).max();

    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let last = MonthKey::of(last);
    let mut months = Vec::new();
    let mut current = MonthKey::of(first);
    while current <= last {
        months.push(current);
        current = current.next();
    }
    months
}

/// 逐日掃描，計算每個月份涵蓋的天數
pub fn day_counts(start: NaiveDate, end: NaiveDate) -> BTreeMap<MonthKey, i64> {
    let mut counts = BTreeMap::new();
    for day in start.iter_days().take_while(|d| *d <= end) {
        *counts.entry(MonthKey::of(day)).or_insert(0) += 1;
    }
    counts
}

/// 每個月份分到的金額，期間外的月份為 0
pub fn amortize(milestone: &NormalizedMilestone, axis: &[MonthKey]) -> Result<BTreeMap<MonthKey, Decimal>> {
    let counts = day_counts(milestone.record.start_date, milestone.record.end_date);

    axis.iter()
        .map(|month| {
            let days = counts.get(month).copied().unwrap_or(0);
            let value = milestone
                .daily_rate
                .checked_mul(Decimal::from(days))
                .ok_or_else(|| {
                    ForecastError::computation(format!(
                        "row {}: {} days x {} overflows",
                        milestone.record.row, days, milestone.daily_rate
                    ))
                })?;
            Ok((*month, value.round_dp(CENTS)))
        })
        .collect()
}

fn checked_sum<'a>(mut values: impl Iterator<Item = &'a Decimal>, column: &str) -> Result<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(*v)
            .ok_or_else(|| ForecastError::computation(format!("total of column '{}' overflows", column)))
    })
}

pub fn totals_row(rows: &[MonthlyRow], months: &[MonthKey]) -> Result<TotalsRow> {
    let milestone_amount = checked_sum(rows.iter().map(|r| &r.milestone_amount), "Monto Hito")?;

    let mut monthly_amounts = BTreeMap::new();
    for month in months {
        let column = month.to_string();
        let total = checked_sum(rows.iter().filter_map(|r| r.monthly_amounts.get(month)), &column)?;
        monthly_amounts.insert(*month, total);
    }

    Ok(TotalsRow {
        project: TOTALS_PROJECT.to_string(),
        milestone_amount,
        monthly_amounts,
    })
}

/// 依輸入順序每個里程碑一列，加上合計列
pub fn build_matrix(milestones: &[NormalizedMilestone]) -> Result<ForecastMatrix> {
    let months = month_axis(milestones);
    tracing::debug!(
        "Month axis: {} months ({} .. {})",
        months.len(),
        months.first().map(ToString::to_string).unwrap_or_default(),
        months.last().map(ToString::to_string).unwrap_or_default()
    );

    let rows = milestones
        .iter()
        .map(|milestone| {
            Ok(MonthlyRow {
                project: project_key(&milestone.record.project),
                milestone_name: milestone.record.milestone_name.clone(),
                milestone_amount: milestone.amount.round_dp(CENTS),
                monthly_amounts: amortize(milestone, &months)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let totals = totals_row(&rows, &months)?;

    Ok(ForecastMatrix { months, rows, totals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::resolve_percent;
    use crate::domain::model::{MilestoneRecord, RawValue};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn milestone(total: Decimal, pct: i64, start: NaiveDate, end: NaiveDate) -> NormalizedMilestone {
        let raw = RawValue::from(pct);
        let percent = resolve_percent(&raw);
        NormalizedMilestone::from_record(
            MilestoneRecord {
                row: 2,
                project: "proyecto a".to_string(),
                total_value: total,
                milestone_name: format!("Hito {}", pct),
                raw_percent: raw,
                start_date: start,
                end_date: end,
            },
            percent,
        )
        .unwrap()
    }

    #[test]
    fn test_boundary_split_follows_day_count() {
        let m = milestone(dec!(7000), 10, date(2025, 1, 28), date(2025, 2, 3));
        assert_eq!(m.daily_rate, dec!(100));

        let axis = month_axis(std::slice::from_ref(&m));
        let cells = amortize(&m, &axis).unwrap();

        assert_eq!(cells[&MonthKey::new(2025, 1)], dec!(400.00));
        assert_eq!(cells[&MonthKey::new(2025, 2)], dec!(300.00));
    }

    #[test]
    fn test_single_month_milestone_has_one_non_zero_cell() {
        let m = milestone(dec!(1000), 50, date(2025, 3, 15), date(2025, 3, 15));
        let axis = vec![MonthKey::new(2025, 2), MonthKey::new(2025, 3), MonthKey::new(2025, 4)];
        let cells = amortize(&m, &axis).unwrap();

        assert_eq!(cells.len(), 3);
        assert_eq!(cells[&MonthKey::new(2025, 2)], Decimal::ZERO);
        assert_eq!(cells[&MonthKey::new(2025, 3)], dec!(500));
        assert_eq!(cells[&MonthKey::new(2025, 4)], Decimal::ZERO);
    }

    #[test]
    fn test_month_axis_spans_dataset_across_year_end() {
        let milestones = vec![
            milestone(dec!(1000), 50, date(2024, 11, 20), date(2024, 12, 5)),
            milestone(dec!(1000), 50, date(2025, 1, 10), date(2025, 2, 1)),
        ];
        let axis: Vec<String> = month_axis(&milestones).iter().map(ToString::to_string).collect();
        assert_eq!(axis, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert!(month_axis(&[]).is_empty());
    }

    #[test]
    fn test_day_counts_sum_to_span() {
        let counts = day_counts(date(2024, 2, 20), date(2024, 4, 2));
        assert_eq!(counts[&MonthKey::new(2024, 2)], 10);
        assert_eq!(counts[&MonthKey::new(2024, 3)], 31);
        assert_eq!(counts[&MonthKey::new(2024, 4)], 2);
        assert_eq!(counts.values().sum::<i64>(), 43);
    }

    #[test]
    fn test_row_sums_stay_within_rounding_tolerance() {
        let m = milestone(dec!(1000), 100, date(2025, 1, 30), date(2025, 3, 2));
        let matrix = build_matrix(std::slice::from_ref(&m)).unwrap();
        let row = &matrix.rows[0];

        let spanned = row.monthly_amounts.values().filter(|v| !v.is_zero()).count();
        let sum: Decimal = row.monthly_amounts.values().sum();
        assert!((sum - row.milestone_amount).abs() <= dec!(0.01) * Decimal::from(spanned));
    }

    #[test]
    fn test_totals_sum_rounded_cells() {
        let milestones = vec![
            milestone(dec!(1000), 100, date(2025, 1, 1), date(2025, 1, 3)),
            milestone(dec!(1000), 100, date(2025, 1, 2), date(2025, 1, 4)),
            milestone(dec!(3000), 50, date(2025, 1, 31), date(2025, 2, 6)),
        ];
        let matrix = build_matrix(&milestones).unwrap();

        assert_eq!(matrix.totals.project, TOTALS_PROJECT);
        let expected_amount: Decimal = matrix.rows.iter().map(|r| r.milestone_amount).sum();
        assert_eq!(matrix.totals.milestone_amount, expected_amount);

        for month in &matrix.months {
            let column: Decimal = matrix.rows.iter().map(|r| r.monthly_amounts[month]).sum();
            assert_eq!(matrix.totals.monthly_amounts[month], column);
        }

        // 1000 / 3 per day: three rounded cells of 1000.00 each, no re-derivation
        assert_eq!(matrix.rows[0].monthly_amounts[&MonthKey::new(2025, 1)], dec!(1000.00));
    }

    #[test]
    fn test_rows_use_project_key() {
        let m = milestone(dec!(1000), 100, date(2025, 1, 1), date(2025, 1, 1));
        let matrix = build_matrix(&[m]).unwrap();
        assert_eq!(matrix.rows[0].project, "Proyecto A");
    }

    #[test]
    fn test_empty_dataset_has_zero_totals() {
        let matrix = build_matrix(&[]).unwrap();
        assert!(matrix.months.is_empty());
        assert!(matrix.rows.is_empty());
        assert_eq!(matrix.totals.milestone_amount, Decimal::ZERO);
    }
}
