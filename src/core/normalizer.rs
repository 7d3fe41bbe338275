use crate::core::auditor::project_key;
use crate::domain::model::{MilestoneRecord, NormalizedMilestone, PercentScale, RawValue};
use crate::utils::error::{ForecastError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// 0-1 與 0-100 的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    /// 逐值判斷：`> 1` 視為百分比，所以 `1` 是 100%
    #[default]
    PerValue,
    /// 每個專案依最大值決定一種尺度
    PerProject,
    /// 整份檔案依最大值決定一種尺度
    PerDataset,
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PerValue => "per-value",
            Self::PerProject => "per-project",
            Self::PerDataset => "per-dataset",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPercent {
    pub fraction: Decimal,
    pub scale: PercentScale,
}

impl NormalizedPercent {
    const UNPARSABLE: Self = Self {
        fraction: Decimal::ZERO,
        scale: PercentScale::Unparsable,
    };
}

/// 解析數值；無法解析時回傳 `None`
pub fn parse_decimal(raw: &RawValue) -> Option<Decimal> {
    match raw {
        RawValue::Number(n) => Some(*n),
        RawValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .ok()
        }
        RawValue::Empty => None,
    }
}

fn scaled(value: Decimal, as_percent: bool) -> NormalizedPercent {
    if as_percent {
        NormalizedPercent {
            fraction: value / Decimal::ONE_HUNDRED,
            scale: PercentScale::Percent,
        }
    } else {
        NormalizedPercent {
            fraction: value,
            scale: PercentScale::Fraction,
        }
    }
}

/// 逐值規則：大於 1 除以 100，無法解析為 0
pub fn resolve_percent(raw: &RawValue) -> NormalizedPercent {
    match parse_decimal(raw) {
        Some(value) => scaled(value, value > Decimal::ONE),
        None => NormalizedPercent::UNPARSABLE,
    }
}

/// 只回傳比例
pub fn normalize(raw: impl Into<RawValue>) -> Decimal {
    resolve_percent(&raw.into()).fraction
}

/// 依 `mode` 解析每一列的百分比，順序與輸入相同
pub fn resolve_all(records: &[MilestoneRecord], mode: ScaleMode) -> Vec<NormalizedPercent> {
    let parsed: Vec<Option<Decimal>> = records.iter().map(|r| parse_decimal(&r.raw_percent)).collect();

    let percent_scale: Vec<bool> = match mode {
        ScaleMode::PerValue => parsed
            .iter()
            .map(|v| v.is_some_and(|v| v > Decimal::ONE))
            .collect(),
        ScaleMode::PerProject => {
            let mut max_by_project: HashMap<String, Decimal> = HashMap::new();
            for (record, value) in records.iter().zip(&parsed) {
                if let Some(value) = value {
                    let max = max_by_project
                        .entry(project_key(&record.project))
                        .or_insert(*value);
                    *max = (*max).max(*value);
                }
            }
            records
                .iter()
                .map(|r| {
                    max_by_project
                        .get(&project_key(&r.project))
                        .is_some_and(|max| *max > Decimal::ONE)
                })
                .collect()
        }
        ScaleMode::PerDataset => {
            let as_percent = parsed.iter().flatten().any(|v| *v > Decimal::ONE);
            vec![as_percent; records.len()]
        }
    };

    parsed
        .into_iter()
        .zip(percent_scale)
        .map(|(value, as_percent)| match value {
            Some(value) => scaled(value, as_percent),
            None => NormalizedPercent::UNPARSABLE,
        })
        .collect()
}

impl NormalizedMilestone {
    /// 計算金額、天數與日攤金額；結束日早於開始日時回傳 `DateRangeError`
    pub fn from_record(record: MilestoneRecord, percent: NormalizedPercent) -> Result<Self> {
        let span_days = (record.end_date - record.start_date).num_days() + 1;
        if span_days <= 0 {
            return Err(ForecastError::date_range(
                record.row,
                record.milestone_name.clone(),
                format!(
                    "end date {} is before start date {}",
                    record.end_date, record.start_date
                ),
            ));
        }

        let amount = record
            .total_value
            .checked_mul(percent.fraction)
            .ok_or_else(|| {
                ForecastError::computation(format!(
                    "row {}: amount {} x {} overflows",
                    record.row, record.total_value, percent.fraction
                ))
            })?;
        let daily_rate = amount
            .checked_div(Decimal::from(span_days))
            .ok_or_else(|| {
                ForecastError::computation(format!("row {}: cannot derive day rate", record.row))
            })?;

        Ok(Self {
            record,
            fraction: percent.fraction,
            scale: percent.scale,
            amount,
            span_days,
            daily_rate,
        })
    }
}
