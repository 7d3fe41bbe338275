use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 輸入表格的一列，以表頭為鍵
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }
}

/// extract 階段的輸出：表頭（保留原順序）加上所有資料列
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

/// A percentage cell before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(Decimal),
    Text(String),
    Empty,
}

impl From<Decimal> for RawValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        use rust_decimal::prelude::FromPrimitive;
        Decimal::from_f64(value).map_or(Self::Empty, Self::Number)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// 來源列號（1 起算，表頭為第 1 列）
    pub row: usize,
    pub project: String,
    pub total_value: Decimal,
    pub milestone_name: String,
    pub raw_percent: RawValue,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Which rule turned the raw percentage into a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentScale {
    /// Already a 0-1 fraction (includes the literal `1`, read as 100%).
    Fraction,
    /// 0-100 scale, divided by 100.
    Percent,
    /// Could not be parsed; the fraction falls back to zero.
    Unparsable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMilestone {
    #[serde(flatten)]
    pub record: MilestoneRecord,
    pub fraction: Decimal,
    pub scale: PercentScale,
    pub amount: Decimal,
    pub span_days: i64,
    pub daily_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Balanced,
    Unbalanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAuditEntry {
    pub project: String,
    pub fraction_sum: Decimal,
    pub percent_total: Decimal,
    pub milestones: usize,
    pub status: AuditStatus,
}

impl ProjectAuditEntry {
    pub fn is_balanced(&self) -> bool {
        self.status == AuditStatus::Balanced
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub entries: Vec<ProjectAuditEntry>,
}

impl AuditReport {
    pub fn entry(&self, project: &str) -> Option<&ProjectAuditEntry> {
        self.entries.iter().find(|e| e.project == project)
    }

    pub fn unbalanced(&self) -> impl Iterator<Item = &ProjectAuditEntry> {
        self.entries.iter().filter(|e| !e.is_balanced())
    }
}

/// Calendar month, displayed and serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key '{}'", s))?;
        let year = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{}'", s));
        }
        Ok(Self::new(year, month))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub project: String,
    pub milestone_name: String,
    pub milestone_amount: Decimal,
    pub monthly_amounts: BTreeMap<MonthKey, Decimal>,
}

/// Column-wise sums over every [`MonthlyRow`] of a matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsRow {
    pub project: String,
    pub milestone_amount: Decimal,
    pub monthly_amounts: BTreeMap<MonthKey, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMatrix {
    pub months: Vec<MonthKey>,
    pub rows: Vec<MonthlyRow>,
    pub totals: TotalsRow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    pub row: usize,
    pub project: String,
    pub milestone: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueWarning {
    pub row: usize,
    pub column: String,
    pub raw: String,
    /// 原始的解析錯誤訊息
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub milestones: Vec<NormalizedMilestone>,
    pub audit: AuditReport,
    pub matrix: ForecastMatrix,
    pub rejections: Vec<RowRejection>,
    pub warnings: Vec<ValueWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_display_and_parse() {
        let key = MonthKey::new(2025, 3);
        assert_eq!(key.to_string(), "2025-03");
        assert_eq!("2025-03".parse::<MonthKey>().unwrap(), key);
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("202503".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_month_key_next_wraps_year() {
        assert_eq!(MonthKey::new(2024, 12).next(), MonthKey::new(2025, 1));
        assert_eq!(MonthKey::new(2025, 1).next(), MonthKey::new(2025, 2));
    }

    #[test]
    fn test_month_key_serializes_as_string() {
        let mut amounts = BTreeMap::new();
        amounts.insert(MonthKey::new(2025, 1), Decimal::new(40000, 2));
        let json = serde_json::to_value(&amounts).unwrap();
        assert_eq!(json["2025-01"], serde_json::json!("400.00"));
    }
}
