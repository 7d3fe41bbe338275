use crate::domain::model::{AuditReport, AuditStatus, NormalizedMilestone, ProjectAuditEntry};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// 預設容許誤差：±1 個百分點
pub const DEFAULT_TOLERANCE_PCT: Decimal = Decimal::ONE;

/// Canonical grouping key for a project name: trimmed, then title-cased
/// (first letter of each alphabetic run upper-case, the rest lower-case).
pub fn project_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut in_word = false;

    for c in name.trim().chars() {
        if c.is_alphabetic() {
            if in_word {
                key.extend(c.to_lowercase());
            } else {
                key.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            key.push(c);
            in_word = false;
        }
    }
    key
}

pub fn classify(percent_total: Decimal, tolerance_pct: Decimal) -> AuditStatus {
    let low = Decimal::ONE_HUNDRED - tolerance_pct;
    let high = Decimal::ONE_HUNDRED + tolerance_pct;
    if percent_total >= low && percent_total <= high {
        AuditStatus::Balanced
    } else {
        AuditStatus::Unbalanced
    }
}

/// Sums normalized fractions per project.
///
/// The report is advisory: unbalanced projects are still amortized with whatever fractions
/// they carry. Entries are ordered by project key. Rows without a project name stay in the
/// matrix but have no audit entry.
pub fn audit_projects(milestones: &[NormalizedMilestone], tolerance_pct: Decimal) -> AuditReport {
    let mut groups: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();

    for milestone in milestones {
        let key = project_key(&milestone.record.project);
        if key.is_empty() {
            tracing::debug!("Row {} has no project, skipped in audit", milestone.record.row);
            continue;
        }
        let group = groups.entry(key).or_insert((Decimal::ZERO, 0));
        group.0 += milestone.fraction;
        group.1 += 1;
    }

    let entries = groups
        .into_iter()
        .map(|(project, (fraction_sum, count))| {
            let percent_total = (fraction_sum * Decimal::ONE_HUNDRED).round_dp(2);
            let status = classify(percent_total, tolerance_pct);
            if status == AuditStatus::Unbalanced {
                tracing::warn!("🚨 Project '{}' sums to {}%", project, percent_total);
            } else {
                tracing::debug!("✅ Project '{}' sums to {}%", project, percent_total);
            }

            ProjectAuditEntry {
                project,
                fraction_sum,
                percent_total,
                milestones: count,
                status,
            }
        })
        .collect();

    AuditReport { entries }
}
