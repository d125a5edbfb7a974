//! Compliance aggregation over consumption records.
//!
//! Everything here folds an already-loaded record set; nothing queries the
//! store except `build_dashboard`. Buckets key on `scheduled_date`, never on
//! when a record was created.

use chrono::{Datelike, Duration, Months, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::models::enums::RecordStatus;
use crate::models::{ConsumptionRecord, MedicationSchedule};
use crate::scoping::{self, AccessError, Viewer};

const DAILY_WINDOW: i64 = 7;
const MONTHLY_WINDOW: u32 = 6;
const RECENT_ACTIVITY: usize = 10;

/// `round(100 × part / total)`, half rounding up; 0 when `total` is 0.
pub fn percent(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (part, total) = (u64::from(part), u64::from(total));
    ((200 * part + total) / (2 * total)) as u32
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub total: u32,
    pub taken: u32,
    pub missed: u32,
    pub late: u32,
    pub pending: u32,
    pub compliance_rate: u32,
}

pub fn summarize<'a, I>(records: I) -> ComplianceSummary
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut summary = ComplianceSummary::default();
    for record in records {
        summary.total += 1;
        match record.status {
            RecordStatus::Taken => summary.taken += 1,
            RecordStatus::Missed => summary.missed += 1,
            RecordStatus::Late => summary.late += 1,
            RecordStatus::Pending => summary.pending += 1,
        }
    }
    summary.compliance_rate = percent(summary.taken, summary.total);
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: NaiveDate,
    /// Short weekday, e.g. "Mon".
    pub day: String,
    pub compliance: u32,
    /// Share of the day's doses not taken.
    pub missed: u32,
    pub total: u32,
    pub taken: u32,
}

/// The seven calendar days ending `today`, oldest first.
pub fn daily_buckets(records: &[ConsumptionRecord], today: NaiveDate) -> Vec<DailyBucket> {
    (0..DAILY_WINDOW)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let day = summarize(records.iter().filter(|r| r.scheduled_date == date));
            DailyBucket {
                date,
                day: date.format("%a").to_string(),
                compliance: day.compliance_rate,
                missed: percent(day.total - day.taken, day.total.max(1)),
                total: day.total,
                taken: day.taken,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    /// "YYYY-MM".
    pub month: String,
    /// Short month name, e.g. "Jan".
    pub label: String,
    pub compliance: u32,
    pub total: u32,
    pub taken: u32,
}

/// The six calendar months ending with `today`'s month, oldest first.
pub fn monthly_buckets(records: &[ConsumptionRecord], today: NaiveDate) -> Vec<MonthlyBucket> {
    let first_of_month = today.with_day(1).unwrap_or(today);
    (0..MONTHLY_WINDOW)
        .rev()
        .filter_map(|back| first_of_month.checked_sub_months(Months::new(back)))
        .map(|start| {
            let month = summarize(records.iter().filter(|r| {
                r.scheduled_date.year() == start.year() && r.scheduled_date.month() == start.month()
            }));
            MonthlyBucket {
                month: start.format("%Y-%m").to_string(),
                label: start.format("%b").to_string(),
                compliance: month.compliance_rate,
                total: month.total,
                taken: month.taken,
            }
        })
        .collect()
}

/// Keyword buckets for the medication mix chart.
pub fn medication_category(medication_name: &str) -> &'static str {
    let name = medication_name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));
    if has(&["amlodipine", "captopril"]) {
        "antihypertensive"
    } else if has(&["metformin", "insulin"]) {
        "antidiabetic"
    } else if has(&["amoxicillin", "antibiotic"]) {
        "antibiotic"
    } else if has(&["paracetamol", "ibuprofen"]) {
        "analgesic"
    } else if has(&["vitamin"]) {
        "vitamin"
    } else {
        "other"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub name: &'static str,
    pub value: u32,
}

/// Schedules per category, in order of first appearance.
pub fn medication_categories(schedules: &[MedicationSchedule]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for schedule in schedules {
        let name = medication_category(&schedule.medication_name);
        match counts.iter_mut().find(|c| c.name == name) {
            Some(entry) => entry.value += 1,
            None => counts.push(CategoryCount { name, value: 1 }),
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: u32,
    pub total_schedules: u32,
    pub total_medications: u32,
    pub compliance_rate: u32,
    /// Today's doses marked taken.
    pub today_consumptions: u32,
    /// Today's doses marked missed.
    pub missed_medications: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub summary: ComplianceSummary,
    pub daily: Vec<DailyBucket>,
    pub monthly: Vec<MonthlyBucket>,
    pub categories: Vec<CategoryCount>,
    pub recent_activity: Vec<ConsumptionRecord>,
}

/// Fold everything the viewer can see into the dashboard.
///
/// Only the `record_limit` most recently created records are considered,
/// so long-running deployments show trends over recent activity.
pub fn build_dashboard(
    conn: &Connection,
    viewer: &Viewer,
    today: NaiveDate,
    record_limit: u32,
) -> Result<Dashboard, AccessError> {
    let patients = scoping::visible_patients(conn, viewer)?;
    let schedules = scoping::visible_schedules(conn, viewer)?;
    let records = scoping::visible_records(conn, viewer, record_limit)?;

    let summary = summarize(&records);
    let today_summary = summarize(records.iter().filter(|r| r.scheduled_date == today));

    let stats = DashboardStats {
        total_patients: patients.len() as u32,
        total_schedules: schedules.len() as u32,
        total_medications: schedules.len() as u32,
        compliance_rate: summary.compliance_rate,
        today_consumptions: today_summary.taken,
        missed_medications: today_summary.missed,
    };

    Ok(Dashboard {
        stats,
        daily: daily_buckets(&records, today),
        monthly: monthly_buckets(&records, today),
        categories: medication_categories(&schedules),
        recent_activity: records.iter().take(RECENT_ACTIVITY).cloned().collect(),
        summary,
    })
}
