//! Day-bucketed monthly attendance statistics.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;

/// What was recorded for one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayRecord {
    pub status: AttendanceStatus,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub work_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct MonthlySummary {
    pub employee_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: u32,
    /// Days per status, keyed by status tag
    #[schema(value_type = Object)]
    pub days: BTreeMap<String, u32>,
    pub scheduled_days: u32,
    pub total_late_minutes: i64,
    pub total_early_leave_minutes: i64,
    pub total_work_minutes: i64,
}

pub fn month_days(year: i32, month: u32) -> Result<Vec<NaiveDate>, AppError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation("Invalid year/month"))?;
    Ok(first
        .iter_days()
        .take_while(|d| d.month() == month)
        .collect())
}

/// Walks every calendar day of the month. Scheduled days before `today` with
/// nothing recorded count as absent. Today is still open, so it and later
/// days only count what was recorded.
pub fn summarize_month(
    employee_id: u64,
    year: i32,
    month: u32,
    today: NaiveDate,
    records: &HashMap<NaiveDate, DayRecord>,
    scheduled_weekdays: &HashSet<u32>,
) -> Result<MonthlySummary, AppError> {
    let mut summary = MonthlySummary {
        employee_id,
        year,
        month,
        days: BTreeMap::new(),
        scheduled_days: 0,
        total_late_minutes: 0,
        total_early_leave_minutes: 0,
        total_work_minutes: 0,
    };

    for day in month_days(year, month)? {
        let scheduled = scheduled_weekdays.contains(&day.weekday().number_from_monday());
        if scheduled {
            summary.scheduled_days += 1;
        }

        let status = match records.get(&day) {
            Some(record) => {
                summary.total_late_minutes += i64::from(record.late_minutes);
                summary.total_early_leave_minutes += i64::from(record.early_leave_minutes);
                summary.total_work_minutes += i64::from(record.work_duration_minutes.unwrap_or(0));
                record.status
            }
            None if scheduled && day < today => AttendanceStatus::Absent,
            None => continue,
        };

        *summary.days.entry(status.to_string()).or_insert(0) += 1;
    }

    Ok(summary)
}
