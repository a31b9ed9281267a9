//! Attendance rows. Derived fields are recomputed from the clock times and
//! the weekday's scheduled shift on every write.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveTime};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info};

use crate::error::{AppError, on_duplicate};
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::store::schedule;
use crate::workflow::attendance::{self, DayOutcome, ScheduledShift};
use crate::workflow::summary::{self, DayRecord, MonthlySummary};

const COLUMNS: &str = "id, employee_id, date, clock_in, clock_out, scheduled_clock_in, \
     scheduled_clock_out, status, late_minutes, early_leave_minutes, work_duration_minutes, \
     is_manual_entry, is_approved, notes";

/// What gets written for one day.
struct DayRow {
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
    shift: Option<ScheduledShift>,
    outcome: DayOutcome,
    is_manual_entry: bool,
    is_approved: bool,
    notes: Option<String>,
}

/// A hand-entered day: either a manual status or corrected clock times.
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub date: NaiveDate,
    pub status: Option<AttendanceStatus>,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub notes: Option<String>,
}

async fn shift_for(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<ScheduledShift>, AppError> {
    let day = schedule::day_schedule(conn, employee_id, date.weekday().number_from_monday()).await?;
    Ok(day.as_ref().map(ScheduledShift::from))
}

pub async fn fetch(pool: &MySqlPool, id: u64) -> Result<Attendance, AppError> {
    sqlx::query_as::<_, Attendance>(&format!("SELECT {COLUMNS} FROM attendances WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Attendance"))
}

async fn lock_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, AppError> {
    Ok(sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {COLUMNS} FROM attendances WHERE employee_id = ? AND date = ? FOR UPDATE"
    ))
    .bind(employee_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?)
}

async fn insert_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
    row: &DayRow,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendances
            (employee_id, date, clock_in, clock_out, scheduled_clock_in, scheduled_clock_out,
             status, late_minutes, early_leave_minutes, work_duration_minutes,
             is_manual_entry, is_approved, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(row.clock_in)
    .bind(row.clock_out)
    .bind(row.shift.map(|s| s.clock_in))
    .bind(row.shift.map(|s| s.clock_out))
    .bind(row.outcome.status.as_ref())
    .bind(row.outcome.late_minutes)
    .bind(row.outcome.early_leave_minutes)
    .bind(row.outcome.work_duration_minutes)
    .bind(row.is_manual_entry)
    .bind(row.is_approved)
    .bind(&row.notes)
    .execute(&mut *conn)
    .await
    .map_err(|e| on_duplicate(e, "Attendance for that date already exists"))?;

    Ok(result.last_insert_id())
}

async fn update_day(conn: &mut MySqlConnection, id: u64, row: &DayRow) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE attendances
        SET clock_in = ?, clock_out = ?, scheduled_clock_in = ?, scheduled_clock_out = ?,
            status = ?, late_minutes = ?, early_leave_minutes = ?, work_duration_minutes = ?,
            is_manual_entry = ?, is_approved = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(row.clock_in)
    .bind(row.clock_out)
    .bind(row.shift.map(|s| s.clock_in))
    .bind(row.shift.map(|s| s.clock_out))
    .bind(row.outcome.status.as_ref())
    .bind(row.outcome.late_minutes)
    .bind(row.outcome.early_leave_minutes)
    .bind(row.outcome.work_duration_minutes)
    .bind(row.is_manual_entry)
    .bind(row.is_approved)
    .bind(&row.notes)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn check_in(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    at: NaiveTime,
) -> Result<Attendance, AppError> {
    let mut tx = pool.begin().await?;
    if lock_day(&mut tx, employee_id, date).await?.is_some() {
        return Err(AppError::Conflict("Already checked in today".into()));
    }

    let shift = shift_for(&mut tx, employee_id, date).await?;
    let row = DayRow {
        clock_in: Some(at),
        clock_out: None,
        shift,
        outcome: attendance::evaluate(Some(at), None, shift.as_ref()),
        is_manual_entry: false,
        is_approved: true,
        notes: None,
    };
    let id = insert_day(&mut tx, employee_id, date, &row).await?;
    tx.commit().await?;

    info!(
        employee_id,
        %date,
        clock_in = %at,
        late_minutes = row.outcome.late_minutes,
        status = %row.outcome.status,
        "Checked in"
    );
    fetch(pool, id).await
}

pub async fn check_out(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    at: NaiveTime,
) -> Result<Attendance, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_day(&mut tx, employee_id, date)
        .await?
        .ok_or_else(|| AppError::Conflict("You have not checked in today".into()))?;

    let clock_in = current
        .clock_in
        .ok_or_else(|| AppError::Conflict("You have not checked in today".into()))?;
    if current.clock_out.is_some() {
        return Err(AppError::Conflict("Already checked out today".into()));
    }
    if at < clock_in {
        return Err(AppError::validation("Check-out cannot be before check-in"));
    }

    let shift = shift_for(&mut tx, employee_id, date).await?;
    let row = DayRow {
        clock_in: Some(clock_in),
        clock_out: Some(at),
        shift,
        outcome: attendance::evaluate(Some(clock_in), Some(at), shift.as_ref()),
        is_manual_entry: current.is_manual_entry,
        is_approved: current.is_approved,
        notes: current.notes.clone(),
    };
    update_day(&mut tx, current.id, &row).await?;
    tx.commit().await?;

    info!(
        employee_id,
        %date,
        clock_out = %at,
        early_leave_minutes = row.outcome.early_leave_minutes,
        status = %row.outcome.status,
        "Checked out"
    );
    fetch(pool, current.id).await
}

fn manual_outcome(entry: &ManualEntry, shift: Option<&ScheduledShift>) -> Result<DayOutcome, AppError> {
    match entry.status {
        Some(status) if status.is_manual() => Ok(attendance::manual(status)),
        Some(status) => Err(AppError::validation(format!(
            "'{status}' is derived from clock times and cannot be entered by hand"
        ))),
        None => {
            if entry.clock_in.is_none() {
                return Err(AppError::validation(
                    "A manual entry needs a status or a clock_in time",
                ));
            }
            if let (Some(i), Some(o)) = (entry.clock_in, entry.clock_out) {
                if o < i {
                    return Err(AppError::validation("clock_out cannot be before clock_in"));
                }
            }
            Ok(attendance::evaluate(entry.clock_in, entry.clock_out, shift))
        }
    }
}

/// Records a hand-entered day. HR entries are approved at once and may
/// overwrite an existing day; an employee's own entry waits for HR and may
/// only fill a day with nothing recorded.
pub async fn record_manual(
    pool: &MySqlPool,
    employee_id: u64,
    entry: ManualEntry,
    by_hr: bool,
) -> Result<Attendance, AppError> {
    let mut tx = pool.begin().await?;
    let existing = lock_day(&mut tx, employee_id, entry.date).await?;
    if existing.is_some() && !by_hr {
        return Err(AppError::Conflict("Attendance for that date already exists".into()));
    }

    let shift = shift_for(&mut tx, employee_id, entry.date).await?;
    let outcome = manual_outcome(&entry, shift.as_ref())?;
    let manual_status = entry.status.is_some();
    let row = DayRow {
        clock_in: if manual_status { None } else { entry.clock_in },
        clock_out: if manual_status { None } else { entry.clock_out },
        shift,
        outcome,
        is_manual_entry: true,
        is_approved: by_hr,
        notes: entry.notes,
    };

    let id = match existing {
        Some(current) => {
            update_day(&mut tx, current.id, &row).await?;
            current.id
        }
        None => insert_day(&mut tx, employee_id, entry.date, &row).await?,
    };
    tx.commit().await?;

    info!(
        employee_id,
        date = %entry.date,
        status = %row.outcome.status,
        approved = by_hr,
        "Manual attendance recorded"
    );
    fetch(pool, id).await
}

pub async fn approve(pool: &MySqlPool, id: u64) -> Result<Attendance, AppError> {
    let current = fetch(pool, id).await?;
    if current.is_approved {
        return Err(AppError::Conflict("Attendance is already approved".into()));
    }

    sqlx::query("UPDATE attendances SET is_approved = TRUE WHERE id = ? AND is_approved = FALSE")
        .bind(id)
        .execute(pool)
        .await?;

    info!(attendance_id = id, "Manual attendance approved");
    fetch(pool, id).await
}

pub async fn list(
    pool: &MySqlPool,
    employee_id: Option<u64>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Attendance>, AppError> {
    let mut conditions = Vec::new();
    if employee_id.is_some() {
        conditions.push("employee_id = ?");
    }
    if from.is_some() {
        conditions.push("date >= ?");
    }
    if to.is_some() {
        conditions.push("date <= ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("SELECT {COLUMNS} FROM attendances {where_clause} ORDER BY date DESC, id DESC LIMIT 500");
    debug!(sql = %sql, "Listing attendance");

    let mut q = sqlx::query_as::<_, Attendance>(&sql);
    if let Some(id) = employee_id {
        q = q.bind(id);
    }
    if let Some(d) = from {
        q = q.bind(d);
    }
    if let Some(d) = to {
        q = q.bind(d);
    }
    Ok(q.fetch_all(pool).await?)
}

/// Month statistics from approved rows plus the weekly schedule.
pub async fn monthly_summary(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<MonthlySummary, AppError> {
    let days = summary::month_days(year, month)?;
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return Err(AppError::validation("Invalid year/month"));
    };

    let rows = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {COLUMNS} FROM attendances \
         WHERE employee_id = ? AND date BETWEEN ? AND ? AND is_approved = TRUE"
    ))
    .bind(employee_id)
    .bind(*first)
    .bind(*last)
    .fetch_all(pool)
    .await?;

    let mut records = HashMap::with_capacity(rows.len());
    for row in &rows {
        records.insert(
            row.date,
            DayRecord {
                status: row.status()?,
                late_minutes: row.late_minutes,
                early_leave_minutes: row.early_leave_minutes,
                work_duration_minutes: row.work_duration_minutes,
            },
        );
    }

    let weekdays: HashSet<u32> = schedule::week_schedule(pool, employee_id)
        .await?
        .iter()
        .map(|d| u32::from(d.day_of_week))
        .collect();

    summary::summarize_month(employee_id, year, month, today, &records, &weekdays)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: Option<AttendanceStatus>, clock_in: Option<(u32, u32)>) -> ManualEntry {
        ManualEntry {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            status,
            clock_in: clock_in.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            clock_out: NaiveTime::from_hms_opt(17, 0, 0),
            notes: None,
        }
    }

    #[test]
    fn manual_statuses_bypass_the_clock() {
        let out = manual_outcome(&entry(Some(AttendanceStatus::Sick), None), None).unwrap();
        assert_eq!(out.status, AttendanceStatus::Sick);
        assert_eq!(out.late_minutes, 0);
    }

    #[test]
    fn derived_statuses_cannot_be_typed_in() {
        let err = manual_outcome(&entry(Some(AttendanceStatus::Present), None), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn corrected_clock_times_are_evaluated_against_the_shift() {
        let shift = ScheduledShift {
            clock_in: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            clock_out: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            late_tolerance_minutes: 0,
            early_leave_tolerance_minutes: 0,
        };
        let out = manual_outcome(&entry(None, Some((8, 15))), Some(&shift)).unwrap();
        assert_eq!(out.status, AttendanceStatus::Late);
        assert_eq!(out.late_minutes, 15);

        assert!(manual_outcome(&entry(None, None), Some(&shift)).is_err());
    }
}
