use chrono::NaiveTime;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

use crate::error::{AppError, on_duplicate};
use crate::model::attendance::{ScheduleDay, Shift};

const SCHEDULE_SELECT: &str = r#"
    SELECT es.employee_id, es.day_of_week, es.shift_id, s.name AS shift_name,
           s.clock_in, s.clock_out, s.late_tolerance_minutes, s.early_leave_tolerance_minutes
    FROM employee_schedules es
    JOIN shifts s ON s.id = es.shift_id
"#;

pub struct NewShift<'a> {
    pub name: &'a str,
    pub clock_in: NaiveTime,
    pub clock_out: NaiveTime,
    pub late_tolerance_minutes: i32,
    pub early_leave_tolerance_minutes: i32,
}

impl NewShift<'_> {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Shift name is required"));
        }
        if self.clock_out <= self.clock_in {
            return Err(AppError::validation("clock_out must be after clock_in"));
        }
        if self.late_tolerance_minutes < 0 || self.early_leave_tolerance_minutes < 0 {
            return Err(AppError::validation("Tolerances cannot be negative"));
        }
        Ok(())
    }
}

pub async fn list_shifts(pool: &MySqlPool) -> Result<Vec<Shift>, AppError> {
    Ok(sqlx::query_as::<_, Shift>(
        "SELECT id, name, clock_in, clock_out, late_tolerance_minutes, early_leave_tolerance_minutes \
         FROM shifts ORDER BY id",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn fetch_shift(pool: &MySqlPool, id: u64) -> Result<Shift, AppError> {
    sqlx::query_as::<_, Shift>(
        "SELECT id, name, clock_in, clock_out, late_tolerance_minutes, early_leave_tolerance_minutes \
         FROM shifts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Shift"))
}

pub async fn create_shift(pool: &MySqlPool, shift: NewShift<'_>) -> Result<Shift, AppError> {
    shift.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO shifts (name, clock_in, clock_out, late_tolerance_minutes, early_leave_tolerance_minutes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(shift.name)
    .bind(shift.clock_in)
    .bind(shift.clock_out)
    .bind(shift.late_tolerance_minutes)
    .bind(shift.early_leave_tolerance_minutes)
    .execute(pool)
    .await?;

    info!(shift_id = result.last_insert_id(), name = shift.name, "Shift created");
    fetch_shift(pool, result.last_insert_id()).await
}

pub async fn update_shift(pool: &MySqlPool, id: u64, shift: NewShift<'_>) -> Result<Shift, AppError> {
    shift.validate()?;

    sqlx::query(
        r#"
        UPDATE shifts
        SET name = ?, clock_in = ?, clock_out = ?,
            late_tolerance_minutes = ?, early_leave_tolerance_minutes = ?
        WHERE id = ?
        "#,
    )
    .bind(shift.name)
    .bind(shift.clock_in)
    .bind(shift.clock_out)
    .bind(shift.late_tolerance_minutes)
    .bind(shift.early_leave_tolerance_minutes)
    .bind(id)
    .execute(pool)
    .await?;

    // rows_affected is 0 for unchanged rows too, so existence is checked by re-reading
    let updated = fetch_shift(pool, id).await?;
    info!(shift_id = id, "Shift updated");
    Ok(updated)
}

/// The shift an employee works on ISO weekday `day_of_week` (1 = Monday).
pub async fn day_schedule(
    conn: &mut MySqlConnection,
    employee_id: u64,
    day_of_week: u32,
) -> Result<Option<ScheduleDay>, AppError> {
    let sql = format!("{SCHEDULE_SELECT} WHERE es.employee_id = ? AND es.day_of_week = ?");
    Ok(sqlx::query_as::<_, ScheduleDay>(&sql)
        .bind(employee_id)
        .bind(day_of_week)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn week_schedule(pool: &MySqlPool, employee_id: u64) -> Result<Vec<ScheduleDay>, AppError> {
    let sql = format!("{SCHEDULE_SELECT} WHERE es.employee_id = ? ORDER BY es.day_of_week");
    Ok(sqlx::query_as::<_, ScheduleDay>(&sql)
        .bind(employee_id)
        .fetch_all(pool)
        .await?)
}

/// Assigns `shift_id` to one weekday, replacing any earlier assignment.
pub async fn assign_day(
    pool: &MySqlPool,
    employee_id: u64,
    day_of_week: u8,
    shift_id: u64,
) -> Result<(), AppError> {
    if !(1..=7).contains(&day_of_week) {
        return Err(AppError::validation("day_of_week must be 1 (Monday) to 7 (Sunday)"));
    }
    fetch_shift(pool, shift_id).await?;

    sqlx::query(
        r#"
        INSERT INTO employee_schedules (employee_id, day_of_week, shift_id)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE shift_id = VALUES(shift_id)
        "#,
    )
    .bind(employee_id)
    .bind(day_of_week)
    .bind(shift_id)
    .execute(pool)
    .await
    .map_err(|e| on_duplicate(e, "Schedule conflict"))?;

    info!(employee_id, day_of_week, shift_id, "Schedule day assigned");
    Ok(())
}

pub async fn clear_day(pool: &MySqlPool, employee_id: u64, day_of_week: u8) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM employee_schedules WHERE employee_id = ? AND day_of_week = ?")
        .bind(employee_id)
        .bind(day_of_week)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Schedule day"));
    }
    info!(employee_id, day_of_week, "Schedule day cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(clock_in: (u32, u32), clock_out: (u32, u32), late: i32) -> NewShift<'static> {
        NewShift {
            name: "Office hours",
            clock_in: NaiveTime::from_hms_opt(clock_in.0, clock_in.1, 0).unwrap(),
            clock_out: NaiveTime::from_hms_opt(clock_out.0, clock_out.1, 0).unwrap(),
            late_tolerance_minutes: late,
            early_leave_tolerance_minutes: 0,
        }
    }

    #[test]
    fn shifts_must_end_after_they_start() {
        assert!(shift((8, 0), (17, 0), 5).validate().is_ok());
        assert!(shift((22, 0), (6, 0), 0).validate().is_err());
        assert!(shift((8, 0), (17, 0), -1).validate().is_err());
    }
}
