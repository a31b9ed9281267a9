use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    EarlyLeave,
    LateEarlyLeave,
    Absent,
    /// No shift scheduled and nobody clocked in
    Off,
    Leave,
    Sick,
    Permit,
}

impl AttendanceStatus {
    /// Statuses entered by hand that bypass the clock calculation.
    pub fn is_manual(self) -> bool {
        matches!(
            self,
            AttendanceStatus::Leave | AttendanceStatus::Sick | AttendanceStatus::Permit
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "08:15:00", value_type = Option<String>)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "17:00:00", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "08:00:00", value_type = Option<String>)]
    pub scheduled_clock_in: Option<NaiveTime>,
    #[schema(example = "17:00:00", value_type = Option<String>)]
    pub scheduled_clock_out: Option<NaiveTime>,
    #[schema(example = "late")]
    pub status: String,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub work_duration_minutes: Option<i32>,
    pub is_manual_entry: bool,
    pub is_approved: bool,
    pub notes: Option<String>,
}

impl Attendance {
    pub fn status(&self) -> Result<AttendanceStatus, AppError> {
        self.status.parse().map_err(|_| {
            tracing::error!(attendance_id = self.id, status = %self.status, "Unknown attendance status");
            AppError::Conflict(format!("Unknown attendance status '{}'", self.status))
        })
    }
}

/// A named work-schedule template.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    pub id: u64,
    #[schema(example = "Office hours")]
    pub name: String,
    #[schema(example = "08:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    #[schema(example = 0)]
    pub late_tolerance_minutes: i32,
    #[schema(example = 0)]
    pub early_leave_tolerance_minutes: i32,
}

/// One weekday of an employee's weekly schedule, joined with its shift.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ScheduleDay {
    pub employee_id: u64,
    /// 1 = Monday … 7 = Sunday
    #[schema(example = 1)]
    pub day_of_week: u8,
    pub shift_id: u64,
    pub shift_name: String,
    #[schema(example = "08:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    pub late_tolerance_minutes: i32,
    pub early_leave_tolerance_minutes: i32,
}
