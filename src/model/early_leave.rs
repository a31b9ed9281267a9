use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EarlyLeaveStatus {
    PendingHr,
    PendingDirectorSign,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EarlyLeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "14:30:00", value_type = String)]
    pub leave_time: NaiveTime,
    pub reason: String,
    #[schema(example = "pending_hr")]
    pub status: String,
    pub hr_reviewer_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub hr_reviewed_at: Option<DateTime<Utc>>,
    pub director_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub director_signed_at: Option<DateTime<Utc>>,
    #[schema(example = "001/PLC/HRD/2026")]
    pub response_letter_number: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl EarlyLeaveRequest {
    pub fn status(&self) -> Result<EarlyLeaveStatus, AppError> {
        self.status.parse().map_err(|_| {
            tracing::error!(early_leave_id = self.id, status = %self.status, "Unknown early leave status");
            AppError::Conflict(format!("Unknown early leave status '{}'", self.status))
        })
    }
}
