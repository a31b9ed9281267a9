use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const ALL: [LeaveStatus; 5] = [
        LeaveStatus::Draft,
        LeaveStatus::Pending,
        LeaveStatus::Approved,
        LeaveStatus::Rejected,
        LeaveStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }

    /// Requests in these states hold their dates against new requests.
    pub fn blocks_overlap(self) -> bool {
        matches!(
            self,
            LeaveStatus::Draft | LeaveStatus::Pending | LeaveStatus::Approved
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-04", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    #[schema(example = 3.0)]
    pub total_days: f64,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub approver_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn status(&self) -> Result<LeaveStatus, AppError> {
        self.status.parse().map_err(|_| {
            tracing::error!(leave_id = self.id, status = %self.status, "Unknown leave status");
            AppError::Conflict(format!("Unknown leave status '{}'", self.status))
        })
    }
}
