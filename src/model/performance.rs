use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    SelfAssessment,
    ManagerReview,
    Completed,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalibrationStatus {
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PerformanceReview {
    pub id: u64,
    pub employee_id: u64,
    /// Employee id of the manager scoring this review
    pub reviewer_id: u64,
    #[schema(example = "H1")]
    pub period: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = "manager_review")]
    pub status: String,
    pub self_score: Option<f64>,
    pub manager_score: Option<f64>,
    pub final_score: Option<f64>,
    #[schema(example = "B")]
    pub final_grade: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl PerformanceReview {
    pub fn status(&self) -> Result<ReviewStatus, AppError> {
        self.status.parse().map_err(|_| {
            tracing::error!(review_id = self.id, status = %self.status, "Unknown review status");
            AppError::Conflict(format!("Unknown review status '{}'", self.status))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PerformanceReviewItem {
    pub id: u64,
    pub review_id: u64,
    #[schema(example = "Delivery")]
    pub title: String,
    #[schema(example = 40.0)]
    pub weight: f64,
    pub self_score: Option<f64>,
    pub manager_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CalibrationSession {
    pub id: u64,
    #[schema(example = "2026 year-end calibration")]
    pub name: String,
    pub year: i32,
    pub facilitator_id: u64,
    #[schema(example = "in_progress")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CalibrationSession {
    pub fn status(&self) -> Result<CalibrationStatus, AppError> {
        self.status.parse().map_err(|_| {
            tracing::error!(session_id = self.id, status = %self.status, "Unknown calibration status");
            AppError::Conflict(format!("Unknown calibration status '{}'", self.status))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CalibrationReview {
    pub id: u64,
    pub session_id: u64,
    pub performance_review_id: u64,
    pub original_score: f64,
    pub original_grade: String,
    pub calibrated_score: Option<f64>,
    pub calibrated_grade: Option<String>,
    pub notes: Option<String>,
}
