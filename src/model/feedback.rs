use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackStatus {
    Open,
    Closed,
}

/// How a reviewer relates to the person receiving 360 feedback.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Relationship {
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    SelfReview,
    Peer,
    Manager,
    DirectReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FeedbackRequest {
    pub id: u64,
    pub subject_employee_id: u64,
    #[schema(example = "Mid-year 360")]
    pub title: String,
    #[schema(example = "open")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FeedbackReviewer {
    pub id: u64,
    pub request_id: u64,
    pub reviewer_employee_id: u64,
    #[schema(example = "peer")]
    pub relationship: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// An answer joined with the relationship of the reviewer who gave it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackAnswerRow {
    pub relationship: String,
    pub competency: String,
    pub score: f64,
}
