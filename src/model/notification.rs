use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: u64,
    pub recipient_employee_id: Option<u64>,
    #[schema(example = "employee")]
    pub audience: String,
    #[schema(example = "leave_approved")]
    pub kind: String,
    pub title: String,
    pub body: String,
    #[schema(example = "leave_request")]
    pub reference_type: String,
    pub reference_id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub read_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
