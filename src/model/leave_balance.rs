use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 12.0)]
    pub initial_balance: f64,
    #[schema(example = 2.0)]
    pub carry_over: f64,
    #[schema(example = 0.0)]
    pub adjustment: f64,
    #[schema(example = 3.0)]
    pub used: f64,
    #[schema(example = 1.0)]
    pub pending: f64,
}
