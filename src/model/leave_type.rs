use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "name": "Annual Leave",
    "code": "AL",
    "default_quota": 12.0,
    "requires_balance": true,
    "allow_half_day": true
}))]
pub struct LeaveType {
    pub id: u64,
    pub name: String,
    pub code: String,
    /// Seeds `initial_balance` when a balance row is first created
    pub default_quota: f64,
    /// Unpaid-style types are tracked but never refused for lack of balance
    pub requires_balance: bool,
    pub allow_half_day: bool,
}
