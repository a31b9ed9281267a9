use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    pub id: u64,
    pub name: String,
    /// Organisational unit code printed on outgoing letters, e.g. `HRD`
    #[schema(example = "HRD")]
    pub code: String,
}
