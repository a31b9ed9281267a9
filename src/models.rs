use serde::{Deserialize, Serialize};

/// Claims of a bearer token minted by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Login name, used in logs only
    pub sub: String,
    /// `Role` id: 1 admin, 2 HR, 3 director, 4 manager, 5 employee
    pub role: u8,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// The identity provider signs both kinds with the same key. Only access
/// tokens authenticate API calls.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
