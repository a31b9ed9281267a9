use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

/// The caller behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already verified by the auth middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        ready(AuthUser::from_claims(claims).ok_or_else(|| ErrorUnauthorized("Invalid role")))
    }
}

impl AuthUser {
    /// `None` when the token carries a role id this service does not know.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        Some(AuthUser {
            user_id: claims.user_id,
            role: Role::from_id(claims.role)?,
            username: claims.sub,
            employee_id: claims.employee_id,
        })
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.role.is_hr_desk() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only"))
        }
    }

    /// Employee record of the caller; self-service endpoints need one.
    pub fn require_employee(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or(AppError::Forbidden("No employee profile"))
    }

    pub fn is_hr_desk(&self) -> bool {
        self.role.is_hr_desk()
    }

    /// The owner of a record, or HR/Admin acting on their behalf.
    pub fn require_self_or_hr(&self, employee_id: u64) -> Result<(), AppError> {
        if self.is_hr_desk() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not your record"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenType;

    fn claims(role: u8, employee_id: Option<u64>) -> Claims {
        Claims {
            user_id: 4,
            sub: "hr.jane".into(),
            role,
            exp: 0,
            jti: "j".into(),
            token_type: TokenType::Access,
            employee_id,
        }
    }

    #[test]
    fn unknown_role_ids_do_not_authenticate() {
        assert!(AuthUser::from_claims(claims(0, None)).is_none());
        assert!(AuthUser::from_claims(claims(9, Some(1))).is_none());

        let user = AuthUser::from_claims(claims(2, Some(40))).unwrap();
        assert_eq!(user.role, Role::Hr);
        assert_eq!(user.employee_id, Some(40));
    }

    #[test]
    fn owners_and_the_hr_desk_pass_the_record_guard() {
        let employee = AuthUser::from_claims(claims(5, Some(40))).unwrap();
        assert!(employee.require_self_or_hr(40).is_ok());
        assert!(employee.require_self_or_hr(41).is_err());
        assert!(employee.require_hr_or_admin().is_err());

        let admin = AuthUser::from_claims(claims(1, None)).unwrap();
        assert!(admin.require_self_or_hr(41).is_ok());
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_employee().is_err());
    }
}
