use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Business-rule and storage failures surfaced to API callers as
/// `{"message": ...}` bodies.
#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(
        fmt = "Insufficient leave balance: {} day(s) available, {} requested",
        available,
        requested
    )]
    InsufficientBalance { available: f64, requested: f64 },

    #[display(fmt = "Dates overlap an existing leave request (#{})", _0)]
    Overlap(u64),

    #[display(fmt = "Cannot {} a request that is {}", action, from)]
    InvalidTransition { action: &'static str, from: String },

    #[display(fmt = "{}", _0)]
    Forbidden(&'static str),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Internal Server Error")]
    Database(sqlx::Error),
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Overlap(_) | AppError::InvalidTransition { .. } | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Database(e) = self {
            tracing::error!(error = %e, "Database error");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

/// Maps a unique-key violation (MySQL SQLSTATE 23000) to a conflict message.
pub fn on_duplicate(e: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") {
            return AppError::Conflict(message.to_string());
        }
    }
    AppError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientBalance {
                available: 1.0,
                requested: 2.0
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Overlap(7).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::NotFound("Leave request").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn messages_read_like_flash_messages() {
        let e = AppError::InsufficientBalance {
            available: 1.5,
            requested: 3.0,
        };
        assert_eq!(
            e.to_string(),
            "Insufficient leave balance: 1.5 day(s) available, 3 requested"
        );
        assert_eq!(
            AppError::InvalidTransition {
                action: "approve",
                from: "cancelled".to_string()
            }
            .to_string(),
            "Cannot approve a request that is cancelled"
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).to_string(),
            "Internal Server Error"
        );
    }
}
