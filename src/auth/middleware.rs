use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn unauthorized(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    req.into_response(resp.map_into_boxed_body())
}

fn bearer_token(req: &ServiceRequest) -> Result<String, &'static str> {
    let value = req
        .headers()
        .get("Authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    value
        .strip_prefix("Bearer ")
        .map(str::to_owned)
        .ok_or("Authorization header must start with Bearer")
}

/// Verifies the bearer token once per request and stores the caller as an
/// `AuthUser` request extension for the handlers' extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let token = match bearer_token(&req) {
        Ok(t) => t,
        Err(message) => return Ok(unauthorized(req, message)),
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, path = %req.path(), "Rejected bearer token");
            return Ok(unauthorized(req, "Invalid or expired token"));
        }
    };

    let Some(auth_user) = AuthUser::from_claims(claims) else {
        return Ok(unauthorized(req, "Invalid role"));
    };

    tracing::debug!(user = %auth_user.username, role = ?auth_user.role, path = %req.path(), "Authenticated request");
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, middleware::from_fn, test as actix_test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().json(json!({ "employee_id": user.employee_id }))
    }

    #[actix_web::test]
    async fn bearer_tokens_are_checked_before_handlers_run() {
        let config = Config::for_tests();
        let token =
            generate_access_token(3, "emp".into(), Role::Employee as u8, Some(30), &config.jwt_secret, 900)
                .unwrap();
        let unknown_role =
            generate_access_token(3, "emp".into(), 42, Some(30), &config.jwt_secret, 900).unwrap();
        let app = actix_test::init_service(
            App::new().app_data(web::Data::new(config)).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["employee_id"], 30);

        for header in [format!("Token {token}"), format!("Bearer {unknown_role}"), "Bearer junk".into()] {
            let req = actix_test::TestRequest::get()
                .uri("/api/me")
                .insert_header(("Authorization", header))
                .to_request();
            assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
