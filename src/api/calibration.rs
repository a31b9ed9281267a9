use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::performance::{CalibrationReview, CalibrationSession};
use crate::notify::{NotificationEvent, Notifier};
use crate::store::performance::{self as store, Calibration};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateSession {
    #[schema(example = "2026 year-end calibration")]
    pub name: String,
    #[schema(example = 2026)]
    pub year: i32,
    /// Employee id running the session; defaults to the caller
    pub facilitator_id: Option<u64>,
    /// Restrict the session to these reviews; defaults to every completed
    /// review of the year
    pub review_ids: Option<Vec<u64>>,
}

#[derive(Deserialize, ToSchema)]
pub struct CalibrateEntry {
    /// Omit to clear the calibration of this entry
    #[schema(example = 84.0)]
    pub calibrated_score: Option<f64>,
    /// Derived from the grade table when omitted
    #[schema(example = "B")]
    pub calibrated_grade: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: CalibrationSession,
    pub entries: Vec<CalibrationReview>,
}

#[utoipa::path(
    post,
    path = "/api/calibration",
    request_body = CreateSession,
    responses(
        (status = 200, description = "Session opened with snapshotted scores", body = SessionDetail),
        (status = 400, description = "No completed reviews to calibrate"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Calibration"
)]
pub async fn create_session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSession>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let facilitator_id = match payload.facilitator_id {
        Some(id) => id,
        None => auth.require_employee()?,
    };

    let (session, entries) = store::create_session(
        pool.get_ref(),
        payload.name.trim(),
        payload.year,
        facilitator_id,
        payload.review_ids.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Calibration session created",
        "data": SessionDetail { session, entries }
    })))
}

#[utoipa::path(
    get,
    path = "/api/calibration/{id}",
    params(("id" = u64, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session with its entries", body = SessionDetail),
        (status = 403, description = "Only the facilitator or HR"),
        (status = 404, description = "Calibration session not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Calibration"
)]
pub async fn get_session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let session = store::fetch_session(pool.get_ref(), id).await?;
    store::ensure_facilitator(&session, &auth)?;

    let entries = store::session_entries(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(SessionDetail { session, entries }))
}

#[utoipa::path(
    put,
    path = "/api/calibration/{id}/entries/{entry_id}",
    params(
        ("id" = u64, Path, description = "Session ID"),
        ("entry_id" = u64, Path, description = "Calibration entry ID")
    ),
    request_body = CalibrateEntry,
    responses(
        (status = 200, description = "Entry calibrated", body = CalibrationReview),
        (status = 400, description = "Score out of range or unknown grade"),
        (status = 409, description = "Session is no longer in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "Calibration"
)]
pub async fn calibrate_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<CalibrateEntry>,
) -> actix_web::Result<impl Responder> {
    let (session_id, entry_id) = path.into_inner();
    let payload = payload.into_inner();

    let entry = store::calibrate_entry(
        pool.get_ref(),
        session_id,
        entry_id,
        &auth,
        Calibration {
            calibrated_score: payload.calibrated_score,
            calibrated_grade: payload.calibrated_grade.map(|g| g.trim().to_uppercase()),
            notes: payload.notes,
        },
        &config.grade_table,
    )
    .await?;

    Ok(HttpResponse::Ok().json(entry))
}

/// Completes the session and writes calibrated results back to their reviews
#[utoipa::path(
    put,
    path = "/api/calibration/{id}/complete",
    params(("id" = u64, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session completed", body = CalibrationSession),
        (status = 409, description = "Session is no longer in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "Calibration"
)]
pub async fn complete_session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let session_id = path.into_inner();
    let session =
        store::complete_session(pool.get_ref(), session_id, &auth, &config.grade_table).await?;

    notifier.notify(
        NotificationEvent::to_hr("calibration_completed", format!("Calibration '{}' completed", session.name))
            .about("calibration_session", session.id),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Calibration session completed",
        "data": session
    })))
}

#[utoipa::path(
    put,
    path = "/api/calibration/{id}/cancel",
    params(("id" = u64, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session cancelled, nothing written back", body = CalibrationSession),
        (status = 409, description = "Session is no longer in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "Calibration"
)]
pub async fn cancel_session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let session = store::cancel_session(pool.get_ref(), path.into_inner(), &auth).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Calibration session cancelled",
        "data": session
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn sessions_are_opened_by_the_hr_desk() {
        let config = Config::for_tests();
        let token =
            generate_access_token(7, "dir".into(), Role::Director as u8, Some(7), &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .route("/api/calibration", web::post().to(create_session)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/calibration")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"name": "Year end", "year": 2026}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn hr_without_a_profile_must_name_a_facilitator() {
        let config = Config::for_tests();
        let token =
            generate_access_token(1, "admin".into(), Role::Admin as u8, None, &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .route("/api/calibration", web::post().to(create_session)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/calibration")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"name": "Year end", "year": 2026}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
