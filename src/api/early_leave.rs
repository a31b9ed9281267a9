use crate::auth::auth::AuthUser;
use crate::model::early_leave::{EarlyLeaveRequest, EarlyLeaveStatus};
use crate::model::role::Role;
use crate::notify::{NotificationEvent, Notifier};
use crate::store::early_leave as store;
use crate::workflow::early_leave::EarlyLeaveAction;
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateEarlyLeave {
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "14:30:00", value_type = String)]
    pub leave_time: NaiveTime,
    #[schema(example = "Clinic appointment")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct HrApproval {
    /// Employee id of the director who signs the response letter
    #[schema(example = 3)]
    pub director_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct Rejection {
    #[schema(example = "Handover not arranged")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct EarlyLeaveFilter {
    /// HR/Admin only; other callers see their own requests
    pub employee_id: Option<u64>,
    #[schema(example = "pending_hr")]
    pub status: Option<EarlyLeaveStatus>,
}

#[utoipa::path(
    post,
    path = "/api/early-leave",
    request_body = CreateEarlyLeave,
    responses(
        (status = 200, description = "Request submitted to HR", body = Object, example = json!({
            "message": "Early leave request submitted"
        })),
        (status = 400, description = "Reason missing"),
        (status = 409, description = "A request already exists for that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn create_early_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    payload: web::Json<CreateEarlyLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    if payload.reason.trim().is_empty() {
        return Err(crate::error::AppError::validation("Reason is required").into());
    }

    let request = store::create(
        pool.get_ref(),
        employee_id,
        payload.date,
        payload.leave_time,
        payload.reason.trim(),
    )
    .await?;

    notifier.notify(
        NotificationEvent::to_hr("early_leave_submitted", "Early leave request awaiting review")
            .about("early_leave_request", request.id)
            .body(format!(
                "Employee #{} asks to leave at {} on {}",
                request.employee_id, request.leave_time, request.date
            )),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Early leave request submitted",
        "data": request
    })))
}

#[utoipa::path(
    get,
    path = "/api/early-leave",
    params(EarlyLeaveFilter),
    responses((status = 200, description = "Early leave requests", body = [EarlyLeaveRequest])),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn list_early_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EarlyLeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, director_id) = if auth.is_hr_desk() {
        (query.employee_id, None)
    } else if auth.role == Role::Director {
        // Directors see what awaits their signature
        (None, Some(auth.require_employee()?))
    } else {
        (Some(auth.require_employee()?), None)
    };

    let requests = store::list(pool.get_ref(), employee_id, director_id, query.status).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    get,
    path = "/api/early-leave/{id}",
    params(("id" = u64, Path, description = "Early leave request ID")),
    responses(
        (status = 200, description = "Early leave request", body = EarlyLeaveRequest),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn get_early_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = store::fetch(pool.get_ref(), path.into_inner()).await?;
    let is_director = request.director_id.is_some() && request.director_id == auth.employee_id;
    if !is_director {
        auth.require_self_or_hr(request.employee_id)?;
    }
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/early-leave/{id}/hr-approve",
    params(("id" = u64, Path, description = "Early leave request ID")),
    request_body = HrApproval,
    responses(
        (status = 200, description = "Approved by HR, letter number issued", body = Object, example = json!({
            "message": "Early leave approved by HR, awaiting director signature",
            "data": {"response_letter_number": "001/PLC/HRD/2026"}
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Request is not pending HR review")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn hr_approve(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: web::Json<HrApproval>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let request = store::hr_approve(pool.get_ref(), path.into_inner(), &auth, payload.director_id).await?;

    let letter = request.response_letter_number.clone().unwrap_or_default();
    notifier.notify(
        NotificationEvent::to_director(
            payload.director_id,
            "early_leave_awaiting_signature",
            "Early leave letter awaiting your signature",
        )
        .about("early_leave_request", request.id)
        .body(format!("Letter {letter} for employee #{}", request.employee_id)),
    );
    notifier.notify(
        NotificationEvent::to_employee(
            request.employee_id,
            "early_leave_hr_approved",
            "Early leave approved by HR",
        )
        .about("early_leave_request", request.id)
        .body(format!("Letter {letter} is waiting for the director's signature")),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Early leave approved by HR, awaiting director signature",
        "data": request
    })))
}

#[utoipa::path(
    put,
    path = "/api/early-leave/{id}/director",
    params(("id" = u64, Path, description = "Early leave request ID")),
    request_body = HrApproval,
    responses(
        (status = 200, description = "Letter handed to another director"),
        (status = 400, description = "Director is the requester or not active"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Request or director not found"),
        (status = 409, description = "Request is not awaiting a signature")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn reassign_director(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: web::Json<HrApproval>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let request =
        store::reassign_director(pool.get_ref(), path.into_inner(), &auth, payload.director_id).await?;

    notifier.notify(
        NotificationEvent::to_director(
            payload.director_id,
            "early_leave_awaiting_signature",
            "Early leave letter awaiting your signature",
        )
        .about("early_leave_request", request.id)
        .body(format!(
            "Letter {} for employee #{}",
            request.response_letter_number.as_deref().unwrap_or("-"),
            request.employee_id
        )),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Director reassigned",
        "data": request
    })))
}

#[utoipa::path(
    put,
    path = "/api/early-leave/{id}/hr-reject",
    params(("id" = u64, Path, description = "Early leave request ID")),
    request_body = Rejection,
    responses(
        (status = 200, description = "Rejected by HR"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Request is not pending HR review")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn hr_reject(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: Option<web::Json<Rejection>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    reject(
        &auth,
        &pool,
        &notifier,
        path.into_inner(),
        EarlyLeaveAction::HrReject,
        payload.and_then(|p| p.into_inner().reason),
    )
    .await
}

#[utoipa::path(
    put,
    path = "/api/early-leave/{id}/director-reject",
    params(("id" = u64, Path, description = "Early leave request ID")),
    request_body = Rejection,
    responses(
        (status = 200, description = "Rejected by the director"),
        (status = 403, description = "Only the assigned director"),
        (status = 409, description = "Request is not awaiting a signature")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn director_reject(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: Option<web::Json<Rejection>>,
) -> actix_web::Result<impl Responder> {
    reject(
        &auth,
        &pool,
        &notifier,
        path.into_inner(),
        EarlyLeaveAction::DirectorReject,
        payload.and_then(|p| p.into_inner().reason),
    )
    .await
}

async fn reject(
    auth: &AuthUser,
    pool: &MySqlPool,
    notifier: &Notifier,
    id: u64,
    action: EarlyLeaveAction,
    reason: Option<String>,
) -> actix_web::Result<HttpResponse> {
    let request = store::reject(pool, id, auth, action, reason).await?;

    notifier.notify(
        NotificationEvent::to_employee(request.employee_id, "early_leave_rejected", "Early leave rejected")
            .about("early_leave_request", request.id)
            .body(request.rejection_reason.clone().unwrap_or_default()),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Early leave request rejected",
        "data": request
    })))
}

#[utoipa::path(
    put,
    path = "/api/early-leave/{id}/sign",
    params(("id" = u64, Path, description = "Early leave request ID")),
    responses(
        (status = 200, description = "Signed and approved", body = Object, example = json!({
            "message": "Early leave request signed"
        })),
        (status = 403, description = "Only the assigned director"),
        (status = 409, description = "Request is not awaiting a signature")
    ),
    security(("bearer_auth" = [])),
    tag = "Early Leave"
)]
pub async fn sign(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = store::sign(pool.get_ref(), path.into_inner(), &auth).await?;

    notifier.notify(
        NotificationEvent::to_employee(request.employee_id, "early_leave_approved", "Early leave approved")
            .about("early_leave_request", request.id)
            .body(format!(
                "You may leave at {} on {} (letter {})",
                request.leave_time,
                request.date,
                request.response_letter_number.as_deref().unwrap_or("-")
            )),
    );
    notifier.notify(
        NotificationEvent::to_hr("early_leave_signed", "Early leave letter signed")
            .about("early_leave_request", request.id),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Early leave request signed",
        "data": request
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::config::Config;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn only_hr_desk_reviews_early_leave() {
        let config = Config::for_tests();
        let token =
            generate_access_token(9, "director".into(), Role::Director as u8, Some(3), &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let (notifier, _rx) = Notifier::channel(8);
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(notifier))
                .route("/api/early-leave/{id}/hr-approve", web::put().to(hr_approve))
                .route("/api/early-leave/{id}/hr-reject", web::put().to(hr_reject))
                .route("/api/early-leave/{id}/director", web::put().to(reassign_director)),
        )
        .await;

        let req = actix_test::TestRequest::put()
            .uri("/api/early-leave/1/hr-approve")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"director_id": 3}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::put()
            .uri("/api/early-leave/1/hr-reject")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        // Directors cannot hand a letter on to someone else.
        let req = actix_test::TestRequest::put()
            .uri("/api/early-leave/1/director")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"director_id": 4}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn blank_reason_is_refused() {
        let config = Config::for_tests();
        let token =
            generate_access_token(4, "emp".into(), Role::Employee as u8, Some(4), &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let (notifier, _rx) = Notifier::channel(8);
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(notifier))
                .route("/api/early-leave", web::post().to(create_early_leave)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/early-leave")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"date": "2026-03-02", "leave_time": "14:30:00", "reason": "  "}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
