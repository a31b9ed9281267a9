use crate::auth::auth::AuthUser;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::notify::{NotificationEvent, Notifier};
use crate::store::leave::{self as store, LeaveDraft};
use crate::utils::db_utils::page_window;
use crate::workflow::leave::LeaveAction;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
    /// Submit straight away instead of saving a draft
    #[serde(default)]
    pub submit: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct EditLeave {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Team is short-staffed that week")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID (HR/Admin only; employees always see their own)
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    #[schema(example = 20)]
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

impl From<CreateLeave> for LeaveDraft {
    fn from(p: CreateLeave) -> Self {
        LeaveDraft {
            leave_type_id: p.leave_type_id,
            start_date: p.start_date,
            end_date: p.end_date,
            is_half_day: p.is_half_day,
            reason: p.reason,
        }
    }
}

impl From<EditLeave> for LeaveDraft {
    fn from(p: EditLeave) -> Self {
        LeaveDraft {
            leave_type_id: p.leave_type_id,
            start_date: p.start_date,
            end_date: p.end_date,
            is_half_day: p.is_half_day,
            reason: p.reason,
        }
    }
}

fn submitted_event(request: &LeaveRequest) -> NotificationEvent {
    NotificationEvent::to_hr("leave_submitted", "Leave request awaiting approval")
        .about("leave_request", request.id)
        .body(format!(
            "Employee #{} requested {} day(s) from {} to {}",
            request.employee_id, request.total_days, request.start_date, request.end_date
        ))
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request saved", body = Object,
         example = json!({
            "message": "Leave request submitted",
            "data": {"id": 1, "status": "pending"}
         })
        ),
        (status = 400, description = "Invalid dates"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Dates overlap an existing request"),
        (status = 422, description = "Insufficient leave balance")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();
    let submit = payload.submit;

    let request = store::create_request(pool.get_ref(), employee_id, payload.into(), submit).await?;

    let message = if submit {
        notifier.notify(submitted_event(&request));
        "Leave request submitted"
    } else {
        "Leave request saved as draft"
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "data": request
    })))
}

/* =========================
Edit a draft or pending request
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    request_body = EditLeave,
    responses(
        (status = 200, description = "Leave request updated", body = LeaveRequest),
        (status = 403, description = "Not the requester"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already decided or dates overlap"),
        (status = 422, description = "Insufficient leave balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn edit_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EditLeave>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let request = store::edit_request(pool.get_ref(), id, &auth, payload.into_inner().into()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request updated",
        "data": request
    })))
}

async fn run_action(
    auth: &AuthUser,
    pool: &MySqlPool,
    notifier: &Notifier,
    id: u64,
    action: LeaveAction,
    reason: Option<String>,
) -> actix_web::Result<HttpResponse> {
    let (request, from) = store::transition_request(pool, id, action, auth, reason).await?;

    let (message, event) = match action {
        LeaveAction::Submit => ("Leave request submitted", Some(submitted_event(&request))),
        LeaveAction::Approve => (
            "Leave request approved",
            Some(
                NotificationEvent::to_employee(request.employee_id, "leave_approved", "Leave approved")
                    .about("leave_request", request.id)
                    .body(format!(
                        "Your leave from {} to {} was approved",
                        request.start_date, request.end_date
                    )),
            ),
        ),
        LeaveAction::Reject => (
            "Leave request rejected",
            Some(
                NotificationEvent::to_employee(request.employee_id, "leave_rejected", "Leave rejected")
                    .about("leave_request", request.id)
                    .body(request.rejection_reason.clone().unwrap_or_default()),
            ),
        ),
        LeaveAction::Cancel if auth.employee_id != Some(request.employee_id) => (
            "Leave request cancelled",
            Some(
                NotificationEvent::to_employee(request.employee_id, "leave_cancelled", "Leave cancelled by HR")
                    .about("leave_request", request.id),
            ),
        ),
        LeaveAction::Cancel if from == LeaveStatus::Pending => (
            "Leave request cancelled",
            Some(
                NotificationEvent::to_hr("leave_cancelled", "Pending leave withdrawn")
                    .about("leave_request", request.id),
            ),
        ),
        LeaveAction::Cancel => ("Leave request cancelled", None),
    };

    if let Some(event) = event {
        notifier.notify(event);
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "data": request
    })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/submit",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Draft submitted", body = Object, example = json!({
            "message": "Leave request submitted"
        })),
        (status = 409, description = "Request is not a draft"),
        (status = 422, description = "Insufficient leave balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn submit_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    run_action(&auth, &pool, &notifier, path.into_inner(), LeaveAction::Submit, None).await
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/approve",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave request approved"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    run_action(&auth, &pool, &notifier, path.into_inner(), LeaveAction::Approve, None).await
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/reject",
    params(("id" = u64, Path, description = "Leave request ID")),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({
            "message": "Leave request rejected"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: Option<web::Json<RejectLeave>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let reason = payload.and_then(|p| p.into_inner().reason);
    run_action(&auth, &pool, &notifier, path.into_inner(), LeaveAction::Reject, reason).await
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/cancel",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave request cancelled"
        })),
        (status = 403, description = "Not your request"),
        (status = 409, description = "Request already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    run_action(&auth, &pool, &notifier, path.into_inner(), LeaveAction::Cancel, None).await
}

/* =========================
Get a single leave request
========================= */
#[utoipa::path(
    get,
    path = "/api/leave/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = store::fetch_request(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(request.employee_id)?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave requests", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    // Employees only ever see their own requests
    let employee_filter = if auth.is_hr_desk() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let mut conditions = Vec::new();
    if employee_filter.is_some() {
        conditions.push("employee_id = ?");
    }
    if query.status.is_some() {
        conditions.push("status = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests {}", where_clause);
    let data_sql = format!(
        "SELECT id, employee_id, leave_type_id, start_date, end_date, is_half_day, total_days, \
         reason, status, approver_id, approved_at, rejection_reason, created_at \
         FROM leave_requests {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching leave requests");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    if let Some(employee_id) = employee_filter {
        count_query = count_query.bind(employee_id);
        data_query = data_query.bind(employee_id);
    }
    if let Some(status) = query.status {
        count_query = count_query.bind(status.as_ref().to_string());
        data_query = data_query.bind(status.as_ref().to_string());
    }

    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(crate::error::AppError::from)?;
    let data = data_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(crate::error::AppError::from)?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
