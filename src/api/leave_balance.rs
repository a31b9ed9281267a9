use crate::auth::auth::AuthUser;
use crate::model::leave_balance::LeaveBalance;
use crate::store::leave as store;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    /// Defaults to the caller's own employee record
    #[schema(example = 12)]
    pub employee_id: Option<u64>,
    /// Defaults to the current year
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

/// A balance row with its derived availability.
#[derive(Serialize, ToSchema)]
pub struct BalanceView {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    #[schema(example = 9.0)]
    pub available: f64,
}

impl From<LeaveBalance> for BalanceView {
    fn from(balance: LeaveBalance) -> Self {
        BalanceView {
            available: balance.available(),
            balance,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustBalance {
    #[schema(example = 2.0)]
    pub carry_over: Option<f64>,
    #[schema(example = json!(-1.0))]
    pub adjustment: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "Annual Leave")]
    pub name: String,
    #[schema(example = "AL")]
    pub code: String,
    #[schema(example = 12.0)]
    pub default_quota: f64,
    #[serde(default = "yes")]
    pub requires_balance: bool,
    #[serde(default = "yes")]
    pub allow_half_day: bool,
}

fn yes() -> bool {
    true
}

#[utoipa::path(
    get,
    path = "/api/leave-balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balances per leave type", body = [BalanceView]),
        (status = 403, description = "Not your record")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.require_employee()?,
    };
    auth.require_self_or_hr(employee_id)?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let balances: Vec<BalanceView> = store::balances_for(pool.get_ref(), employee_id, year)
        .await?
        .into_iter()
        .map(BalanceView::from)
        .collect();

    Ok(HttpResponse::Ok().json(balances))
}

#[utoipa::path(
    put,
    path = "/api/leave-balances/{id}",
    params(("id" = u64, Path, description = "Leave balance ID")),
    request_body = AdjustBalance,
    responses(
        (status = 200, description = "Balance adjusted", body = Object, example = json!({
            "message": "Leave balance updated"
        })),
        (status = 400, description = "Change would leave a negative balance"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave balance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn adjust_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdjustBalance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let balance = store::adjust_balance(
        pool.get_ref(),
        path.into_inner(),
        payload.carry_over,
        payload.adjustment,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave balance updated",
        "data": BalanceView::from(balance)
    })))
}

#[utoipa::path(
    get,
    path = "/api/leave-types",
    responses((status = 200, description = "All leave types", body = [crate::model::leave_type::LeaveType])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leave_types(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let types = store::list_leave_types(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body = CreateLeaveType,
    responses(
        (status = 200, description = "Leave type created", body = crate::model::leave_type::LeaveType),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeaveType>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_type = store::create_leave_type(
        pool.get_ref(),
        &payload.name,
        &payload.code,
        payload.default_quota,
        payload.requires_balance,
        payload.allow_half_day,
    )
    .await?;

    Ok(HttpResponse::Ok().json(leave_type))
}
