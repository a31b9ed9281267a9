use crate::auth::auth::AuthUser;
use crate::store::schedule::{self as store, NewShift};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ShiftPayload {
    #[schema(example = "Morning")]
    pub name: String,
    #[schema(example = "08:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    #[serde(default)]
    #[schema(example = 10)]
    pub late_tolerance_minutes: i32,
    #[serde(default)]
    #[schema(example = 0)]
    pub early_leave_tolerance_minutes: i32,
}

impl ShiftPayload {
    fn as_new(&self) -> NewShift<'_> {
        NewShift {
            name: self.name.trim(),
            clock_in: self.clock_in,
            clock_out: self.clock_out,
            late_tolerance_minutes: self.late_tolerance_minutes,
            early_leave_tolerance_minutes: self.early_leave_tolerance_minutes,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AssignShift {
    #[schema(example = 1)]
    pub shift_id: u64,
}

#[utoipa::path(
    get,
    path = "/api/shifts",
    responses((status = 200, description = "All shifts", body = [crate::model::attendance::Shift])),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn list_shifts(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let shifts = store::list_shifts(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(shifts))
}

#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = ShiftPayload,
    responses(
        (status = 200, description = "Shift created", body = crate::model::attendance::Shift),
        (status = 400, description = "Clock-out not after clock-in, or negative tolerance"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ShiftPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let shift = store::create_shift(pool.get_ref(), payload.as_new()).await?;
    Ok(HttpResponse::Ok().json(shift))
}

#[utoipa::path(
    put,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift ID")),
    request_body = ShiftPayload,
    responses(
        (status = 200, description = "Shift updated", body = crate::model::attendance::Shift),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ShiftPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let shift = store::update_shift(pool.get_ref(), path.into_inner(), payload.as_new()).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// Weekly schedule of one employee, Monday first
#[utoipa::path(
    get,
    path = "/api/employees/{id}/schedule",
    params(("id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Assigned weekdays", body = [crate::model::attendance::ScheduleDay]),
        (status = 403, description = "Not your record")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn get_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let days = store::week_schedule(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(days))
}

#[utoipa::path(
    put,
    path = "/api/employees/{id}/schedule/{day}",
    params(
        ("id" = u64, Path, description = "Employee ID"),
        ("day" = u8, Path, description = "ISO weekday, 1 = Monday")
    ),
    request_body = AssignShift,
    responses(
        (status = 200, description = "Day assigned", body = Object, example = json!({
            "message": "Schedule updated"
        })),
        (status = 400, description = "Weekday out of range"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn assign_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u8)>,
    payload: web::Json<AssignShift>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee_id, day) = path.into_inner();

    store::assign_day(pool.get_ref(), employee_id, day, payload.shift_id).await?;
    let days = store::week_schedule(pool.get_ref(), employee_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Schedule updated",
        "data": days
    })))
}

#[utoipa::path(
    delete,
    path = "/api/employees/{id}/schedule/{day}",
    params(
        ("id" = u64, Path, description = "Employee ID"),
        ("day" = u8, Path, description = "ISO weekday, 1 = Monday")
    ),
    responses(
        (status = 200, description = "Day cleared"),
        (status = 404, description = "Day was not scheduled")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn clear_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u8)>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee_id, day) = path.into_inner();

    store::clear_day(pool.get_ref(), employee_id, day).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Schedule day cleared"
    })))
}
