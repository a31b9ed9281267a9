use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceStatus;
use crate::notify::{NotificationEvent, Notifier};
use crate::store::attendance::{self as store, ManualEntry};
use crate::workflow::summary::MonthlySummary;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate, NaiveTime, Timelike};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ManualAttendance {
    /// Defaults to the caller; HR/Admin may record for anyone
    #[schema(example = 12)]
    pub employee_id: Option<u64>,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// One of `leave`, `sick`, `permit`; omit to enter clock times instead
    #[schema(example = "sick")]
    pub status: Option<AttendanceStatus>,
    #[schema(example = "08:05:00", value_type = Option<String>)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "17:00:00", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "Doctor's note attached")]
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    /// HR/Admin only; other callers see their own days
    pub employee_id: Option<u64>,
    #[schema(example = "2026-03-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-03-31", format = "date", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SummaryQuery {
    pub employee_id: Option<u64>,
    /// Defaults to the current year
    #[schema(example = 2026)]
    pub year: Option<i32>,
    /// 1-12, defaults to the current month
    #[schema(example = 3)]
    pub month: Option<u32>,
}

/// Current local wall-clock time without sub-second noise.
fn now() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    let time = now.time().with_nanosecond(0).unwrap_or(now.time());
    (now.date(), time)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "data": {"status": "late", "late_minutes": 15}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let (date, time) = now();

    let attendance = store::check_in(pool.get_ref(), employee_id, date, time).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully",
        "data": attendance
    })))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "No active check-in found for today", body = Object, example = json!({
            "message": "You have not checked in today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let (date, time) = now();

    let attendance = store::check_out(pool.get_ref(), employee_id, date, time).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "data": attendance
    })))
}

/// Manual entry: sick/leave/permit days or corrected clock times
#[utoipa::path(
    post,
    path = "/api/attendance/manual",
    request_body = ManualAttendance,
    responses(
        (status = 200, description = "Entry recorded", body = Object, example = json!({
            "message": "Attendance recorded, awaiting approval"
        })),
        (status = 400, description = "Invalid status or times"),
        (status = 403, description = "Not your record"),
        (status = 409, description = "Attendance for that date already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn manual_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    payload: web::Json<ManualAttendance>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let employee_id = match payload.employee_id {
        Some(id) => id,
        None => auth.require_employee()?,
    };
    auth.require_self_or_hr(employee_id)?;
    let by_hr = auth.is_hr_desk();

    let entry = ManualEntry {
        date: payload.date,
        status: payload.status,
        clock_in: payload.clock_in,
        clock_out: payload.clock_out,
        notes: payload.notes,
    };
    let attendance = store::record_manual(pool.get_ref(), employee_id, entry, by_hr).await?;

    let message = if by_hr {
        "Attendance recorded"
    } else {
        notifier.notify(
            NotificationEvent::to_hr("attendance_manual_entry", "Manual attendance awaiting approval")
                .about("attendance", attendance.id)
                .body(format!(
                    "Employee #{} recorded {} for {}",
                    employee_id, attendance.status, attendance.date
                )),
        );
        "Attendance recorded, awaiting approval"
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "data": attendance
    })))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{id}/approve",
    params(("id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Entry approved", body = crate::model::attendance::Attendance),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Already approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn approve_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let attendance = store::approve(pool.get_ref(), path.into_inner()).await?;

    notifier.notify(
        NotificationEvent::to_employee(
            attendance.employee_id,
            "attendance_approved",
            "Manual attendance approved",
        )
        .about("attendance", attendance.id),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance approved",
        "data": attendance
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance days, newest first", body = [crate::model::attendance::Attendance])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    let employee_id = if auth.is_hr_desk() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let days = store::list(pool.get_ref(), employee_id, query.from, query.to).await?;
    Ok(HttpResponse::Ok().json(days))
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly statistics", body = MonthlySummary),
        (status = 400, description = "Invalid year/month"),
        (status = 403, description = "Not your record")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.require_employee()?,
    };
    auth.require_self_or_hr(employee_id)?;

    let (today, _) = now();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    let summary = store::monthly_summary(pool.get_ref(), employee_id, year, month, today).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::config::Config;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn employees_cannot_enter_days_for_colleagues_or_approve() {
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
                .route("/api/attendance/manual", web::post().to(manual_entry))
                .route("/api/attendance/{id}/approve", web::put().to(approve_entry)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/attendance/manual")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"employee_id": 5, "date": "2026-03-02", "status": "sick"}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::put()
            .uri("/api/attendance/1/approve")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn check_in_needs_an_employee_profile() {
        let config = Config::for_tests();
        let token =
            generate_access_token(1, "admin".into(), Role::Admin as u8, None, &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .route("/api/attendance", web::post().to(check_in)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/attendance")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
