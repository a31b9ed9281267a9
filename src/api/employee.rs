use crate::{
    auth::auth::AuthUser,
    error::{AppError, on_duplicate},
    model::{department::Department, employee::Employee},
    store::employee as store,
    utils::db_utils::{build_update_sql, execute_update, page_window},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns HR may change through `PUT /employees/{id}`.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "hire_date",
    "status",
];

const EMPLOYEE_COLUMNS: &str =
    "id, employee_code, first_name, last_name, email, phone, department_id, hire_date, status";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001", value_type = String)]
    pub employee_code: String,
    #[schema(example = "John", value_type = String)]
    pub first_name: String,
    #[schema(example = "Doe", value_type = String)]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = 1, value_type = u64 )]
    pub department_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Any subset of these fields may be sent.
#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<u64>,
    pub status: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub hire_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Human Resources")]
    pub name: String,
    /// Unit code printed on outgoing letters
    #[schema(example = "HRD")]
    pub code: String,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 200, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Code or email already in use")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, hire_date)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.employee_code)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.department_id)
    .bind(payload.hire_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| on_duplicate(e, "Employee code or email already in use"))?;

    let employee = store::find(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, code = %employee.employee_code, name = %employee.full_name(), "Employee created");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee created successfully",
        "data": employee
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let like = query.search.as_ref().map(|s| format!("%{}%", s.trim()));
    // Unset filters collapse to TRUE.
    let where_clause = r#"
        WHERE (? IS NULL OR department_id = ?)
          AND (? IS NULL OR status = ?)
          AND (? IS NULL OR first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)
    "#;

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(filter = ?query, "Counting employees");

    let total = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(query.department_id)
        .bind(query.department_id)
        .bind(&query.status)
        .bind(&query.status)
        .bind(&like)
        .bind(&like)
        .bind(&like)
        .bind(&like)
        .fetch_one(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        EMPLOYEE_COLUMNS, where_clause
    );
    debug!(page, per_page, offset, "Fetching employees");

    let employees = sqlx::query_as::<_, Employee>(&data_sql)
        .bind(query.department_id)
        .bind(query.department_id)
        .bind(&query.status)
        .bind(&query.status)
        .bind(&like)
        .bind(&like)
        .bind(&like)
        .bind(&like)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE_COLUMNS, "id", employee_id)?;

    let mut tx = pool.begin().await.map_err(AppError::from)?;
    execute_update(&mut tx, update)
        .await
        .map_err(|e| on_duplicate(e, "Employee code or email already in use"))?;
    tx.commit().await.map_err(AppError::from)?;

    let employee = store::find(pool.get_ref(), employee_id).await?;
    info!(employee_id, "Employee updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully",
        "data": employee
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee still has leave or attendance records")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            on_duplicate(
                e,
                "Employee still has records; set the status to inactive instead",
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Employee").into());
    }

    info!(employee_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = store::find(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, description = "All departments", body = [Department])),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let departments =
        sqlx::query_as::<_, Department>("SELECT id, name, code FROM departments ORDER BY name")
            .fetch_all(pool.get_ref())
            .await
            .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 200, description = "Department created", body = Department),
        (status = 400, description = "Name or code missing"),
        (status = 409, description = "Code already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    let code = payload.code.trim().to_uppercase();
    if name.is_empty() || code.is_empty() || code.contains('/') {
        return Err(AppError::validation("Name and a code without '/' are required").into());
    }

    let result = sqlx::query("INSERT INTO departments (name, code) VALUES (?, ?)")
        .bind(name)
        .bind(&code)
        .execute(pool.get_ref())
        .await
        .map_err(|e| on_duplicate(e, "Department code already in use"))?;

    info!(department_id = result.last_insert_id(), code = %code, "Department created");
    Ok(HttpResponse::Ok().json(Department {
        id: result.last_insert_id(),
        name: name.to_string(),
        code,
    }))
}
