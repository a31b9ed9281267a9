use sqlx::{MySqlConnection, MySqlPool};

use crate::error::AppError;
use crate::model::employee::Employee;

/// Takes the row lock that serializes every leave write for one employee.
pub async fn lock_employee(conn: &mut MySqlConnection, employee_id: u64) -> Result<(), AppError> {
    sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE id = ? FOR UPDATE")
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;
    Ok(())
}

pub async fn find(pool: &MySqlPool, employee_id: u64) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department_id, hire_date, status
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Employee"))
}

/// Code of the employee's department, used on outgoing letters.
pub async fn unit_code(conn: &mut MySqlConnection, employee_id: u64) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT d.code
        FROM employees e
        JOIN departments d ON d.id = e.department_id
        WHERE e.id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Employee"))
}

/// Fails unless `employee_id` names an active employee.
pub async fn ensure_active(
    conn: &mut MySqlConnection,
    employee_id: u64,
    what: &'static str,
) -> Result<(), AppError> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound(what))?;

    if status != "active" {
        return Err(AppError::validation(format!("{what} #{employee_id} is not active")));
    }
    Ok(())
}
