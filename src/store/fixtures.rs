//! Rows shared by the database-backed store tests.
//!
//! These tests run through `#[sqlx::test]`, which creates a scratch MySQL
//! database per test from `DATABASE_URL` and applies `migrations/`. They are
//! ignored by default; run them with `cargo test -- --ignored`.

use sqlx::MySqlPool;

use crate::auth::auth::AuthUser;
use crate::model::leave_type::LeaveType;
use crate::model::role::Role;

pub async fn department(pool: &MySqlPool, code: &str) -> u64 {
    sqlx::query("INSERT INTO departments (name, code) VALUES (?, ?)")
        .bind(format!("{code} department"))
        .bind(code)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_id()
}

pub async fn employee(pool: &MySqlPool, department_id: u64, code: &str) -> u64 {
    sqlx::query(
        "INSERT INTO employees (employee_code, first_name, last_name, email, department_id, hire_date) \
         VALUES (?, 'Test', ?, ?, ?, '2024-01-01')",
    )
    .bind(code)
    .bind(code)
    .bind(format!("{}@example.com", code.to_lowercase()))
    .bind(department_id)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_id()
}

/// Annual leave with a three-day quota, always id 1.
///
/// Leave types are cached process-wide by id, so every test database gets
/// the identical row.
pub async fn annual_leave(pool: &MySqlPool) -> LeaveType {
    sqlx::query(
        "INSERT INTO leave_types (id, name, code, default_quota, requires_balance, allow_half_day) \
         VALUES (1, 'Annual Leave', 'AL', 3, TRUE, TRUE)",
    )
    .execute(pool)
    .await
    .unwrap();

    LeaveType {
        id: 1,
        name: "Annual Leave".into(),
        code: "AL".into(),
        default_quota: 3.0,
        requires_balance: true,
        allow_half_day: true,
    }
}

pub fn user(user_id: u64, role: Role, employee_id: Option<u64>) -> AuthUser {
    AuthUser {
        user_id,
        username: format!("user{user_id}"),
        role,
        employee_id,
    }
}
