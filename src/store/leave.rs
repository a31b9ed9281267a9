//! Leave requests and the balance ledger.
//!
//! Lock order is request row (when one exists), then employee row, then the
//! balance rows touched. The employee lock serializes every write for one
//! person. Ledger arithmetic lives in `workflow::ledger`; checks run before
//! the first write, and an early return drops the transaction, which rolls
//! it back.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info};

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::store::employee::lock_employee;
use crate::utils::leave_type_cache;
use crate::workflow::leave::{self, LeaveAction};

const REQUEST_COLUMNS: &str = "id, employee_id, leave_type_id, start_date, end_date, is_half_day, \
     total_days, reason, status, approver_id, approved_at, rejection_reason, created_at";

const BALANCE_COLUMNS: &str =
    "id, employee_id, leave_type_id, year, initial_balance, carry_over, adjustment, used, pending";

/// The editable part of a leave request.
#[derive(Debug, Clone)]
pub struct LeaveDraft {
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub reason: Option<String>,
}

impl LeaveDraft {
    /// Validates the dates against the leave type and returns `total_days`.
    fn total_days(&self, leave_type: &LeaveType) -> Result<f64, AppError> {
        if self.is_half_day && !leave_type.allow_half_day {
            return Err(AppError::validation(format!(
                "{} cannot be taken as a half day",
                leave_type.name
            )));
        }
        leave::total_days(self.start_date, self.end_date, self.is_half_day)
    }

    fn year(&self) -> i32 {
        self.start_date.year()
    }
}

pub async fn leave_type(pool: &MySqlPool, id: u64) -> Result<LeaveType, AppError> {
    leave_type_cache::get(pool, id)
        .await?
        .ok_or(AppError::NotFound("Leave type"))
}

pub async fn fetch_request(pool: &MySqlPool, id: u64) -> Result<LeaveRequest, AppError> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Leave request"))
}

async fn lock_request(conn: &mut MySqlConnection, id: u64) -> Result<LeaveRequest, AppError> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Leave request"))
}

/// First request on the employee's calendar sharing a day with
/// `start..=end`, ignoring `exclude_id`.
async fn find_overlap(
    conn: &mut MySqlConnection,
    employee_id: u64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<u64>,
) -> Result<Option<u64>, AppError> {
    let blocking: Vec<LeaveStatus> = LeaveStatus::ALL
        .into_iter()
        .filter(|s| s.blocks_overlap())
        .collect();
    let placeholders = vec!["?"; blocking.len()].join(", ");

    // Candidates end on or after `start`; the inclusive-range rule picks the hit.
    let sql = format!(
        r#"
        SELECT id, start_date, end_date FROM leave_requests
        WHERE employee_id = ?
          AND status IN ({placeholders})
          AND end_date >= ?
          AND id <> ?
        ORDER BY start_date
        "#
    );

    let mut q = sqlx::query_as::<_, (u64, NaiveDate, NaiveDate)>(&sql).bind(employee_id);
    for status in &blocking {
        q = q.bind(status.as_ref());
    }

    let candidates = q
        .bind(start)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(&mut *conn)
        .await?;

    Ok(candidates
        .into_iter()
        .find(|(_, s, e)| leave::overlaps(start, end, *s, *e))
        .map(|(id, _, _)| id))
}

/// Get-or-create for the (employee, type, year) balance row, locked for the
/// rest of the transaction. New rows start from the type's default quota.
pub async fn lock_balance(
    conn: &mut MySqlConnection,
    employee_id: u64,
    leave_type: &LeaveType,
    year: i32,
) -> Result<LeaveBalance, AppError> {
    sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, leave_type_id, year, initial_balance)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE id = id
        "#,
    )
    .bind(employee_id)
    .bind(leave_type.id)
    .bind(year)
    .bind(leave_type.default_quota)
    .execute(&mut *conn)
    .await?;

    let balance = sqlx::query_as::<_, LeaveBalance>(&format!(
        "SELECT {BALANCE_COLUMNS} FROM leave_balances \
         WHERE employee_id = ? AND leave_type_id = ? AND year = ? FOR UPDATE"
    ))
    .bind(employee_id)
    .bind(leave_type.id)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(balance)
}

async fn save_balance(conn: &mut MySqlConnection, balance: &LeaveBalance) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE leave_balances
        SET carry_over = ?, adjustment = ?, used = ?, pending = ?
        WHERE id = ?
        "#,
    )
    .bind(balance.carry_over)
    .bind(balance.adjustment)
    .bind(balance.used)
    .bind(balance.pending)
    .bind(balance.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn ensure_no_overlap(
    conn: &mut MySqlConnection,
    employee_id: u64,
    draft: &LeaveDraft,
    exclude_id: Option<u64>,
) -> Result<(), AppError> {
    if let Some(existing) =
        find_overlap(conn, employee_id, draft.start_date, draft.end_date, exclude_id).await?
    {
        debug!(employee_id, existing, "Leave dates overlap");
        return Err(AppError::Overlap(existing));
    }
    Ok(())
}

/// Stores a new request as a draft, or as pending with its days reserved.
pub async fn create_request(
    pool: &MySqlPool,
    employee_id: u64,
    draft: LeaveDraft,
    submit: bool,
) -> Result<LeaveRequest, AppError> {
    let leave_type = leave_type(pool, draft.leave_type_id).await?;
    let total_days = draft.total_days(&leave_type)?;

    let mut tx = pool.begin().await?;
    lock_employee(&mut tx, employee_id).await?;
    ensure_no_overlap(&mut tx, employee_id, &draft, None).await?;

    let status = if submit {
        let mut balance = lock_balance(&mut tx, employee_id, &leave_type, draft.year()).await?;
        balance.add_pending(total_days, leave_type.requires_balance)?;
        save_balance(&mut tx, &balance).await?;
        LeaveStatus::Pending
    } else {
        LeaveStatus::Draft
    };

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type_id, start_date, end_date, is_half_day, total_days, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(draft.leave_type_id)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.is_half_day)
    .bind(total_days)
    .bind(&draft.reason)
    .bind(status.as_ref())
    .execute(&mut *tx)
    .await?;

    let request = lock_request(&mut tx, result.last_insert_id()).await?;
    tx.commit().await?;

    info!(
        leave_id = request.id,
        employee_id,
        total_days,
        status = %status,
        "Leave request created"
    );
    Ok(request)
}

/// Rewrites dates/type of a draft or pending request. A pending request's
/// reservation is swapped for the new amount in the same transaction.
pub async fn edit_request(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
    draft: LeaveDraft,
) -> Result<LeaveRequest, AppError> {
    let new_type = leave_type(pool, draft.leave_type_id).await?;
    let new_days = draft.total_days(&new_type)?;

    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    if actor.employee_id != Some(current.employee_id) {
        return Err(AppError::Forbidden("Only the requester can edit"));
    }
    let status = current.status()?;
    leave::ensure_editable(status)?;

    lock_employee(&mut tx, current.employee_id).await?;
    ensure_no_overlap(&mut tx, current.employee_id, &draft, Some(id)).await?;

    if status == LeaveStatus::Pending {
        let old_type = leave_type(pool, current.leave_type_id).await?;
        let old_year = current.start_date.year();
        let same_row = old_type.id == new_type.id && old_year == draft.year();

        if same_row {
            let mut balance = lock_balance(&mut tx, current.employee_id, &new_type, old_year).await?;
            balance.replace_pending(current.total_days, new_days, new_type.requires_balance)?;
            save_balance(&mut tx, &balance).await?;
        } else {
            // Lock in (type, year) order so concurrent edits cannot deadlock
            let old_key = (old_type.id, old_year);
            let new_key = (new_type.id, draft.year());
            let (mut old_balance, mut new_balance) = if old_key < new_key {
                let old = lock_balance(&mut tx, current.employee_id, &old_type, old_year).await?;
                let new = lock_balance(&mut tx, current.employee_id, &new_type, draft.year()).await?;
                (old, new)
            } else {
                let new = lock_balance(&mut tx, current.employee_id, &new_type, draft.year()).await?;
                let old = lock_balance(&mut tx, current.employee_id, &old_type, old_year).await?;
                (old, new)
            };
            new_balance.add_pending(new_days, new_type.requires_balance)?;
            old_balance.remove_pending(current.total_days);
            save_balance(&mut tx, &old_balance).await?;
            save_balance(&mut tx, &new_balance).await?;
        }
    }

    sqlx::query(
        r#"
        UPDATE leave_requests
        SET leave_type_id = ?, start_date = ?, end_date = ?, is_half_day = ?,
            total_days = ?, reason = ?
        WHERE id = ?
        "#,
    )
    .bind(draft.leave_type_id)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.is_half_day)
    .bind(new_days)
    .bind(&draft.reason)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock_request(&mut tx, id).await?;
    tx.commit().await?;

    info!(leave_id = id, total_days = new_days, "Leave request edited");
    Ok(updated)
}

/// Applies a workflow action and its ledger effect atomically. Returns the
/// updated request and the status it moved from.
pub async fn transition_request(
    pool: &MySqlPool,
    id: u64,
    action: LeaveAction,
    actor: &AuthUser,
    reason: Option<String>,
) -> Result<(LeaveRequest, LeaveStatus), AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    leave::authorize(action, actor, current.employee_id)?;

    let from = current.status()?;
    let step = leave::transition(from, action)?;

    lock_employee(&mut tx, current.employee_id).await?;
    let leave_type = leave_type(pool, current.leave_type_id).await?;
    let mut balance = lock_balance(
        &mut tx,
        current.employee_id,
        &leave_type,
        current.start_date.year(),
    )
    .await?;
    balance.apply(step.effect, current.total_days, leave_type.requires_balance)?;
    save_balance(&mut tx, &balance).await?;

    let decided = matches!(action, LeaveAction::Approve | LeaveAction::Reject);
    let approver_id = decided.then_some(actor.user_id);
    let approved_at: Option<DateTime<Utc>> = (action == LeaveAction::Approve).then(Utc::now);
    let rejection_reason = if action == LeaveAction::Reject { reason } else { None };

    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?,
            approver_id = COALESCE(?, approver_id),
            approved_at = COALESCE(?, approved_at),
            rejection_reason = COALESCE(?, rejection_reason)
        WHERE id = ?
        "#,
    )
    .bind(step.to.as_ref())
    .bind(approver_id)
    .bind(approved_at)
    .bind(rejection_reason)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock_request(&mut tx, id).await?;
    tx.commit().await?;

    info!(
        leave_id = id,
        actor = actor.user_id,
        from = %from,
        to = %step.to,
        available = balance.available(),
        "Leave request transitioned"
    );
    Ok((updated, from))
}

/// Every leave type's balance for the employee and year, creating missing
/// rows on the way.
pub async fn balances_for(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
) -> Result<Vec<LeaveBalance>, AppError> {
    let types = list_leave_types(pool).await?;

    let mut tx = pool.begin().await?;
    let mut balances = Vec::with_capacity(types.len());
    for leave_type in &types {
        balances.push(lock_balance(&mut tx, employee_id, leave_type, year).await?);
    }
    tx.commit().await?;

    Ok(balances)
}

/// HR edit of carry-over and adjustment on one balance row.
pub async fn adjust_balance(
    pool: &MySqlPool,
    balance_id: u64,
    carry_over: Option<f64>,
    adjustment: Option<f64>,
) -> Result<LeaveBalance, AppError> {
    let mut tx = pool.begin().await?;
    let mut balance = sqlx::query_as::<_, LeaveBalance>(&format!(
        "SELECT {BALANCE_COLUMNS} FROM leave_balances WHERE id = ? FOR UPDATE"
    ))
    .bind(balance_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Leave balance"))?;

    balance.set_allowances(carry_over, adjustment)?;
    save_balance(&mut tx, &balance).await?;
    tx.commit().await?;

    info!(
        balance_id,
        carry_over = balance.carry_over,
        adjustment = balance.adjustment,
        "Leave balance adjusted"
    );
    Ok(balance)
}

pub async fn list_leave_types(pool: &MySqlPool) -> Result<Vec<LeaveType>, AppError> {
    Ok(sqlx::query_as::<_, LeaveType>(
        "SELECT id, name, code, default_quota, requires_balance, allow_half_day FROM leave_types ORDER BY id",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn create_leave_type(
    pool: &MySqlPool,
    name: &str,
    code: &str,
    default_quota: f64,
    requires_balance: bool,
    allow_half_day: bool,
) -> Result<LeaveType, AppError> {
    if name.trim().is_empty() || code.trim().is_empty() {
        return Err(AppError::validation("Name and code are required"));
    }
    if default_quota < 0.0 {
        return Err(AppError::validation("default_quota cannot be negative"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_types (name, code, default_quota, requires_balance, allow_half_day)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(name.trim())
    .bind(code.trim())
    .bind(default_quota)
    .bind(requires_balance)
    .bind(allow_half_day)
    .execute(pool)
    .await
    .map_err(|e| crate::error::on_duplicate(e, "A leave type with that code already exists"))?;

    let leave_type = LeaveType {
        id: result.last_insert_id(),
        name: name.trim().to_string(),
        code: code.trim().to_string(),
        default_quota,
        requires_balance,
        allow_half_day,
    };
    leave_type_cache::put(leave_type.clone()).await;

    info!(leave_type_id = leave_type.id, code = %leave_type.code, "Leave type created");
    Ok(leave_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::store::fixtures;

    fn draft(start: (u32, u32), end: (u32, u32)) -> LeaveDraft {
        LeaveDraft {
            leave_type_id: 1,
            start_date: NaiveDate::from_ymd_opt(2026, start.0, start.1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, end.0, end.1).unwrap(),
            is_half_day: false,
            reason: None,
        }
    }

    async fn balance(pool: &MySqlPool, employee_id: u64) -> LeaveBalance {
        sqlx::query_as::<_, LeaveBalance>(&format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances WHERE employee_id = ? AND leave_type_id = 1 AND year = 2026"
        ))
        .bind(employee_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn concurrent_approvals_never_lose_a_ledger_update(pool: MySqlPool) {
        fixtures::annual_leave(&pool).await;
        let dept = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, dept, "EMP-1").await;

        let mut ids = Vec::new();
        for day in [2, 4, 6] {
            let request = create_request(&pool, emp, draft((3, day), (3, day)), true).await.unwrap();
            ids.push(request.id);
        }
        let before = balance(&pool, emp).await;
        assert_eq!((before.pending, before.available()), (3.0, 0.0));

        let hr = fixtures::user(90, Role::Hr, None);
        let (a, b, c) = tokio::join!(
            transition_request(&pool, ids[0], LeaveAction::Approve, &hr, None),
            transition_request(&pool, ids[1], LeaveAction::Approve, &hr, None),
            transition_request(&pool, ids[2], LeaveAction::Approve, &hr, None),
        );
        for outcome in [a, b, c] {
            let (request, from) = outcome.unwrap();
            assert_eq!(from, LeaveStatus::Pending);
            assert_eq!(request.status().unwrap(), LeaveStatus::Approved);
        }

        let after = balance(&pool, emp).await;
        assert_eq!((after.used, after.pending, after.available()), (3.0, 0.0, 0.0));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn concurrent_submissions_reserve_at_most_the_quota(pool: MySqlPool) {
        fixtures::annual_leave(&pool).await;
        let dept = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, dept, "EMP-1").await;

        let (a, b) = tokio::join!(
            create_request(&pool, emp, draft((4, 1), (4, 2)), true),
            create_request(&pool, emp, draft((5, 4), (5, 5)), true),
        );
        let refused = [&a, &b]
            .into_iter()
            .filter(|r| matches!(r, Err(AppError::InsufficientBalance { .. })))
            .count();
        assert_eq!(refused, 1);
        assert_eq!([&a, &b].into_iter().filter(|r| r.is_ok()).count(), 1);

        let after = balance(&pool, emp).await;
        assert_eq!((after.pending, after.available()), (2.0, 1.0));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn approval_moves_exactly_the_requested_days(pool: MySqlPool) {
        fixtures::annual_leave(&pool).await;
        let dept = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, dept, "EMP-1").await;
        let owner = fixtures::user(10, Role::Employee, Some(emp));
        let hr = fixtures::user(90, Role::Hr, None);

        let request = create_request(&pool, emp, draft((6, 1), (6, 2)), false).await.unwrap();
        let available_before = balance(&pool, emp).await.available();
        transition_request(&pool, request.id, LeaveAction::Submit, &owner, None).await.unwrap();
        transition_request(&pool, request.id, LeaveAction::Approve, &hr, None).await.unwrap();

        assert_eq!(balance(&pool, emp).await.available(), available_before - 2.0);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn overlap_check_sees_requests_that_start_earlier(pool: MySqlPool) {
        fixtures::annual_leave(&pool).await;
        let dept = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, dept, "EMP-1").await;
        let owner = fixtures::user(10, Role::Employee, Some(emp));

        let long = create_request(&pool, emp, draft((3, 2), (3, 10)), false).await.unwrap();

        // Starts inside the earlier range; only the end_date pre-filter finds it.
        let err = create_request(&pool, emp, draft((3, 5), (3, 6)), false).await.unwrap_err();
        assert!(matches!(err, AppError::Overlap(id) if id == long.id));
        let err = create_request(&pool, emp, draft((3, 10), (3, 10)), false).await.unwrap_err();
        assert!(matches!(err, AppError::Overlap(_)));

        assert!(create_request(&pool, emp, draft((3, 11), (3, 11)), false).await.is_ok());

        // Cancelled requests free their dates.
        transition_request(&pool, long.id, LeaveAction::Cancel, &owner, None).await.unwrap();
        assert!(create_request(&pool, emp, draft((3, 5), (3, 6)), false).await.is_ok());
    }
}
