//! Early-leave requests and their letter numbering.

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, on_duplicate};
use crate::model::early_leave::{EarlyLeaveRequest, EarlyLeaveStatus};
use crate::store::employee;
use crate::workflow::early_leave::{self, EarlyLeaveAction};

const COLUMNS: &str = "id, employee_id, date, leave_time, reason, status, hr_reviewer_id, \
     hr_reviewed_at, director_id, director_signed_at, response_letter_number, \
     rejection_reason, created_at";

pub async fn fetch(pool: &MySqlPool, id: u64) -> Result<EarlyLeaveRequest, AppError> {
    sqlx::query_as::<_, EarlyLeaveRequest>(&format!(
        "SELECT {COLUMNS} FROM early_leave_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Early leave request"))
}

async fn lock(conn: &mut MySqlConnection, id: u64) -> Result<EarlyLeaveRequest, AppError> {
    sqlx::query_as::<_, EarlyLeaveRequest>(&format!(
        "SELECT {COLUMNS} FROM early_leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Early leave request"))
}

pub async fn list(
    pool: &MySqlPool,
    employee_id: Option<u64>,
    director_id: Option<u64>,
    status: Option<EarlyLeaveStatus>,
) -> Result<Vec<EarlyLeaveRequest>, AppError> {
    let mut conditions = Vec::new();
    if employee_id.is_some() {
        conditions.push("employee_id = ?");
    }
    if director_id.is_some() {
        conditions.push("director_id = ?");
    }
    if status.is_some() {
        conditions.push("status = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {COLUMNS} FROM early_leave_requests {where_clause} ORDER BY date DESC, id DESC"
    );
    let mut q = sqlx::query_as::<_, EarlyLeaveRequest>(&sql);
    if let Some(id) = employee_id {
        q = q.bind(id);
    }
    if let Some(id) = director_id {
        q = q.bind(id);
    }
    if let Some(s) = status {
        q = q.bind(s.as_ref().to_string());
    }

    Ok(q.fetch_all(pool).await?)
}

pub async fn create(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    leave_time: NaiveTime,
    reason: &str,
) -> Result<EarlyLeaveRequest, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO early_leave_requests (employee_id, date, leave_time, reason, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(leave_time)
    .bind(reason)
    .bind(EarlyLeaveStatus::PendingHr.as_ref())
    .execute(pool)
    .await
    .map_err(|e| on_duplicate(e, "An early leave request already exists for that date"))?;

    info!(employee_id, %date, "Early leave request submitted");
    fetch(pool, result.last_insert_id()).await
}

/// Makes sure the counter row of a unit and year exists.
///
/// Runs outside the approval transaction. The count of letters already
/// issued is a plain consistent read, so seeding takes no locks on
/// `early_leave_requests`.
async fn seed_letter_sequence(pool: &MySqlPool, unit_code: &str, year: i32) -> Result<(), AppError> {
    let issued: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM early_leave_requests WHERE response_letter_number LIKE ?",
    )
    .bind(early_leave::letter_pattern(unit_code, year))
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT IGNORE INTO letter_sequences (unit_code, year, last_number) VALUES (?, ?, ?)")
        .bind(unit_code)
        .bind(year)
        .bind(issued)
        .execute(pool)
        .await?;
    Ok(())
}

/// Locks the counter row and returns the last number issued.
async fn lock_letter_sequence(
    conn: &mut MySqlConnection,
    unit_code: &str,
    year: i32,
) -> Result<u32, AppError> {
    sqlx::query_scalar::<_, u32>(
        "SELECT last_number FROM letter_sequences WHERE unit_code = ? AND year = ? FOR UPDATE",
    )
    .bind(unit_code)
    .bind(year)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Letter sequence"))
}

async fn store_letter_sequence(
    conn: &mut MySqlConnection,
    unit_code: &str,
    year: i32,
    number: u32,
) -> Result<(), AppError> {
    sqlx::query("UPDATE letter_sequences SET last_number = ? WHERE unit_code = ? AND year = ?")
        .bind(number)
        .bind(unit_code)
        .bind(year)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// HR sign-off: assigns the signing director and issues the letter number.
///
/// Lock order is counter row, then request row. Approvals in one unit
/// serialize on the counter, so numbers are unique and gapless per unit
/// and year.
pub async fn hr_approve(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
    director_id: u64,
) -> Result<EarlyLeaveRequest, AppError> {
    actor.require_hr_or_admin()?;

    let pending = fetch(pool, id).await?;
    let unit = {
        let mut conn = pool.acquire().await?;
        employee::unit_code(&mut conn, pending.employee_id).await?
    };
    let now = Utc::now();
    let year = now.year();
    seed_letter_sequence(pool, &unit, year).await?;

    let mut tx = pool.begin().await?;
    let last = lock_letter_sequence(&mut tx, &unit, year).await?;
    let current = lock(&mut tx, id).await?;
    if actor.employee_id == Some(current.employee_id) {
        return Err(AppError::Forbidden("You cannot decide your own request"));
    }
    let to = early_leave::transition(current.status()?, EarlyLeaveAction::HrApprove)?;
    if employee::unit_code(&mut tx, current.employee_id).await? != unit {
        return Err(AppError::Conflict(
            "The employee changed department during approval, please retry".to_string(),
        ));
    }
    ensure_director(&mut tx, &current, director_id).await?;

    let sequence = last + 1;
    store_letter_sequence(&mut tx, &unit, year, sequence).await?;
    let letter = early_leave::letter_number(sequence, &unit, year);

    sqlx::query(
        r#"
        UPDATE early_leave_requests
        SET status = ?, hr_reviewer_id = ?, hr_reviewed_at = ?,
            director_id = ?, response_letter_number = ?
        WHERE id = ?
        "#,
    )
    .bind(to.as_ref())
    .bind(actor.user_id)
    .bind(now)
    .bind(director_id)
    .bind(&letter)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;

    info!(early_leave_id = id, director_id, letter = %letter, "Early leave approved by HR");
    Ok(updated)
}

/// Hands a letter awaiting signature to another director. The letter
/// number is kept.
pub async fn reassign_director(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
    director_id: u64,
) -> Result<EarlyLeaveRequest, AppError> {
    actor.require_hr_or_admin()?;

    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;
    let to = early_leave::transition(current.status()?, EarlyLeaveAction::ReassignDirector)?;
    ensure_director(&mut tx, &current, director_id).await?;

    sqlx::query("UPDATE early_leave_requests SET status = ?, director_id = ? WHERE id = ?")
        .bind(to.as_ref())
        .bind(director_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;

    info!(early_leave_id = id, from = ?current.director_id, director_id, "Early leave signer reassigned");
    Ok(updated)
}

/// The signer must be an active employee other than the requester.
async fn ensure_director(
    conn: &mut MySqlConnection,
    request: &EarlyLeaveRequest,
    director_id: u64,
) -> Result<(), AppError> {
    if director_id == request.employee_id {
        return Err(AppError::validation("The requester cannot sign their own letter"));
    }
    employee::ensure_active(conn, director_id, "Director").await
}

/// Director signature on a request HR already approved.
pub async fn sign(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
) -> Result<EarlyLeaveRequest, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;
    ensure_assigned_director(&current, actor)?;
    let to = early_leave::transition(current.status()?, EarlyLeaveAction::DirectorSign)?;

    sqlx::query(
        "UPDATE early_leave_requests SET status = ?, director_signed_at = ? WHERE id = ?",
    )
    .bind(to.as_ref())
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;

    info!(early_leave_id = id, "Early leave signed");
    Ok(updated)
}

/// Rejection at either gate. HR rejects while the request awaits HR, the
/// assigned director while it awaits the signature.
pub async fn reject(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
    action: EarlyLeaveAction,
    reason: Option<String>,
) -> Result<EarlyLeaveRequest, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;

    match action {
        EarlyLeaveAction::HrReject => actor.require_hr_or_admin()?,
        EarlyLeaveAction::DirectorReject => ensure_assigned_director(&current, actor)?,
        _ => return Err(AppError::validation("Not a rejection")),
    }
    let to = early_leave::transition(current.status()?, action)?;

    let hr_reviewer = (action == EarlyLeaveAction::HrReject).then_some(actor.user_id);
    let hr_reviewed_at = hr_reviewer.map(|_| Utc::now());

    sqlx::query(
        r#"
        UPDATE early_leave_requests
        SET status = ?, rejection_reason = ?,
            hr_reviewer_id = COALESCE(?, hr_reviewer_id),
            hr_reviewed_at = COALESCE(?, hr_reviewed_at)
        WHERE id = ?
        "#,
    )
    .bind(to.as_ref())
    .bind(reason)
    .bind(hr_reviewer)
    .bind(hr_reviewed_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;

    info!(early_leave_id = id, action = action.verb(), "Early leave rejected");
    Ok(updated)
}

fn ensure_assigned_director(request: &EarlyLeaveRequest, actor: &AuthUser) -> Result<(), AppError> {
    match (request.director_id, actor.employee_id) {
        (Some(assigned), Some(me)) if assigned == me => Ok(()),
        _ => Err(AppError::Forbidden("Only the assigned director can act")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::store::fixtures;

    fn request(director_id: Option<u64>) -> EarlyLeaveRequest {
        EarlyLeaveRequest {
            id: 1,
            employee_id: 5,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            leave_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            reason: "Clinic appointment".into(),
            status: "pending_director_sign".into(),
            hr_reviewer_id: Some(2),
            hr_reviewed_at: None,
            director_id,
            director_signed_at: None,
            response_letter_number: Some("001/PLC/HRD/2026".into()),
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    fn director(employee_id: u64) -> AuthUser {
        AuthUser {
            user_id: 70,
            username: "director".into(),
            role: Role::Director,
            employee_id: Some(employee_id),
        }
    }

    #[test]
    fn only_the_assigned_director_may_sign() {
        assert!(ensure_assigned_director(&request(Some(9)), &director(9)).is_ok());
        assert!(ensure_assigned_director(&request(Some(9)), &director(8)).is_err());
        assert!(ensure_assigned_director(&request(None), &director(9)).is_err());
    }

    async fn submitted(pool: &MySqlPool, employee_id: u64, day: u32) -> u64 {
        create(
            pool,
            employee_id,
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            "Family matter",
        )
        .await
        .unwrap()
        .id
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn nth_approval_in_a_unit_gets_letter_n(pool: MySqlPool) {
        let hrd = fixtures::department(&pool, "HRD").await;
        let fin = fixtures::department(&pool, "FIN").await;
        let emp = fixtures::employee(&pool, hrd, "EMP-1").await;
        let other = fixtures::employee(&pool, fin, "EMP-2").await;
        let signer = fixtures::employee(&pool, hrd, "DIR-1").await;
        let hr = fixtures::user(90, Role::Hr, None);
        let year = Utc::now().year();

        for (n, day) in [(1, 2), (2, 3), (3, 4)] {
            let id = submitted(&pool, emp, day).await;
            let approved = hr_approve(&pool, id, &hr, signer).await.unwrap();
            assert_eq!(
                approved.response_letter_number,
                Some(early_leave::letter_number(n, "HRD", year))
            );
        }

        // A unit's series starts from the letters it already holds.
        let legacy = submitted(&pool, other, 2).await;
        sqlx::query("UPDATE early_leave_requests SET response_letter_number = ? WHERE id = ?")
            .bind(early_leave::letter_number(1, "FIN", year))
            .bind(legacy)
            .execute(&pool)
            .await
            .unwrap();
        let id = submitted(&pool, other, 3).await;
        let approved = hr_approve(&pool, id, &hr, signer).await.unwrap();
        assert_eq!(
            approved.response_letter_number,
            Some(early_leave::letter_number(2, "FIN", year))
        );
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn concurrent_hr_approvals_take_distinct_numbers(pool: MySqlPool) {
        let hrd = fixtures::department(&pool, "HRD").await;
        let first = fixtures::employee(&pool, hrd, "EMP-1").await;
        let second = fixtures::employee(&pool, hrd, "EMP-2").await;
        let signer = fixtures::employee(&pool, hrd, "DIR-1").await;
        let hr = fixtures::user(90, Role::Hr, None);
        let a = submitted(&pool, first, 2).await;
        let b = submitted(&pool, second, 2).await;

        let (ra, rb) = tokio::join!(
            hr_approve(&pool, a, &hr, signer),
            hr_approve(&pool, b, &hr, signer),
        );
        let mut letters = vec![
            ra.unwrap().response_letter_number.unwrap(),
            rb.unwrap().response_letter_number.unwrap(),
        ];
        letters.sort();

        let year = Utc::now().year();
        assert_eq!(
            letters,
            vec![
                early_leave::letter_number(1, "HRD", year),
                early_leave::letter_number(2, "HRD", year)
            ]
        );
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn signer_must_exist_and_can_be_reassigned(pool: MySqlPool) {
        let hrd = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, hrd, "EMP-1").await;
        let first_signer = fixtures::employee(&pool, hrd, "DIR-1").await;
        let second_signer = fixtures::employee(&pool, hrd, "DIR-2").await;
        let hr = fixtures::user(90, Role::Hr, None);
        let id = submitted(&pool, emp, 2).await;

        let err = hr_approve(&pool, id, &hr, 9_999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Director")));
        let err = hr_approve(&pool, id, &hr, emp).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // Refused approvals consume no number.
        let approved = hr_approve(&pool, id, &hr, first_signer).await.unwrap();
        let letter = approved.response_letter_number.clone();
        assert_eq!(letter, Some(early_leave::letter_number(1, "HRD", Utc::now().year())));

        let moved = reassign_director(&pool, id, &hr, second_signer).await.unwrap();
        assert_eq!(moved.director_id, Some(second_signer));
        assert_eq!(moved.response_letter_number, letter);

        assert!(matches!(
            sign(&pool, id, &director(first_signer)).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        let signed = sign(&pool, id, &director(second_signer)).await.unwrap();
        assert_eq!(signed.status().unwrap(), EarlyLeaveStatus::Approved);

        let err = reassign_director(&pool, id, &hr, first_signer).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn hr_rejection_closes_both_gates(pool: MySqlPool) {
        let hrd = fixtures::department(&pool, "HRD").await;
        let emp = fixtures::employee(&pool, hrd, "EMP-1").await;
        let signer = fixtures::employee(&pool, hrd, "DIR-1").await;
        let hr = fixtures::user(90, Role::Hr, None);
        let id = submitted(&pool, emp, 2).await;

        let rejected = reject(&pool, id, &hr, EarlyLeaveAction::HrReject, Some("No cover".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status().unwrap(), EarlyLeaveStatus::Rejected);
        assert_eq!(rejected.hr_reviewer_id, Some(90));
        assert_eq!(rejected.response_letter_number, None);

        assert!(matches!(
            hr_approve(&pool, id, &hr, signer).await.unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
        assert!(matches!(
            reject(&pool, id, &director(signer), EarlyLeaveAction::DirectorReject, None)
                .await
                .unwrap_err(),
            AppError::Forbidden(_)
        ));
    }
}
