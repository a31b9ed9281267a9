//! Performance reviews and calibration sessions.

use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, warn};

use crate::auth::auth::AuthUser;
use crate::error::{AppError, on_duplicate};
use crate::model::performance::{
    CalibrationReview, CalibrationSession, CalibrationStatus, PerformanceReview,
    PerformanceReviewItem, ReviewStatus,
};
use crate::workflow::performance::{
    self, GradeTable, ReviewAction, calibration_outcome, ensure_session_open, review_transition,
    weighted_score,
};

const REVIEW_COLUMNS: &str = "id, employee_id, reviewer_id, period, year, status, self_score, \
     manager_score, final_score, final_grade, created_at";

const SESSION_COLUMNS: &str = "id, name, year, facilitator_id, status, created_at, completed_at";

const ENTRY_COLUMNS: &str = "id, session_id, performance_review_id, original_score, original_grade, \
     calibrated_score, calibrated_grade, notes";

pub const MAX_SCORE: f64 = 100.0;

fn check_score(score: f64) -> Result<(), AppError> {
    if !(0.0..=MAX_SCORE).contains(&score) {
        return Err(AppError::validation(format!(
            "Scores must be between 0 and {MAX_SCORE}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub employee_id: u64,
    pub reviewer_id: u64,
    pub period: String,
    pub year: i32,
    /// (title, weight)
    pub items: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct Calibration {
    pub calibrated_score: Option<f64>,
    pub calibrated_grade: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Scorer {
    Employee,
    Manager,
}

// ---------------- reviews ----------------

pub async fn fetch_review(pool: &MySqlPool, id: u64) -> Result<PerformanceReview, AppError> {
    sqlx::query_as::<_, PerformanceReview>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM performance_reviews WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Performance review"))
}

async fn lock_review(conn: &mut MySqlConnection, id: u64) -> Result<PerformanceReview, AppError> {
    sqlx::query_as::<_, PerformanceReview>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM performance_reviews WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Performance review"))
}

pub async fn review_items(
    conn: &mut MySqlConnection,
    review_id: u64,
) -> Result<Vec<PerformanceReviewItem>, AppError> {
    Ok(sqlx::query_as::<_, PerformanceReviewItem>(
        "SELECT id, review_id, title, weight, self_score, manager_score \
         FROM performance_review_items WHERE review_id = ? ORDER BY id",
    )
    .bind(review_id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn list_reviews(
    pool: &MySqlPool,
    employee_id: Option<u64>,
    year: Option<i32>,
) -> Result<Vec<PerformanceReview>, AppError> {
    let mut sql = format!("SELECT {REVIEW_COLUMNS} FROM performance_reviews WHERE 1 = 1");
    if employee_id.is_some() {
        sql.push_str(" AND employee_id = ?");
    }
    if year.is_some() {
        sql.push_str(" AND year = ?");
    }
    sql.push_str(" ORDER BY year DESC, id DESC");

    let mut q = sqlx::query_as::<_, PerformanceReview>(&sql);
    if let Some(id) = employee_id {
        q = q.bind(id);
    }
    if let Some(y) = year {
        q = q.bind(y);
    }
    Ok(q.fetch_all(pool).await?)
}

pub async fn create_review(pool: &MySqlPool, review: NewReview) -> Result<PerformanceReview, AppError> {
    if review.items.is_empty() {
        return Err(AppError::validation("A review needs at least one item"));
    }
    if review.items.iter().any(|(title, weight)| title.trim().is_empty() || *weight <= 0.0) {
        return Err(AppError::validation("Every item needs a title and a positive weight"));
    }
    if review.employee_id == review.reviewer_id {
        return Err(AppError::validation("An employee cannot be their own reviewer"));
    }

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO performance_reviews (employee_id, reviewer_id, period, year, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(review.employee_id)
    .bind(review.reviewer_id)
    .bind(&review.period)
    .bind(review.year)
    .bind(ReviewStatus::Draft.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(|e| on_duplicate(e, "A review for that period already exists"))?;
    let review_id = result.last_insert_id();

    for (title, weight) in &review.items {
        sqlx::query("INSERT INTO performance_review_items (review_id, title, weight) VALUES (?, ?, ?)")
            .bind(review_id)
            .bind(title)
            .bind(weight)
            .execute(&mut *tx)
            .await?;
    }

    let created = lock_review(&mut tx, review_id).await?;
    tx.commit().await?;

    info!(
        review_id,
        employee_id = review.employee_id,
        items = review.items.len(),
        "Performance review created"
    );
    Ok(created)
}

/// Hands the review to the employee for self-assessment.
pub async fn open_review(pool: &MySqlPool, id: u64) -> Result<PerformanceReview, AppError> {
    let mut tx = pool.begin().await?;
    let review = lock_review(&mut tx, id).await?;
    let to = review_transition(review.status()?, ReviewAction::Open)?;

    sqlx::query("UPDATE performance_reviews SET status = ? WHERE id = ?")
        .bind(to.as_ref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = lock_review(&mut tx, id).await?;
    tx.commit().await?;

    info!(review_id = id, "Performance review opened");
    Ok(updated)
}

/// Stores item scores from one side of the review and rolls them up.
///
/// The reviewed employee scores once, which moves the review to the manager;
/// the assigned reviewer (or HR) may rescore until the review is finalized.
pub async fn submit_scores(
    pool: &MySqlPool,
    id: u64,
    actor: &AuthUser,
    scorer: Scorer,
    scores: &[(u64, f64)],
) -> Result<PerformanceReview, AppError> {
    for (_, score) in scores {
        check_score(*score)?;
    }

    let mut tx = pool.begin().await?;
    let review = lock_review(&mut tx, id).await?;

    let action = match scorer {
        Scorer::Employee => {
            if actor.employee_id != Some(review.employee_id) {
                return Err(AppError::Forbidden("Only the reviewed employee can self-assess"));
            }
            ReviewAction::SubmitSelf
        }
        Scorer::Manager => {
            if actor.employee_id != Some(review.reviewer_id) && !actor.is_hr_desk() {
                return Err(AppError::Forbidden("Only the assigned reviewer can score"));
            }
            ReviewAction::SubmitManager
        }
    };
    let to = review_transition(review.status()?, action)?;

    let mut items = review_items(&mut tx, id).await?;
    for (item_id, score) in scores {
        let item = items
            .iter_mut()
            .find(|i| i.id == *item_id)
            .ok_or_else(|| AppError::validation(format!("Item {item_id} is not part of this review")))?;
        match scorer {
            Scorer::Employee => item.self_score = Some(*score),
            Scorer::Manager => item.manager_score = Some(*score),
        }
    }

    let column = match scorer {
        Scorer::Employee => "self_score",
        Scorer::Manager => "manager_score",
    };
    for item in &items {
        let value = match scorer {
            Scorer::Employee => item.self_score,
            Scorer::Manager => item.manager_score,
        };
        sqlx::query(&format!(
            "UPDATE performance_review_items SET {column} = ? WHERE id = ?"
        ))
        .bind(value)
        .bind(item.id)
        .execute(&mut *tx)
        .await?;
    }

    let aggregate = weighted_score(items.iter().map(|i| {
        let score = match scorer {
            Scorer::Employee => i.self_score,
            Scorer::Manager => i.manager_score,
        };
        (i.weight, score)
    }));
    if aggregate.is_none() {
        return Err(AppError::validation("Score at least one item"));
    }

    sqlx::query(&format!(
        "UPDATE performance_reviews SET status = ?, {column} = ? WHERE id = ?"
    ))
    .bind(to.as_ref())
    .bind(aggregate)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock_review(&mut tx, id).await?;
    tx.commit().await?;

    info!(review_id = id, scorer = column, score = ?aggregate, "Review scores submitted");
    Ok(updated)
}

/// Completes the review with the final score and its grade.
pub async fn finalize_review(
    pool: &MySqlPool,
    id: u64,
    grades: &GradeTable,
) -> Result<PerformanceReview, AppError> {
    let mut tx = pool.begin().await?;
    let review = lock_review(&mut tx, id).await?;
    let to = review_transition(review.status()?, ReviewAction::Finalize)?;

    let score = performance::final_score(review.self_score, review.manager_score)
        .ok_or_else(|| AppError::validation("The review has no scores yet"))?;
    let grade = grades.grade_for(score).to_string();

    sqlx::query(
        "UPDATE performance_reviews SET status = ?, final_score = ?, final_grade = ? WHERE id = ?",
    )
    .bind(to.as_ref())
    .bind(score)
    .bind(&grade)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock_review(&mut tx, id).await?;
    tx.commit().await?;

    info!(review_id = id, final_score = score, grade = %grade, "Performance review finalized");
    Ok(updated)
}

// ---------------- calibration ----------------

pub async fn fetch_session(pool: &MySqlPool, id: u64) -> Result<CalibrationSession, AppError> {
    sqlx::query_as::<_, CalibrationSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM calibration_sessions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Calibration session"))
}

async fn lock_session(conn: &mut MySqlConnection, id: u64) -> Result<CalibrationSession, AppError> {
    sqlx::query_as::<_, CalibrationSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM calibration_sessions WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Calibration session"))
}

pub async fn session_entries(pool: &MySqlPool, session_id: u64) -> Result<Vec<CalibrationReview>, AppError> {
    Ok(sqlx::query_as::<_, CalibrationReview>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM calibration_reviews WHERE session_id = ? ORDER BY id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}

pub fn ensure_facilitator(session: &CalibrationSession, actor: &AuthUser) -> Result<(), AppError> {
    if actor.is_hr_desk() || actor.employee_id == Some(session.facilitator_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the facilitator or HR can calibrate"))
    }
}

/// Opens a session over completed reviews of `year` (or the listed ones),
/// snapshotting each review's current score and grade.
pub async fn create_session(
    pool: &MySqlPool,
    name: &str,
    year: i32,
    facilitator_id: u64,
    review_ids: Option<&[u64]>,
) -> Result<(CalibrationSession, Vec<CalibrationReview>), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Session name is required"));
    }

    let mut tx = pool.begin().await?;

    let mut sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM performance_reviews \
         WHERE year = ? AND status = ? AND final_score IS NOT NULL"
    );
    if let Some(ids) = review_ids {
        if ids.is_empty() {
            return Err(AppError::validation("review_ids cannot be empty"));
        }
        sql.push_str(&format!(" AND id IN ({})", vec!["?"; ids.len()].join(", ")));
    }
    sql.push_str(" ORDER BY id FOR UPDATE");

    let mut q = sqlx::query_as::<_, PerformanceReview>(&sql)
        .bind(year)
        .bind(ReviewStatus::Completed.as_ref());
    for id in review_ids.unwrap_or_default() {
        q = q.bind(*id);
    }
    let reviews = q.fetch_all(&mut *tx).await?;

    if reviews.is_empty() {
        return Err(AppError::validation("No completed reviews to calibrate"));
    }
    if let Some(ids) = review_ids {
        if reviews.len() != ids.len() {
            return Err(AppError::validation(
                "Only completed reviews of the session year can be calibrated",
            ));
        }
    }

    let result = sqlx::query(
        "INSERT INTO calibration_sessions (name, year, facilitator_id, status) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(year)
    .bind(facilitator_id)
    .bind(CalibrationStatus::InProgress.as_ref())
    .execute(&mut *tx)
    .await?;
    let session_id = result.last_insert_id();

    for review in &reviews {
        let (Some(score), Some(grade)) = (review.final_score, review.final_grade.as_deref()) else {
            continue;
        };
        sqlx::query(
            r#"
            INSERT INTO calibration_reviews
                (session_id, performance_review_id, original_score, original_grade)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(review.id)
        .bind(score)
        .bind(grade)
        .execute(&mut *tx)
        .await?;
    }

    let session = lock_session(&mut tx, session_id).await?;
    tx.commit().await?;

    info!(session_id, year, reviews = reviews.len(), "Calibration session created");
    let entries = session_entries(pool, session_id).await?;
    Ok((session, entries))
}

/// Sets or clears the calibrated score of one entry. The grade follows the
/// score unless given explicitly.
pub async fn calibrate_entry(
    pool: &MySqlPool,
    session_id: u64,
    entry_id: u64,
    actor: &AuthUser,
    input: Calibration,
    grades: &GradeTable,
) -> Result<CalibrationReview, AppError> {
    let Calibration {
        calibrated_score,
        calibrated_grade,
        notes,
    } = input;
    if let Some(score) = calibrated_score {
        check_score(score)?;
    }
    if let Some(grade) = &calibrated_grade {
        if !grades.bands().iter().any(|b| &b.grade == grade) {
            return Err(AppError::validation(format!("Unknown grade '{grade}'")));
        }
    }
    if calibrated_score.is_none() && calibrated_grade.is_some() {
        return Err(AppError::validation("A calibrated grade needs a calibrated score"));
    }

    let mut tx = pool.begin().await?;
    let session = lock_session(&mut tx, session_id).await?;
    ensure_facilitator(&session, actor)?;
    ensure_session_open(session.status()?, "calibrate")?;

    let outcome = calibration_outcome(calibrated_score, calibrated_grade.as_deref(), grades);
    let result = sqlx::query(
        r#"
        UPDATE calibration_reviews
        SET calibrated_score = ?, calibrated_grade = ?, notes = COALESCE(?, notes)
        WHERE id = ? AND session_id = ?
        "#,
    )
    .bind(outcome.as_ref().map(|(s, _)| *s))
    .bind(outcome.as_ref().map(|(_, g)| g.clone()))
    .bind(notes)
    .bind(entry_id)
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    let entry = sqlx::query_as::<_, CalibrationReview>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM calibration_reviews WHERE id = ? AND session_id = ?"
    ))
    .bind(entry_id)
    .bind(session_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Calibration entry"))?;
    tx.commit().await?;

    info!(
        session_id,
        entry_id,
        changed = result.rows_affected(),
        score = ?calibrated_score,
        "Calibration entry updated"
    );
    Ok(entry)
}

/// Closes the session and writes calibrated scores back to their reviews.
/// Entries without a calibrated score leave their review untouched.
pub async fn complete_session(
    pool: &MySqlPool,
    session_id: u64,
    actor: &AuthUser,
    grades: &GradeTable,
) -> Result<CalibrationSession, AppError> {
    let mut tx = pool.begin().await?;
    let session = lock_session(&mut tx, session_id).await?;
    ensure_facilitator(&session, actor)?;
    ensure_session_open(session.status()?, "complete")?;

    let entries = sqlx::query_as::<_, CalibrationReview>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM calibration_reviews WHERE session_id = ? FOR UPDATE"
    ))
    .bind(session_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut written = 0usize;
    for entry in &entries {
        let Some((score, grade)) =
            calibration_outcome(entry.calibrated_score, entry.calibrated_grade.as_deref(), grades)
        else {
            continue;
        };

        let result = sqlx::query(
            "UPDATE performance_reviews SET final_score = ?, final_grade = ? WHERE id = ?",
        )
        .bind(score)
        .bind(&grade)
        .bind(entry.performance_review_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            warn!(
                session_id,
                review_id = entry.performance_review_id,
                "Calibrated review unchanged or missing"
            );
        }
        written += 1;
    }

    sqlx::query("UPDATE calibration_sessions SET status = ?, completed_at = ? WHERE id = ?")
        .bind(CalibrationStatus::Completed.as_ref())
        .bind(Utc::now())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    let updated = lock_session(&mut tx, session_id).await?;
    tx.commit().await?;

    info!(session_id, written, entries = entries.len(), "Calibration session completed");
    Ok(updated)
}

pub async fn cancel_session(
    pool: &MySqlPool,
    session_id: u64,
    actor: &AuthUser,
) -> Result<CalibrationSession, AppError> {
    let mut tx = pool.begin().await?;
    let session = lock_session(&mut tx, session_id).await?;
    ensure_facilitator(&session, actor)?;
    ensure_session_open(session.status()?, "cancel")?;

    sqlx::query("UPDATE calibration_sessions SET status = ? WHERE id = ?")
        .bind(CalibrationStatus::Cancelled.as_ref())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    let updated = lock_session(&mut tx, session_id).await?;
    tx.commit().await?;

    info!(session_id, "Calibration session cancelled");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::store::fixtures;

    #[test]
    fn scores_stay_on_the_hundred_point_scale() {
        assert!(check_score(0.0).is_ok());
        assert!(check_score(100.0).is_ok());
        assert!(check_score(100.5).is_err());
        assert!(check_score(-1.0).is_err());
    }

    #[test]
    fn facilitator_or_hr_may_calibrate() {
        let session = CalibrationSession {
            id: 1,
            name: "Year end".into(),
            year: 2026,
            facilitator_id: 12,
            status: "in_progress".into(),
            created_at: Utc::now(),
            completed_at: None,
        };
        let user = |role, employee_id| AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id: Some(employee_id),
        };

        assert!(ensure_facilitator(&session, &user(Role::Manager, 12)).is_ok());
        assert!(ensure_facilitator(&session, &user(Role::Hr, 3)).is_ok());
        assert!(ensure_facilitator(&session, &user(Role::Manager, 13)).is_err());
    }

    async fn completed_review(pool: &MySqlPool, employee_id: u64, reviewer_id: u64, score: f64, grade: &str) -> u64 {
        sqlx::query(
            "INSERT INTO performance_reviews \
             (employee_id, reviewer_id, period, year, status, final_score, final_grade) \
             VALUES (?, ?, 'H2', 2026, 'completed', ?, ?)",
        )
        .bind(employee_id)
        .bind(reviewer_id)
        .bind(score)
        .bind(grade)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_id()
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a MySQL server"]
    async fn completing_a_session_writes_calibrated_results_back(pool: MySqlPool) {
        let dept = fixtures::department(&pool, "OPS").await;
        let lead = fixtures::employee(&pool, dept, "LEAD-1").await;
        let first = fixtures::employee(&pool, dept, "EMP-1").await;
        let second = fixtures::employee(&pool, dept, "EMP-2").await;
        let raised = completed_review(&pool, first, lead, 78.0, "C").await;
        let untouched = completed_review(&pool, second, lead, 85.0, "B").await;

        let hr = fixtures::user(90, Role::Hr, None);
        let grades = GradeTable::default();
        let (session, entries) = create_session(&pool, "Year end", 2026, lead, None).await.unwrap();
        assert_eq!(entries.len(), 2);

        let entry = entries.iter().find(|e| e.performance_review_id == raised).unwrap();
        let calibrated = calibrate_entry(
            &pool,
            session.id,
            entry.id,
            &hr,
            Calibration {
                calibrated_score: Some(92.0),
                ..Calibration::default()
            },
            &grades,
        )
        .await
        .unwrap();
        assert_eq!(calibrated.calibrated_grade.as_deref(), Some("A"));

        let completed = complete_session(&pool, session.id, &hr, &grades).await.unwrap();
        assert_eq!(completed.status().unwrap(), CalibrationStatus::Completed);

        let review = fetch_review(&pool, raised).await.unwrap();
        assert_eq!((review.final_score, review.final_grade.as_deref()), (Some(92.0), Some("A")));
        let review = fetch_review(&pool, untouched).await.unwrap();
        assert_eq!((review.final_score, review.final_grade.as_deref()), (Some(85.0), Some("B")));

        let err = cancel_session(&pool, session.id, &hr).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }
}
