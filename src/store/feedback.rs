//! 360-degree feedback requests, reviewers and answers.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

use crate::error::{AppError, on_duplicate};
use crate::model::feedback::{
    FeedbackAnswerRow, FeedbackRequest, FeedbackReviewer, FeedbackStatus, Relationship,
};
use crate::workflow::feedback::{self, FeedbackSummary, RelationshipWeights, ScoredAnswer};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct Answer {
    pub competency: String,
    pub score: f64,
    pub comment: Option<String>,
}

fn check_reviewers(subject: u64, reviewers: &[(u64, Relationship)]) -> Result<(), AppError> {
    if reviewers.is_empty() {
        return Err(AppError::validation("Add at least one reviewer"));
    }

    let mut seen = HashSet::new();
    for (employee_id, relationship) in reviewers {
        if !seen.insert(*employee_id) {
            return Err(AppError::validation(format!(
                "Employee {employee_id} is listed twice"
            )));
        }
        let is_subject = *employee_id == subject;
        let is_self = *relationship == Relationship::SelfReview;
        if is_subject != is_self {
            return Err(AppError::validation(
                "Only the subject reviews as 'self', and only as 'self'",
            ));
        }
    }
    Ok(())
}

fn check_answers(answers: &[Answer]) -> Result<(), AppError> {
    if answers.is_empty() {
        return Err(AppError::validation("Answer at least one competency"));
    }

    let mut seen = HashSet::new();
    for answer in answers {
        let competency = answer.competency.trim();
        if competency.is_empty() {
            return Err(AppError::validation("Competency is required"));
        }
        // Stored trimmed, so compare trimmed
        if !seen.insert(competency.to_lowercase()) {
            return Err(AppError::validation(format!(
                "'{competency}' is answered twice"
            )));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&answer.score) {
            return Err(AppError::validation(format!(
                "Scores must be between {MIN_SCORE} and {MAX_SCORE}"
            )));
        }
    }
    Ok(())
}

pub async fn fetch(pool: &MySqlPool, id: u64) -> Result<FeedbackRequest, AppError> {
    sqlx::query_as::<_, FeedbackRequest>(
        "SELECT id, subject_employee_id, title, status, created_at, closed_at \
         FROM feedback_requests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Feedback request"))
}

async fn lock(conn: &mut MySqlConnection, id: u64) -> Result<FeedbackRequest, AppError> {
    sqlx::query_as::<_, FeedbackRequest>(
        "SELECT id, subject_employee_id, title, status, created_at, closed_at \
         FROM feedback_requests WHERE id = ? FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Feedback request"))
}

fn ensure_open(request: &FeedbackRequest, action: &'static str) -> Result<(), AppError> {
    let status: FeedbackStatus = request
        .status
        .parse()
        .map_err(|_| AppError::Conflict(format!("Unknown feedback status '{}'", request.status)))?;
    if status == FeedbackStatus::Open {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            action,
            from: status.to_string(),
        })
    }
}

pub async fn reviewers(pool: &MySqlPool, request_id: u64) -> Result<Vec<FeedbackReviewer>, AppError> {
    Ok(sqlx::query_as::<_, FeedbackReviewer>(
        "SELECT id, request_id, reviewer_employee_id, relationship, submitted_at \
         FROM feedback_reviewers WHERE request_id = ? ORDER BY id",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create(
    pool: &MySqlPool,
    subject_employee_id: u64,
    title: &str,
    reviewers: &[(u64, Relationship)],
) -> Result<FeedbackRequest, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    check_reviewers(subject_employee_id, reviewers)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "INSERT INTO feedback_requests (subject_employee_id, title, status) VALUES (?, ?, ?)",
    )
    .bind(subject_employee_id)
    .bind(title)
    .bind(FeedbackStatus::Open.as_ref())
    .execute(&mut *tx)
    .await?;
    let request_id = result.last_insert_id();

    for (employee_id, relationship) in reviewers {
        sqlx::query(
            "INSERT INTO feedback_reviewers (request_id, reviewer_employee_id, relationship) VALUES (?, ?, ?)",
        )
        .bind(request_id)
        .bind(employee_id)
        .bind(relationship.as_ref())
        .execute(&mut *tx)
        .await
        .map_err(|e| on_duplicate(e, "Reviewer already added"))?;
    }

    let created = lock(&mut tx, request_id).await?;
    tx.commit().await?;

    info!(
        request_id,
        subject_employee_id,
        reviewers = reviewers.len(),
        "Feedback request opened"
    );
    Ok(created)
}

/// Stores one reviewer's answers. A reviewer submits exactly once, and only
/// while the request is open.
pub async fn submit(
    pool: &MySqlPool,
    request_id: u64,
    reviewer_employee_id: u64,
    answers: &[Answer],
) -> Result<FeedbackReviewer, AppError> {
    check_answers(answers)?;

    let mut tx = pool.begin().await?;
    let request = lock(&mut tx, request_id).await?;
    ensure_open(&request, "answer")?;

    let reviewer = sqlx::query_as::<_, FeedbackReviewer>(
        "SELECT id, request_id, reviewer_employee_id, relationship, submitted_at \
         FROM feedback_reviewers WHERE request_id = ? AND reviewer_employee_id = ? FOR UPDATE",
    )
    .bind(request_id)
    .bind(reviewer_employee_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::Forbidden("You are not a reviewer on this request"))?;

    if reviewer.submitted_at.is_some() {
        return Err(AppError::Conflict("Feedback already submitted".into()));
    }

    for answer in answers {
        sqlx::query(
            "INSERT INTO feedback_answers (feedback_reviewer_id, competency, score, comment) VALUES (?, ?, ?, ?)",
        )
        .bind(reviewer.id)
        .bind(answer.competency.trim())
        .bind(answer.score)
        .bind(&answer.comment)
        .execute(&mut *tx)
        .await?;
    }

    let now = Utc::now();
    sqlx::query("UPDATE feedback_reviewers SET submitted_at = ? WHERE id = ?")
        .bind(now)
        .bind(reviewer.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        request_id,
        reviewer_employee_id,
        answers = answers.len(),
        "Feedback submitted"
    );
    Ok(FeedbackReviewer {
        submitted_at: Some(now),
        ..reviewer
    })
}

pub async fn close(pool: &MySqlPool, request_id: u64) -> Result<FeedbackRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock(&mut tx, request_id).await?;
    ensure_open(&request, "close")?;

    sqlx::query("UPDATE feedback_requests SET status = ?, closed_at = ? WHERE id = ?")
        .bind(FeedbackStatus::Closed.as_ref())
        .bind(Utc::now())
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let closed = lock(&mut tx, request_id).await?;
    tx.commit().await?;

    info!(request_id, "Feedback request closed");
    Ok(closed)
}

pub async fn summary(
    pool: &MySqlPool,
    request_id: u64,
    weights: &RelationshipWeights,
) -> Result<FeedbackSummary, AppError> {
    let rows = sqlx::query_as::<_, FeedbackAnswerRow>(
        r#"
        SELECT r.relationship, a.competency, a.score
        FROM feedback_answers a
        JOIN feedback_reviewers r ON r.id = a.feedback_reviewer_id
        WHERE r.request_id = ?
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    let answers = rows
        .into_iter()
        .map(|row| {
            let relationship = row.relationship.parse::<Relationship>().map_err(|_| {
                AppError::Conflict(format!("Unknown relationship '{}'", row.relationship))
            })?;
            Ok(ScoredAnswer {
                relationship,
                competency: row.competency,
                score: row.score,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(feedback::summarize(&answers, weights))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(competency: &str, score: f64) -> Answer {
        Answer {
            competency: competency.into(),
            score,
            comment: None,
        }
    }

    #[test]
    fn self_slot_belongs_to_the_subject() {
        assert!(check_reviewers(1, &[(1, Relationship::SelfReview), (2, Relationship::Peer)]).is_ok());
        assert!(check_reviewers(1, &[(2, Relationship::SelfReview)]).is_err());
        assert!(check_reviewers(1, &[(1, Relationship::Peer)]).is_err());
        assert!(check_reviewers(1, &[(2, Relationship::Peer), (2, Relationship::Manager)]).is_err());
        assert!(check_reviewers(1, &[]).is_err());
    }

    #[test]
    fn answers_are_scored_one_to_five_once_per_competency() {
        assert!(check_answers(&[answer("Communication", 4.0), answer("Ownership", 5.0)]).is_ok());
        assert!(check_answers(&[answer("Communication", 0.0)]).is_err());
        assert!(check_answers(&[answer("Communication", 6.0)]).is_err());
        assert!(check_answers(&[answer("Communication", 3.0), answer("Communication", 4.0)]).is_err());
        assert!(check_answers(&[]).is_err());
    }

    #[test]
    fn padded_competency_names_count_as_the_same_competency() {
        let err = check_answers(&[answer("Ownership", 4.0), answer(" Ownership", 1.0)]).unwrap_err();
        assert_eq!(err.to_string(), "'Ownership' is answered twice");
        assert!(check_answers(&[answer("Ownership ", 4.0), answer("ownership", 2.0)]).is_err());
    }
}
