use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::performance::{PerformanceReview, PerformanceReviewItem};
use crate::notify::{NotificationEvent, Notifier};
use crate::store::performance::{self as store, NewReview, Scorer};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ReviewItemInput {
    #[schema(example = "Delivery")]
    pub title: String,
    #[schema(example = 40.0)]
    pub weight: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateReview {
    #[schema(example = 12)]
    pub employee_id: u64,
    /// Employee id of the scoring manager
    #[schema(example = 4)]
    pub reviewer_id: u64,
    #[schema(example = "H1")]
    pub period: String,
    #[schema(example = 2026)]
    pub year: i32,
    pub items: Vec<ReviewItemInput>,
}

#[derive(Deserialize, ToSchema)]
pub struct ItemScore {
    #[schema(example = 31)]
    pub item_id: u64,
    #[schema(example = 85.0)]
    pub score: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ScoreSubmission {
    pub scores: Vec<ItemScore>,
}

impl ScoreSubmission {
    fn pairs(&self) -> Vec<(u64, f64)> {
        self.scores.iter().map(|s| (s.item_id, s.score)).collect()
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ReviewFilter {
    /// HR/Admin only; other callers see their own reviews
    pub employee_id: Option<u64>,
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: PerformanceReview,
    pub items: Vec<PerformanceReviewItem>,
}

fn can_view(auth: &AuthUser, review: &PerformanceReview) -> bool {
    auth.is_hr_desk()
        || auth.employee_id == Some(review.employee_id)
        || auth.employee_id == Some(review.reviewer_id)
}

#[utoipa::path(
    post,
    path = "/api/performance-reviews",
    request_body = CreateReview,
    responses(
        (status = 200, description = "Review created as draft", body = PerformanceReview),
        (status = 400, description = "Missing items or invalid weights"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "A review for that period already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn create_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateReview>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let payload = payload.into_inner();

    let review = store::create_review(
        pool.get_ref(),
        NewReview {
            employee_id: payload.employee_id,
            reviewer_id: payload.reviewer_id,
            period: payload.period.trim().to_string(),
            year: payload.year,
            items: payload
                .items
                .into_iter()
                .map(|i| (i.title.trim().to_string(), i.weight))
                .collect(),
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Performance review created",
        "data": review
    })))
}

#[utoipa::path(
    get,
    path = "/api/performance-reviews",
    params(ReviewFilter),
    responses((status = 200, description = "Reviews, newest year first", body = [PerformanceReview])),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn list_reviews(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReviewFilter>,
) -> actix_web::Result<impl Responder> {
    let employee_id = if auth.is_hr_desk() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let reviews = store::list_reviews(pool.get_ref(), employee_id, query.year).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

#[utoipa::path(
    get,
    path = "/api/performance-reviews/{id}",
    params(("id" = u64, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review with its items", body = ReviewDetail),
        (status = 403, description = "Not a party to this review"),
        (status = 404, description = "Performance review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn get_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let review = store::fetch_review(pool.get_ref(), id).await?;
    if !can_view(&auth, &review) {
        return Err(AppError::Forbidden("Not a party to this review").into());
    }

    let mut conn = pool.acquire().await.map_err(AppError::from)?;
    let items = store::review_items(&mut conn, id).await?;

    Ok(HttpResponse::Ok().json(ReviewDetail { review, items }))
}

#[utoipa::path(
    put,
    path = "/api/performance-reviews/{id}/open",
    params(("id" = u64, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review handed to the employee", body = PerformanceReview),
        (status = 409, description = "Review is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn open_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let review = store::open_review(pool.get_ref(), path.into_inner()).await?;

    notifier.notify(
        NotificationEvent::to_employee(
            review.employee_id,
            "review_self_assessment",
            format!("Your {} {} review is open for self-assessment", review.period, review.year),
        )
        .about("performance_review", review.id),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Performance review opened",
        "data": review
    })))
}

#[utoipa::path(
    put,
    path = "/api/performance-reviews/{id}/self-assessment",
    params(("id" = u64, Path, description = "Review ID")),
    request_body = ScoreSubmission,
    responses(
        (status = 200, description = "Self scores stored, review moved to the manager", body = PerformanceReview),
        (status = 400, description = "Score out of range or unknown item"),
        (status = 403, description = "Only the reviewed employee can self-assess"),
        (status = 409, description = "Review is not awaiting self-assessment")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn self_assessment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
    payload: web::Json<ScoreSubmission>,
) -> actix_web::Result<impl Responder> {
    let review = store::submit_scores(
        pool.get_ref(),
        path.into_inner(),
        &auth,
        Scorer::Employee,
        &payload.pairs(),
    )
    .await?;

    notifier.notify(
        NotificationEvent::to_employee(
            review.reviewer_id,
            "review_manager_scoring",
            "A performance review is waiting for your scores",
        )
        .about("performance_review", review.id)
        .body(format!("Employee #{} submitted a self-assessment", review.employee_id)),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Self-assessment submitted",
        "data": review
    })))
}

#[utoipa::path(
    put,
    path = "/api/performance-reviews/{id}/manager-review",
    params(("id" = u64, Path, description = "Review ID")),
    request_body = ScoreSubmission,
    responses(
        (status = 200, description = "Manager scores stored", body = PerformanceReview),
        (status = 400, description = "Score out of range or unknown item"),
        (status = 403, description = "Only the assigned reviewer or HR can score"),
        (status = 409, description = "Review is not awaiting manager scores")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn manager_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ScoreSubmission>,
) -> actix_web::Result<impl Responder> {
    let review = store::submit_scores(
        pool.get_ref(),
        path.into_inner(),
        &auth,
        Scorer::Manager,
        &payload.pairs(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Manager review saved",
        "data": review
    })))
}

#[utoipa::path(
    put,
    path = "/api/performance-reviews/{id}/finalize",
    params(("id" = u64, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review completed and graded", body = PerformanceReview),
        (status = 400, description = "The review has no scores yet"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Review is not in manager review")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn finalize_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let review = store::finalize_review(pool.get_ref(), path.into_inner(), &config.grade_table).await?;
    debug!(review_id = review.id, grade = ?review.final_grade, "Review graded");

    notifier.notify(
        NotificationEvent::to_employee(
            review.employee_id,
            "review_completed",
            format!("Your {} {} review is complete", review.period, review.year),
        )
        .about("performance_review", review.id)
        .body(format!(
            "Final grade: {}",
            review.final_grade.as_deref().unwrap_or("-")
        )),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Performance review finalized",
        "data": review
    })))
}
