use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::feedback::{FeedbackRequest, FeedbackReviewer, Relationship};
use crate::notify::{NotificationEvent, Notifier};
use crate::store::feedback::{self as store, Answer};
use crate::workflow::feedback::{FeedbackSummary, RelationshipWeights};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ReviewerInput {
    #[schema(example = 8)]
    pub employee_id: u64,
    pub relationship: Relationship,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateFeedback {
    #[schema(example = 12)]
    pub subject_employee_id: u64,
    #[schema(example = "Mid-year 360")]
    pub title: String,
    pub reviewers: Vec<ReviewerInput>,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerInput {
    #[schema(example = "Communication")]
    pub competency: String,
    /// 1 to 5
    #[schema(example = 4.0)]
    pub score: f64,
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitFeedback {
    pub answers: Vec<AnswerInput>,
}

#[derive(Serialize, ToSchema)]
pub struct FeedbackDetail {
    #[serde(flatten)]
    pub request: FeedbackRequest,
    pub reviewers: Vec<FeedbackReviewer>,
}

#[utoipa::path(
    post,
    path = "/api/feedback",
    request_body = CreateFeedback,
    responses(
        (status = 200, description = "Feedback request opened", body = FeedbackDetail),
        (status = 400, description = "Missing title or invalid reviewer list"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn create_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    payload: web::Json<CreateFeedback>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let reviewers: Vec<(u64, Relationship)> = payload
        .reviewers
        .iter()
        .map(|r| (r.employee_id, r.relationship))
        .collect();
    let request = store::create(
        pool.get_ref(),
        payload.subject_employee_id,
        payload.title.trim(),
        &reviewers,
    )
    .await?;

    for (employee_id, _) in &reviewers {
        notifier.notify(
            NotificationEvent::to_employee(
                *employee_id,
                "feedback_requested",
                format!("Your feedback is requested: {}", request.title),
            )
            .about("feedback_request", request.id),
        );
    }

    let reviewers = store::reviewers(pool.get_ref(), request.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Feedback request opened",
        "data": FeedbackDetail { request, reviewers }
    })))
}

#[utoipa::path(
    get,
    path = "/api/feedback/{id}",
    params(("id" = u64, Path, description = "Feedback request ID")),
    responses(
        (status = 200, description = "Request with reviewer progress", body = FeedbackDetail),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Feedback request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn get_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let request = store::fetch(pool.get_ref(), id).await?;
    let reviewers = store::reviewers(pool.get_ref(), id).await?;

    // Reviewers see the requests they were asked to answer.
    let is_reviewer = reviewers
        .iter()
        .any(|r| Some(r.reviewer_employee_id) == auth.employee_id);
    if !auth.is_hr_desk() && !is_reviewer {
        return Err(AppError::Forbidden("Not a reviewer on this request").into());
    }

    Ok(HttpResponse::Ok().json(FeedbackDetail { request, reviewers }))
}

#[utoipa::path(
    put,
    path = "/api/feedback/{id}/submit",
    params(("id" = u64, Path, description = "Feedback request ID")),
    request_body = SubmitFeedback,
    responses(
        (status = 200, description = "Answers stored", body = FeedbackReviewer),
        (status = 400, description = "Score outside 1-5 or duplicate competency"),
        (status = 403, description = "You are not a reviewer on this request"),
        (status = 409, description = "Already submitted or request closed")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn submit_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SubmitFeedback>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let answers: Vec<Answer> = payload
        .into_inner()
        .answers
        .into_iter()
        .map(|a| Answer {
            competency: a.competency,
            score: a.score,
            comment: a.comment,
        })
        .collect();

    let reviewer = store::submit(pool.get_ref(), path.into_inner(), employee_id, &answers).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Feedback submitted",
        "data": reviewer
    })))
}

#[utoipa::path(
    put,
    path = "/api/feedback/{id}/close",
    params(("id" = u64, Path, description = "Feedback request ID")),
    responses(
        (status = 200, description = "Request closed", body = FeedbackRequest),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Request already closed")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn close_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let request = store::close(pool.get_ref(), path.into_inner()).await?;

    notifier.notify(
        NotificationEvent::to_employee(
            request.subject_employee_id,
            "feedback_closed",
            format!("Feedback '{}' is ready", request.title),
        )
        .about("feedback_request", request.id),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Feedback request closed",
        "data": request
    })))
}

#[utoipa::path(
    get,
    path = "/api/feedback/{id}/summary",
    params(("id" = u64, Path, description = "Feedback request ID")),
    responses(
        (status = 200, description = "Weighted means per competency and relationship", body = FeedbackSummary),
        (status = 403, description = "Only the subject or HR"),
        (status = 404, description = "Feedback request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Feedback"
)]
pub async fn feedback_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let request = store::fetch(pool.get_ref(), id).await?;
    auth.require_self_or_hr(request.subject_employee_id)?;

    let summary = store::summary(pool.get_ref(), id, &RelationshipWeights::default()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::config::Config;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[test]
    fn reviewer_relationships_use_snake_case() {
        let payload: CreateFeedback = serde_json::from_value(json!({
            "subject_employee_id": 12,
            "title": "Mid-year",
            "reviewers": [
                {"employee_id": 12, "relationship": "self"},
                {"employee_id": 3, "relationship": "direct_report"}
            ]
        }))
        .unwrap();
        assert_eq!(payload.reviewers[0].relationship, Relationship::SelfReview);
        assert_eq!(payload.reviewers[1].relationship, Relationship::DirectReport);
    }

    #[actix_web::test]
    async fn employees_cannot_open_or_close_requests() {
        let config = Config::for_tests();
        let token =
            generate_access_token(5, "emp".into(), Role::Employee as u8, Some(5), &config.jwt_secret, 900)
                .unwrap();
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let (notifier, _rx) = Notifier::channel(8);
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(notifier))
                .route("/api/feedback", web::post().to(create_feedback))
                .route("/api/feedback/{id}/close", web::put().to(close_feedback)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/feedback")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "subject_employee_id": 5,
                "title": "Mine",
                "reviewers": [{"employee_id": 5, "relationship": "self"}]
            }))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::put()
            .uri("/api/feedback/1/close")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
