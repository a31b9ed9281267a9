use crate::auth::auth::AuthUser;
use crate::store::notification as store;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationFilter),
    responses((status = 200, description = "Own and audience notifications, newest first", body = [crate::model::notification::Notification])),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationFilter>,
) -> actix_web::Result<impl Responder> {
    let notifications = store::list_for(pool.get_ref(), &auth, query.unread_only).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read", body = Object, example = json!({
            "message": "Notification marked as read"
        })),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    store::mark_read(pool.get_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Notification marked as read"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[test]
    fn unread_only_defaults_to_false() {
        let filter: NotificationFilter = serde_json::from_value(json!({})).unwrap();
        assert!(!filter.unread_only);
    }

    #[actix_web::test]
    async fn listing_requires_a_token() {
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(crate::config::Config::for_tests()))
                .app_data(web::Data::new(pool))
                .route("/api/notifications", web::get().to(list_notifications)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/notifications").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
