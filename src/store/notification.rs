use chrono::Utc;
use sqlx::MySqlPool;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::notification::Notification;
use crate::model::role::Role;
use crate::notify::{Audience, NotificationEvent};

pub async fn insert(pool: &MySqlPool, event: &NotificationEvent) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications
            (recipient_employee_id, audience, kind, title, body, reference_type, reference_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.recipient_employee_id)
    .bind(event.audience.as_ref())
    .bind(event.kind)
    .bind(&event.title)
    .bind(&event.body)
    .bind(event.reference_type)
    .bind(event.reference_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}

/// Broadcast audience the caller belongs to, if any.
fn broadcast_audience(role: Role) -> Option<Audience> {
    match role {
        Role::Admin | Role::Hr => Some(Audience::Hr),
        Role::Director => Some(Audience::Director),
        Role::Manager | Role::Employee => None,
    }
}

/// Where the read mark of a notification is kept for one reader.
#[derive(Debug, PartialEq, Eq)]
enum ReadMark {
    /// Personal notice, flagged on the row itself
    Row,
    /// Broadcast, flagged per reader so other desk members still see it unread
    PerReader,
}

fn read_mark(notification: &Notification, user: &AuthUser) -> Option<ReadMark> {
    match notification.recipient_employee_id {
        Some(recipient) => (user.employee_id == Some(recipient)).then_some(ReadMark::Row),
        None => broadcast_audience(user.role)
            .is_some_and(|a| a.as_ref() == notification.audience)
            .then_some(ReadMark::PerReader),
    }
}

/// Personal notifications plus the broadcasts of the caller's audience,
/// newest first. Broadcast read state is the caller's own.
pub async fn list_for(
    pool: &MySqlPool,
    user: &AuthUser,
    unread_only: bool,
) -> Result<Vec<Notification>, AppError> {
    let audience = broadcast_audience(user.role);

    let mut sql = String::from(
        "SELECT n.id, n.recipient_employee_id, n.audience, n.kind, n.title, n.body, \
         n.reference_type, n.reference_id, COALESCE(n.read_at, r.read_at) AS read_at, \
         n.created_at FROM notifications n \
         LEFT JOIN notification_reads r ON r.notification_id = n.id AND r.user_id = ? \
         WHERE (n.recipient_employee_id = ?",
    );
    if audience.is_some() {
        sql.push_str(" OR (n.recipient_employee_id IS NULL AND n.audience = ?)");
    }
    sql.push(')');
    if unread_only {
        sql.push_str(" AND n.read_at IS NULL AND r.read_at IS NULL");
    }
    sql.push_str(" ORDER BY n.created_at DESC, n.id DESC LIMIT 200");

    // 0 never matches an auto-increment id
    let mut q = sqlx::query_as::<_, Notification>(&sql)
        .bind(user.user_id)
        .bind(user.employee_id.unwrap_or(0));
    if let Some(audience) = audience {
        q = q.bind(audience.as_ref().to_string());
    }
    Ok(q.fetch_all(pool).await?)
}

pub async fn mark_read(pool: &MySqlPool, id: u64, user: &AuthUser) -> Result<(), AppError> {
    let notification = sqlx::query_as::<_, Notification>(
        "SELECT id, recipient_employee_id, audience, kind, title, body, reference_type, \
         reference_id, read_at, created_at FROM notifications WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Notification"))?;

    match read_mark(&notification, user).ok_or(AppError::NotFound("Notification"))? {
        ReadMark::Row => {
            sqlx::query("UPDATE notifications SET read_at = COALESCE(read_at, ?) WHERE id = ?")
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?;
        }
        ReadMark::PerReader => {
            sqlx::query(
                "INSERT IGNORE INTO notification_reads (notification_id, user_id, read_at) \
                 VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(user.user_id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}
