//! Postgres query layer for notifyd.
//!
//! All notification-store access goes through this module.
//! Uses sqlx with compile-time-unchecked queries (runtime-checked)
//! to avoid needing a live DB at compile time.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::NotifyError;

const NOTIFICATION_COLUMNS: &str = "id, receiver_id, title, content, comment_id, party_id, \
     actor_id, notification_type, created_at, is_read";

/// Row returned from notifications table queries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub receiver_id: i64,
    pub title: String,
    pub content: String,
    pub comment_id: Option<i64>,
    pub party_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub notification_type: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Fields for a new notification record; id / created_at / is_read are
/// assigned by the store.
#[derive(Debug)]
pub struct NewNotification<'a> {
    pub receiver_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub comment_id: Option<i64>,
    pub party_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub notification_type: &'a str,
}

/// Insert one notification and return the stored row. The caller dispatches
/// the push only after this commits.
pub async fn create_notification(
    pool: &PgPool,
    new: NewNotification<'_>,
) -> Result<NotificationRow, NotifyError> {
    let row: NotificationRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO notifications
            (receiver_id, title, content, comment_id, party_id, actor_id, notification_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    ))
    .bind(new.receiver_id)
    .bind(new.title)
    .bind(new.content)
    .bind(new.comment_id)
    .bind(new.party_id)
    .bind(new.actor_id)
    .bind(new.notification_type)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Lookup one notification by id.
pub async fn get_notification(
    pool: &PgPool,
    id: i64,
) -> Result<Option<NotificationRow>, NotifyError> {
    let row: Option<NotificationRow> = sqlx::query_as(&format!(
        r#"SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All notifications for one receiver, newest first.
pub async fn list_for_receiver(
    pool: &PgPool,
    receiver_id: i64,
) -> Result<Vec<NotificationRow>, NotifyError> {
    let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS} FROM notifications
        WHERE receiver_id = $1
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(receiver_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Flip the read flag. Ownership is checked by the caller beforehand.
pub async fn set_read(pool: &PgPool, id: i64) -> Result<(), NotifyError> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(NotifyError::NotFound(id));
    }
    Ok(())
}

/// Bulk delete every notification referencing a removed comment.
pub async fn delete_by_comment(pool: &PgPool, comment_id: i64) -> Result<u64, NotifyError> {
    let result = sqlx::query("DELETE FROM notifications WHERE comment_id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Bulk delete every notification referencing a removed party.
pub async fn delete_by_party(pool: &PgPool, party_id: i64) -> Result<u64, NotifyError> {
    let result = sqlx::query("DELETE FROM notifications WHERE party_id = $1")
        .bind(party_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
