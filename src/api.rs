//! REST handlers for the notification store.
//!
//! The creation endpoints are internal, service-to-service calls; each one
//! persists the record first and then dispatches through the hub, so a push
//! failure can never fail the creating request. The read-side endpoints act
//! on behalf of the authenticated user.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::auth::AuthedUser;
use crate::db;
use crate::error::NotifyError;
use crate::state::AppState;
use crate::types::{
    CommentNotificationRequest, NotificationDto, NotificationType, PartyNotificationRequest,
};

/// GET /notifications — the authenticated user's notifications, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<Vec<NotificationDto>>, NotifyError> {
    let rows = db::list_for_receiver(&state.db, user_id).await?;
    Ok(Json(rows.iter().map(NotificationDto::from).collect()))
}

/// PATCH /notifications/read/{notification_id} — mark one notification read.
/// 404 when the id is unknown, 400 when it belongs to a different user.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode, NotifyError> {
    let row = db::get_notification(&state.db, notification_id)
        .await?
        .ok_or(NotifyError::NotFound(notification_id))?;
    if row.receiver_id != user_id {
        return Err(NotifyError::NotOwner(notification_id));
    }
    db::set_read(&state.db, notification_id).await?;
    Ok(StatusCode::OK)
}

/// POST /notifications/comment — create a COMMENT notification and push it
/// to the receiver's live connections.
pub async fn create_comment_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommentNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationDto>), NotifyError> {
    let kind = NotificationType::Comment;
    let row = db::create_notification(
        &state.db,
        db::NewNotification {
            receiver_id: req.receiver_id,
            title: kind.default_title(),
            content: &req.content,
            comment_id: Some(req.comment_id),
            party_id: None,
            actor_id: req.actor_id,
            notification_type: kind.as_str(),
        },
    )
    .await?;

    let dto = NotificationDto::from(&row);
    if req.activated {
        state.hub.dispatch(row.receiver_id, &dto);
    }
    Ok((StatusCode::CREATED, Json(dto)))
}

/// POST /notifications/party — create a PARTY_* notification and push it.
pub async fn create_party_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PartyNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationDto>), NotifyError> {
    let kind = req.notification_type;
    if !kind.is_party() {
        return Err(NotifyError::InvalidType(kind.as_str().into()));
    }
    let row = db::create_notification(
        &state.db,
        db::NewNotification {
            receiver_id: req.receiver_id,
            title: kind.default_title(),
            content: &req.content,
            comment_id: None,
            party_id: Some(req.party_id),
            actor_id: req.actor_id,
            notification_type: kind.as_str(),
        },
    )
    .await?;

    let dto = NotificationDto::from(&row);
    if req.activated {
        state.hub.dispatch(row.receiver_id, &dto);
    }
    Ok((StatusCode::CREATED, Json(dto)))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// DELETE /notifications/comment/{comment_id} — bulk delete every
/// notification tied to a removed comment.
pub async fn delete_by_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
) -> Result<Json<DeletedResponse>, NotifyError> {
    let deleted = db::delete_by_comment(&state.db, comment_id).await?;
    info!(comment_id, deleted, "deleted notifications for comment");
    Ok(Json(DeletedResponse { deleted }))
}

/// DELETE /notifications/party/{party_id} — bulk delete for a removed party.
pub async fn delete_by_party(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<i64>,
) -> Result<Json<DeletedResponse>, NotifyError> {
    let deleted = db::delete_by_party(&state.db, party_id).await?;
    info!(party_id, deleted, "deleted notifications for party");
    Ok(Json(DeletedResponse { deleted }))
}
