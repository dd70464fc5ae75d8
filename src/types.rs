//! Wire types for the notification service.
//!
//! Covers: creation requests from sibling services, the notification DTO
//! returned over REST and pushed over SSE, and the push-message envelope
//! handed from the hub to each live connection.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::db::NotificationRow;

// ═══════════════════════════════════════════════════════════════
// Notification kind
// ═══════════════════════════════════════════════════════════════

/// What happened. Stored as TEXT (matches the Postgres CHECK constraint)
/// and serialized in SCREAMING_SNAKE_CASE on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Comment,
    PartyRequest,
    PartyJoined,
    PartyApproved,
    PartyRefused,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "COMMENT",
            Self::PartyRequest => "PARTY_REQUEST",
            Self::PartyJoined => "PARTY_JOINED",
            Self::PartyApproved => "PARTY_APPROVED",
            Self::PartyRefused => "PARTY_REFUSED",
        }
    }

    /// Display title shown in the client notification list.
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Comment => "New comment on your post",
            Self::PartyRequest => "New join request for your party",
            Self::PartyJoined => "A member joined your party",
            Self::PartyApproved => "Your join request was approved",
            Self::PartyRefused => "Your join request was declined",
        }
    }

    pub fn is_party(&self) -> bool {
        !matches!(self, Self::Comment)
    }
}

// ═══════════════════════════════════════════════════════════════
// Service → service creation requests
// ═══════════════════════════════════════════════════════════════

/// POST /notifications/comment — sent by the board service after a comment
/// is persisted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNotificationRequest {
    pub receiver_id: i64,
    pub comment_id: i64,
    #[serde(default)]
    pub actor_id: Option<i64>,
    pub content: String,
    /// Whether the receiver has live delivery enabled. The record is stored
    /// either way; only `true` triggers a push.
    #[serde(default = "default_activated")]
    pub activated: bool,
}

/// POST /notifications/party — sent by the party service on membership
/// transitions. `type` must be one of the PARTY_* variants.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyNotificationRequest {
    pub receiver_id: i64,
    pub party_id: i64,
    #[serde(default)]
    pub actor_id: Option<i64>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub content: String,
    #[serde(default = "default_activated")]
    pub activated: bool,
}

fn default_activated() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════
// Outbound DTO
// ═══════════════════════════════════════════════════════════════

/// Notification as shown to the client — REST list responses and the SSE
/// `data:` payload share this shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub comment_id: Option<i64>,
    pub party_id: Option<i64>,
    pub actor_id: Option<i64>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub created_at: String,
    pub is_read: bool,
}

impl From<&NotificationRow> for NotificationDto {
    fn from(row: &NotificationRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            content: row.content.clone(),
            comment_id: row.comment_id,
            party_id: row.party_id,
            actor_id: row.actor_id,
            notification_type: row.notification_type.clone(),
            created_at: format_display_time(row.created_at),
            is_read: row.is_read,
        }
    }
}

/// Client-facing timestamps are rendered in the platform's home time zone.
const DISPLAY_UTC_OFFSET_SECS: i32 = 9 * 3600;

pub fn format_display_time(ts: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_UTC_OFFSET_SECS).expect("static display offset");
    ts.with_timezone(&offset).format("%Y.%m.%d %H:%M").to_string()
}

// ═══════════════════════════════════════════════════════════════
// Push envelope
// ═══════════════════════════════════════════════════════════════

/// One SSE event as queued on a connection's channel: the event id the
/// client will echo back in `Last-Event-ID`, plus the `data:` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub id: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_row() -> NotificationRow {
        NotificationRow {
            id: 11,
            receiver_id: 42,
            title: "New comment on your post".into(),
            content: "nice shot!".into(),
            comment_id: Some(7),
            party_id: None,
            actor_id: Some(3),
            notification_type: "COMMENT".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 3, 4, 0).unwrap(),
            is_read: false,
        }
    }

    #[test]
    fn dto_serializes_with_wire_field_names() {
        let dto = NotificationDto::from(&sample_row());
        let value = serde_json::to_value(&dto).unwrap();
        assert_eq!(value["id"], 11);
        assert_eq!(value["type"], "COMMENT");
        assert_eq!(value["commentId"], 7);
        assert_eq!(value["partyId"], serde_json::Value::Null);
        assert_eq!(value["actorId"], 3);
        assert_eq!(value["isRead"], false);
        assert_eq!(value["content"], "nice shot!");
    }

    #[test]
    fn display_time_uses_fixed_offset_and_minute_precision() {
        // 03:04 UTC is 12:04 in the UTC+9 display zone.
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 3, 4, 59).unwrap();
        assert_eq!(format_display_time(ts), "2026.03.01 12:04");
    }

    #[test]
    fn notification_type_wire_names() {
        for (kind, wire) in [
            (NotificationType::Comment, "COMMENT"),
            (NotificationType::PartyRequest, "PARTY_REQUEST"),
            (NotificationType::PartyJoined, "PARTY_JOINED"),
            (NotificationType::PartyApproved, "PARTY_APPROVED"),
            (NotificationType::PartyRefused, "PARTY_REFUSED"),
        ] {
            assert_eq!(kind.as_str(), wire);
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, wire);
            let parsed: NotificationType =
                serde_json::from_value(serde_json::Value::String(wire.into())).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn party_request_deserializes_with_defaults() {
        let req: PartyNotificationRequest = serde_json::from_str(
            r#"{"receiverId": 7, "partyId": 9, "type": "PARTY_APPROVED", "content": "see you there"}"#,
        )
        .unwrap();
        assert_eq!(req.receiver_id, 7);
        assert_eq!(req.notification_type, NotificationType::PartyApproved);
        assert!(req.activated);
        assert!(req.actor_id.is_none());
        assert!(req.notification_type.is_party());
    }
}
