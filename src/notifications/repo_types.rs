use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub payload: Value,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub in_app_notifications: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl NotificationSettings {
    pub fn defaults(now: OffsetDateTime) -> Self {
        Self {
            email_notifications: true,
            in_app_notifications: true,
            updated_at: now,
        }
    }
}

/// Partial settings update; `None` keeps the stored flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsChanges {
    pub email_notifications: Option<bool>,
    pub in_app_notifications: Option<bool>,
}
