use serde::{Deserialize, Serialize};

use super::repo_types::Notification;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub count: i64,
    pub results: Vec<Notification>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub email_notifications: Option<bool>,
    pub in_app_notifications: Option<bool>,
}
