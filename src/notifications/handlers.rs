use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{NotificationList, Pagination, UpdateSettingsRequest},
    repo_types::{NotificationSettings, SettingsChanges},
};
use crate::{auth::extractors::AuthUser, error::ApiResult, extract::ApiJson, state::AppState};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).patch(mark_all_read),
        )
        .route(
            "/notification-settings",
            get(get_settings).patch(update_settings),
        )
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<NotificationList>> {
    let (count, results) = state
        .notifications
        .list(user_id, p.limit(), p.offset())
        .await?;
    Ok(Json(NotificationList { count, results }))
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<NotificationList>> {
    let results = state.notifications.mark_all_read(user_id).await?;
    info!(%user_id, count = results.len(), "notifications marked read");
    Ok(Json(NotificationList {
        count: results.len() as i64,
        results,
    }))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<NotificationSettings>> {
    Ok(Json(state.notifications.settings(user_id).await?))
}

#[instrument(skip(state))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<NotificationSettings>> {
    let changes = SettingsChanges {
        email_notifications: body.email_notifications,
        in_app_notifications: body.in_app_notifications,
    };
    let settings = state.notifications.update_settings(user_id, changes).await?;
    info!(%user_id, "notification settings updated");
    Ok(Json(settings))
}
