use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::repo_types::{Notification, NotificationSettings, SettingsChanges};
use crate::db::{PgStore, RepoResult};

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create(&self, user_id: Uuid, payload: Value) -> RepoResult<Notification>;
    /// Newest first, with the total count for the user.
    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(i64, Vec<Notification>)>;
    /// Marks every notification of the user read and returns all of them.
    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<Vec<Notification>>;
    /// Settings of the user, created with defaults on first access.
    async fn settings(&self, user_id: Uuid) -> RepoResult<NotificationSettings>;
    async fn update_settings(
        &self,
        user_id: Uuid,
        changes: SettingsChanges,
    ) -> RepoResult<NotificationSettings>;
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn create(&self, user_id: Uuid, payload: Value) -> RepoResult<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, payload)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, payload, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(i64, Vec<Notification>)> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, payload, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((count, rows))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<Vec<Notification>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, payload, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn settings(&self, user_id: Uuid) -> RepoResult<NotificationSettings> {
        let row = sqlx::query_as::<_, NotificationSettings>(
            r#"
            INSERT INTO notification_settings (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING email_notifications, in_app_notifications, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        changes: SettingsChanges,
    ) -> RepoResult<NotificationSettings> {
        let row = sqlx::query_as::<_, NotificationSettings>(
            r#"
            INSERT INTO notification_settings (user_id, email_notifications, in_app_notifications)
            VALUES ($1, COALESCE($2, TRUE), COALESCE($3, TRUE))
            ON CONFLICT (user_id) DO UPDATE
               SET email_notifications  = COALESCE($2, notification_settings.email_notifications),
                   in_app_notifications = COALESCE($3, notification_settings.in_app_notifications),
                   updated_at = now()
            RETURNING email_notifications, in_app_notifications, updated_at
            "#,
        )
        .bind(user_id)
        .bind(changes.email_notifications)
        .bind(changes.in_app_notifications)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
