use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{PasswordResetRecord, RedeemOutcome};
use crate::db::{map_unique, PgStore, RepoResult};

#[async_trait]
pub trait ResetRepo: Send + Sync {
    async fn create(&self, user_id: Uuid, token: &str) -> RepoResult<PasswordResetRecord>;
    /// Looks the record up, rejects a used one, stores `password_hash` on the
    /// owning user whose email is `email` and marks the record used. All or
    /// nothing.
    async fn redeem(
        &self,
        token: &str,
        email: &str,
        password_hash: &str,
    ) -> RepoResult<RedeemOutcome>;
}

#[async_trait]
impl ResetRepo for PgStore {
    async fn create(&self, user_id: Uuid, token: &str) -> RepoResult<PasswordResetRecord> {
        let record = sqlx::query_as::<_, PasswordResetRecord>(
            r#"
            INSERT INTO password_resets (id, user_id, token)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, used
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(record)
    }

    async fn redeem(
        &self,
        token: &str,
        email: &str,
        password_hash: &str,
    ) -> RepoResult<RedeemOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent redemptions of the same token.
        let record = sqlx::query_as::<_, PasswordResetRecord>(
            r#"
            SELECT id, user_id, token, used
            FROM password_resets
            WHERE token = $1
            FOR UPDATE
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            return Ok(RedeemOutcome::UnknownToken);
        };
        if record.used {
            return Ok(RedeemOutcome::AlreadyUsed);
        }

        let updated = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3, updated_at = now()
             WHERE id = $1 AND email = $2
            "#,
        )
        .bind(record.user_id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(RedeemOutcome::UnknownUser);
        }

        sqlx::query("UPDATE password_resets SET used = TRUE, updated_at = now() WHERE id = $1")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RedeemOutcome::Redeemed)
    }
}
