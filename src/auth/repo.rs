use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{AccountChanges, NewUser, Profile, User};
use crate::db::{map_unique, PgStore, RepoError, RepoResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inserts the user together with an empty profile and default
    /// notification settings.
    async fn create(&self, new: NewUser) -> RepoResult<User>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn profile(&self, user_id: Uuid) -> RepoResult<Profile>;
    async fn update_account(
        &self,
        user_id: Uuid,
        changes: &AccountChanges,
    ) -> RepoResult<(User, Profile)>;
    /// Flips `is_verified` to true. Returns false when the user was already
    /// verified (or does not exist), so only one caller ever wins.
    async fn mark_verified(&self, user_id: Uuid) -> RepoResult<bool>;
    /// Verifies a still-unverified account and replaces its password hash.
    /// Returns false when the account was already verified.
    async fn claim_unverified(&self, user_id: Uuid, password_hash: &str) -> RepoResult<bool>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, password_hash, is_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, username, password_hash, is_verified, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.is_verified)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique)?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO notification_settings (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, is_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, is_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, is_verified, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn profile(&self, user_id: Uuid) -> RepoResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT first_name, last_name, birth_date, bio, image, city, country, phone, website
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile.unwrap_or_default())
    }

    async fn update_account(
        &self,
        user_id: Uuid,
        changes: &AccountChanges,
    ) -> RepoResult<(User, Profile)> {
        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, email, username, password_hash, is_verified, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_unique)?
        .ok_or(RepoError::NotFound)?;

        let p = &changes.profile;
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, first_name, last_name, birth_date, bio, image,
                                  city, country, phone, website)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE
               SET first_name = COALESCE(EXCLUDED.first_name, profiles.first_name),
                   last_name  = COALESCE(EXCLUDED.last_name, profiles.last_name),
                   birth_date = COALESCE(EXCLUDED.birth_date, profiles.birth_date),
                   bio        = COALESCE(EXCLUDED.bio, profiles.bio),
                   image      = COALESCE(EXCLUDED.image, profiles.image),
                   city       = COALESCE(EXCLUDED.city, profiles.city),
                   country    = COALESCE(EXCLUDED.country, profiles.country),
                   phone      = COALESCE(EXCLUDED.phone, profiles.phone),
                   website    = COALESCE(EXCLUDED.website, profiles.website),
                   updated_at = now()
            RETURNING first_name, last_name, birth_date, bio, image, city, country, phone, website
            "#,
        )
        .bind(user_id)
        .bind(p.first_name.as_deref())
        .bind(p.last_name.as_deref())
        .bind(p.birth_date)
        .bind(p.bio.as_deref())
        .bind(p.image.as_deref())
        .bind(p.city.as_deref())
        .bind(p.country.as_deref())
        .bind(p.phone.as_deref())
        .bind(p.website.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, profile))
    }

    async fn mark_verified(&self, user_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET is_verified = TRUE, updated_at = now()
             WHERE id = $1 AND is_verified = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_unverified(&self, user_id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET is_verified = TRUE, password_hash = $2, updated_at = now()
             WHERE id = $1 AND is_verified = FALSE
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
