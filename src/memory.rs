//! In-process store used when no database is configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{AccountChanges, NewUser, Profile, User},
    },
    db::{RepoError, RepoResult},
    notifications::{
        repo::NotificationRepo,
        repo_types::{Notification, NotificationSettings, SettingsChanges},
    },
    reset::{
        repo::ResetRepo,
        repo_types::{PasswordResetRecord, RedeemOutcome},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    resets: Vec<PasswordResetRecord>,
    // insertion order, oldest first
    notifications: Vec<Notification>,
    settings: HashMap<Uuid, NotificationSettings>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn newest_first(&self, user_id: Uuid) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .rev()
            .filter(move |n| n.user_id == user_id)
    }
}

/// Every repository behind one lock, so multi-step operations are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut t = self.tables.write().await;
        if t.email_taken(&new.email, None) {
            return Err(RepoError::Conflict("email"));
        }
        if t.username_taken(&new.username, None) {
            return Err(RepoError::Conflict("username"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            is_verified: new.is_verified,
            created_at: now,
            updated_at: now,
        };
        t.profiles.insert(user.id, Profile::default());
        t.settings
            .insert(user.id, NotificationSettings::defaults(now));
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn profile(&self, user_id: Uuid) -> RepoResult<Profile> {
        let t = self.tables.read().await;
        Ok(t.profiles.get(&user_id).cloned().unwrap_or_default())
    }

    async fn update_account(
        &self,
        user_id: Uuid,
        changes: &AccountChanges,
    ) -> RepoResult<(User, Profile)> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) {
            return Err(RepoError::NotFound);
        }
        if let Some(email) = &changes.email {
            if t.email_taken(email, Some(user_id)) {
                return Err(RepoError::Conflict("email"));
            }
        }
        if let Some(username) = &changes.username {
            if t.username_taken(username, Some(user_id)) {
                return Err(RepoError::Conflict("username"));
            }
        }

        let user = t.users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        user.updated_at = OffsetDateTime::now_utc();
        let user = user.clone();

        let profile = t.profiles.entry(user_id).or_default();
        profile.apply(&changes.profile);
        Ok((user, profile.clone()))
    }

    async fn mark_verified(&self, user_id: Uuid) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&user_id) {
            Some(user) if !user.is_verified => {
                user.is_verified = true;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_unverified(&self, user_id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&user_id) {
            Some(user) if !user.is_verified => {
                user.is_verified = true;
                user.password_hash = password_hash.to_string();
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ResetRepo for MemoryStore {
    async fn create(&self, user_id: Uuid, token: &str) -> RepoResult<PasswordResetRecord> {
        let mut t = self.tables.write().await;
        if t.resets.iter().any(|r| r.token == token) {
            return Err(RepoError::Conflict("token"));
        }
        let record = PasswordResetRecord {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            used: false,
        };
        t.resets.push(record.clone());
        Ok(record)
    }

    async fn redeem(
        &self,
        token: &str,
        email: &str,
        password_hash: &str,
    ) -> RepoResult<RedeemOutcome> {
        let mut t = self.tables.write().await;
        let Some(idx) = t.resets.iter().position(|r| r.token == token) else {
            return Ok(RedeemOutcome::UnknownToken);
        };
        if t.resets[idx].used {
            return Ok(RedeemOutcome::AlreadyUsed);
        }
        let owner = t.resets[idx].user_id;
        let now = OffsetDateTime::now_utc();
        match t.users.get_mut(&owner) {
            Some(user) if user.email == email => {
                user.password_hash = password_hash.to_string();
                user.updated_at = now;
            }
            _ => return Ok(RedeemOutcome::UnknownUser),
        }
        t.resets[idx].used = true;
        Ok(RedeemOutcome::Redeemed)
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn create(&self, user_id: Uuid, payload: Value) -> RepoResult<Notification> {
        let mut t = self.tables.write().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            payload,
            is_read: false,
            created_at: OffsetDateTime::now_utc(),
        };
        t.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(i64, Vec<Notification>)> {
        let t = self.tables.read().await;
        let count = t.newest_first(user_id).count() as i64;
        let page = t
            .newest_first(user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((count, page))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<Vec<Notification>> {
        let mut t = self.tables.write().await;
        for n in t.notifications.iter_mut().filter(|n| n.user_id == user_id) {
            n.is_read = true;
        }
        Ok(t.newest_first(user_id).cloned().collect())
    }

    async fn settings(&self, user_id: Uuid) -> RepoResult<NotificationSettings> {
        let mut t = self.tables.write().await;
        let settings = t
            .settings
            .entry(user_id)
            .or_insert_with(|| NotificationSettings::defaults(OffsetDateTime::now_utc()));
        Ok(settings.clone())
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        changes: SettingsChanges,
    ) -> RepoResult<NotificationSettings> {
        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let settings = t
            .settings
            .entry(user_id)
            .or_insert_with(|| NotificationSettings::defaults(now));
        if let Some(v) = changes.email_notifications {
            settings.email_notifications = v;
        }
        if let Some(v) = changes.in_app_notifications {
            settings.in_app_notifications = v;
        }
        settings.updated_at = now;
        Ok(settings.clone())
    }
}
