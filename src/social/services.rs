use axum::extract::FromRef;
use rand::Rng;
use tracing::{info, warn};

use super::providers::{ProviderCredentials, SocialError, SocialProfile};
use crate::{
    auth::{
        jwt::JwtKeys,
        password::unusable_password_hash,
        repo_types::{NewUser, User},
        services::normalize_email,
    },
    db::RepoError,
    error::{ApiError, ApiResult},
    state::AppState,
};

const USERNAME_BASE_MAX: usize = 24;
const NUMBERED_ATTEMPTS: u32 = 20;

impl From<SocialError> for ApiError {
    fn from(e: SocialError) -> Self {
        match e {
            SocialError::Upstream(e) => ApiError::Internal(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Logs in the account matching the provider email, creating a verified
/// account on first use. Returns a session token.
pub async fn social_login(state: &AppState, creds: ProviderCredentials) -> ApiResult<String> {
    let provider = creds.provider();
    if creds.access_token().trim().is_empty() {
        return Err(ApiError::field("access_token", "This field may not be blank"));
    }

    let profile = state.social.profile(&creds).await?;
    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or(SocialError::MissingEmail(provider))?;

    let user = match state.users.find_by_email(&email).await? {
        Some(user) if !user.is_verified => claim_unverified(state, user).await?,
        Some(user) => user,
        None => create_social_user(state, &email, &profile).await?,
    };
    info!(user_id = %user.id, provider = provider.name(), "social login");
    Ok(JwtKeys::from_ref(state).sign(user.id)?)
}

// An unverified account loses its password once a provider confirms the email.
async fn claim_unverified(state: &AppState, user: User) -> ApiResult<User> {
    let password_hash = unusable_password_hash()?;
    if state.users.claim_unverified(user.id, &password_hash).await? {
        warn!(user_id = %user.id, "unverified account claimed by social login");
    }
    Ok(user)
}

async fn create_social_user(
    state: &AppState,
    email: &str,
    profile: &SocialProfile,
) -> ApiResult<User> {
    let base = username_base(profile.name.as_deref(), email);
    let password_hash = unusable_password_hash()?;

    let mut candidates: Vec<String> = (0..NUMBERED_ATTEMPTS)
        .map(|n| match n {
            0 => base.clone(),
            n => format!("{}{}", base, n),
        })
        .collect();
    candidates.push(format!(
        "{}{}",
        base,
        rand::thread_rng().gen_range(100_000..1_000_000)
    ));

    for username in candidates {
        if state.users.find_by_username(&username).await?.is_some() {
            continue;
        }
        let new = NewUser {
            email: email.to_string(),
            username,
            password_hash: password_hash.clone(),
            is_verified: true,
        };
        match state.users.create(new).await {
            Ok(user) => {
                info!(user_id = %user.id, "account created from social profile");
                return Ok(user);
            }
            Err(RepoError::Conflict("username")) => continue,
            Err(RepoError::Conflict("email")) => {
                // created concurrently by another login
                return state
                    .users
                    .find_by_email(email)
                    .await?
                    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user vanished after conflict")));
            }
            Err(e) => return Err(e.into()),
        }
    }
    warn!(%base, "no free username for social account");
    Err(ApiError::Conflict("username is already taken".into()))
}

/// Username stem from the display name, falling back to the email local part.
pub(crate) fn username_base(name: Option<&str>, email: &str) -> String {
    fn clean(raw: &str) -> String {
        raw.trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(USERNAME_BASE_MAX)
            .collect::<String>()
            .to_lowercase()
    }

    let from_name = name.map(clean).unwrap_or_default();
    let stem = if from_name.len() >= 3 {
        from_name
    } else {
        clean(email.split('@').next().unwrap_or_default())
    };
    if stem.len() >= 3 {
        stem
    } else {
        format!("user{}", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_base_prefers_display_name() {
        assert_eq!(
            username_base(Some("Ada Lovelace"), "ada@example.com"),
            "ada_lovelace"
        );
        assert_eq!(username_base(Some("  "), "ada.l@example.com"), "adal");
        assert_eq!(username_base(None, "x@example.com"), "userx");
        assert_eq!(username_base(Some("李"), "li@example.com"), "userli");
        assert!(username_base(Some(&"n".repeat(80)), "a@b.c").len() <= USERNAME_BASE_MAX);
    }
}
