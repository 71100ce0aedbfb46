use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    dto::{
        LoginResponse, LoginUser, PublicUser, RegisterResponse, RegisterUser, UpdateUserRequest,
        UserResponse,
    },
    jwt::JwtKeys,
    password::{check_strength, hash_password, verify_password},
    repo_types::{AccountChanges, NewUser, Profile, User},
    verification::{decode_uid, encode_uid, VerificationTokens},
};
use crate::{
    db::RepoError,
    error::{ApiError, ApiResult},
    mail,
    state::AppState,
};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const EMAIL_VERIFIED: &str = "Email successfully verified";
pub const LOGGED_IN: &str = "you have successfully logged in!";
const USERNAME_CHARSET: &str =
    "Username may only contain letters, numbers, underscores and hyphens";

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid verification link")]
    InvalidLink,
    #[error("Verification link has expired")]
    ExpiredLink,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        let message = e.to_string();
        match e {
            VerifyError::InvalidLink => ApiError::NotFound(message),
            VerifyError::ExpiredLink => ApiError::Forbidden(message),
            VerifyError::Repo(e) => e.into(),
        }
    }
}

pub async fn register(state: &AppState, mut input: RegisterUser) -> ApiResult<RegisterResponse> {
    input.email = normalize_email(&input.email);
    input.username = input.username.trim().to_string();
    input.validate()?;
    if !is_valid_username(&input.username) {
        return Err(ApiError::field("username", USERNAME_CHARSET));
    }
    check_strength(&input.password).map_err(|msg| ApiError::field("password", msg))?;

    if state.users.find_by_email(&input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(RepoError::Conflict("email").into());
    }
    if state.users.find_by_username(&input.username).await?.is_some() {
        warn!(username = %input.username, "username already taken");
        return Err(RepoError::Conflict("username").into());
    }

    let user = state
        .users
        .create(NewUser {
            email: input.email,
            username: input.username,
            password_hash: hash_password(&input.password)?,
            is_verified: false,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    // Delivery failures do not fail registration.
    if let Err(e) = send_verification(state, &user).await {
        warn!(error = %e, user_id = %user.id, "verification email not sent");
    }

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(RegisterResponse {
        token,
        message: format!("A verification email has been sent to {}", user.email),
        data: PublicUser::from(&user),
    })
}

async fn send_verification(state: &AppState, user: &User) -> anyhow::Result<()> {
    let token = VerificationTokens::from_ref(state).make_token(user, OffsetDateTime::now_utc())?;
    let link = state.config.verification_link(&encode_uid(user.id), &token);
    debug!(user_id = %user.id, "verification link issued");
    state
        .mailer
        .send(mail::verification_email(&user.email, &user.username, &link))
        .await
}

pub async fn login(state: &AppState, mut input: LoginUser) -> ApiResult<LoginResponse> {
    input.email = normalize_email(&input.email);
    input.validate()?;

    let Some(user) = state.users.find_by_email(&input.email).await? else {
        warn!(email = %input.email, "login unknown email");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    };
    if !verify_password(&input.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        token,
        message: LOGGED_IN.into(),
    })
}

/// Consumes a verification link. Replaying a consumed link reports
/// [`VerifyError::ExpiredLink`] because the token no longer matches the
/// verified account.
pub async fn verify_email(state: &AppState, uidb64: &str, token: &str) -> Result<(), VerifyError> {
    let user_id = decode_uid(uidb64).ok_or(VerifyError::InvalidLink)?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(VerifyError::InvalidLink)?;

    let tokens = VerificationTokens::from_ref(state);
    if !tokens.check_token(&user, token, OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "verification token rejected");
        return Err(VerifyError::ExpiredLink);
    }
    if !state.users.mark_verified(user.id).await? {
        // lost the race against a concurrent verification
        return Err(VerifyError::ExpiredLink);
    }
    info!(user_id = %user.id, "email verified");
    Ok(())
}

pub async fn current_user(state: &AppState, user_id: Uuid) -> ApiResult<UserResponse> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let profile = state.users.profile(user_id).await?;
    Ok(UserResponse {
        user: PublicUser::from(&user),
        profile,
    })
}

pub async fn update_account(
    state: &AppState,
    user_id: Uuid,
    req: UpdateUserRequest,
) -> ApiResult<UserResponse> {
    req.validate()?;
    let username = req.username.map(|u| u.trim().to_string());
    if let Some(name) = &username {
        if !is_valid_username(name) {
            return Err(ApiError::field("username", USERNAME_CHARSET));
        }
    }

    let changes = AccountChanges {
        username,
        email: req.email.as_deref().map(normalize_email),
        profile: Profile {
            first_name: req.first_name,
            last_name: req.last_name,
            birth_date: req.birth_date,
            bio: req.bio,
            image: req.image,
            city: req.city,
            country: req.country,
            phone: req.phone,
            website: req.website,
        },
    };
    let (user, profile) = state
        .users
        .update_account(user_id, &changes)
        .await
        .map_err(|e| match e {
            RepoError::NotFound => ApiError::NotFound("User not found".into()),
            other => other.into(),
        })?;
    info!(user_id = %user.id, "account updated");
    Ok(UserResponse {
        user: PublicUser::from(&user),
        profile,
    })
}
