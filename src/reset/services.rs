use axum::extract::FromRef;
use tracing::{info, warn};
use validator::Validate;

use super::{
    dto::{PasswordData, ResetRequestUser},
    repo_types::RedeemOutcome,
    tokens::{TokenError, TokenHandler},
};
use crate::{
    auth::{password, services::normalize_email},
    db::RepoError,
    error::{ApiError, ApiResult},
    mail,
    state::AppState,
};

pub const RESET_LINK_SENT: &str =
    "If an account with that email exists, a password reset link has been sent to it";
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match";
pub const INVALID_RESET_LINK: &str = "This password reset link is invalid or has expired";
pub const USED_RESET_LINK: &str = "This password reset link has already been used";
pub const RESET_SUCCESSFUL: &str = "Your password has been reset";

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("{0}")]
    WeakPassword(&'static str),
    #[error("reset token rejected: {0}")]
    ExpiredOrInvalidToken(#[from] TokenError),
    #[error("no reset record for token")]
    UnknownToken,
    #[error("reset token already used")]
    AlreadyUsed,
    #[error("no user for reset token")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// Every invalid-link case maps to one message.
impl From<ResetError> for ApiError {
    fn from(e: ResetError) -> Self {
        match e {
            ResetError::PasswordMismatch => ApiError::Token(PASSWORDS_DO_NOT_MATCH),
            ResetError::WeakPassword(msg) => ApiError::field("password", msg),
            ResetError::ExpiredOrInvalidToken(_)
            | ResetError::UnknownToken
            | ResetError::UnknownUser => ApiError::Token(INVALID_RESET_LINK),
            ResetError::AlreadyUsed => ApiError::Token(USED_RESET_LINK),
            ResetError::Repo(e) => e.into(),
            ResetError::Internal(e) => ApiError::Internal(e),
        }
    }
}

/// Issues and mails a reset link. Answers the same way whether or not the
/// email belongs to an account.
pub async fn request_reset(state: &AppState, mut input: ResetRequestUser) -> ApiResult<()> {
    input.email = normalize_email(&input.email);
    input.validate()?;

    let Some(user) = state.users.find_by_email(&input.email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };

    let token = TokenHandler::from_ref(state)
        .issue(&user.email)
        .map_err(anyhow::Error::from)?;
    state.resets.create(user.id, &token).await?;

    let link = state.config.reset_link(&token);
    let email = mail::password_reset_email(&user.email, &user.username, &link);
    if let Err(e) = state.mailer.send(email).await {
        warn!(error = %e, user_id = %user.id, "password reset email not sent");
    }
    info!(user_id = %user.id, "password reset link issued");
    Ok(())
}

pub async fn redeem(state: &AppState, token: &str, data: PasswordData) -> Result<(), ResetError> {
    if data.new_password != data.confirm_password {
        return Err(ResetError::PasswordMismatch);
    }
    password::check_strength(&data.new_password).map_err(ResetError::WeakPassword)?;

    let email = TokenHandler::from_ref(state).verify(token).map_err(|e| {
        warn!(error = %e, "reset token rejected");
        e
    })?;

    let hash = password::hash_password(&data.new_password)?;
    match state.resets.redeem(token, &email, &hash).await? {
        RedeemOutcome::Redeemed => {
            info!("password reset completed");
            Ok(())
        }
        RedeemOutcome::UnknownToken => Err(ResetError::UnknownToken),
        RedeemOutcome::AlreadyUsed => Err(ResetError::AlreadyUsed),
        RedeemOutcome::UnknownUser => Err(ResetError::UnknownUser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestContext, STRONG_PASSWORD};

    fn data(new: &str, confirm: &str) -> PasswordData {
        PasswordData {
            new_password: new.into(),
            confirm_password: confirm.into(),
        }
    }

    #[tokio::test]
    async fn mismatch_is_checked_before_the_token() {
        let ctx = TestContext::new();
        let err = redeem(&ctx.state, "garbage", data(STRONG_PASSWORD, "Different!1A"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::PasswordMismatch));
    }

    #[tokio::test]
    async fn weak_password_is_checked_before_the_token() {
        let ctx = TestContext::new();
        let err = redeem(&ctx.state, "garbage", data("weakpass", "weakpass"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn unrecorded_token_is_unknown() {
        let ctx = TestContext::new();
        ctx.register("ada", "ada@example.com").await;
        let token = TokenHandler::from_ref(&ctx.state)
            .issue("ada@example.com")
            .unwrap();
        let err = redeem(&ctx.state, &token, data(STRONG_PASSWORD, STRONG_PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::UnknownToken));
    }

    #[tokio::test]
    async fn second_redemption_is_rejected() {
        let ctx = TestContext::new();
        ctx.register("ada", "ada@example.com").await;
        request_reset(
            &ctx.state,
            ResetRequestUser {
                email: "ada@example.com".into(),
            },
        )
        .await
        .unwrap();
        let token = ctx.last_reset_token().await;

        let new_password = "N3w!Password";
        redeem(&ctx.state, &token, data(new_password, new_password))
            .await
            .unwrap();
        let err = redeem(&ctx.state, &token, data(new_password, new_password))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::AlreadyUsed));
    }

    #[tokio::test]
    async fn concurrent_redemptions_succeed_once() {
        let ctx = TestContext::new();
        ctx.register("ada", "ada@example.com").await;
        request_reset(
            &ctx.state,
            ResetRequestUser {
                email: "ada@example.com".into(),
            },
        )
        .await
        .unwrap();
        let token = ctx.last_reset_token().await;

        let (a, b) = tokio::join!(
            redeem(&ctx.state, &token, data("Fir5t!Password", "Fir5t!Password")),
            redeem(&ctx.state, &token, data("Sec0nd!Password", "Sec0nd!Password")),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[test]
    fn invalid_link_cases_share_a_message() {
        let cases = [
            ResetError::ExpiredOrInvalidToken(TokenError::Expired),
            ResetError::ExpiredOrInvalidToken(TokenError::Malformed),
            ResetError::UnknownToken,
            ResetError::UnknownUser,
        ];
        for case in cases {
            let api: ApiError = case.into();
            assert_eq!(api.to_string(), INVALID_RESET_LINK);
        }
        let used: ApiError = ResetError::AlreadyUsed.into();
        assert_eq!(used.to_string(), USED_RESET_LINK);
    }
}
