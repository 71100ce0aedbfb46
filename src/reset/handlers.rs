use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{RedeemRequest, ResetMessage, ResetRequest},
    services::{self, RESET_LINK_SENT, RESET_SUCCESSFUL},
};
use crate::{error::ApiResult, extract::ApiJson, state::AppState};

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/password-reset", post(request_reset))
        .route("/password-reset/:token", patch(redeem))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetRequest>,
) -> ApiResult<(StatusCode, Json<ResetMessage>)> {
    services::request_reset(&state, payload.user).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ResetMessage {
            message: RESET_LINK_SENT,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn redeem(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<RedeemRequest>,
) -> ApiResult<Json<ResetMessage>> {
    services::redeem(&state, &token, payload.password_data).await?;
    Ok(Json(ResetMessage {
        message: RESET_SUCCESSFUL,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::reset::services::{
        INVALID_RESET_LINK, PASSWORDS_DO_NOT_MATCH, RESET_LINK_SENT, USED_RESET_LINK,
    };
    use crate::testing::{TestContext, STRONG_PASSWORD};

    async fn request_for(ctx: &TestContext, email: &str) -> (StatusCode, serde_json::Value) {
        ctx.request(
            Method::POST,
            "/api/v1/password-reset",
            None,
            Some(json!({"user": {"email": email}})),
        )
        .await
    }

    async fn redeem(
        ctx: &TestContext,
        token: &str,
        new: &str,
        confirm: &str,
    ) -> (StatusCode, serde_json::Value) {
        ctx.request(
            Method::PATCH,
            &format!("/api/v1/password-reset/{}", token),
            None,
            Some(json!({"password_data": {"new_password": new, "confirm_password": confirm}})),
        )
        .await
    }

    #[tokio::test]
    async fn unknown_email_gets_the_same_answer() {
        let ctx = TestContext::new();
        ctx.register("ada", "ada@example.com").await;

        let known = request_for(&ctx, "ada@example.com").await;
        let unknown = request_for(&ctx, "nobody@example.com").await;
        assert_eq!(known.0, StatusCode::ACCEPTED);
        assert_eq!(known, unknown);
        assert_eq!(known.1["message"], RESET_LINK_SENT);

        // only the real account got mail: verification + reset
        let sent = ctx.outbox.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.to == "ada@example.com"));
    }

    #[tokio::test]
    async fn invalid_email_is_a_field_error() {
        let ctx = TestContext::new();
        let (status, body) = request_for(&ctx, "not-an-email").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["email"].is_array());
    }

    #[tokio::test]
    async fn full_reset_flow() {
        let ctx = TestContext::new();
        ctx.register("ada", "ada@example.com").await;
        request_for(&ctx, "ada@example.com").await;
        let token = ctx.last_reset_token().await;

        let new_password = "Brand!New1";
        let (status, body) = redeem(&ctx, &token, new_password, new_password).await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, _) = ctx.login("ada@example.com", STRONG_PASSWORD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = ctx.login("ada@example.com", new_password).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = redeem(&ctx, &token, new_password, new_password).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], USED_RESET_LINK);
    }

    #[tokio::test]
    async fn mismatch_wins_over_a_garbage_token() {
        let ctx = TestContext::new();
        let (status, body) = redeem(&ctx, "garbage", STRONG_PASSWORD, "Other!Pass1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], PASSWORDS_DO_NOT_MATCH);
    }

    #[tokio::test]
    async fn garbage_token_is_an_invalid_link() {
        let ctx = TestContext::new();
        let (status, body) = redeem(&ctx, "garbage", STRONG_PASSWORD, STRONG_PASSWORD).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], INVALID_RESET_LINK);
    }

    #[tokio::test]
    async fn weak_password_reports_field_detail() {
        let ctx = TestContext::new();
        let (status, body) = redeem(&ctx, "garbage", "alllower!", "alllower!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["password"][0].as_str().is_some());
    }
}
