use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::{
    dto::{FacebookRequest, GoogleRequest, TokenResponse, TwitterRequest},
    services::social_login,
};
use crate::{error::ApiResult, extract::ApiJson, state::AppState};

pub fn social_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", post(google))
        .route("/auth/facebook", post(facebook))
        .route("/auth/twitter", post(twitter))
}

#[instrument(skip_all)]
pub async fn google(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<GoogleRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = social_login(&state, payload.into()).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all)]
pub async fn facebook(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<FacebookRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = social_login(&state, payload.into()).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all)]
pub async fn twitter(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TwitterRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = social_login(&state, payload.into()).await?;
    Ok(Json(TokenResponse { token }))
}
