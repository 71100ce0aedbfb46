use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
            UpdateUserRequest, UserResponse,
        },
        extractors::AuthUser,
        services::{self, EMAIL_VERIFIED},
    },
    error::ApiResult,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify/:uidb64/:token", get(verify_email))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user", get(get_user).patch(update_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let response = services::register(&state, payload.user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(services::login(&state, payload.user).await?))
}

#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    services::verify_email(&state, &uidb64, &token).await?;
    Ok((StatusCode::ACCEPTED, Json(MessageResponse::new(EMAIL_VERIFIED))))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(services::current_user(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(services::update_account(&state, user_id, payload).await?))
}
