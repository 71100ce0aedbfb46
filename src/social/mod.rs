use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod oauth1;
pub mod providers;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::social_routes()
}
