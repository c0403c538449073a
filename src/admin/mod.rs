use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod services;

/// Moderation and user management. Every route requires an admin token.
pub fn router() -> Router<AppState> {
    handlers::admin_routes()
}
