use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod services;

pub fn router(max_file_bytes: usize) -> Router<AppState> {
    handlers::upload_routes(max_file_bytes)
}
