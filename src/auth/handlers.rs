use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            UpdateMeRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        services,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).put(update_me))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from(&state.config.jwt);
    services::register(&state.db, &keys, payload).await.map(Json)
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from(&state.config.jwt);
    services::login(&state.db, &keys, payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from(&state.config.jwt);
    services::refresh(&state.db, &keys, &payload.refresh_token)
        .await
        .map(Json)
}

#[instrument(skip(state, requester), fields(user_id = %requester.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> AppResult<Json<PublicUser>> {
    services::me(&state.db, &requester).await.map(Json)
}

#[instrument(skip(state, requester, payload), fields(user_id = %requester.user_id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> AppResult<Json<PublicUser>> {
    services::update_me(&state.db, &requester, payload)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use crate::auth::claims::Role;

    use super::*;

    #[test]
    fn public_user_hides_password_and_uses_camel_case() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            username: "wanderer".into(),
            nickname: "Wanderer".into(),
            avatar_url: "/uploads/a.jpg".into(),
            role: Role::User,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["avatarUrl"], "/uploads/a.jpg");
        assert_eq!(json["role"], "user");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert!(json.get("password_hash").is_none());
    }
}
