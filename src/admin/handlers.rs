use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{parse_role, AdminListQuery, RejectRequest, RoleRequest},
    services,
};
use crate::{
    auth::{dto::PublicUser, extractors::AdminUser},
    diaries::dto::{ModerationSummary, Page, StatusChange},
    error::AppResult,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/diaries", get(list_diaries))
        .route("/admin/diaries/:id", axum::routing::delete(soft_delete))
        .route("/admin/diaries/:id/approve", put(approve))
        .route("/admin/diaries/:id/reject", put(reject))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", put(update_role))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn list_diaries(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(q): Query<AdminListQuery>,
) -> AppResult<Json<Page<ModerationSummary>>> {
    let page = q.pagination().validate()?;
    let status = q.status_filter()?;
    services::list_by_status(&state.db, status, page)
        .await
        .map(Json)
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn approve(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusChange>> {
    services::approve(&state.db, id).await.map(Json)
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.user_id))]
pub async fn reject(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> AppResult<Json<StatusChange>> {
    services::reject(&state.db, id, payload.reason).await.map(Json)
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn soft_delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusChange>> {
    services::soft_delete(&state.db, id).await.map(Json)
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    services::list_users(&state.db).await.map(Json)
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.user_id))]
pub async fn update_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleRequest>,
) -> AppResult<Json<PublicUser>> {
    let role = parse_role(&payload.role)?;
    services::update_user_role(&state.db, id, role)
        .await
        .map(Json)
}
