use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        Deleted, DiaryDetails, DiaryReceipt, MyDiarySummary, Page, PageQuery, PublicDiarySummary,
        SearchQuery,
    },
    form::DiaryForm,
    services,
};
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppResult,
    state::AppState,
    uploads::handlers::body_limit,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/diaries", get(list_diaries))
        .route("/diaries/my", get(my_diaries))
        .route("/diaries/:id", get(get_diary).delete(delete_diary))
}

pub fn write_routes(max_file_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/diaries", axum::routing::post(create_diary))
        .route("/diaries/:id", axum::routing::put(update_diary))
        .layer(body_limit(max_file_bytes))
}

// --- handlers ---

/// GET /diaries?keyword=&page=&pageSize=
#[instrument(skip(state))]
pub async fn list_diaries(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Page<PublicDiarySummary>>> {
    let page = q.pagination().validate()?;
    services::search(&state, &q.keyword, page).await.map(Json)
}

#[instrument(skip(state, requester), fields(user_id = %requester.user_id))]
pub async fn my_diaries(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Page<MyDiarySummary>>> {
    let page = q.validate()?;
    services::list_mine(&state, &requester, page).await.map(Json)
}

#[instrument(skip(state, requester))]
pub async fn get_diary(
    State(state): State<AppState>,
    MaybeAuthUser(requester): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DiaryDetails>> {
    services::get_by_id(&state, id, requester.as_ref())
        .await
        .map(Json)
}

/// POST /diaries (JSON or multipart)
#[instrument(skip(state, requester, form), fields(user_id = %requester.user_id))]
pub async fn create_diary(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    form: DiaryForm,
) -> AppResult<(StatusCode, HeaderMap, Json<DiaryReceipt>)> {
    let diary = services::create(&state, &requester, form).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/diaries/{}", diary.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(DiaryReceipt::from(diary))))
}

#[instrument(skip(state, requester, form), fields(user_id = %requester.user_id))]
pub async fn update_diary(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    form: DiaryForm,
) -> AppResult<Json<DiaryReceipt>> {
    services::update(&state, id, &requester, form)
        .await
        .map(|d| Json(DiaryReceipt::from(d)))
}

#[instrument(skip(state, requester), fields(user_id = %requester.user_id))]
pub async fn delete_diary(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Deleted>> {
    services::delete(&state, id, &requester).await?;
    Ok(Json(Deleted { message: "deleted" }))
}
