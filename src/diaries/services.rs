use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{like_pattern, DiaryDetails, MyDiarySummary, Page, PageRequest, PublicDiarySummary},
    form::DiaryForm,
    policy,
    repo_types::Diary,
};
use crate::{
    auth::claims::Requester,
    error::{AppError, AppResult},
    state::AppState,
    uploads::services::discard,
};

fn diary_not_found() -> AppError {
    AppError::not_found("diary not found")
}

/// A guarded write matched nothing: the diary was removed or moved to a
/// state that no longer accepts the write since it was read.
pub(crate) async fn lost_race(db: &PgPool, id: Uuid) -> AppError {
    match Diary::find_by_id(db, id).await {
        Ok(Some(d)) => {
            warn!(diary_id = %id, status = ?d.status, "diary changed during write");
            AppError::InvalidState(format!("diary is now {:?}", d.status).to_lowercase())
        }
        Ok(None) => diary_not_found(),
        Err(e) => e.into(),
    }
}

async fn discard_on_error<T>(
    st: &AppState,
    stored: &[String],
    result: AppResult<T>,
) -> AppResult<T> {
    if result.is_err() && !stored.is_empty() {
        discard(st.storage.as_ref(), stored).await;
    }
    result
}

/// New diaries always start in the review queue.
pub async fn create(st: &AppState, requester: &Requester, form: DiaryForm) -> AppResult<Diary> {
    if form.image_files.is_empty() && form.input.images.as_ref().map_or(true, Vec::is_empty) {
        return Err(AppError::invalid("at least one image is required"));
    }
    let (input, stored) = form.into_input(st.storage.as_ref()).await?;
    let inserted = match policy::new_draft(input) {
        Ok(draft) => Diary::insert(&st.db, requester.user_id, &draft)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };
    let diary = discard_on_error(st, &stored, inserted).await?;
    info!(diary_id = %diary.id, author_id = %requester.user_id, "diary created");
    Ok(diary)
}

/// Author edit. Always sends the diary back to pending.
pub async fn update(
    st: &AppState,
    id: Uuid,
    requester: &Requester,
    form: DiaryForm,
) -> AppResult<Diary> {
    let existing = Diary::find_by_id(&st.db, id)
        .await?
        .ok_or_else(diary_not_found)?;
    let allow_approved = st.config.allow_edit_approved;
    policy::ensure_author(&existing, requester)?;
    policy::ensure_editable(existing.status, allow_approved)?;

    let (input, stored) = form.into_input(st.storage.as_ref()).await?;
    let updated = match policy::edit_draft(&existing, requester, input, allow_approved) {
        Ok(draft) => match Diary::update_content(&st.db, id, &draft, allow_approved).await {
            Ok(Some(diary)) => Ok(diary),
            Ok(None) => Err(lost_race(&st.db, id).await),
            Err(e) => Err(e.into()),
        },
        Err(e) => Err(e),
    };
    let diary = discard_on_error(st, &stored, updated).await?;
    info!(diary_id = %id, previous = ?existing.status, "diary edited, back to pending");
    Ok(diary)
}

pub async fn delete(st: &AppState, id: Uuid, requester: &Requester) -> AppResult<()> {
    let existing = Diary::find_by_id(&st.db, id)
        .await?
        .ok_or_else(diary_not_found)?;
    policy::ensure_can_delete(&existing, requester)?;
    if !Diary::delete(&st.db, id).await? {
        return Err(diary_not_found());
    }
    info!(diary_id = %id, by = %requester.user_id, admin = requester.is_admin(), "diary removed");
    Ok(())
}

pub async fn get_by_id(
    st: &AppState,
    id: Uuid,
    requester: Option<&Requester>,
) -> AppResult<DiaryDetails> {
    let row = Diary::find_detail(&st.db, id)
        .await?
        .ok_or_else(diary_not_found)?;
    if !policy::can_view(&row.diary, requester) {
        warn!(diary_id = %id, status = ?row.diary.status, "hidden diary requested");
        return Err(AppError::forbidden("you may not view this diary"));
    }
    Ok(DiaryDetails::from(row))
}

/// Public listing of approved diaries. A blank keyword is the same query
/// without a filter, so paging lines up with the plain listing.
pub async fn search(
    st: &AppState,
    keyword: &str,
    page: PageRequest,
) -> AppResult<Page<PublicDiarySummary>> {
    let pattern = like_pattern(keyword);
    let (total, rows) =
        Diary::search_public(&st.db, pattern.as_deref(), page.limit(), page.offset()).await?;
    Ok(Page::new(
        page,
        total,
        rows.into_iter().map(PublicDiarySummary::from).collect(),
    ))
}

pub async fn list_mine(
    st: &AppState,
    requester: &Requester,
    page: PageRequest,
) -> AppResult<Page<MyDiarySummary>> {
    let (total, rows) =
        Diary::list_by_author(&st.db, requester.user_id, page.limit(), page.offset()).await?;
    Ok(Page::new(
        page,
        total,
        rows.into_iter().map(MyDiarySummary::from).collect(),
    ))
}
