use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{claims::Role, dto::PublicUser, repo_types::User},
    diaries::{
        dto::{ModerationSummary, Page, PageRequest, StatusChange},
        policy::{self, ModerationAction},
        repo_types::{Diary, DiaryStatus},
        services::lost_race,
    },
    error::{AppError, AppResult},
};

pub async fn list_by_status(
    db: &PgPool,
    status: Option<DiaryStatus>,
    page: PageRequest,
) -> AppResult<Page<ModerationSummary>> {
    let (total, rows) = Diary::list_by_status(db, status, page.limit(), page.offset()).await?;
    Ok(Page::new(
        page,
        total,
        rows.into_iter().map(ModerationSummary::from).collect(),
    ))
}

/// Loads the diary, applies the transition and persists it.
pub async fn moderate(db: &PgPool, id: Uuid, action: ModerationAction) -> AppResult<StatusChange> {
    let existing = Diary::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("diary not found"))?;
    let next = policy::moderate(existing.status, action)?;

    let diary = match Diary::set_status(db, id, next.status, next.reason.as_deref()).await? {
        Some(diary) => diary,
        None => return Err(lost_race(db, id).await),
    };
    info!(diary_id = %id, from = ?existing.status, to = ?diary.status, "diary moderated");

    Ok(StatusChange {
        id: diary.id,
        status: diary.status,
        reason: diary.reason,
    })
}

pub async fn approve(db: &PgPool, id: Uuid) -> AppResult<StatusChange> {
    moderate(db, id, ModerationAction::Approve).await
}

pub async fn reject(db: &PgPool, id: Uuid, reason: Option<String>) -> AppResult<StatusChange> {
    let reason = reason.unwrap_or_default();
    moderate(db, id, ModerationAction::Reject { reason }).await
}

pub async fn soft_delete(db: &PgPool, id: Uuid) -> AppResult<StatusChange> {
    moderate(db, id, ModerationAction::Delete).await
}

pub async fn list_users(db: &PgPool) -> AppResult<Vec<PublicUser>> {
    let users = User::list_all(db).await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}

pub async fn update_user_role(db: &PgPool, id: Uuid, role: Role) -> AppResult<PublicUser> {
    let user = User::update_role(db, id, role)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    info!(user_id = %id, ?role, "role updated");
    Ok(PublicUser::from(user))
}
