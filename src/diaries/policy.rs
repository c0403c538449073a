//! Authorship, visibility and moderation rules for diaries. Everything here is
//! pure so the services only have to load rows and persist the outcome.

use super::{
    dto::DiaryInput,
    repo_types::{Diary, DiaryDraft, DiaryStatus},
};
use crate::{
    auth::claims::Requester,
    error::{AppError, AppResult},
};

/// Admin transitions on a diary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject { reason: String },
    Delete,
}

/// Status and reason to persist after a moderation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: DiaryStatus,
    pub reason: Option<String>,
}

pub fn moderate(current: DiaryStatus, action: ModerationAction) -> AppResult<Transition> {
    match (current, action) {
        (DiaryStatus::Deleted, ModerationAction::Delete) => Ok(Transition {
            status: DiaryStatus::Deleted,
            reason: None,
        }),
        (DiaryStatus::Deleted, _) => Err(AppError::InvalidState(
            "diary has been deleted".into(),
        )),
        (_, ModerationAction::Approve) => Ok(Transition {
            status: DiaryStatus::Approved,
            reason: None,
        }),
        (_, ModerationAction::Reject { reason }) => {
            if reason.trim().is_empty() {
                return Err(AppError::invalid("a rejection reason is required"));
            }
            Ok(Transition {
                status: DiaryStatus::Rejected,
                reason: Some(reason),
            })
        }
        (_, ModerationAction::Delete) => Ok(Transition {
            status: DiaryStatus::Deleted,
            reason: None,
        }),
    }
}

fn normalize_video(video: Option<String>) -> Option<String> {
    video
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn finish_draft(
    title: String,
    content: String,
    images: Vec<String>,
    video_url: Option<String>,
    cover_image: Option<String>,
) -> AppResult<DiaryDraft> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::invalid("title is required"));
    }
    if content.trim().is_empty() {
        return Err(AppError::invalid("content is required"));
    }
    let images: Vec<String> = images
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    let Some(first) = images.first().cloned() else {
        return Err(AppError::invalid("at least one image is required"));
    };
    let cover_image = cover_image
        .filter(|c| images.contains(c))
        .unwrap_or(first);

    Ok(DiaryDraft {
        title,
        content,
        images,
        video_url,
        cover_image,
    })
}

/// Validates a new diary.
pub fn new_draft(input: DiaryInput) -> AppResult<DiaryDraft> {
    finish_draft(
        input.title,
        input.content,
        input.images.unwrap_or_default(),
        normalize_video(input.video_url),
        input.cover_image,
    )
}

pub fn ensure_author(diary: &Diary, requester: &Requester) -> AppResult<()> {
    if diary.author_id != requester.user_id {
        return Err(AppError::forbidden("only the author may edit this diary"));
    }
    Ok(())
}

pub fn ensure_editable(status: DiaryStatus, allow_edit_approved: bool) -> AppResult<()> {
    match status {
        DiaryStatus::Deleted => Err(AppError::InvalidState("diary has been deleted".into())),
        DiaryStatus::Approved if !allow_edit_approved => Err(AppError::InvalidState(
            "approved diaries cannot be edited".into(),
        )),
        _ => Ok(()),
    }
}

/// Applies an author's edit. Omitted images or video keep the stored ones;
/// an empty video string clears it. The caller resets status to pending.
pub fn edit_draft(
    existing: &Diary,
    requester: &Requester,
    input: DiaryInput,
    allow_edit_approved: bool,
) -> AppResult<DiaryDraft> {
    ensure_author(existing, requester)?;
    ensure_editable(existing.status, allow_edit_approved)?;

    let images = input.images.unwrap_or_else(|| existing.images.clone());
    let video_url = match input.video_url {
        Some(v) => normalize_video(Some(v)),
        None => existing.video_url.clone(),
    };
    let cover_image = input.cover_image.or_else(|| existing.cover_image.clone());
    finish_draft(input.title, input.content, images, video_url, cover_image)
}

/// Authors may delete their own diaries; admins may delete any.
pub fn ensure_can_delete(diary: &Diary, requester: &Requester) -> AppResult<()> {
    if diary.author_id == requester.user_id || requester.is_admin() {
        return Ok(());
    }
    Err(AppError::forbidden("only the author may delete this diary"))
}

/// Approved diaries are public; anything else is limited to the author and
/// administrators.
pub fn can_view(diary: &Diary, requester: Option<&Requester>) -> bool {
    if diary.status == DiaryStatus::Approved {
        return true;
    }
    requester.is_some_and(|r| r.is_admin() || r.user_id == diary.author_id)
}
