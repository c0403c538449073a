use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Moderation state of a diary. `Deleted` is a logical delete and terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "diary_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiaryStatus {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

#[derive(Debug, Clone, FromRow)]
pub struct Diary {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub cover_image: Option<String>,
    pub status: DiaryStatus,
    pub reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Diary joined with the author's public profile.
#[derive(Debug, Clone, FromRow)]
pub struct DiaryDetailRow {
    #[sqlx(flatten)]
    pub diary: Diary,
    pub author_nickname: String,
    pub author_avatar_url: String,
}

/// One row of the public listing.
#[derive(Debug, Clone, FromRow)]
pub struct PublicDiaryRow {
    pub id: Uuid,
    pub title: String,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub author_id: Uuid,
    pub author_nickname: String,
    pub author_avatar_url: String,
}

/// One row of the moderation queue.
#[derive(Debug, Clone, FromRow)]
pub struct ModerationRow {
    pub id: Uuid,
    pub title: String,
    pub status: DiaryStatus,
    pub reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_nickname: String,
}

/// Fields written by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryDraft {
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub cover_image: String,
}
