use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{
    Diary, DiaryDetailRow, DiaryDraft, DiaryStatus, ModerationRow, PublicDiaryRow,
};

const DIARY_COLUMNS: &str = "d.id, d.author_id, d.title, d.content, d.images, d.video_url, \
     d.cover_image, d.status, d.reason, d.created_at, d.updated_at";

// Approved diaries, optionally filtered by an escaped ILIKE pattern on title
// or author nickname. Shared by the page and count queries.
const PUBLIC_FILTER: &str = r#"
    FROM diaries d
    JOIN users u ON u.id = d.author_id
    WHERE d.status = 'approved'
      AND ($1::text IS NULL
           OR d.title ILIKE $1 ESCAPE '\'
           OR u.nickname ILIKE $1 ESCAPE '\')
"#;

impl Diary {
    pub async fn insert(db: &PgPool, author_id: Uuid, draft: &DiaryDraft) -> sqlx::Result<Diary> {
        sqlx::query_as::<_, Diary>(&format!(
            r#"
            INSERT INTO diaries AS d
                   (author_id, title, content, images, video_url, cover_image, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {DIARY_COLUMNS}
            "#
        ))
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.images)
        .bind(&draft.video_url)
        .bind(&draft.cover_image)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Diary>> {
        sqlx::query_as::<_, Diary>(&format!(
            "SELECT {DIARY_COLUMNS} FROM diaries d WHERE d.id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_detail(db: &PgPool, id: Uuid) -> sqlx::Result<Option<DiaryDetailRow>> {
        sqlx::query_as::<_, DiaryDetailRow>(&format!(
            r#"
            SELECT {DIARY_COLUMNS},
                   u.nickname AS author_nickname,
                   u.avatar_url AS author_avatar_url
              FROM diaries d
              JOIN users u ON u.id = d.author_id
             WHERE d.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Replaces the content and puts the diary back into the review queue.
    /// Deleted diaries, and approved ones unless `allow_approved`, are left
    /// alone and yield `None`.
    pub async fn update_content(
        db: &PgPool,
        id: Uuid,
        draft: &DiaryDraft,
        allow_approved: bool,
    ) -> sqlx::Result<Option<Diary>> {
        sqlx::query_as::<_, Diary>(&format!(
            r#"
            UPDATE diaries AS d
               SET title = $2,
                   content = $3,
                   images = $4,
                   video_url = $5,
                   cover_image = $6,
                   status = 'pending',
                   reason = NULL,
                   updated_at = now()
             WHERE d.id = $1
               AND d.status <> 'deleted'
               AND ($7 OR d.status <> 'approved')
            RETURNING {DIARY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.images)
        .bind(&draft.video_url)
        .bind(&draft.cover_image)
        .bind(allow_approved)
        .fetch_optional(db)
        .await
    }

    /// Moves a diary to `status`. A deleted diary only accepts `Deleted`
    /// again; anything else yields `None`.
    pub async fn set_status(
        db: &PgPool,
        id: Uuid,
        status: DiaryStatus,
        reason: Option<&str>,
    ) -> sqlx::Result<Option<Diary>> {
        sqlx::query_as::<_, Diary>(&format!(
            r#"
            UPDATE diaries AS d
               SET status = $2, reason = $3, updated_at = now()
             WHERE d.id = $1
               AND (d.status <> 'deleted' OR $2 = 'deleted'::diary_status)
            RETURNING {DIARY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(reason)
        .fetch_optional(db)
        .await
    }

    /// Physically removes the row. Returns whether anything was deleted.
    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM diaries WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn search_public(
        db: &PgPool,
        pattern: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(i64, Vec<PublicDiaryRow>)> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {PUBLIC_FILTER}"))
            .bind(pattern)
            .fetch_one(db)
            .await?;

        let rows = sqlx::query_as::<_, PublicDiaryRow>(&format!(
            r#"
            SELECT d.id, d.title, d.cover_image, d.images,
                   u.id AS author_id,
                   u.nickname AS author_nickname,
                   u.avatar_url AS author_avatar_url
            {PUBLIC_FILTER}
            ORDER BY d.created_at DESC, d.id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        Ok((total, rows))
    }

    pub async fn list_by_author(
        db: &PgPool,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(i64, Vec<Diary>)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diaries WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(db)
            .await?;

        let rows = sqlx::query_as::<_, Diary>(&format!(
            r#"
            SELECT {DIARY_COLUMNS}
              FROM diaries d
             WHERE d.author_id = $1
             ORDER BY d.created_at DESC, d.id
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        Ok((total, rows))
    }

    /// Moderation queue. `None` lists every status.
    pub async fn list_by_status(
        db: &PgPool,
        status: Option<DiaryStatus>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(i64, Vec<ModerationRow>)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM diaries WHERE ($1::diary_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(db)
        .await?;

        let rows = sqlx::query_as::<_, ModerationRow>(
            r#"
            SELECT d.id, d.title, d.status, d.reason, d.created_at,
                   u.id AS author_id,
                   u.nickname AS author_nickname
              FROM diaries d
              JOIN users u ON u.id = d.author_id
             WHERE ($1::diary_status IS NULL OR d.status = $1)
             ORDER BY d.created_at DESC, d.id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        Ok((total, rows))
    }
}
