use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Diary, DiaryDetailRow, DiaryStatus, ModerationRow, PublicDiaryRow};
use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageQuery {
    pub fn validate(&self) -> AppResult<PageRequest> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(AppError::invalid("page must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::invalid(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(AppError::invalid("page is out of range"));
        }
        Ok(PageRequest { page, page_size })
    }
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Bounded by `PageQuery::validate`.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub keyword: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl SearchQuery {
    pub fn pagination(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Turns a search keyword into an ILIKE pattern matching it as a literal
/// substring. Blank keywords mean "no filter".
pub fn like_pattern(keyword: &str) -> Option<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(keyword.len() + 2);
    out.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    Some(out)
}

/// Create/update payload after it has been pulled out of JSON or multipart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub images: Option<Vec<String>>,
    #[serde(alias = "video")]
    pub video_url: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub diaries: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(req: PageRequest, total: i64, diaries: Vec<T>) -> Self {
        Self {
            total,
            page: req.page,
            page_size: req.page_size,
            diaries,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDiarySummary {
    pub id: Uuid,
    pub title: String,
    pub cover_image: Option<String>,
    pub author: AuthorSummary,
}

impl From<PublicDiaryRow> for PublicDiarySummary {
    fn from(r: PublicDiaryRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            cover_image: r.cover_image.or_else(|| r.images.into_iter().next()),
            author: AuthorSummary {
                id: r.author_id,
                nickname: r.author_nickname,
                avatar_url: Some(r.author_avatar_url),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyDiarySummary {
    pub id: Uuid,
    pub title: String,
    pub cover_image: Option<String>,
    pub status: DiaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Diary> for MyDiarySummary {
    fn from(d: Diary) -> Self {
        Self {
            id: d.id,
            title: d.title,
            cover_image: d.cover_image.or_else(|| d.images.into_iter().next()),
            status: d.status,
            reason: visible_reason(d.status, d.reason),
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationSummary {
    pub id: Uuid,
    pub title: String,
    pub author: AuthorSummary,
    pub status: DiaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ModerationRow> for ModerationSummary {
    fn from(r: ModerationRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            author: AuthorSummary {
                id: r.author_id,
                nickname: r.author_nickname,
                avatar_url: None,
            },
            status: r.status,
            reason: visible_reason(r.status, r.reason),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryDetails {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub cover_image: Option<String>,
    pub author: AuthorSummary,
    pub status: DiaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<DiaryDetailRow> for DiaryDetails {
    fn from(r: DiaryDetailRow) -> Self {
        let d = r.diary;
        Self {
            id: d.id,
            title: d.title,
            content: d.content,
            video_url: d.video_url,
            cover_image: d.cover_image.or_else(|| d.images.first().cloned()),
            images: d.images,
            author: AuthorSummary {
                id: d.author_id,
                nickname: r.author_nickname,
                avatar_url: Some(r.author_avatar_url),
            },
            status: d.status,
            reason: visible_reason(d.status, d.reason),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Short body returned after create and update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryReceipt {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub cover_image: Option<String>,
    pub status: DiaryStatus,
}

impl From<Diary> for DiaryReceipt {
    fn from(d: Diary) -> Self {
        Self {
            id: d.id,
            title: d.title,
            content: d.content,
            images: d.images,
            video_url: d.video_url,
            cover_image: d.cover_image,
            status: d.status,
        }
    }
}

/// Response to a status change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub status: DiaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: &'static str,
}

/// Rejection reasons are only shown while a diary is rejected.
pub fn visible_reason(status: DiaryStatus, reason: Option<String>) -> Option<String> {
    match status {
        DiaryStatus::Rejected => reason,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_bounds() {
        let p = PageQuery::default().validate().unwrap();
        assert_eq!((p.page, p.page_size), (1, DEFAULT_PAGE_SIZE));
        assert_eq!((p.limit(), p.offset()), (10, 0));

        let p = PageQuery { page: Some(3), page_size: Some(20) }.validate().unwrap();
        assert_eq!(p.offset(), 40);

        for bad in [
            PageQuery { page: Some(0), page_size: None },
            PageQuery { page: None, page_size: Some(0) },
            PageQuery { page: None, page_size: Some(51) },
            PageQuery { page: Some(i64::MAX), page_size: Some(MAX_PAGE_SIZE) },
        ] {
            assert!(matches!(bad.validate(), Err(AppError::InvalidArgument(_))));
        }
    }

    #[test]
    fn largest_valid_page_has_a_finite_offset() {
        let full_page = |page| PageQuery {
            page: Some(page),
            page_size: Some(MAX_PAGE_SIZE),
        };
        let last = i64::MAX / MAX_PAGE_SIZE + 1;
        let p = full_page(last).validate().unwrap();
        assert_eq!(p.offset(), (last - 1) * MAX_PAGE_SIZE);
        assert!(full_page(last + 1).validate().is_err());
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern(""), None);
        assert_eq!(like_pattern("   "), None);
        assert_eq!(like_pattern(" Beijing ").as_deref(), Some("%Beijing%"));
        assert_eq!(like_pattern("100%").as_deref(), Some("%100\\%%"));
        assert_eq!(like_pattern("a_b\\c").as_deref(), Some("%a\\_b\\\\c%"));
    }

    #[test]
    fn search_query_reads_camel_case_params() {
        let q: SearchQuery = serde_json::from_value(serde_json::json!({
            "keyword": "lake",
            "page": 2,
            "pageSize": 5
        }))
        .unwrap();
        assert_eq!(q.keyword, "lake");
        assert_eq!(
            q.pagination().validate().unwrap(),
            PageRequest { page: 2, page_size: 5 }
        );
    }

    #[test]
    fn diary_input_accepts_video_alias() {
        let input: DiaryInput = serde_json::from_value(serde_json::json!({
            "title": "West Lake",
            "content": "boats",
            "images": ["/uploads/a.jpg"],
            "video": "/uploads/v.mp4"
        }))
        .unwrap();
        assert_eq!(input.video_url.as_deref(), Some("/uploads/v.mp4"));
        assert_eq!(input.images.unwrap().len(), 1);
    }

    #[test]
    fn reason_only_visible_when_rejected() {
        assert_eq!(
            visible_reason(DiaryStatus::Rejected, Some("blurry".into())).as_deref(),
            Some("blurry")
        );
        assert_eq!(visible_reason(DiaryStatus::Pending, Some("old".into())), None);
    }
}
