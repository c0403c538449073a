use serde::Deserialize;

use crate::{
    auth::claims::Role,
    diaries::{dto::PageQuery, repo_types::DiaryStatus},
    error::{AppError, AppResult},
};

/// GET /admin/diaries?status=&page=&pageSize=
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl AdminListQuery {
    pub fn pagination(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// `None` (or an empty value) means every status.
    pub fn status_filter(&self) -> AppResult<Option<DiaryStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_status(s).map(Some),
        }
    }
}

pub fn parse_status(s: &str) -> AppResult<DiaryStatus> {
    match s.to_ascii_lowercase().as_str() {
        "pending" => Ok(DiaryStatus::Pending),
        "approved" => Ok(DiaryStatus::Approved),
        "rejected" => Ok(DiaryStatus::Rejected),
        "deleted" => Ok(DiaryStatus::Deleted),
        other => Err(AppError::invalid(format!("unknown status: {other}"))),
    }
}

pub fn parse_role(s: &str) -> AppResult<Role> {
    match s.trim() {
        "user" => Ok(Role::User),
        "admin" => Ok(Role::Admin),
        other => Err(AppError::invalid(format!("unknown role: {other}"))),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_accepts_known_values() {
        let q = AdminListQuery::default();
        assert_eq!(q.status_filter().unwrap(), None);

        let q = AdminListQuery {
            status: Some("Pending".into()),
            ..Default::default()
        };
        assert_eq!(q.status_filter().unwrap(), Some(DiaryStatus::Pending));

        let q = AdminListQuery {
            status: Some("archived".into()),
            ..Default::default()
        };
        assert!(matches!(q.status_filter(), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn roles_are_a_closed_set() {
        assert_eq!(parse_role("admin").unwrap(), Role::Admin);
        assert_eq!(parse_role("user").unwrap(), Role::User);
        assert!(parse_role("root").is_err());
        assert!(parse_role("").is_err());
    }

    #[test]
    fn reject_request_tolerates_missing_reason() {
        let r: RejectRequest = serde_json::from_str("{}").unwrap();
        assert!(r.reason.is_none());
    }
}
