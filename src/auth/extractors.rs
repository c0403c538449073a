use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;
use tracing::warn;

use super::{claims::Requester, jwt::JwtKeys};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Looks for a token in `Authorization: Bearer`, then `x-auth-token`, then
/// the `token` query parameter.
fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(t) = bearer {
        return Some(t.to_string());
    }

    let header = parts
        .headers
        .get("x-auth-token")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(t) = header {
        return Some(t.to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Requires a valid access token.
pub struct AuthUser(pub Requester);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)
            .ok_or_else(|| AppError::Unauthenticated("missing token".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthenticated("invalid or expired token".into())
        })?;

        Ok(AuthUser(Requester::from(&claims)))
    }
}

/// Identity when a usable token is present; anonymous otherwise.
pub struct MaybeAuthUser(pub Option<Requester>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_parts(parts) else {
            return Ok(MaybeAuthUser(None));
        };
        match JwtKeys::from_ref(state).verify_access(&token) {
            Ok(claims) => Ok(MaybeAuthUser(Some(Requester::from(&claims)))),
            Err(e) => {
                warn!(error = %e, "ignoring invalid optional token");
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

/// Requires a valid access token with the admin role.
pub struct AdminUser(pub Requester);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(requester) = AuthUser::from_request_parts(parts, state).await?;
        if !requester.is_admin() {
            warn!(user_id = %requester.user_id, "admin route denied");
            return Err(AppError::forbidden("administrator role required"));
        }
        Ok(AdminUser(requester))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::claims::Role, state::testing};

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    fn token(role: Role) -> (Uuid, String) {
        let keys = JwtKeys::from(&testing::test_config().jwt);
        let id = Uuid::new_v4();
        (id, keys.sign_access(id, role).unwrap())
    }

    #[tokio::test]
    async fn reads_bearer_header() {
        let state = testing::fake();
        let (id, t) = token(Role::User);
        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, format!("Bearer {t}"))
                .body(())
                .unwrap(),
        );
        let AuthUser(r) = AuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(r.user_id, id);
        assert_eq!(r.role, Role::User);
    }

    #[tokio::test]
    async fn falls_back_to_x_auth_token_and_query() {
        let state = testing::fake();
        let (id, t) = token(Role::User);

        let mut p = parts(Request::builder().header("x-auth-token", &t).body(()).unwrap());
        let AuthUser(r) = AuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(r.user_id, id);

        let mut p = parts(
            Request::builder()
                .uri(format!("/api/diaries/my?page=1&token={t}"))
                .body(())
                .unwrap(),
        );
        let AuthUser(r) = AuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(r.user_id, id);
    }

    #[tokio::test]
    async fn missing_or_garbage_token_is_unauthenticated() {
        let state = testing::fake();

        let mut p = parts(Request::builder().body(()).unwrap());
        let err = AuthUser::from_request_parts(&mut p, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthenticated(_)));

        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, "Bearer not.a.jwt")
                .body(())
                .unwrap(),
        );
        let err = AuthUser::from_request_parts(&mut p, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = testing::fake();
        let keys = JwtKeys::from(&testing::test_config().jwt);
        let t = keys.sign_refresh(Uuid::new_v4(), Role::User).unwrap();
        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, format!("Bearer {t}"))
                .body(())
                .unwrap(),
        );
        assert!(AuthUser::from_request_parts(&mut p, &state).await.is_err());
    }

    #[tokio::test]
    async fn optional_auth_tolerates_bad_tokens() {
        let state = testing::fake();

        let mut p = parts(Request::builder().body(()).unwrap());
        let MaybeAuthUser(r) = MaybeAuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert!(r.is_none());

        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, "Bearer broken")
                .body(())
                .unwrap(),
        );
        let MaybeAuthUser(r) = MaybeAuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert!(r.is_none());

        let (id, t) = token(Role::Admin);
        let mut p = parts(Request::builder().header("x-auth-token", t).body(()).unwrap());
        let MaybeAuthUser(r) = MaybeAuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(r.map(|r| r.user_id), Some(id));
    }

    #[tokio::test]
    async fn admin_extractor_checks_role() {
        let state = testing::fake();

        let (_, user_token) = token(Role::User);
        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, format!("Bearer {user_token}"))
                .body(())
                .unwrap(),
        );
        let err = AdminUser::from_request_parts(&mut p, &state).await.err().unwrap();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let (admin_id, admin_token) = token(Role::Admin);
        let mut p = parts(
            Request::builder()
                .header(AUTHORIZATION, format!("Bearer {admin_token}"))
                .body(())
                .unwrap(),
        );
        let AdminUser(r) = AdminUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(r.user_id, admin_id);
    }
}
