use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{
    claims::{Requester, Role},
    dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest, UpdateMeRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::is_unique_violation,
    repo_types::User,
};
use crate::{
    config::AdminSeed,
    error::{AppError, AppResult},
};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NICKNAME_LEN: usize = 32;

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Trims the request in place and checks the shape of every field.
pub(crate) fn validate_registration(req: &mut RegisterRequest) -> AppResult<()> {
    req.username = req.username.trim().to_string();
    req.nickname = req.nickname.trim().to_string();

    if !is_valid_username(&req.username) {
        return Err(AppError::invalid(
            "username must be 3-32 letters, digits or underscores",
        ));
    }
    validate_nickname(&req.nickname)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid("password too short"));
    }
    Ok(())
}

fn validate_nickname(nickname: &str) -> AppResult<()> {
    if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(AppError::invalid("nickname must be 1-32 characters"));
    }
    Ok(())
}

fn issue(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    let pair = keys.sign_pair(user.id, user.role)?;
    Ok(AuthResponse {
        token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: PublicUser::from(user),
    })
}

pub async fn register(
    db: &PgPool,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> AppResult<AuthResponse> {
    validate_registration(&mut req)?;

    if User::find_by_username(db, &req.username).await?.is_some() {
        warn!(username = %req.username, "username already registered");
        return Err(AppError::AlreadyExists("username already taken".into()));
    }
    if User::nickname_taken(db, &req.nickname, None).await? {
        warn!(nickname = %req.nickname, "nickname already registered");
        return Err(AppError::AlreadyExists("nickname already taken".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = User::create(db, &req.username, &req.nickname, &hash, Role::User)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists("username or nickname already taken".into())
            } else {
                e.into()
            }
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    issue(keys, user)
}

pub async fn login(db: &PgPool, keys: &JwtKeys, req: LoginRequest) -> AppResult<AuthResponse> {
    let username = req.username.trim();
    let Some(user) = User::find_by_username(db, username).await? else {
        warn!(username, "login unknown username");
        return Err(AppError::InvalidCredential);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredential);
    }

    info!(user_id = %user.id, "user logged in");
    issue(keys, user)
}

/// Swaps a refresh token for a new pair. The role is read again so that
/// promotions and demotions take effect here.
pub async fn refresh(db: &PgPool, keys: &JwtKeys, refresh_token: &str) -> AppResult<AuthResponse> {
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthenticated(e.to_string()))?;
    let user = User::find_by_id(db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("user not found".into()))?;
    issue(keys, user)
}

pub async fn me(db: &PgPool, requester: &Requester) -> AppResult<PublicUser> {
    User::find_by_id(db, requester.user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::Unauthenticated("user not found".into()))
}

pub async fn update_me(
    db: &PgPool,
    requester: &Requester,
    req: UpdateMeRequest,
) -> AppResult<PublicUser> {
    let nickname = req.nickname.as_deref().map(str::trim);
    if let Some(n) = nickname {
        validate_nickname(n)?;
        if User::nickname_taken(db, n, Some(requester.user_id)).await? {
            return Err(AppError::AlreadyExists("nickname already taken".into()));
        }
    }
    let avatar_url = req
        .avatar_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    User::update_profile(db, requester.user_id, nickname, avatar_url)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists("nickname already taken".into())
            } else {
                e.into()
            }
        })?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::Unauthenticated("user not found".into()))
}

/// Creates the configured administrator unless the username already exists.
pub async fn ensure_admin(db: &PgPool, seed: &AdminSeed) -> anyhow::Result<()> {
    if User::find_by_username(db, &seed.username).await?.is_some() {
        info!(username = %seed.username, "admin account already present");
        return Ok(());
    }
    let hash = hash_password(&seed.password)?;
    let admin = User::create(db, &seed.username, &seed.nickname, &hash, Role::Admin).await?;
    info!(user_id = %admin.id, username = %admin.username, "admin account created");
    Ok(())
}
