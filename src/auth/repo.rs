use sqlx::PgPool;
use uuid::Uuid;

use super::{
    claims::Role,
    repo_types::{User, DEFAULT_AVATAR_URL},
};

const USER_COLUMNS: &str =
    "id, username, nickname, password_hash, avatar_url, role, created_at";

impl User {
    /// Find a user by login name.
    pub async fn find_by_username(db: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Whether `nickname` belongs to someone other than `except`.
    pub async fn nickname_taken(
        db: &PgPool,
        nickname: &str,
        except: Option<Uuid>,
    ) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE nickname = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(nickname)
        .bind(except)
        .fetch_one(db)
        .await
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        username: &str,
        nickname: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, nickname, password_hash, role, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(nickname)
        .bind(password_hash)
        .bind(role)
        .bind(DEFAULT_AVATAR_URL)
        .fetch_one(db)
        .await
    }

    pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await
    }

    pub async fn update_role(db: &PgPool, id: Uuid, role: Role) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await
    }

    /// `None` fields keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        nickname: Option<&str>,
        avatar_url: Option<&str>,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET nickname = COALESCE($2, nickname),
                   avatar_url = COALESCE($3, avatar_url)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(nickname)
        .bind(avatar_url)
        .fetch_optional(db)
        .await
    }
}

/// Postgres unique-violation, raised when a concurrent insert wins the race
/// past the existence checks.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
