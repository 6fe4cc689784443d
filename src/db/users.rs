use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, User};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, email, name, google_id, github_id, role, created_at, updated_at";

/// Sign-in upsert keyed by the Google account id.
#[instrument(skip(pool))]
pub async fn upsert_google_user(
    pool: &Pool<Sqlite>,
    email: &str,
    name: &str,
    google_id: &str,
) -> Result<User, AppError> {
    info!("Creating or updating user from Google sign-in");
    let sql = format!(
        "INSERT INTO users (email, name, google_id, role)
         VALUES (?, ?, ?, 'user')
         ON CONFLICT(google_id) DO UPDATE SET
             email = excluded.email,
             name = excluded.name,
             updated_at = CURRENT_TIMESTAMP
         RETURNING {USER_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(email)
        .bind(name)
        .bind(google_id)
        .fetch_one(pool)
        .await?;

    Ok(User::from(row))
}

/// Sign-in upsert keyed by the GitHub account id.
#[instrument(skip(pool))]
pub async fn upsert_github_user(
    pool: &Pool<Sqlite>,
    email: &str,
    name: &str,
    github_id: &str,
) -> Result<User, AppError> {
    info!("Creating or updating user from GitHub sign-in");
    let sql = format!(
        "INSERT INTO users (email, name, github_id, role)
         VALUES (?, ?, ?, 'user')
         ON CONFLICT(github_id) DO UPDATE SET
             email = excluded.email,
             name = excluded.name,
             updated_at = CURRENT_TIMESTAMP
         RETURNING {USER_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(email)
        .bind(name)
        .bind(github_id)
        .fetch_one(pool)
        .await?;

    Ok(User::from(row))
}

/// Development sign-in: mints a synthetic identity under a `local_` google
/// id so the one-provider-id constraint holds, with a caller-chosen role.
#[instrument(skip(pool))]
pub async fn create_local_user(
    pool: &Pool<Sqlite>,
    email: &str,
    name: &str,
    role: &str,
) -> Result<User, AppError> {
    info!("Creating local user");
    let local_id = format!("local_{}", email);
    let sql = format!(
        "INSERT INTO users (email, name, google_id, role)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(google_id) DO UPDATE SET
             email = excluded.email,
             name = excluded.name,
             role = excluded.role,
             updated_at = CURRENT_TIMESTAMP
         RETURNING {USER_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(email)
        .bind(name)
        .bind(&local_id)
        .bind(role)
        .fetch_one(pool)
        .await?;

    Ok(User::from(row))
}

/// Resolves a bearer token used as a provider id: google id first, then
/// github id, first match wins. `None` means the caller stays anonymous.
#[instrument(skip_all)]
pub async fn find_user_by_provider_id(
    pool: &Pool<Sqlite>,
    provider_id: &str,
) -> Result<Option<User>, AppError> {
    let by_google = format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = ?");
    let row = sqlx::query_as::<_, DbUser>(&by_google)
        .bind(provider_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        return Ok(Some(User::from(row)));
    }

    let by_github = format!("SELECT {USER_COLUMNS} FROM users WHERE github_id = ?");
    let row = sqlx::query_as::<_, DbUser>(&by_github)
        .bind(provider_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query_as::<_, DbUser>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}
