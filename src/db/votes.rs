use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

/// Upserts a user's vote through the (user_id, program_id) uniqueness
/// constraint, overwriting any prior value.
#[instrument(skip(pool))]
pub async fn set_vote(
    pool: &Pool<Sqlite>,
    user_id: i64,
    program_id: i64,
    vote: i64,
) -> Result<(), AppError> {
    info!("Recording vote");
    sqlx::query(
        "INSERT INTO votes (user_id, program_id, vote)
         VALUES (?, ?, ?)
         ON CONFLICT(user_id, program_id) DO UPDATE SET
             vote = excluded.vote,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(program_id)
    .bind(vote)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn remove_vote(
    pool: &Pool<Sqlite>,
    user_id: i64,
    program_id: i64,
) -> Result<(), AppError> {
    info!("Removing vote");
    sqlx::query("DELETE FROM votes WHERE user_id = ? AND program_id = ?")
        .bind(user_id)
        .bind(program_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Upserts a user's 1-5 rating, same shape as votes.
#[instrument(skip(pool))]
pub async fn set_rating(
    pool: &Pool<Sqlite>,
    user_id: i64,
    program_id: i64,
    rating: i64,
) -> Result<(), AppError> {
    info!("Recording rating");
    sqlx::query(
        "INSERT INTO ratings (user_id, program_id, rating)
         VALUES (?, ?, ?)
         ON CONFLICT(user_id, program_id) DO UPDATE SET
             rating = excluded.rating,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(program_id)
    .bind(rating)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn remove_rating(
    pool: &Pool<Sqlite>,
    user_id: i64,
    program_id: i64,
) -> Result<(), AppError> {
    info!("Removing rating");
    sqlx::query("DELETE FROM ratings WHERE user_id = ? AND program_id = ?")
        .bind(user_id)
        .bind(program_id)
        .execute(pool)
        .await?;

    Ok(())
}
