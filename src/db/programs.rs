use std::collections::HashMap;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::query::{ProgramFilters, SqlFilter, admin_order_by, public_order_by};
use crate::error::AppError;
use crate::models::{DbProgram, Program, ProgramUpdateRequest, ProposeRequest};

const PROGRAM_COLUMNS: &str = "
        p.id,
        p.university_id,
        p.name,
        p.description,
        p.degree_type,
        p.country,
        p.city,
        p.state,
        p.url,
        p.cost,
        p.status,
        p.visibility,
        p.created_at,
        p.updated_at,
        u.name AS university_name,
        COALESCE(AVG(r.rating), 0.0) AS average_rating";

const PROGRAM_GROUP_BY: &str = "
     GROUP BY p.id, p.university_id, p.name, p.description, p.degree_type, p.country,
              p.city, p.state, p.url, p.cost, p.status, p.visibility, p.created_at,
              p.updated_at, u.name";

/// Public listing: active, approved programs with aggregate rating, the
/// caller's filters and sort applied, and (when a caller id is supplied)
/// that caller's own vote and rating merged in. An empty match is an
/// empty vector, never an error.
#[instrument(skip(pool))]
pub async fn list_programs(
    pool: &Pool<Sqlite>,
    user_id: Option<i64>,
    filters: &ProgramFilters,
) -> Result<Vec<Program>, AppError> {
    info!("Listing approved programs");
    let filter = SqlFilter::from_program_filters(filters);

    let mut sql = format!(
        "SELECT {PROGRAM_COLUMNS}
     FROM programs p
     JOIN universities u ON p.university_id = u.id
     LEFT JOIN ratings r ON p.id = r.program_id
     WHERE p.status = 'active' AND p.visibility = 'approved'"
    );
    sql.push_str(&filter.render());
    sql.push_str(PROGRAM_GROUP_BY);
    sql.push_str(" ORDER BY ");
    sql.push_str(&public_order_by(filters));

    let mut query = sqlx::query_as::<_, DbProgram>(&sql);
    for param in filter.params() {
        query = query.bind(param);
    }

    let rows = query.fetch_all(pool).await?;
    let mut programs: Vec<Program> = rows.into_iter().map(Program::from).collect();

    if let Some(user_id) = user_id {
        attach_user_reactions(pool, user_id, &mut programs).await?;
    }

    Ok(programs)
}

/// Admin listing: drops the approved constraint and widens the sort
/// whitelist so the review queue can be ordered by moderation state.
#[instrument(skip(pool))]
pub async fn list_all_programs(
    pool: &Pool<Sqlite>,
    filters: &ProgramFilters,
) -> Result<Vec<Program>, AppError> {
    info!("Listing all programs");
    let filter = SqlFilter::from_program_filters(filters);

    let mut sql = format!(
        "SELECT {PROGRAM_COLUMNS}
     FROM programs p
     JOIN universities u ON p.university_id = u.id
     LEFT JOIN ratings r ON p.id = r.program_id
     WHERE p.status = 'active'"
    );
    sql.push_str(&filter.render());
    sql.push_str(PROGRAM_GROUP_BY);
    sql.push_str(" ORDER BY ");
    sql.push_str(&admin_order_by(filters));

    let mut query = sqlx::query_as::<_, DbProgram>(&sql);
    for param in filter.params() {
        query = query.bind(param);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Program::from).collect())
}

/// The admin review queue: programs still awaiting moderation.
#[instrument(skip(pool))]
pub async fn pending_programs(pool: &Pool<Sqlite>) -> Result<Vec<Program>, AppError> {
    info!("Listing pending programs");
    let sql = format!(
        "SELECT {PROGRAM_COLUMNS}
     FROM programs p
     JOIN universities u ON p.university_id = u.id
     LEFT JOIN ratings r ON p.id = r.program_id
     WHERE p.visibility = 'pending'
     {PROGRAM_GROUP_BY}
     ORDER BY p.created_at DESC, p.id"
    );

    let rows = sqlx::query_as::<_, DbProgram>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Program::from).collect())
}

#[instrument(skip(pool))]
pub async fn program_by_id(pool: &Pool<Sqlite>, program_id: i64) -> Result<Program, AppError> {
    info!("Fetching program by ID");
    let sql = format!(
        "SELECT {PROGRAM_COLUMNS}
     FROM programs p
     JOIN universities u ON p.university_id = u.id
     LEFT JOIN ratings r ON p.id = r.program_id
     WHERE p.id = ?
     {PROGRAM_GROUP_BY}"
    );

    let row = sqlx::query_as::<_, DbProgram>(&sql)
        .bind(program_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Program::from(row)),
        _ => Err(AppError::NotFound(format!(
            "Program with id {} not found",
            program_id
        ))),
    }
}

/// Persists a user-submitted program with pending visibility. The
/// university is resolved by name inside the same transaction.
#[instrument(skip(pool, req), fields(university = %req.university_name, program = %req.program_name))]
pub async fn propose_program(
    pool: &Pool<Sqlite>,
    req: &ProposeRequest,
) -> Result<Program, AppError> {
    info!("Creating proposed program");
    let mut tx = pool.begin().await?;

    let university_id = find_or_create_university(&mut *tx, &req.university_name).await?;

    let row = sqlx::query_as::<_, DbProgram>(
        "INSERT INTO programs
             (university_id, name, description, degree_type, country, city, state, url, cost, status, visibility)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', 'pending')
         RETURNING id, university_id, name, description, degree_type, country, city, state,
                   url, cost, status, visibility, created_at, updated_at",
    )
    .bind(university_id)
    .bind(&req.program_name)
    .bind(&req.description)
    .bind(&req.degree_type)
    .bind(&req.country)
    .bind(&req.city)
    .bind(&req.state)
    .bind(&req.url)
    .bind(&req.cost)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut program = Program::from(row);
    program.university_name = req.university_name.clone();
    Ok(program)
}

/// Full-field admin update, moving the program to a (find-or-create)
/// university when the name changed. All-or-nothing.
#[instrument(skip(pool, req), fields(program_id = %req.id))]
pub async fn update_program(
    pool: &Pool<Sqlite>,
    req: &ProgramUpdateRequest,
) -> Result<Program, AppError> {
    info!("Updating program");
    let mut tx = pool.begin().await?;

    let university_id = find_or_create_university(&mut *tx, &req.university_name).await?;

    let row = sqlx::query_as::<_, DbProgram>(
        "UPDATE programs SET
             university_id = ?,
             name = ?,
             description = ?,
             degree_type = ?,
             country = ?,
             city = ?,
             state = ?,
             url = ?,
             cost = ?,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?
         RETURNING id, university_id, name, description, degree_type, country, city, state,
                   url, cost, status, visibility, created_at, updated_at",
    )
    .bind(university_id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.degree_type)
    .bind(&req.country)
    .bind(&req.city)
    .bind(&req.state)
    .bind(&req.url)
    .bind(&req.cost)
    .bind(req.id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Err(AppError::NotFound(format!(
            "Program with id {} not found",
            req.id
        )));
    };

    tx.commit().await?;

    let mut program = Program::from(row);
    program.university_name = req.university_name.clone();
    Ok(program)
}

/// Moderation transition. The WHERE clause only matches programs still
/// pending, so visibility moves pending->approved|rejected exactly once.
#[instrument(skip(pool))]
pub async fn set_program_visibility(
    pool: &Pool<Sqlite>,
    program_id: i64,
    visibility: &str,
) -> Result<(), AppError> {
    info!("Updating program visibility");
    let result = sqlx::query(
        "UPDATE programs
         SET visibility = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ? AND visibility = 'pending'",
    )
    .bind(visibility)
    .bind(program_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Program not found or already reviewed".to_string(),
        ));
    }

    Ok(())
}

/// Single conditional insert: the unique name column resolves concurrent
/// submissions for the same new university to one row.
#[instrument(skip(executor))]
pub async fn find_or_create_university<'e, E>(executor: E, name: &str) -> Result<i64, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO universities (name)
         VALUES (?)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING id",
    )
    .bind(name)
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

/// One round trip per reaction table for the whole listing, merged in
/// memory by program id.
async fn attach_user_reactions(
    pool: &Pool<Sqlite>,
    user_id: i64,
    programs: &mut [Program],
) -> Result<(), AppError> {
    let ids: Vec<i64> = programs.iter().map(|p| p.id).collect();
    if ids.is_empty() {
        return Ok(());
    }

    let votes = user_reactions_for_programs(pool, "votes", "vote", user_id, &ids).await?;
    let ratings = user_reactions_for_programs(pool, "ratings", "rating", user_id, &ids).await?;

    for program in programs.iter_mut() {
        program.user_vote = votes.get(&program.id).copied();
        program.user_rating = ratings.get(&program.id).copied();
    }

    Ok(())
}

async fn user_reactions_for_programs(
    pool: &Pool<Sqlite>,
    table: &str,
    column: &str,
    user_id: i64,
    program_ids: &[i64],
) -> Result<HashMap<i64, i64>, AppError> {
    let placeholders = vec!["?"; program_ids.len()].join(", ");
    let sql = format!(
        "SELECT program_id, {column} FROM {table}
         WHERE user_id = ? AND program_id IN ({placeholders})"
    );

    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql).bind(user_id);
    for id in program_ids {
        query = query.bind(*id);
    }

    Ok(query.fetch_all(pool).await?.into_iter().collect())
}
