use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbProgramProposal, ProgramProposal, ProgramProposalRequest};

const PROPOSAL_COLUMNS: &str = "id, program_id, user_id, proposed_name, proposed_description,
           proposed_degree_type, proposed_country, proposed_city, proposed_state,
           proposed_url, proposed_cost, reason, status, admin_notes, reviewed_by,
           reviewed_at, created_at, updated_at";

#[instrument(skip(pool, req), fields(program_id = %req.program_id))]
pub async fn create_program_proposal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    req: &ProgramProposalRequest,
) -> Result<ProgramProposal, AppError> {
    info!("Creating program change proposal");
    let sql = format!(
        "INSERT INTO program_proposals
             (program_id, user_id, proposed_name, proposed_description, proposed_degree_type,
              proposed_country, proposed_city, proposed_state, proposed_url, proposed_cost, reason)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {PROPOSAL_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DbProgramProposal>(&sql)
        .bind(req.program_id)
        .bind(user_id)
        .bind(&req.proposed_name)
        .bind(&req.proposed_description)
        .bind(&req.proposed_degree_type)
        .bind(&req.proposed_country)
        .bind(&req.proposed_city)
        .bind(&req.proposed_state)
        .bind(&req.proposed_url)
        .bind(&req.proposed_cost)
        .bind(&req.reason)
        .fetch_one(pool)
        .await?;

    Ok(ProgramProposal::from(row))
}

/// Admin review queue, one status at a time, joined with the author,
/// program, university and reviewer display names.
#[instrument(skip(pool))]
pub async fn list_proposals_by_status(
    pool: &Pool<Sqlite>,
    status: &str,
) -> Result<Vec<ProgramProposal>, AppError> {
    info!("Listing program proposals by status");
    let rows = sqlx::query_as::<_, DbProgramProposal>(
        "SELECT
             pp.id, pp.program_id, pp.user_id, pp.proposed_name, pp.proposed_description,
             pp.proposed_degree_type, pp.proposed_country, pp.proposed_city, pp.proposed_state,
             pp.proposed_url, pp.proposed_cost, pp.reason, pp.status, pp.admin_notes,
             pp.reviewed_by, pp.reviewed_at, pp.created_at, pp.updated_at,
             u.name AS user_name, u.email AS user_email,
             p.name AS program_name, univ.name AS university_name,
             reviewer.name AS reviewer_name
         FROM program_proposals pp
         JOIN users u ON pp.user_id = u.id
         JOIN programs p ON pp.program_id = p.id
         JOIN universities univ ON p.university_id = univ.id
         LEFT JOIN users reviewer ON pp.reviewed_by = reviewer.id
         WHERE pp.status = ?
         ORDER BY pp.created_at DESC, pp.id",
    )
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProgramProposal::from).collect())
}

/// Everything the caller has ever proposed, regardless of status.
#[instrument(skip(pool))]
pub async fn list_user_proposals(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<ProgramProposal>, AppError> {
    info!("Listing user's program proposals");
    let rows = sqlx::query_as::<_, DbProgramProposal>(
        "SELECT
             pp.id, pp.program_id, pp.user_id, pp.proposed_name, pp.proposed_description,
             pp.proposed_degree_type, pp.proposed_country, pp.proposed_city, pp.proposed_state,
             pp.proposed_url, pp.proposed_cost, pp.reason, pp.status, pp.admin_notes,
             pp.reviewed_by, pp.reviewed_at, pp.created_at, pp.updated_at,
             p.name AS program_name, univ.name AS university_name,
             reviewer.name AS reviewer_name
         FROM program_proposals pp
         JOIN programs p ON pp.program_id = p.id
         JOIN universities univ ON p.university_id = univ.id
         LEFT JOIN users reviewer ON pp.reviewed_by = reviewer.id
         WHERE pp.user_id = ?
         ORDER BY pp.created_at DESC, pp.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProgramProposal::from).collect())
}

/// Reviews a proposal in a single transaction. The pending-status
/// predicate on the re-fetch is the sole optimistic-concurrency guard: a
/// second review of the same proposal finds no row and conflicts. On
/// approval, only the columns the proposal explicitly set are copied onto
/// the live program; nulls mean "leave unchanged". The program's updated
/// timestamp is always bumped.
#[instrument(skip(pool, admin_notes))]
pub async fn review_program_proposal(
    pool: &Pool<Sqlite>,
    proposal_id: i64,
    reviewer_id: i64,
    action: &str,
    admin_notes: Option<&str>,
) -> Result<(), AppError> {
    info!("Reviewing program proposal");
    if action != "approve" && action != "reject" {
        return Err(AppError::Validation(format!("Invalid action: {}", action)));
    }

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT {PROPOSAL_COLUMNS} FROM program_proposals WHERE id = ? AND status = 'pending'"
    );
    let row = sqlx::query_as::<_, DbProgramProposal>(&sql)
        .bind(proposal_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        return Err(AppError::Conflict(
            "Proposal not found or already reviewed".to_string(),
        ));
    };
    let proposal = ProgramProposal::from(row);

    if action == "approve" {
        let overrides = [
            ("name", &proposal.proposed_name),
            ("description", &proposal.proposed_description),
            ("degree_type", &proposal.proposed_degree_type),
            ("country", &proposal.proposed_country),
            ("city", &proposal.proposed_city),
            ("state", &proposal.proposed_state),
            ("url", &proposal.proposed_url),
            ("cost", &proposal.proposed_cost),
        ];

        let mut sql = String::from("UPDATE programs SET updated_at = CURRENT_TIMESTAMP");
        let mut params: Vec<&String> = Vec::new();
        for (column, value) in overrides {
            if let Some(value) = value {
                sql.push_str(&format!(", {} = ?", column));
                params.push(value);
            }
        }
        sql.push_str(" WHERE id = ?");

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }
        query = query.bind(proposal.program_id);
        query.execute(&mut *tx).await?;
    }

    let status = if action == "approve" {
        "approved"
    } else {
        "rejected"
    };

    sqlx::query(
        "UPDATE program_proposals
         SET status = ?, reviewed_by = ?, reviewed_at = CURRENT_TIMESTAMP,
             admin_notes = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(status)
    .bind(reviewer_id)
    .bind(admin_notes)
    .bind(proposal_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Author-only edit of a still-pending proposal. The ownership and status
/// predicates live in the UPDATE itself, so there is no check-then-act
/// window on this path.
#[instrument(skip(pool, req))]
pub async fn update_user_proposal(
    pool: &Pool<Sqlite>,
    proposal_id: i64,
    user_id: i64,
    req: &ProgramProposalRequest,
) -> Result<ProgramProposal, AppError> {
    info!("Updating user's program proposal");
    let sql = format!(
        "UPDATE program_proposals
         SET proposed_name = ?, proposed_description = ?, proposed_degree_type = ?,
             proposed_country = ?, proposed_city = ?, proposed_state = ?,
             proposed_url = ?, proposed_cost = ?, reason = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ? AND user_id = ? AND status = 'pending'
         RETURNING {PROPOSAL_COLUMNS}"
    );

    let row = sqlx::query_as::<_, DbProgramProposal>(&sql)
        .bind(&req.proposed_name)
        .bind(&req.proposed_description)
        .bind(&req.proposed_degree_type)
        .bind(&req.proposed_country)
        .bind(&req.proposed_city)
        .bind(&req.proposed_state)
        .bind(&req.proposed_url)
        .bind(&req.proposed_cost)
        .bind(&req.reason)
        .bind(proposal_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(ProgramProposal::from(row)),
        _ => Err(AppError::Conflict(
            "Proposal not found, not owned by user, or already reviewed".to_string(),
        )),
    }
}

/// Author-only withdrawal of a still-pending proposal, same predicate
/// shape as the update.
#[instrument(skip(pool))]
pub async fn delete_user_proposal(
    pool: &Pool<Sqlite>,
    proposal_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    info!("Deleting user's program proposal");
    let result =
        sqlx::query("DELETE FROM program_proposals WHERE id = ? AND user_id = ? AND status = 'pending'")
            .bind(proposal_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Proposal not found, not owned by user, or already reviewed".to_string(),
        ));
    }

    Ok(())
}
