use rocket::State;
use rocket::serde::json::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Admin, Permission, User};
use crate::db::{
    ProgramFilters, create_local_user, create_program_proposal, delete_user_proposal,
    list_all_programs, list_programs, list_proposals_by_status, list_user_proposals,
    pending_programs, program_by_id, propose_program, remove_rating, remove_vote,
    review_program_proposal, set_program_visibility, set_rating, set_vote, update_program,
    update_user_proposal, upsert_github_user, upsert_google_user,
};
use crate::error::AppError;
use crate::models::{Program, ProgramProposalRequest, ProgramUpdateRequest, ProposeRequest};
use crate::validation::ValidateExt;

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    google_id: Option<String>,
    github_id: Option<String>,
}

/// Sign-in callback: upserts the user record keyed by whichever provider
/// id the frontend asserts. Exactly one provider id must be present.
#[post("/auth", data = "<auth>")]
pub async fn api_auth(
    auth: Json<AuthRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<User>, AppError> {
    let auth = auth.into_inner().validate_custom()?;

    let google_id = auth.google_id.as_deref().filter(|id| !id.is_empty());
    let github_id = auth.github_id.as_deref().filter(|id| !id.is_empty());

    let user = match (google_id, github_id) {
        (Some(google_id), None) => {
            upsert_google_user(db, &auth.email, &auth.name, google_id).await?
        }
        (None, Some(github_id)) => {
            upsert_github_user(db, &auth.email, &auth.name, github_id).await?
        }
        _ => {
            return Err(AppError::Validation(
                "Exactly one of google_id or github_id is required".to_string(),
            ));
        }
    };

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LocalAuthRequest {
    role: String,
}

/// Development convenience: mints a synthetic local identity with the
/// requested role and hands back its provider id as the bearer token.
#[post("/auth/local", data = "<auth>")]
pub async fn api_local_auth(
    auth: Json<LocalAuthRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    let auth = auth.into_inner();

    if auth.role != "user" && auth.role != "admin" {
        return Err(AppError::Validation(
            "Invalid role. Must be 'user' or 'admin'".to_string(),
        ));
    }

    let email = format!("{}@local.dev", auth.role);
    let name = format!("Local {}", auth.role);
    let user = create_local_user(db, &email, &name, &auth.role).await?;
    let token = user.google_id.clone().unwrap_or_default();

    Ok(Json(json!({
        "user": user,
        "token": token,
        "message": "Local authentication successful"
    })))
}

/// Public listing. An authenticated caller additionally gets their own
/// vote and rating on every returned program.
#[get("/programs?<filters..>")]
pub async fn api_programs(
    filters: ProgramFilters,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Program>>, AppError> {
    let programs = list_programs(db, user.map(|u| u.id), &filters).await?;
    Ok(Json(programs))
}

#[derive(Deserialize, Validate)]
pub struct VoteRequest {
    program_id: i64,
    #[validate(range(min = -1, max = 1, message = "Invalid vote value"))]
    vote: i64,
}

/// Value 0 clears the caller's vote; -1/+1 upsert it.
#[post("/vote", data = "<vote>")]
pub async fn api_vote(
    vote: Json<VoteRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::VotePrograms)?;
    let request = vote.into_inner().validate_custom()?;

    if request.vote == 0 {
        remove_vote(db, user.id, request.program_id).await?;
    } else {
        set_vote(db, user.id, request.program_id, request.vote).await?;
    }

    Ok(Json(json!({"status": "success"})))
}

#[derive(Deserialize, Validate)]
pub struct RateRequest {
    #[validate(range(
        min = 0,
        max = 5,
        message = "Invalid rating value. Must be between 0 and 5 (0 to remove rating)"
    ))]
    rating: i64,
}

/// Value 0 clears the caller's rating; 1-5 upsert it.
#[post("/programs/<id>/rate", data = "<rating>")]
pub async fn api_rate_program(
    id: i64,
    rating: Json<RateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::RatePrograms)?;
    let request = rating.into_inner().validate_custom()?;

    if request.rating == 0 {
        remove_rating(db, user.id, id).await?;
    } else {
        set_rating(db, user.id, id, request.rating).await?;
    }

    Ok(Json(json!({"status": "success"})))
}

/// Submits a brand-new program; it enters the directory with pending
/// visibility until an admin approves it.
#[post("/programs/propose", data = "<propose>")]
pub async fn api_propose_program(
    propose: Json<ProposeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::ProposePrograms)?;
    let mut request = propose.into_inner().validate_custom()?;
    request.apply_defaults();

    let program = propose_program(db, &request).await?;

    Ok(Json(json!({
        "program": program,
        "message": "Program proposal submitted successfully. It will be reviewed by an administrator."
    })))
}

/// Submits a change proposal against an existing program.
#[post("/programs/proposals", data = "<proposal>")]
pub async fn api_create_proposal(
    proposal: Json<ProgramProposalRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::ProposePrograms)?;
    let request = proposal.into_inner().validate_custom()?;

    if request.program_id == 0 {
        return Err(AppError::Validation(
            "Program ID and reason are required".to_string(),
        ));
    }

    if !request.has_any_change() {
        return Err(AppError::Validation(
            "At least one proposed change must be provided".to_string(),
        ));
    }

    let proposal = create_program_proposal(db, user.id, &request).await?;

    Ok(Json(json!({
        "proposal": proposal,
        "message": "Program change proposal submitted successfully. It will be reviewed by an administrator."
    })))
}

#[get("/programs/proposals/user")]
pub async fn api_user_proposals(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<crate::models::ProgramProposal>>, AppError> {
    let proposals = list_user_proposals(db, user.id).await?;
    Ok(Json(proposals))
}

/// Author-only edit of a pending proposal.
#[put("/programs/proposals/<id>", data = "<proposal>")]
pub async fn api_update_proposal(
    id: i64,
    proposal: Json<ProgramProposalRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::EditOwnProposals)?;
    let request = proposal.into_inner().validate_custom()?;

    if !request.has_any_change() {
        return Err(AppError::Validation(
            "At least one proposed change must be provided".to_string(),
        ));
    }

    let proposal = update_user_proposal(db, id, user.id, &request).await?;

    Ok(Json(json!({
        "proposal": proposal,
        "message": "Program proposal updated successfully"
    })))
}

/// Author-only withdrawal of a pending proposal.
#[delete("/programs/proposals/<id>")]
pub async fn api_delete_proposal(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::EditOwnProposals)?;
    delete_user_proposal(db, id, user.id).await?;

    Ok(Json(json!({"message": "Proposal deleted successfully"})))
}

#[get("/admin/programs")]
pub async fn api_admin_pending_programs(
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Program>>, AppError> {
    admin.0.require_permission(Permission::ReviewPrograms)?;
    let programs = pending_programs(db).await?;
    Ok(Json(programs))
}

#[derive(Deserialize)]
pub struct AdminProgramAction {
    program_id: i64,
    action: String,
}

/// Approve or reject a pending program submission.
#[post("/admin/programs/action", data = "<action>")]
pub async fn api_admin_program_action(
    action: Json<AdminProgramAction>,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    admin.0.require_permission(Permission::ReviewPrograms)?;
    let request = action.into_inner();

    if request.action != "approve" && request.action != "reject" {
        return Err(AppError::Validation(
            "Invalid action. Must be 'approve' or 'reject'".to_string(),
        ));
    }

    let visibility = if request.action == "approve" {
        "approved"
    } else {
        "rejected"
    };

    set_program_visibility(db, request.program_id, visibility).await?;

    Ok(Json(json!({
        "message": format!("Program {} successfully", visibility),
        "status": visibility
    })))
}

#[get("/admin/programs/all?<filters..>")]
pub async fn api_admin_all_programs(
    filters: ProgramFilters,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Program>>, AppError> {
    admin.0.require_permission(Permission::ManagePrograms)?;
    let programs = list_all_programs(db, &filters).await?;
    Ok(Json(programs))
}

#[get("/admin/programs/<id>")]
pub async fn api_admin_get_program(
    id: i64,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Program>, AppError> {
    admin.0.require_permission(Permission::ManagePrograms)?;
    let program = program_by_id(db, id).await?;
    Ok(Json(program))
}

#[put("/admin/programs/update", data = "<update>")]
pub async fn api_admin_update_program(
    update: Json<ProgramUpdateRequest>,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    admin.0.require_permission(Permission::ManagePrograms)?;
    let mut request = update.into_inner().validate_custom()?;
    request.apply_defaults();

    let program = update_program(db, &request).await?;

    Ok(Json(json!({
        "program": program,
        "message": "Program updated successfully"
    })))
}

/// Review queue, one status at a time, defaulting to pending.
#[get("/admin/proposals?<status>")]
pub async fn api_admin_proposals(
    status: Option<String>,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<crate::models::ProgramProposal>>, AppError> {
    admin.0.require_permission(Permission::ReviewProposals)?;

    let status = status.unwrap_or_else(|| "pending".to_string());
    if !matches!(status.as_str(), "pending" | "approved" | "rejected") {
        return Err(AppError::Validation(format!(
            "Invalid status: {}",
            status
        )));
    }

    let proposals = list_proposals_by_status(db, &status).await?;
    Ok(Json(proposals))
}

#[derive(Deserialize)]
pub struct ProposalReviewRequest {
    #[serde(default)]
    proposal_id: i64,
    action: String,
    admin_notes: Option<String>,
}

#[post("/admin/proposals/review", data = "<review>")]
pub async fn api_admin_review_proposal(
    review: Json<ProposalReviewRequest>,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, AppError> {
    admin.0.require_permission(Permission::ReviewProposals)?;
    let request = review.into_inner();

    if request.proposal_id == 0 {
        return Err(AppError::Validation("Proposal ID is required".to_string()));
    }

    if request.action != "approve" && request.action != "reject" {
        return Err(AppError::Validation(
            "Invalid action. Must be 'approve' or 'reject'".to_string(),
        ));
    }

    review_program_proposal(
        db,
        request.proposal_id,
        admin.0.id,
        &request.action,
        request.admin_notes.as_deref(),
    )
    .await?;

    let status = if request.action == "approve" {
        "approved"
    } else {
        "rejected"
    };

    Ok(Json(json!({
        "message": format!("Program proposal {} successfully", status),
        "status": status
    })))
}
