use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Program {
    pub id: i64,
    pub university_id: i64,
    pub name: String,
    pub description: String,
    pub degree_type: String,
    pub country: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub cost: String,
    pub status: String,
    pub visibility: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub university_name: String,
    pub average_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<i64>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProgram {
    pub id: Option<i64>,
    pub university_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub degree_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub url: Option<String>,
    pub cost: Option<String>,
    pub status: Option<String>,
    pub visibility: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub university_name: Option<String>,
    #[sqlx(default)]
    pub average_rating: Option<f64>,
}

impl From<DbProgram> for Program {
    fn from(db: DbProgram) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            university_id: db.university_id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            degree_type: db.degree_type.unwrap_or_default(),
            country: db.country.unwrap_or_default(),
            city: db.city.unwrap_or_default(),
            state: db.state,
            url: db.url,
            cost: db.cost.unwrap_or_default(),
            status: db.status.unwrap_or_default(),
            visibility: db.visibility.unwrap_or_default(),
            created_at: lift_utc(db.created_at),
            updated_at: lift_utc(db.updated_at),
            university_name: db.university_name.unwrap_or_default(),
            average_rating: db.average_rating.unwrap_or_default(),
            user_vote: None,
            user_rating: None,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ProgramProposal {
    pub id: i64,
    pub program_id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_degree_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_cost: Option<String>,
    pub reason: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Joined display fields, present on listing queries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProgramProposal {
    pub id: Option<i64>,
    pub program_id: Option<i64>,
    pub user_id: Option<i64>,
    pub proposed_name: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_degree_type: Option<String>,
    pub proposed_country: Option<String>,
    pub proposed_city: Option<String>,
    pub proposed_state: Option<String>,
    pub proposed_url: Option<String>,
    pub proposed_cost: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub user_name: Option<String>,
    #[sqlx(default)]
    pub user_email: Option<String>,
    #[sqlx(default)]
    pub program_name: Option<String>,
    #[sqlx(default)]
    pub university_name: Option<String>,
    #[sqlx(default)]
    pub reviewer_name: Option<String>,
}

impl From<DbProgramProposal> for ProgramProposal {
    fn from(db: DbProgramProposal) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            program_id: db.program_id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            proposed_name: db.proposed_name,
            proposed_description: db.proposed_description,
            proposed_degree_type: db.proposed_degree_type,
            proposed_country: db.proposed_country,
            proposed_city: db.proposed_city,
            proposed_state: db.proposed_state,
            proposed_url: db.proposed_url,
            proposed_cost: db.proposed_cost,
            reason: db.reason.unwrap_or_default(),
            status: db.status.unwrap_or_default(),
            admin_notes: db.admin_notes,
            reviewed_by: db.reviewed_by,
            reviewed_at: db
                .reviewed_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)),
            created_at: lift_utc(db.created_at),
            updated_at: lift_utc(db.updated_at),
            user_name: db.user_name,
            user_email: db.user_email,
            program_name: db.program_name,
            university_name: db.university_name,
            reviewer_name: db.reviewer_name,
        }
    }
}

/// Submission of a brand-new program, persisted directly with pending
/// visibility. Degree type and country fall back to the commonest values
/// when omitted.
#[derive(Deserialize, Validate, Debug, Clone)]
pub struct ProposeRequest {
    #[validate(length(min = 1, message = "University name is required"))]
    pub university_name: String,
    #[validate(length(min = 1, message = "Program name is required"))]
    pub program_name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    pub degree_type: String,
    #[serde(default)]
    pub country: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    pub state: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub cost: String,
}

impl ProposeRequest {
    pub fn apply_defaults(&mut self) {
        if self.degree_type.is_empty() {
            self.degree_type = "masters".to_string();
        }
        if self.country.is_empty() {
            self.country = "United States".to_string();
        }
    }
}

/// Full-field admin edit of an existing program.
#[derive(Deserialize, Validate, Debug, Clone)]
pub struct ProgramUpdateRequest {
    pub id: i64,
    #[validate(length(min = 1, message = "University name is required"))]
    pub university_name: String,
    #[validate(length(min = 1, message = "Program name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    pub degree_type: String,
    #[serde(default)]
    pub country: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    pub state: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub cost: String,
}

impl ProgramUpdateRequest {
    pub fn apply_defaults(&mut self) {
        if self.degree_type.is_empty() {
            self.degree_type = "masters".to_string();
        }
        if self.country.is_empty() {
            self.country = "United States".to_string();
        }
    }
}

/// A change proposal against an existing program: nullable overrides plus
/// a mandatory human-readable reason.
#[derive(Deserialize, Validate, Debug, Clone)]
pub struct ProgramProposalRequest {
    #[serde(default)]
    pub program_id: i64,
    pub proposed_name: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_degree_type: Option<String>,
    pub proposed_country: Option<String>,
    pub proposed_city: Option<String>,
    pub proposed_state: Option<String>,
    pub proposed_url: Option<String>,
    pub proposed_cost: Option<String>,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
}

impl ProgramProposalRequest {
    pub fn has_any_change(&self) -> bool {
        self.proposed_name.is_some()
            || self.proposed_description.is_some()
            || self.proposed_degree_type.is_some()
            || self.proposed_country.is_some()
            || self.proposed_city.is_some()
            || self.proposed_state.is_some()
            || self.proposed_url.is_some()
            || self.proposed_cost.is_some()
    }
}

fn lift_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}
