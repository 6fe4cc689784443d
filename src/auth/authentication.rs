use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::db::find_user_by_provider_id;

use super::{Role, User};

/// The bearer token is the caller's OAuth provider id, taken at face
/// value. Verification is assumed to have happened upstream.
fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    let header = request.headers().get_one("Authorization")?;
    let (scheme, token) = header.split_once(' ')?;
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let token = match bearer_token(request) {
            Some(token) => token.to_string(),
            _ => return Outcome::Error((Status::Unauthorized, ())),
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match find_user_by_provider_id(db, &token).await {
            Ok(Some(user)) => {
                tracing::info!(email = %user.email, role = %user.role.as_str(), "User authenticated via bearer token");
                Outcome::Success(user)
            }
            Ok(_) => {
                tracing::warn!("Bearer token does not resolve to a user");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Err(err) => {
                tracing::error!(error = ?err, "Failed to look up user for bearer token");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// Request guard for admin-only routes. Runs before body parsing, so a
/// non-admin caller gets 403 regardless of payload validity.
pub struct Admin(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.guard::<User>().await {
            Outcome::Success(user) if user.role == Role::Admin => Outcome::Success(Admin(user)),
            Outcome::Success(user) => {
                tracing::warn!(email = %user.email, "Admin access denied");
                Outcome::Error((Status::Forbidden, ()))
            }
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Forbidden",
        "message": "Admin access required"
    });

    Custom(Status::Forbidden, Json(error_json))
}
