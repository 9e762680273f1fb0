pub mod admin;
pub mod auth;
pub mod dean;
pub mod hod;
pub mod teacher;

use std::sync::Arc;

use axum::{Router, extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use utoipa::OpenApi;

use crate::{
    error::{Error, Result},
    model::User,
    scope::Caller,
    server::AppState,
};

/// Session key holding the logged in user's id.
pub const USER_ID: &str = "user_id";

#[derive(OpenApi)]
#[openapi(
    info(title = "LMS analytics", description = "Student progress and performance reports"),
    paths(
        auth::login,
        auth::logout,
        auth::me,
        hod::department_analytics,
        hod::course_analytics,
        hod::export_quiz_report,
        dean::school_analytics,
        dean::course_analytics,
        admin::student_progress,
        admin::course_analytics,
        teacher::course_analytics,
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> anyhow::Result<String> {
    Ok(ApiDoc::openapi().to_pretty_json()?)
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .merge(auth::routes())
            .merge(hod::routes())
            .merge(dean::routes())
            .merge(admin::routes())
            .merge(teacher::routes()),
    )
}

/// Loads the session's user. Reports re-read it on every request so role changes
/// apply without logging in again.
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| Error::Fatal(anyhow::anyhow!("session layer missing: {}", msg)))?;
        let Some(user_id) = session
            .get::<String>(USER_ID)
            .await
            .map_err(|e| Error::Fatal(e.into()))?
        else {
            return Err(Error::Unauthorized);
        };
        let user = state
            .store
            .get::<User>(&user_id)
            .await?
            .ok_or(Error::Unauthorized)?;
        Ok(user.into())
    }
}
