use std::sync::Arc;

use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use axum::{
    Router,
    extract::{Json, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::USER_ID;
use crate::{
    error::{Error, Result},
    model::{Role, User},
    scope::Caller,
    server::AppState,
    store::Store,
};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CallerInfo {
    pub id: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub department: Option<String>,
    pub school: Option<String>,
}

impl From<Caller> for CallerInfo {
    fn from(caller: Caller) -> Self {
        Self {
            id: caller.id,
            name: caller.name,
            roles: caller.roles.iter().collect(),
            department: caller.department,
            school: caller.school,
        }
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string())
}

async fn verify_login(store: &Store, email: &str, password: &str) -> Result<User> {
    let Some(user) = store.find_one::<User>("email", email).await? else {
        return Err(Error::Unauthorized);
    };
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| Error::Unauthorized)?;
    Ok(user)
}

#[utoipa::path(
    context_path = "/api/auth",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = CallerInfo),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<CallerInfo>> {
    let user = match verify_login(&state.store, &req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            warn!("login failed for {}: {}", req.email, e);
            return Err(e);
        }
    };
    session
        .cycle_id()
        .await
        .map_err(|e| Error::Fatal(e.into()))?;
    session
        .insert(USER_ID, &user.id)
        .await
        .map_err(|e| Error::Fatal(e.into()))?;
    info!("user {} logged in", user.id);
    Ok(Json(Caller::from(user).into()))
}

#[utoipa::path(
    context_path = "/api/auth",
    path = "/logout",
    method(post),
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout(session: Session) -> &'static str {
    if let Err(e) = session.delete().await {
        warn!("failed to delete session: {}", e);
    }
    "Logout successful"
}

#[utoipa::path(
    context_path = "/api/auth",
    path = "/me",
    method(get),
    responses(
        (status = 200, description = "The logged in user", body = CallerInfo),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(caller: Caller) -> Json<CallerInfo> {
    Json(caller.into())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}
