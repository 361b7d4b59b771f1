//! HTTP handlers for accounts and roles

pub mod auth;

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use self::auth::{AccountId, Actor};
use super::repo::{Account, AccountRepo, AccountRepoError, SessionInfo};
use super::role::{check_role_change, Role};
use crate::http::{bad_request, forbidden, internal_error, not_found, ErrorResponse};
use crate::members::http::MemberBody;
use crate::members::service::{MemberService, ProfileInput};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PushTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    pub role: Role,
}

fn account_error_response(e: AccountRepoError) -> Response {
    match e {
        AccountRepoError::NotFound => not_found("Account not found"),
        other => {
            tracing::error!("account operation failed: {other}");
            internal_error()
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/session", post(start_session))
        .route("/accounts/me", get(get_me))
        .route("/accounts/me/profile", post(complete_profile))
        .route("/accounts/me/push-token", put(register_push_token))
        .route("/accounts/{id}/role", put(change_role))
}

/// Record a sign-in, creating the account as a reader on first contact
#[utoipa::path(
    post,
    path = "/accounts/session",
    tag = "Accounts",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Current account", body = Account),
        (status = 401, description = "Missing X-Account-Id", body = ErrorResponse)
    )
)]
pub async fn start_session(
    AccountId(id): AccountId,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<Account>, Response> {
    let info = SessionInfo {
        email: req.email.trim().to_string(),
        display_name: req.display_name,
        photo_url: req.photo_url,
    };
    let account = repo
        .upsert_session(&id, &info)
        .await
        .map_err(account_error_response)?;
    tracing::info!(account_id = %account.id, role = %account.role, "session started");
    Ok(Json(account))
}

/// The calling account
#[utoipa::path(
    get,
    path = "/accounts/me",
    tag = "Accounts",
    responses((status = 200, description = "Current account", body = Account))
)]
pub async fn get_me(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
) -> Result<Json<Account>, Response> {
    let account = repo
        .get_account(&actor.account_id)
        .await
        .map_err(account_error_response)?;
    Ok(Json(account))
}

/// Complete the caller's profile and link it to a member record
#[utoipa::path(
    post,
    path = "/accounts/me/profile",
    tag = "Accounts",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Linked member record", body = MemberBody),
        (status = 400, description = "Invalid birth date", body = ErrorResponse)
    )
)]
pub async fn complete_profile(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
    Extension(members): Extension<Arc<MemberService>>,
    Json(input): Json<ProfileInput>,
) -> Result<Json<MemberBody>, Response> {
    let account = repo
        .get_account(&actor.account_id)
        .await
        .map_err(account_error_response)?;
    let member = members
        .complete_profile(&account, input)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(member.into()))
}

/// Register a push notification token for the caller
#[utoipa::path(
    put,
    path = "/accounts/me/push-token",
    tag = "Accounts",
    request_body = PushTokenRequest,
    responses((status = 204, description = "Registered"))
)]
pub async fn register_push_token(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
    Json(req): Json<PushTokenRequest>,
) -> Result<StatusCode, Response> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(bad_request("Push token cannot be empty"));
    }
    repo.add_push_token(&actor.account_id, token)
        .await
        .map_err(account_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all accounts (admin or above)
#[utoipa::path(
    get,
    path = "/accounts",
    tag = "Accounts",
    responses(
        (status = 200, description = "Accounts ordered by email", body = [Account]),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn list_accounts(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
) -> Result<Json<Vec<Account>>, Response> {
    actor.require(Role::Admin)?;
    let accounts = repo.list_accounts().await.map_err(account_error_response)?;
    Ok(Json(accounts))
}

/// Change an account's role (admin or above)
#[utoipa::path(
    put,
    path = "/accounts/{id}/role",
    tag = "Accounts",
    params(("id" = String, Path, description = "Account id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Updated account", body = Account),
        (status = 403, description = "Change not permitted", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
pub async fn change_role(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn AccountRepo>>,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Account>, Response> {
    actor.require(Role::Admin)?;
    let target = repo.get_account(&id).await.map_err(account_error_response)?;
    check_role_change(actor.role, target.role, req.role).map_err(|e| forbidden(&e.to_string()))?;

    let updated = repo
        .set_role(&id, req.role)
        .await
        .map_err(account_error_response)?;
    tracing::info!(
        account_id = %updated.id,
        from = %target.role,
        to = %updated.role,
        by = %actor.account_id,
        "role changed"
    );
    Ok(Json(updated))
}
