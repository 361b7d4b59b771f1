//! HTTP handlers for honor plans

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::{HonorPlan, HonorPlanInput};
use super::repo::{HonorRepo, HonorRepoError};
use super::share::{share_message, whatsapp_link};
use crate::http::{bad_request, internal_error, not_found, ErrorResponse};
use crate::identity::http::auth::Actor;
use crate::identity::{AccountRepo, Role};
use crate::members::MemberService;
use crate::notify::{spawn_push_to_all, Notifier, PushMessage};

pub const NEW_PLAN_PUSH_TITLE: &str = "New honor opportunity";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhotoRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShareLink {
    pub message: String,
    pub link: String,
}

fn honor_error_response(e: HonorRepoError) -> Response {
    match e {
        HonorRepoError::NotFound => not_found("Honor plan not found"),
        other => {
            tracing::error!("honor plan operation failed: {other}");
            internal_error()
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/honor-plans", get(list_plans).post(create_plan))
        .route("/honor-plans/{id}", get(get_plan).delete(delete_plan))
        .route("/honor-plans/{id}/photos", post(add_photo))
        .route("/honor-plans/{id}/share", get(share_plan))
}

/// List honor plans, latest target date first
#[utoipa::path(
    get,
    path = "/honor-plans",
    tag = "Honor plans",
    responses((status = 200, description = "Plans", body = [HonorPlan]))
)]
pub async fn list_plans(
    _actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
) -> Result<Json<Vec<HonorPlan>>, Response> {
    let plans = repo.list_plans().await.map_err(honor_error_response)?;
    Ok(Json(plans))
}

/// Get one honor plan
#[utoipa::path(
    get,
    path = "/honor-plans/{id}",
    tag = "Honor plans",
    params(("id" = Uuid, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Plan", body = HonorPlan),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_plan(
    _actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
    Path(id): Path<Uuid>,
) -> Result<Json<HonorPlan>, Response> {
    let plan = repo.get_plan(id).await.map_err(honor_error_response)?;
    Ok(Json(plan))
}

/// Create an honor plan and announce it (editor or above)
#[utoipa::path(
    post,
    path = "/honor-plans",
    tag = "Honor plans",
    request_body = HonorPlanInput,
    responses(
        (status = 201, description = "Created", body = HonorPlan),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn create_plan(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
    Extension(accounts): Extension<Arc<dyn AccountRepo>>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    Json(input): Json<HonorPlanInput>,
) -> Result<Response, Response> {
    actor.require(Role::Editor)?;
    let plan = input
        .into_plan(Utc::now())
        .map_err(|e| bad_request(&e.to_string()))?;
    let plan = repo.create_plan(&plan).await.map_err(honor_error_response)?;
    tracing::info!(plan_id = %plan.id, by = %actor.account_id, "honor plan created");

    spawn_push_to_all(
        accounts,
        notifier,
        PushMessage {
            title: NEW_PLAN_PUSH_TITLE.to_string(),
            body: plan.title.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(plan)).into_response())
}

/// Delete an honor plan (admin or above)
#[utoipa::path(
    delete,
    path = "/honor-plans/{id}",
    tag = "Honor plans",
    params(("id" = Uuid, Path, description = "Plan id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_plan(
    actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    actor.require(Role::Admin)?;
    repo.delete_plan(id).await.map_err(honor_error_response)?;
    tracing::info!(plan_id = %id, by = %actor.account_id, "honor plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an uploaded photo URL to a plan
#[utoipa::path(
    post,
    path = "/honor-plans/{id}/photos",
    tag = "Honor plans",
    params(("id" = Uuid, Path, description = "Plan id")),
    request_body = PhotoRequest,
    responses(
        (status = 200, description = "Updated plan", body = HonorPlan),
        (status = 400, description = "Invalid URL", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn add_photo(
    _actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PhotoRequest>,
) -> Result<Json<HonorPlan>, Response> {
    let url = req.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(bad_request("Photo URL must start with http:// or https://"));
    }
    let plan = repo.add_photo(id, url).await.map_err(honor_error_response)?;
    Ok(Json(plan))
}

/// WhatsApp share link for a plan
#[utoipa::path(
    get,
    path = "/honor-plans/{id}/share",
    tag = "Honor plans",
    params(("id" = Uuid, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Share message and link", body = ShareLink),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn share_plan(
    _actor: Actor,
    Extension(repo): Extension<Arc<dyn HonorRepo>>,
    Extension(members): Extension<Arc<MemberService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareLink>, Response> {
    let plan = repo.get_plan(id).await.map_err(honor_error_response)?;
    let roster = members
        .snapshot()
        .await
        .map_err(IntoResponse::into_response)?;

    let names: Vec<String> = plan
        .honoree_ids
        .iter()
        .filter_map(|hid| roster.iter().find(|m| m.id.as_str() == hid))
        .map(|m| m.full_name.clone())
        .collect();

    let message = share_message(&plan, &names);
    let link = whatsapp_link(&message);
    Ok(Json(ShareLink { message, link }))
}
