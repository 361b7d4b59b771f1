use std::sync::Arc;

use axum::{extract::Extension, response::Response, routing::post, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{email_audience, push_to_all, EmailMessage, EmailReport, Notifier, PushMessage, PushReport};
use crate::http::{bad_request, internal_error, ErrorResponse};
use crate::identity::http::auth::Actor;
use crate::identity::{AccountRepo, Role};

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub subject: String,
    pub message: String,
    /// Roles to address; empty means everyone.
    #[serde(default)]
    pub audience: Vec<Role>,
}

pub fn router() -> Router {
    Router::new()
        .route("/notifications/push", post(send_push))
        .route("/notifications/email", post(send_email))
}

#[allow(clippy::result_large_err)]
fn require_text(value: &str, field: &str) -> Result<(), Response> {
    if value.trim().is_empty() {
        Err(bad_request(&format!("{field} cannot be empty")))
    } else {
        Ok(())
    }
}

/// Push a notification to every registered device (admin or above)
#[utoipa::path(
    post,
    path = "/notifications/push",
    tag = "Notifications",
    request_body = PushMessage,
    responses(
        (status = 200, description = "Delivery counts", body = PushReport),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn send_push(
    actor: Actor,
    Extension(accounts): Extension<Arc<dyn AccountRepo>>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    Json(message): Json<PushMessage>,
) -> Result<Json<PushReport>, Response> {
    actor.require(Role::Admin)?;
    require_text(&message.title, "title")?;
    require_text(&message.body, "body")?;

    let report = push_to_all(accounts.as_ref(), notifier.as_ref(), &message)
        .await
        .map_err(|e| {
            tracing::error!(by = %actor.account_id, "push failed: {e}");
            internal_error()
        })?;
    tracing::info!(
        by = %actor.account_id,
        success = report.success_count,
        failure = report.failure_count,
        "push sent"
    );
    Ok(Json(report))
}

/// Email accounts filtered by role (admin or above)
#[utoipa::path(
    post,
    path = "/notifications/email",
    tag = "Notifications",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Recipient count", body = EmailReport),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn send_email(
    actor: Actor,
    Extension(accounts): Extension<Arc<dyn AccountRepo>>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<EmailReport>, Response> {
    actor.require(Role::Admin)?;
    require_text(&req.subject, "subject")?;
    require_text(&req.message, "message")?;

    let message = EmailMessage {
        subject: req.subject,
        message: req.message,
    };
    let report = email_audience(accounts.as_ref(), notifier.as_ref(), &req.audience, &message)
        .await
        .map_err(|e| {
            tracing::error!(by = %actor.account_id, "email failed: {e}");
            internal_error()
        })?;
    tracing::info!(by = %actor.account_id, recipients = report.recipients, "email sent");
    Ok(Json(report))
}
