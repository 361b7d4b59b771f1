//! `OpenAPI` documentation and the system endpoints.

// The OpenApi derive macro generates code that triggers this lint
#![allow(clippy::needless_for_each)]

use axum::{extract::Extension, Json};
use utoipa::OpenApi;

use crate::build_info::BuildInfo;
use crate::honor::{self, HonorPlan, HonorPlanInput, HonorStatus, MobilePayment};
use crate::http::ErrorResponse;
use crate::identity::{self, Account, Role};
use crate::media::{self, MediaAuth};
use crate::members::{self, EmailSyncReport, MemberInput, MemberStats, ProfileInput, UpcomingBirthday};
use crate::notify::{self, EmailMessage, EmailReport, PushMessage, PushReport};

/// `OpenAPI` documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fellowship API",
        version = "1.0.0",
        description = "Member directory, birthday calendar and honor plans for a church community"
    ),
    servers(
        (url = "/api/v1", description = "REST API v1")
    ),
    paths(
        get_build_info,
        identity::http::start_session,
        identity::http::get_me,
        identity::http::complete_profile,
        identity::http::register_push_token,
        identity::http::list_accounts,
        identity::http::change_role,
        members::http::list_members,
        members::http::get_member,
        members::http::create_member,
        members::http::update_member,
        members::http::delete_member,
        members::http::upcoming_birthdays,
        members::http::member_stats,
        members::http::list_duplicates,
        members::http::merge_members,
        members::http::sync_emails,
        honor::http::list_plans,
        honor::http::get_plan,
        honor::http::create_plan,
        honor::http::delete_plan,
        honor::http::add_photo,
        honor::http::share_plan,
        notify::http::send_push,
        notify::http::send_email,
        media::media_auth,
    ),
    components(schemas(
        BuildInfo,
        ErrorResponse,
        Account,
        Role,
        identity::http::SessionRequest,
        identity::http::PushTokenRequest,
        identity::http::RoleRequest,
        members::http::MemberBody,
        members::http::MergeRequest,
        members::http::SyncEmailsRequest,
        MemberInput,
        ProfileInput,
        UpcomingBirthday,
        MemberStats,
        EmailSyncReport,
        HonorPlan,
        HonorPlanInput,
        HonorStatus,
        MobilePayment,
        honor::http::PhotoRequest,
        honor::http::ShareLink,
        PushMessage,
        EmailMessage,
        PushReport,
        EmailReport,
        notify::http::EmailRequest,
        MediaAuth,
    ))
)]
pub struct ApiDoc;

/// Get build information
///
/// Returns the version, git SHA and build time of the running service.
#[utoipa::path(
    get,
    path = "/build-info",
    tag = "System",
    responses(
        (status = 200, description = "Build information", body = BuildInfo)
    )
)]
#[allow(clippy::unused_async)] // Required for Axum handler signature
pub async fn get_build_info(Extension(build_info): Extension<BuildInfo>) -> Json<BuildInfo> {
    Json(build_info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_router() {
        let doc = ApiDoc::openapi();
        for path in [
            "/build-info",
            "/accounts/session",
            "/accounts/{id}/role",
            "/members",
            "/members/{id}",
            "/members/birthdays/upcoming",
            "/members/merge",
            "/honor-plans/{id}/share",
            "/notifications/email",
            "/media/auth",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
