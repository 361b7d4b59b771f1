//! HTTP handlers for member records

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use fw_roster::{DuplicateGroup, Member, MemberId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::service::{
    EmailSyncReport, MemberFilter, MemberInput, MemberService, MemberServiceError, MemberStats,
    UpcomingBirthday,
};
use crate::http::{bad_request, conflict, internal_error, not_found, ErrorResponse};
use crate::identity::http::auth::Actor;
use crate::identity::role::Role;

/// Member record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberBody {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birth_date: Option<String>,
    #[schema(example = "congregant")]
    pub membership_type: String,
    #[schema(example = "active")]
    pub status: String,
    pub linked_account_id: Option<String>,
    pub notes: Option<String>,
}

impl From<Member> for MemberBody {
    fn from(m: Member) -> Self {
        Self {
            id: m.id.to_string(),
            full_name: m.full_name,
            email: m.email,
            phone_number: m.phone_number,
            birth_date: m.birth_date,
            membership_type: m.membership_type.to_string(),
            status: m.status.to_string(),
            linked_account_id: m.linked_account_id,
            notes: m.notes,
        }
    }
}

fn group_body(group: DuplicateGroup) -> Vec<MemberBody> {
    group.into_members().into_iter().map(MemberBody::from).collect()
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    /// Window in days, inclusive. Defaults to the configured window.
    pub within: Option<i64>,
    /// Maximum number of results. Defaults to the configured limit.
    pub limit: Option<usize>,
    /// Reference date, `YYYY-MM-DD`. Defaults to today (UTC).
    pub reference: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsQuery {
    pub reference: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeRequest {
    pub primary_id: String,
    pub secondary_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SyncEmailsRequest {
    #[serde(default)]
    pub dry_run: bool,
}

impl IntoResponse for MemberServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(msg) => bad_request(&msg),
            Self::NotFound => not_found("Member not found"),
            Self::Conflict(msg) => conflict(&msg),
            Self::Internal(_) => internal_error(),
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn router() -> Router {
    Router::new()
        .route("/members", get(list_members).post(create_member))
        .route("/members/birthdays/upcoming", get(upcoming_birthdays))
        .route("/members/stats", get(member_stats))
        .route("/members/duplicates", get(list_duplicates))
        .route("/members/merge", post(merge_members))
        .route("/members/sync-emails", post(sync_emails))
        .route(
            "/members/{id}",
            get(get_member).put(update_member).delete(delete_member),
        )
}

/// List members, optionally filtered by name and membership type
#[utoipa::path(
    get,
    path = "/members",
    tag = "Members",
    params(
        ("search" = Option<String>, Query, description = "Case-insensitive name substring"),
        ("type" = Option<String>, Query, description = "Membership type")
    ),
    responses(
        (status = 200, description = "Members ordered by name", body = [MemberBody]),
        (status = 401, description = "Missing or unknown account", body = ErrorResponse)
    )
)]
pub async fn list_members(
    _actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Query(filter): Query<MemberFilter>,
) -> Result<Json<Vec<MemberBody>>, MemberServiceError> {
    let members = service.list(&filter).await?;
    Ok(Json(members.into_iter().map(MemberBody::from).collect()))
}

/// Get one member
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "Members",
    params(("id" = String, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member", body = MemberBody),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_member(
    _actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Path(id): Path<String>,
) -> Result<Json<MemberBody>, MemberServiceError> {
    Ok(Json(service.get(&MemberId::new(id)).await?.into()))
}

/// Create a member (editor or above)
#[utoipa::path(
    post,
    path = "/members",
    tag = "Members",
    request_body = MemberInput,
    responses(
        (status = 201, description = "Created", body = MemberBody),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn create_member(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Json(input): Json<MemberInput>,
) -> Result<Response, Response> {
    actor.require(Role::Editor)?;
    let member = service.create(input).await.map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(MemberBody::from(member))).into_response())
}

/// Update a member (editor or above)
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "Members",
    params(("id" = String, Path, description = "Member id")),
    request_body = MemberInput,
    responses(
        (status = 200, description = "Updated", body = MemberBody),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn update_member(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Path(id): Path<String>,
    Json(input): Json<MemberInput>,
) -> Result<Json<MemberBody>, Response> {
    actor.require(Role::Editor)?;
    let member = service
        .update(&MemberId::new(id), input)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(member.into()))
}

/// Delete a member (admin or above)
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "Members",
    params(("id" = String, Path, description = "Member id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_member(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Response> {
    actor.require(Role::Admin)?;
    service
        .delete(&MemberId::new(id))
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upcoming birthdays, soonest first
#[utoipa::path(
    get,
    path = "/members/birthdays/upcoming",
    tag = "Members",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Upcoming birthdays", body = [UpcomingBirthday]),
        (status = 400, description = "Invalid window or limit", body = ErrorResponse)
    )
)]
pub async fn upcoming_birthdays(
    _actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<UpcomingBirthday>>, MemberServiceError> {
    let reference = query.reference.unwrap_or_else(today);
    let upcoming = service
        .upcoming_birthdays(reference, query.within, query.limit)
        .await?;
    Ok(Json(upcoming))
}

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/members/stats",
    tag = "Members",
    params(StatsQuery),
    responses((status = 200, description = "Counters", body = MemberStats))
)]
pub async fn member_stats(
    _actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<MemberStats>, MemberServiceError> {
    let reference = query.reference.unwrap_or_else(today);
    Ok(Json(service.stats(reference).await?))
}

/// Candidate duplicate groups (admin or above)
#[utoipa::path(
    get,
    path = "/members/duplicates",
    tag = "Members",
    responses(
        (status = 200, description = "Groups of suspected duplicates; the first member is the merge target", body = Vec<Vec<MemberBody>>),
        (status = 403, description = "Insufficient role", body = ErrorResponse)
    )
)]
pub async fn list_duplicates(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
) -> Result<Json<Vec<Vec<MemberBody>>>, Response> {
    actor.require(Role::Admin)?;
    let groups = service
        .duplicates()
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(groups.into_iter().map(group_body).collect()))
}

/// Merge the secondary member into the primary (admin or above)
#[utoipa::path(
    post,
    path = "/members/merge",
    tag = "Members",
    request_body = MergeRequest,
    responses(
        (status = 200, description = "Merged primary record", body = MemberBody),
        (status = 400, description = "Same id on both sides", body = ErrorResponse),
        (status = 404, description = "Either member missing", body = ErrorResponse)
    )
)]
pub async fn merge_members(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MemberBody>, Response> {
    actor.require(Role::Admin)?;
    let merged = service
        .merge(&MemberId::new(req.primary_id), &MemberId::new(req.secondary_id))
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(merged.into()))
}

/// Fill empty member emails from linked accounts (admin or above)
#[utoipa::path(
    post,
    path = "/members/sync-emails",
    tag = "Members",
    request_body = SyncEmailsRequest,
    responses((status = 200, description = "Sync counts", body = EmailSyncReport))
)]
pub async fn sync_emails(
    actor: Actor,
    Extension(service): Extension<Arc<MemberService>>,
    body: Option<Json<SyncEmailsRequest>>,
) -> Result<Json<EmailSyncReport>, Response> {
    actor.require(Role::Admin)?;
    let dry_run = body.is_some_and(|Json(b)| b.dry_run);
    let report = service
        .sync_emails(dry_run)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(report))
}
