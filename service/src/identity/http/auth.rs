//! Request actor resolution
//!
//! The upstream identity provider authenticates the user and forwards the
//! account id in the `X-Account-Id` header. Roles are read from the accounts
//! table on every request.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts, response::Response};

use crate::http::{forbidden, internal_error, unauthorized};
use crate::identity::repo::{AccountRepo, AccountRepoError};
use crate::identity::role::Role;

pub const ACCOUNT_ID_HEADER: &str = "x-account-id";

/// Authenticated caller id, without requiring a stored account.
///
/// Used by the sign-in endpoint that creates the account on first contact.
pub struct AccountId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AccountId {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| unauthorized("Missing X-Account-Id header"))?;
        Ok(Self(id.to_string()))
    }
}

/// The account performing the request, with its current role.
#[derive(Debug, Clone)]
pub struct Actor {
    pub account_id: String,
    pub role: Role,
}

impl Actor {
    /// Reject the request unless the actor holds at least `min`.
    ///
    /// # Errors
    ///
    /// Returns a 403 response when the role is insufficient.
    #[allow(clippy::result_large_err)]
    pub fn require(&self, min: Role) -> Result<(), Response> {
        if self.role.at_least(min) {
            Ok(())
        } else {
            tracing::info!(account_id = %self.account_id, role = %self.role, required = %min, "forbidden");
            Err(forbidden(&format!("Requires {min} role")))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AccountId(account_id) = AccountId::from_request_parts(parts, state).await?;

        let repo = parts
            .extensions
            .get::<Arc<dyn AccountRepo>>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AccountRepo extension missing");
                internal_error()
            })?;

        match repo.get_account(&account_id).await {
            Ok(account) => Ok(Self {
                account_id: account.id,
                role: account.role,
            }),
            Err(AccountRepoError::NotFound) => Err(unauthorized("Unknown account")),
            Err(e) => {
                tracing::error!(account_id = %account_id, "actor lookup failed: {e}");
                Err(internal_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::repo::mock::InMemoryAccountRepo;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn whoami(actor: Actor) -> String {
        format!("{}:{}", actor.account_id, actor.role)
    }

    async fn editor_only(actor: Actor) -> Result<&'static str, Response> {
        actor.require(Role::Editor)?;
        Ok("ok")
    }

    fn test_router() -> Router {
        let repo = InMemoryAccountRepo::new();
        repo.insert("reader-1", "r@example.com", Role::Reader);
        repo.insert("editor-1", "e@example.com", Role::Editor);
        Router::new()
            .route("/whoami", get(whoami))
            .route("/editor", get(editor_only))
            .layer(Extension(Arc::new(repo) as Arc<dyn AccountRepo>))
    }

    fn request(uri: &str, account: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = account {
            builder = builder.header(ACCOUNT_ID_HEADER, id);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn resolves_role_from_repo() {
        let response = test_router()
            .oneshot(request("/whoami", Some("editor-1")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(&body[..], b"editor-1:editor");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let response = test_router()
            .oneshot(request("/whoami", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_account_is_unauthorized() {
        let response = test_router()
            .oneshot(request("/whoami", Some("ghost")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn insufficient_role_is_forbidden() {
        let response = test_router()
            .oneshot(request("/editor", Some("reader-1")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = test_router()
            .oneshot(request("/editor", Some("editor-1")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
