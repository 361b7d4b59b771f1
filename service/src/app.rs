//! Router assembly shared by the server binary and the integration tests.

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Extension, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::build_info::BuildInfo;
use crate::honor::HonorRepo;
use crate::http::cors_layer;
use crate::identity::AccountRepo;
use crate::media::MediaSigner;
use crate::members::MemberService;
use crate::notify::Notifier;
use crate::rest::{self, ApiDoc};
use crate::{honor, identity, media, members, notify};

/// Everything the handlers pull out of request extensions.
#[derive(Clone)]
pub struct AppDeps {
    pub accounts: Arc<dyn AccountRepo>,
    pub members: Arc<MemberService>,
    pub honor: Arc<dyn HonorRepo>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Option<Arc<MediaSigner>>,
    pub build_info: BuildInfo,
}

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// `None` leaves the CORS layer off entirely.
    pub cors_origins: Option<Vec<String>>,
    pub swagger: bool,
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the full application router.
///
/// Layer order: routes, then extensions, then CORS, then request tracing
/// (outermost).
#[must_use]
pub fn build_app(deps: AppDeps, options: &AppOptions) -> Router {
    let api_v1 = Router::new()
        .route("/build-info", get(rest::get_build_info))
        .merge(identity::http::router())
        .merge(members::http::router())
        .merge(honor::http::router())
        .merge(notify::http::router())
        .merge(media::router());

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1);

    if options.swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    app = app
        .layer(Extension(deps.accounts))
        .layer(Extension(deps.members))
        .layer(Extension(deps.honor))
        .layer(Extension(deps.notifier))
        .layer(Extension(deps.media))
        .layer(Extension(deps.build_info));

    if let Some(origins) = &options.cors_origins {
        app = app.layer(cors_layer(origins));
    }

    app.layer(TraceLayer::new_for_http())
}
