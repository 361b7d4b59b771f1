#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::sync::Arc;

use fellowship_api::{
    app::{build_app, AppDeps, AppOptions},
    build_info::BuildInfoProvider,
    config::Config,
    db::setup_database,
    honor::PgHonorRepo,
    identity::PgAccountRepo,
    media::MediaSigner,
    members::{MemberService, PgMemberRepo},
    notify::notifier_from_config,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load and validate configuration first (fail-fast)
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "fellowship-api starting up"
    );

    tracing::info!("Connecting to database...");
    let pool = setup_database(&config.database).await?;

    let build_info = BuildInfoProvider::from_env().build_info();
    tracing::info!(
        version = %build_info.version,
        git_sha = %build_info.git_sha,
        build_time = %build_info.build_time,
        "resolved build metadata"
    );

    let accounts = Arc::new(PgAccountRepo::new(pool.clone()));
    let members = Arc::new(MemberService::new(
        Arc::new(PgMemberRepo::new(pool.clone())),
        accounts.clone(),
        config.calendar.clone(),
    ));
    let notifier = notifier_from_config(&config.notifications)?;
    let media = MediaSigner::from_config(&config.media).map(Arc::new);
    if media.is_none() {
        tracing::info!("media signing not configured; /media/auth will return 503");
    }

    let mut events = members.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(?event, "roster changed"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "roster event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = build_app(
        AppDeps {
            accounts,
            members,
            honor: Arc::new(PgHonorRepo::new(pool)),
            notifier,
            media,
            build_info,
        },
        &AppOptions {
            cors_origins: Some(config.cors.allowed_origins.clone()),
            swagger: config.swagger.enabled,
        },
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting server at http://{addr}/api/v1");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
