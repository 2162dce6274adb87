use airlift_auth::server::{self, AppState};
use airlift_auth::{AuthContext, CredentialStore, HttpExchanger, OAuthSettings};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Standalone authorization server. The launcher normally runs an ephemeral
/// one itself; this binary keeps the routes up for debugging a client setup.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    let settings = OAuthSettings::new()?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let state = AppState {
        ctx: Arc::new(AuthContext::new(settings.clone())),
        exchanger: Arc::new(HttpExchanger::new(settings.clone())),
        store: CredentialStore::from_settings(&settings)?,
        // No caller is waiting on this instance, outcomes only hit the log.
        completion: Arc::new(Mutex::new(None)),
    };

    let addr = format!("127.0.0.1:{}", settings.port);
    tracing::info!(%addr, "Starting authorization server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
