use crate::config::OAuthSettings;
use crate::context::AuthContext;
use crate::credentials::{AuthFlow, Credential, CredentialStore};
use crate::error::AuthError;
use crate::exchange::HttpExchanger;
use crate::server::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

/// How long the browser gets before the attempt is abandoned.
const AUTH_TIMEOUT_SECS: u64 = 20;

/// Runs the interactive flow: an ephemeral localhost server for the redirect,
/// the user's browser for consent, and a watchdog so an abandoned consent
/// screen cannot hang the caller.
pub struct TokenAcquirer {
    settings: OAuthSettings,
    ctx: Arc<AuthContext>,
    exchanger: Arc<HttpExchanger>,
    store: CredentialStore,
}

impl TokenAcquirer {
    pub fn new(settings: OAuthSettings) -> Result<Self, AuthError> {
        settings.validate().map_err(AuthError::Configuration)?;
        let store = CredentialStore::from_settings(&settings)?;
        Ok(Self {
            ctx: Arc::new(AuthContext::new(settings.clone())),
            exchanger: Arc::new(HttpExchanger::new(settings.clone())),
            store,
            settings,
        })
    }

    async fn run_interactive(&self) -> Result<Credential, AuthError> {
        let (tx, rx) = oneshot::channel();
        let state = AppState {
            ctx: self.ctx.clone(),
            exchanger: self.exchanger.clone(),
            store: self.store.clone(),
            completion: Arc::new(Mutex::new(Some(tx))),
        };

        let addr = format!("127.0.0.1:{}", self.settings.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::debug!(%addr, "Authorization server listening");

        let app = server::router(state);
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Authorization server stopped");
            }
        });

        let (_, auth_url) = self.ctx.begin()?;
        if let Err(e) = open::that(&auth_url) {
            tracing::warn!(error = %e, "Could not open a browser, prompting instead");
            println!("Open this URL in your browser to authorize:\n{}\n", auth_url);
        }

        let outcome = tokio::time::timeout(Duration::from_secs(AUTH_TIMEOUT_SECS), rx).await;
        server_task.abort();

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::Denied(
                "Authorization ended without an outcome".to_string(),
            )),
            Err(_) => Err(AuthError::Timeout),
        }
    }
}

impl AuthFlow for TokenAcquirer {
    async fn authorize(&self) -> Result<Credential, AuthError> {
        self.run_interactive().await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        self.exchanger.refresh(refresh_token).await
    }
}
