pub mod handlers;

use crate::context::AuthContext;
use crate::credentials::{Credential, CredentialStore};
use crate::error::AuthError;
use crate::exchange::HttpExchanger;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tower_http::trace::TraceLayer;

/// One authorization attempt's completion slot. The callback handler fires it
/// once; whoever holds the receiver learns the outcome.
pub type CompletionSlot = Arc<Mutex<Option<oneshot::Sender<Result<Credential, AuthError>>>>>;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AuthContext>,
    pub exchanger: Arc<HttpExchanger>,
    pub store: CredentialStore,
    pub completion: CompletionSlot,
}

/// Routes: `/` starts an authorization, the redirect path finishes it, and
/// `/refresh` trades a refresh token without a browser round trip.
pub fn router(state: AppState) -> Router {
    let callback_path = state.ctx.settings().callback_path();
    Router::new()
        .route("/", get(handlers::authorize))
        .route(&callback_path, get(handlers::callback))
        .route("/refresh", get(handlers::refresh))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
