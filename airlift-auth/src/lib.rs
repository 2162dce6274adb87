// Credential lifecycle for the Airtable OAuth integration: storage, PKCE,
// the localhost redirect server, and the interactive acquisition flow.
mod acquirer;
pub mod config;
mod context;
mod credentials;
mod error;
mod exchange;
mod pkce;
pub mod server;

pub use acquirer::TokenAcquirer;
pub use config::OAuthSettings;
pub use context::AuthContext;
pub use credentials::{AuthFlow, Credential, CredentialStore};
pub use error::AuthError;
pub use exchange::HttpExchanger;

/// Loads settings, then walks the stored credential through its lifecycle,
/// going interactive only when nothing usable survives.
pub async fn get_token() -> Result<Credential, AuthError> {
    let settings = OAuthSettings::new()?;
    let store = CredentialStore::from_settings(&settings)?;
    let acquirer = TokenAcquirer::new(settings)?;
    store.get_token(&acquirer).await
}
