use crate::config::OAuthSettings;
use crate::error::AuthError;
use crate::pkce::{state_nonce, PkcePair};
use dashmap::DashMap;
use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};

/// Per-process authorization state. Each attempt gets a `state` nonce keyed
/// to its PKCE verifier; the callback handler claims the verifier back by
/// nonce, so concurrent attempts never collide.
pub struct AuthContext {
    settings: OAuthSettings,
    pending: DashMap<String, String>,
}

impl AuthContext {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            pending: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Starts an authorization attempt: generates PKCE material, remembers
    /// the verifier under a fresh state nonce, and returns the browser URL.
    pub fn begin(&self) -> Result<(String, String), AuthError> {
        let auth_url = AuthUrl::new(self.settings.authorize_url())
            .map_err(|e| AuthError::Configuration(format!("Invalid authorize URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(self.settings.redirect_uri.clone())
            .map_err(|e| AuthError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        let pkce = PkcePair::generate();
        let state = state_nonce();
        let csrf = CsrfToken::new(state.clone());

        let (url, _) = BasicClient::new(ClientId::new(self.settings.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url)
            .authorize_url(|| csrf)
            .add_scopes(
                self.settings
                    .scope
                    .split_whitespace()
                    .map(|s| Scope::new(s.to_string())),
            )
            .set_pkce_challenge(pkce.challenge)
            .url();

        self.pending.insert(state.clone(), pkce.verifier.secret().to_string());
        Ok((state, url.to_string()))
    }

    /// Claims the verifier for a callback. Each nonce resolves at most once;
    /// an unknown nonce means a stale or forged callback.
    pub fn take_verifier(&self, state: &str) -> Option<String> {
        self.pending.remove(state).map(|(_, verifier)| verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> AuthContext {
        AuthContext::new(OAuthSettings {
            client_id: "client123".to_string(),
            client_secret: None,
            airtable_url: "https://www.airtable.com".to_string(),
            port: 9093,
            redirect_uri: "http://localhost:9093/callback".to_string(),
            scope: "data.records:read schema.bases:read".to_string(),
            credential_dir: None,
        })
    }

    #[test]
    fn begin_produces_pkce_authorization_url() {
        let ctx = context();
        let (state, url) = ctx.begin().unwrap();

        let url = url::Url::parse(&url).unwrap();
        assert_eq!(url.path(), "/oauth2/v1/authorize");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], state);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["scope"], "data.records:read schema.bases:read");
        assert!(params.contains_key("code_challenge"));
        assert_eq!(params["redirect_uri"], "http://localhost:9093/callback");
    }

    #[test]
    fn verifier_resolves_at_most_once_per_state() {
        let ctx = context();
        let (state, _) = ctx.begin().unwrap();

        assert!(ctx.take_verifier(&state).is_some());
        assert!(ctx.take_verifier(&state).is_none());
        assert!(ctx.take_verifier("unknown").is_none());
    }

    #[test]
    fn concurrent_attempts_keep_separate_verifiers() {
        let ctx = context();
        let (state_a, _) = ctx.begin().unwrap();
        let (state_b, _) = ctx.begin().unwrap();
        assert_ne!(state_a, state_b);

        let verifier_b = ctx.take_verifier(&state_b).unwrap();
        let verifier_a = ctx.take_verifier(&state_a).unwrap();
        assert_ne!(verifier_a, verifier_b);
    }
}
