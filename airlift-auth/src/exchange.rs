use crate::config::OAuthSettings;
use crate::credentials::Credential;
use crate::error::AuthError;
use chrono::Utc;
use serde::Deserialize;

/// Airtable's token endpoint reports the refresh token lifetime alongside the
/// access token one, which the standard OAuth response shape does not carry.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    refresh_expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenEndpointError {
    fn describe(self) -> String {
        match self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error,
        }
    }
}

/// Talks to the token endpoint directly. Code exchange and refresh share the
/// same response handling.
pub struct HttpExchanger {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl HttpExchanger {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Credential, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
            ("client_id", self.settings.client_id.as_str()),
        ];
        self.post_token(&params).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.settings.scope.as_str()),
            ("client_id", self.settings.client_id.as_str()),
        ];
        self.post_token(&params)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> Result<Credential, AuthError> {
        let mut request = self.http.post(self.settings.token_url()).form(params);
        if let Some(secret) = &self.settings.client_secret {
            request = request.basic_auth(&self.settings.client_id, Some(secret));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenEndpointError>(&body)
                .map(TokenEndpointError::describe)
                .unwrap_or(body);
            return Err(AuthError::TokenEndpoint(format!("({}) {}", status, detail)));
        }

        let token: TokenEndpointResponse = response.json().await?;
        Ok(Credential::with_lifetimes(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            token.refresh_expires_in,
            Utc::now(),
        ))
    }
}
