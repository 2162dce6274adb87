use super::AppState;
use crate::credentials::Credential;
use crate::error::AuthError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Airtable Connected</title>
    <style>
        body {
            margin: 0;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #F0FDF4;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
        }
        .card {
            background: white;
            border-radius: 12px;
            padding: 48px;
            box-shadow: 0 8px 32px rgba(0, 0, 0, 0.08);
            text-align: center;
            max-width: 400px;
        }
        h1 { color: #166534; font-size: 22px; margin: 0 0 12px 0; }
        p { color: #6B7280; margin: 0; line-height: 1.5; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Airtable connected</h1>
        <p>Authorization complete. You can close this window and return to the launcher.</p>
    </div>
</body>
</html>"#;

const ERROR_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorization Failed</title>
    <style>
        body {
            margin: 0;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #FEF2F2;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
        }
        .card {
            background: white;
            border-radius: 12px;
            padding: 48px;
            box-shadow: 0 8px 32px rgba(0, 0, 0, 0.08);
            text-align: center;
            max-width: 400px;
        }
        h1 { color: #991B1B; font-size: 22px; margin: 0 0 12px 0; }
        p { color: #6B7280; margin: 0 0 16px 0; line-height: 1.5; }
        .detail {
            background: #FEE2E2;
            border-radius: 8px;
            padding: 12px;
            color: #991B1B;
            font-family: monospace;
            font-size: 13px;
        }
    </style>
</head>
<body>
    <div class="card">
        <h1>Authorization failed</h1>
        <p>Close this window and try again from the launcher.</p>
        <div class="detail">{ERROR}</div>
    </div>
</body>
</html>"#;

fn error_page(status: StatusCode, detail: &str) -> Response {
    (status, Html(ERROR_HTML_TEMPLATE.replace("{ERROR}", detail))).into_response()
}

/// Fires the attempt's completion slot. A second outcome for the same attempt
/// finds the slot empty and is dropped.
async fn complete(state: &AppState, outcome: Result<Credential, AuthError>) {
    if let Some(sender) = state.completion.lock().await.take() {
        let _ = sender.send(outcome);
    }
}

/// Starts an authorization attempt and hands the browser to Airtable.
pub async fn authorize(State(state): State<AppState>) -> Response {
    match state.ctx.begin() {
        Ok((_, url)) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build authorization URL");
            error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        let detail = match params.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        tracing::warn!(error = %detail, "Authorization denied");
        complete(&state, Err(AuthError::Denied(detail.clone()))).await;
        return error_page(StatusCode::BAD_REQUEST, &detail);
    }

    // An unknown nonce is a stale or forged callback. No code exchange, and
    // the pending attempt keeps waiting.
    let verifier = match params.state.as_deref().and_then(|s| state.ctx.take_verifier(s)) {
        Some(verifier) => verifier,
        None => {
            tracing::warn!("Callback with unknown state parameter");
            return error_page(StatusCode::BAD_REQUEST, "Unrecognized authorization state");
        }
    };

    let code = match params.code {
        Some(code) => code,
        None => {
            tracing::warn!("Callback missing authorization code");
            return error_page(StatusCode::BAD_REQUEST, "Missing authorization code");
        }
    };

    match state.exchanger.exchange_code(&code, &verifier).await {
        Ok(credential) => {
            if let Err(e) = state.store.save(&credential) {
                tracing::error!(error = %e, "Failed to persist credential");
                complete(&state, Err(e)).await;
                return error_page(StatusCode::INTERNAL_SERVER_ERROR, "Could not save credential");
            }
            tracing::info!("Authorization complete");
            complete(&state, Ok(credential)).await;
            Html(SUCCESS_HTML.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Code exchange failed");
            let detail = e.to_string();
            complete(&state, Err(e)).await;
            error_page(StatusCode::BAD_GATEWAY, &detail)
        }
    }
}

/// Trades the stored refresh token for a new credential, no browser involved.
pub async fn refresh(State(state): State<AppState>) -> Response {
    let credential = match state.store.load() {
        Ok(Some(credential)) => credential,
        Ok(None) => return error_page(StatusCode::NOT_FOUND, "No stored credential to refresh"),
        Err(e) => return error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match state.exchanger.refresh(&credential.refresh_token).await {
        Ok(refreshed) => {
            if let Err(e) = state.store.save(&refreshed) {
                return error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
            tracing::info!("Credential refreshed");
            // The body is the new access token, so a curl caller can use it
            // directly.
            refreshed.access_token.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Refresh failed");
            error_page(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthSettings;
    use crate::context::AuthContext;
    use crate::exchange::HttpExchanger;
    use std::sync::Arc;
    use tokio::sync::{oneshot, Mutex};

    fn settings(dir: &tempfile::TempDir) -> OAuthSettings {
        OAuthSettings {
            client_id: "client123".to_string(),
            client_secret: None,
            airtable_url: "https://www.airtable.com".to_string(),
            port: 9093,
            redirect_uri: "http://localhost:9093/callback".to_string(),
            scope: "data.records:read".to_string(),
            credential_dir: Some(dir.path().to_path_buf()),
        }
    }

    fn app_state(dir: &tempfile::TempDir) -> (AppState, oneshot::Receiver<Result<Credential, AuthError>>) {
        let settings = settings(dir);
        let (tx, rx) = oneshot::channel();
        let state = AppState {
            ctx: Arc::new(AuthContext::new(settings.clone())),
            exchanger: Arc::new(HttpExchanger::new(settings.clone())),
            store: crate::credentials::CredentialStore::from_settings(&settings).unwrap(),
            completion: Arc::new(Mutex::new(Some(tx))),
        };
        (state, rx)
    }

    #[tokio::test]
    async fn unknown_state_is_rejected_without_completing_the_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut rx) = app_state(&dir);

        let response = callback(
            State(state),
            Query(CallbackParams {
                state: Some("forged".to_string()),
                code: Some("code123".to_string()),
                error: None,
                error_description: None,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // The waiting acquirer must keep waiting.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn provider_error_completes_the_attempt_as_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (state, rx) = app_state(&dir);

        let response = callback(
            State(state),
            Query(CallbackParams {
                state: None,
                code: None,
                error: Some("access_denied".to_string()),
                error_description: Some("User cancelled".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        match rx.await.unwrap() {
            Err(AuthError::Denied(detail)) => {
                assert_eq!(detail, "access_denied: User cancelled")
            }
            other => panic!("unexpected outcome: {:?}", other.map(|c| c.access_token)),
        }
    }

    #[tokio::test]
    async fn missing_code_after_valid_state_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(&dir);
        let (nonce, _) = state.ctx.begin().unwrap();

        let response = callback(
            State(state),
            Query(CallbackParams {
                state: Some(nonce),
                code: None,
                error: None,
                error_description: None,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn authorize_redirects_to_provider() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(&dir);

        let response = authorize(State(state)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert!(location.starts_with("https://www.airtable.com/oauth2/v1/authorize?"));
    }
}
