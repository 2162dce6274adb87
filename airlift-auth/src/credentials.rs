use crate::config::OAuthSettings;
use crate::error::AuthError;
use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::PathBuf;

/// A stored OAuth credential. Both expiry instants are persisted as unix
/// seconds so the file stays readable by other tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub refresh_expires_at: DateTime<Utc>,
}

impl Credential {
    /// Builds a credential from token-endpoint lifetimes, anchored at `now`.
    pub fn with_lifetimes(
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
        refresh_expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: now + chrono::Duration::seconds(expires_in_secs),
            refresh_expires_at: now + chrono::Duration::seconds(refresh_expires_in_secs),
        }
    }

    /// The access token still works at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The access token has lapsed but the refresh token has not.
    pub fn is_refreshable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_usable_at(now) && now < self.refresh_expires_at
    }
}

/// How new or refreshed credentials are obtained. [`CredentialStore::get_token`]
/// drives the lifecycle through this seam so tests can substitute the
/// browser flow.
pub trait AuthFlow {
    fn authorize(&self) -> impl Future<Output = Result<Credential, AuthError>> + Send;
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Credential, AuthError>> + Send;
}

#[derive(Clone)]
pub struct CredentialStore {
    credential_path: PathBuf,
}

impl CredentialStore {
    pub fn new(credential_dir: PathBuf) -> Result<Self, AuthError> {
        if !credential_dir.exists() {
            fs::create_dir_all(&credential_dir).map_err(|e| {
                AuthError::CredentialStorage(format!("Failed to create credential directory: {}", e))
            })?;
        }

        Ok(Self {
            credential_path: credential_dir.join("credential.json"),
        })
    }

    pub fn from_settings(settings: &OAuthSettings) -> Result<Self, AuthError> {
        let dir = match &settings.credential_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .ok_or_else(|| {
                    AuthError::CredentialStorage("No cache directory on this platform".to_string())
                })?
                .join("airlift"),
        };
        Self::new(dir)
    }

    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(credential)?;

        fs::write(&self.credential_path, json)
            .map_err(|e| AuthError::CredentialStorage(format!("Failed to save credential: {}", e)))?;

        // Owner-only: the file holds live tokens.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.credential_path)
                .map_err(|e| {
                    AuthError::CredentialStorage(format!("Failed to read file permissions: {}", e))
                })?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.credential_path, perms).map_err(|e| {
                AuthError::CredentialStorage(format!("Failed to set file permissions: {}", e))
            })?;
        }

        Ok(())
    }

    pub fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.credential_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.credential_path)
            .map_err(|e| AuthError::CredentialStorage(format!("Failed to read credential: {}", e)))?;

        // A mangled file is treated as absent so the flow can recover.
        match serde_json::from_str(&json) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential is unreadable, discarding");
                self.delete()?;
                Ok(None)
            }
        }
    }

    pub fn delete(&self) -> Result<(), AuthError> {
        if self.credential_path.exists() {
            fs::remove_file(&self.credential_path).map_err(|e| {
                AuthError::CredentialStorage(format!("Failed to delete credential: {}", e))
            })?;
        }
        Ok(())
    }

    /// Returns a usable access token, walking the credential through its
    /// lifecycle: return it while it works, refresh it once when only the
    /// refresh token survives, and fall back to the interactive flow when
    /// nothing is left.
    pub async fn get_token<F: AuthFlow>(&self, flow: &F) -> Result<Credential, AuthError> {
        let now = Utc::now();

        if let Some(credential) = self.load()? {
            if credential.is_usable_at(now) {
                return Ok(credential);
            }

            if credential.is_refreshable_at(now) {
                match flow.refresh(&credential.refresh_token).await {
                    Ok(refreshed) => {
                        self.save(&refreshed)?;
                        return Ok(refreshed);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Refresh failed, discarding credential");
                        self.delete()?;
                    }
                }
            } else {
                // Both tokens lapsed. Drop the file before going interactive
                // so a failed authorization never leaves dead state behind.
                self.delete()?;
            }
        }

        let credential = flow.authorize().await?;
        self.save(&credential)?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn credential(expires_in: i64, refresh_expires_in: i64) -> Credential {
        Credential::with_lifetimes(
            "access".to_string(),
            "refresh".to_string(),
            expires_in,
            refresh_expires_in,
            Utc::now(),
        )
    }

    struct MockFlow {
        authorizes: AtomicUsize,
        refreshes: AtomicUsize,
        refresh_fails: bool,
    }

    impl MockFlow {
        fn new(refresh_fails: bool) -> Self {
            Self {
                authorizes: AtomicUsize::new(0),
                refreshes: AtomicUsize::new(0),
                refresh_fails,
            }
        }
    }

    impl AuthFlow for MockFlow {
        async fn authorize(&self) -> Result<Credential, AuthError> {
            self.authorizes.fetch_add(1, Ordering::SeqCst);
            Ok(credential(3600, 5_184_000))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<Credential, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_fails {
                Err(AuthError::RefreshFailed("invalid_grant".to_string()))
            } else {
                let mut c = credential(3600, 5_184_000);
                c.access_token = "refreshed".to_string();
                Ok(c)
            }
        }
    }

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn lifecycle_predicates_are_strict() {
        let now = Utc::now();
        let live = credential(3600, 5_184_000);
        assert!(live.is_usable_at(now));
        assert!(!live.is_refreshable_at(now));

        let lapsed = credential(-10, 5_184_000);
        assert!(!lapsed.is_usable_at(now));
        assert!(lapsed.is_refreshable_at(now));

        let dead = credential(-10, -5);
        assert!(!dead.is_usable_at(now));
        assert!(!dead.is_refreshable_at(now));
    }

    #[test]
    fn expiry_instants_round_trip_as_unix_seconds() {
        let c = credential(3600, 5_184_000);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["expires_at"].as_i64(), Some(c.expires_at.timestamp()));

        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back.expires_at.timestamp(), c.expires_at.timestamp());
        assert_eq!(
            back.refresh_expires_at.timestamp(),
            c.refresh_expires_at.timestamp()
        );
    }

    #[tokio::test]
    async fn usable_credential_is_returned_without_any_flow() {
        let (_dir, store) = store();
        store.save(&credential(3600, 5_184_000)).unwrap();

        let flow = MockFlow::new(false);
        let token = store.get_token(&flow).await.unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(flow.authorizes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lapsed_access_token_is_refreshed_exactly_once_and_saved() {
        let (_dir, store) = store();
        store.save(&credential(-10, 5_184_000)).unwrap();

        let flow = MockFlow::new(false);
        let token = store.get_token(&flow).await.unwrap();

        assert_eq!(token.access_token, "refreshed");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(flow.authorizes.load(Ordering::SeqCst), 0);

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.access_token, "refreshed");
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_interactive_flow() {
        let (_dir, store) = store();
        store.save(&credential(-10, 5_184_000)).unwrap();

        let flow = MockFlow::new(true);
        let token = store.get_token(&flow).await.unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(flow.authorizes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_credential_is_deleted_before_interactive_flow() {
        let (_dir, store) = store();
        store.save(&credential(-10, -5)).unwrap();

        let flow = MockFlow::new(false);
        let token = store.get_token(&flow).await.unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(flow.authorizes.load(Ordering::SeqCst), 1);
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_credential_file_triggers_interactive_flow() {
        let (dir, store) = store();
        fs::write(dir.path().join("credential.json"), "not json").unwrap();

        let flow = MockFlow::new(false);
        let token = store.get_token(&flow).await.unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(flow.authorizes.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = store();
        store.save(&credential(3600, 5_184_000)).unwrap();
        let mode = fs::metadata(dir.path().join("credential.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
