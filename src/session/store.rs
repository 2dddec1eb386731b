use serde_json::Value;

use super::{AuthError, Session, SessionStorage, REMEMBERED_USERNAME_KEY, TOKEN_KEY, USER_INFO_KEY};
use crate::api::AuthApi;
use crate::types::{Credentials, LoginResponse, RegisterRequest, UserInfo};

/// Owns the session and its persistence. Every transition goes through here.
pub struct SessionStore<A, S> {
    api: A,
    storage: S,
    session: Session,
}

impl<A: AuthApi, S: SessionStorage> SessionStore<A, S> {
    /// Empty store; call [`SessionStore::restore`] to pick up a persisted session.
    pub fn new(api: A, storage: S) -> Self {
        Self { api, storage, session: Session::default() }
    }

    /// Rebuild the session from durable storage. An unreadable profile
    /// degrades to an empty one rather than failing startup.
    pub fn restore(api: A, storage: S) -> Self {
        let token = match storage.get(TOKEN_KEY) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read persisted token: {}", e);
                String::new()
            }
        };

        let user = match storage.get(USER_INFO_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<UserInfo>(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupt cached profile: {}", e);
                UserInfo::default()
            }),
            Ok(None) => UserInfo::default(),
            Err(e) => {
                tracing::warn!("Could not read cached profile: {}", e);
                UserInfo::default()
            }
        };

        Self { api, storage, session: Session { token, user } }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn remembered_username(&self) -> Option<String> {
        self.storage.get(REMEMBERED_USERNAME_KEY).ok().flatten()
    }

    /// Authenticate and persist the new session. Any failure leaves the
    /// current session exactly as it was.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<LoginResponse, AuthError> {
        let response = self.api.login(&credentials.username, &credentials.password).await?;
        if response.token.is_empty() {
            return Err(AuthError::InvalidCredentials("backend issued an empty token".to_string()));
        }

        let previous = self.saved_entries()?;
        if let Err(e) = self.persist(credentials, &response.token, &response.user_info) {
            self.restore_entries(previous);
            return Err(e);
        }

        self.session = Session::new(response.token.clone(), response.user_info.clone());
        tracing::info!("Logged in as {}", credentials.username);
        Ok(response)
    }

    /// Creates the account only; the caller logs in separately.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, AuthError> {
        let created = self.api.register(request).await?;
        tracing::info!("Registered account {}", request.username);
        Ok(created)
    }

    /// Best-effort remote invalidation, then an unconditional local clear.
    pub async fn logout(&mut self) {
        if self.session.authenticated() {
            if let Err(e) = self.api.logout(&self.session.token).await {
                tracing::warn!("Remote logout failed, clearing local session anyway: {}", e);
            }
        }

        self.session = Session::default();
        for key in [TOKEN_KEY, USER_INFO_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::error!("Failed to remove persisted {}: {}", key, e);
            }
        }
        tracing::info!("Logged out");
    }

    /// Re-fetch the profile. On failure the cached profile stays untouched.
    pub async fn refresh_profile(&mut self) -> Result<UserInfo, AuthError> {
        if !self.session.authenticated() {
            return Err(AuthError::InvalidCredentials("not logged in".to_string()));
        }

        let user = self.api.user_info(&self.session.token).await?;
        let raw = serde_json::to_string(&user).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.storage.set(USER_INFO_KEY, &raw)?;
        self.session.user = user.clone();
        Ok(user)
    }

    fn persist(
        &self,
        credentials: &Credentials,
        token: &str,
        user: &UserInfo,
    ) -> Result<(), AuthError> {
        let raw = serde_json::to_string(user).map_err(|e| AuthError::Storage(e.to_string()))?;
        if credentials.remember {
            self.storage.set(REMEMBERED_USERNAME_KEY, &credentials.username)?;
        } else {
            self.storage.remove(REMEMBERED_USERNAME_KEY)?;
        }
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_INFO_KEY, &raw)?;
        Ok(())
    }

    fn saved_entries(&self) -> Result<Vec<(&'static str, Option<String>)>, AuthError> {
        [TOKEN_KEY, USER_INFO_KEY, REMEMBERED_USERNAME_KEY]
            .into_iter()
            .map(|key| -> Result<_, AuthError> { Ok((key, self.storage.get(key)?)) })
            .collect()
    }

    /// Put back what a failed login partially overwrote.
    fn restore_entries(&self, entries: Vec<(&'static str, Option<String>)>) {
        for (key, value) in entries {
            let restored = match &value {
                Some(value) => self.storage.set(key, value),
                None => self.storage.remove(key),
            };
            if let Err(e) = restored {
                tracing::error!("Failed to restore persisted {} after a failed login: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryStorage, StorageError};
    use crate::testing::FakeBackend;

    /// Memory storage whose writes to one key always fail.
    struct ReadOnlyKey {
        inner: MemoryStorage,
        key: &'static str,
    }

    impl ReadOnlyKey {
        fn refuse(&self, key: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Io {
                    path: "session.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            Ok(())
        }
    }

    impl SessionStorage for ReadOnlyKey {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.refuse(key)?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.refuse(key)?;
            self.inner.remove(key)
        }
    }

    fn credentials(password: &str, remember: bool) -> Credentials {
        Credentials {
            username: "admin".to_string(),
            password: password.to_string(),
            remember,
        }
    }

    #[tokio::test]
    async fn login_persists_session() {
        let backend = FakeBackend::new();
        let mut store = SessionStore::new(backend.clone(), MemoryStorage::new());

        let response = store.login(&credentials(FakeBackend::USER_PASSWORD, true)).await.unwrap();
        assert!(store.session().authenticated());
        assert_eq!(store.session().token, response.token);
        assert_eq!(store.remembered_username().as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_session() {
        let backend = FakeBackend::new();
        let mut store = SessionStore::new(backend.clone(), MemoryStorage::new());
        store.login(&credentials(FakeBackend::USER_PASSWORD, false)).await.unwrap();
        let before = store.session().clone();

        let err = store.login(&credentials("wrong-password", false)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(store.session(), &before);

        backend.set_offline(true);
        let err = store.login(&credentials(FakeBackend::USER_PASSWORD, false)).await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert_eq!(store.session(), &before);
    }

    #[tokio::test]
    async fn logout_clears_even_when_remote_fails() {
        let backend = FakeBackend::new();
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(backend.clone(), storage);
        store.login(&credentials(FakeBackend::USER_PASSWORD, true)).await.unwrap();

        backend.set_offline(true);
        store.logout().await;

        assert!(!store.session().authenticated());
        assert_eq!(store.session().user, UserInfo::default());
        assert_eq!(store.storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.storage.get(USER_INFO_KEY).unwrap(), None);
        // governed by the login opt-in, not by logout
        assert_eq!(store.remembered_username().as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn register_does_not_log_in() {
        let backend = FakeBackend::new();
        let store = SessionStore::new(backend, MemoryStorage::new());
        let request = RegisterRequest {
            username: "newbie".into(),
            password: "secret1".into(),
            email: "newbie@example.com".into(),
        };
        store.register(&request).await.unwrap();
        assert!(!store.session().authenticated());
    }

    #[tokio::test]
    async fn refresh_failure_keeps_cached_profile() {
        let backend = FakeBackend::new();
        let mut store = SessionStore::new(backend.clone(), MemoryStorage::new());
        store.login(&credentials(FakeBackend::USER_PASSWORD, false)).await.unwrap();
        let cached = store.session().user.clone();

        backend.set_offline(true);
        assert!(store.refresh_profile().await.is_err());
        assert_eq!(store.session().user, cached);
        assert!(store.session().authenticated());

        backend.set_offline(false);
        backend.set_role("SUPER_ADMIN");
        let user = store.refresh_profile().await.unwrap();
        assert_eq!(user.role.as_deref(), Some("SUPER_ADMIN"));
        assert_eq!(store.session().user.role.as_deref(), Some("SUPER_ADMIN"));
    }

    #[tokio::test]
    async fn restore_reads_persisted_session() {
        let backend = FakeBackend::new();
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "persisted").unwrap();
        storage.set(USER_INFO_KEY, "{broken").unwrap();

        let store = SessionStore::restore(backend, storage);
        assert!(store.session().authenticated());
        assert_eq!(store.session().user, UserInfo::default());
    }

    #[tokio::test]
    async fn failed_remember_write_keeps_saved_session() {
        let storage = ReadOnlyKey { inner: MemoryStorage::new(), key: REMEMBERED_USERNAME_KEY };
        storage.inner.set(TOKEN_KEY, "earlier").unwrap();
        storage.inner.set(USER_INFO_KEY, r#"{"username":"admin"}"#).unwrap();
        let mut store = SessionStore::restore(FakeBackend::new(), storage);
        let before = store.session().clone();

        let err = store.login(&credentials(FakeBackend::USER_PASSWORD, true)).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert_eq!(store.session(), &before);
        assert_eq!(store.storage.get(TOKEN_KEY).unwrap().as_deref(), Some("earlier"));
        assert_eq!(
            store.storage.get(USER_INFO_KEY).unwrap().as_deref(),
            Some(r#"{"username":"admin"}"#)
        );
    }

    #[tokio::test]
    async fn failed_login_write_leaves_nothing_to_restore() {
        let storage = ReadOnlyKey { inner: MemoryStorage::new(), key: REMEMBERED_USERNAME_KEY };
        let mut store = SessionStore::new(FakeBackend::new(), storage);

        assert!(store.login(&credentials(FakeBackend::USER_PASSWORD, false)).await.is_err());
        assert_eq!(store.storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.storage.get(USER_INFO_KEY).unwrap(), None);

        let restored = SessionStore::restore(FakeBackend::new(), store.storage);
        assert!(!restored.session().authenticated());
    }
}
