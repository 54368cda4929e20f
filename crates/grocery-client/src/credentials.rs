//! Credential store: the bearer token and user id of the signed-in user
//!
//! The store is a plain key-value collaborator. It is handed to both the
//! `HttpClient` (for the Authorization header) and the `GroceryStore` (for
//! user-scoped URLs) at construction time.

use async_trait::async_trait;
use grocery_api::{ClientError, Result, Session};
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CredentialStore: Send + Sync {
    async fn token(&self) -> Option<String>;

    async fn set_token(&self, token: Option<String>);

    async fn user_id(&self) -> Option<Uuid>;

    async fn set_user_id(&self, user_id: Option<Uuid>);

    /// Both fields, or `None` when either is missing.
    async fn session(&self) -> Option<Session> {
        let token = self.token().await?;
        let user_id = self.user_id().await?;
        Some(Session { token, user_id })
    }

    /// Like `session`, but `NotSignedIn` when there is none.
    async fn require_session(&self) -> Result<Session> {
        self.session().await.ok_or(ClientError::NotSignedIn)
    }

    async fn clear(&self) {
        self.set_token(None).await;
        self.set_user_id(None).await;
    }
}

#[derive(Debug, Default)]
struct StoredCredentials {
    token: Option<String>,
    user_id: Option<Uuid>,
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<StoredCredentials>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out signed in.
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(StoredCredentials {
                token: Some(session.token),
                user_id: Some(session.user_id),
            }),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CredentialStore for InMemoryCredentialStore {
    async fn token(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    async fn set_token(&self, token: Option<String>) {
        self.inner.write().await.token = token;
    }

    async fn user_id(&self) -> Option<Uuid> {
        self.inner.read().await.user_id
    }

    async fn set_user_id(&self, user_id: Option<Uuid>) {
        self.inner.write().await.user_id = user_id;
    }

    async fn session(&self) -> Option<Session> {
        // Read both fields under one lock so a concurrent sign-out is seen atomically
        let stored = self.inner.read().await;
        Some(Session {
            token: stored.token.clone()?,
            user_id: stored.user_id?,
        })
    }

    async fn clear(&self) {
        let mut stored = self.inner.write().await;
        stored.token = None;
        stored.user_id = None;
    }
}
