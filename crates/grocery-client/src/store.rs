//! Observable in-memory model of the signed-in user's grocery data
//!
//! Architecture:
//! - One `RwLock<StoreState>` is the single serialization point for every
//!   mutation. It is never held across a network await: requests run first,
//!   then the decoded result is applied under a short write lock.
//! - Every applied mutation is published as a `StoreEvent` on a broadcast
//!   channel (fire-and-forget, lagging subscribers just miss events).
//! - Authenticated operations read the session first. Without one they log
//!   and return `Ok` without touching the network.

use grocery_api::{
    CategoryRequest, CategoryResponse, ClientError, Credentials, ItemRequest, ItemResponse,
    RegisterResponse, Result, Session, SignInResponse, StoreEvent,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::endpoints::Endpoints;
use crate::resource::Resource;

#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) categories: Vec<CategoryResponse>,
    pub(crate) items: Vec<ItemResponse>,
    /// Category the `items` sequence was fetched for
    pub(crate) items_category_id: Option<Uuid>,
    pub(crate) active_category: Option<CategoryResponse>,
}

impl StoreState {
    pub(crate) fn remove_categories(&mut self, ids: &[Uuid]) {
        self.categories.retain(|c| !ids.contains(&c.id));
        if self
            .active_category
            .as_ref()
            .is_some_and(|active| ids.contains(&active.id))
        {
            self.active_category = None;
        }
        if self.items_category_id.is_some_and(|id| ids.contains(&id)) {
            self.items.clear();
            self.items_category_id = None;
        }
    }

    /// Items are only removed when the local sequence belongs to `category_id`.
    pub(crate) fn remove_items(&mut self, category_id: Uuid, ids: &[Uuid]) -> bool {
        if self.items_category_id != Some(category_id) {
            return false;
        }
        self.items.retain(|item| !ids.contains(&item.id));
        true
    }
}

pub struct GroceryStore {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) endpoints: Endpoints,
    pub(crate) state: RwLock<StoreState>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl GroceryStore {
    /// Store talking to the server at `config.base_url` over reqwest.
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = HttpClient::new(config, credentials)?;
        Ok(Self::with_client(
            Arc::new(client),
            Endpoints::new(config.base_url.clone()),
        ))
    }

    /// The credential store is taken from `client` so both see the same session.
    pub fn with_client(client: Arc<HttpClient>, endpoints: Endpoints) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            credentials: Arc::clone(client.credentials()),
            client,
            endpoints,
            state: RwLock::new(StoreState::default()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        debug!("[GroceryStore] {:?}", event);
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub async fn categories(&self) -> Vec<CategoryResponse> {
        self.state.read().await.categories.clone()
    }

    pub async fn items(&self) -> Vec<ItemResponse> {
        self.state.read().await.items.clone()
    }

    pub async fn active_category(&self) -> Option<CategoryResponse> {
        self.state.read().await.active_category.clone()
    }

    /// Current session, or `None` after logging that `operation` was skipped.
    pub(crate) async fn session_for(&self, operation: &str) -> Option<Session> {
        match self.credentials.require_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("[GroceryStore] {} skipped: {}", operation, e);
                None
            }
        }
    }

    /// Make `category` the active one. Switching to a different category drops
    /// the items of the previous one.
    pub async fn select_category(&self, category: Option<CategoryResponse>) {
        let id = category.as_ref().map(|c| c.id);
        {
            let mut state = self.state.write().await;
            if state.items_category_id != id {
                state.items.clear();
                state.items_category_id = None;
            }
            state.active_category = category;
        }
        self.emit(StoreEvent::ActiveCategoryChanged { id });
    }

    /// Replace the local category list with the server's.
    #[tracing::instrument(name = "store.get_categories", skip(self))]
    pub async fn get_categories(&self) -> Result<()> {
        let Some(session) = self.session_for("get_categories").await else {
            return Ok(());
        };

        let url = self.endpoints.categories(session.user_id)?;
        let categories: Vec<CategoryResponse> = self.client.load(&Resource::get(url)).await?;
        let count = categories.len();

        self.state.write().await.categories = categories;
        info!("[GroceryStore] Loaded {} categories", count);
        self.emit(StoreEvent::CategoriesReplaced { count });
        Ok(())
    }

    /// Replace the local item list with the items of `category_id`.
    ///
    /// The reply is dropped when another category became active while the
    /// request was in flight.
    #[tracing::instrument(name = "store.get_items", skip(self))]
    pub async fn get_items(&self, category_id: Uuid) -> Result<()> {
        let Some(session) = self.session_for("get_items").await else {
            return Ok(());
        };

        let url = self.endpoints.items(session.user_id, category_id)?;
        let items: Vec<ItemResponse> = self.client.load(&Resource::get(url)).await?;
        let count = items.len();

        {
            let mut state = self.state.write().await;
            if state
                .active_category
                .as_ref()
                .is_some_and(|active| active.id != category_id)
            {
                debug!(
                    "[GroceryStore] Dropping {} items of category {}: no longer active",
                    count, category_id
                );
                return Ok(());
            }
            state.items = items;
            state.items_category_id = Some(category_id);
        }
        info!(
            "[GroceryStore] Loaded {} items for category {}",
            count, category_id
        );
        self.emit(StoreEvent::ItemsReplaced { category_id, count });
        Ok(())
    }

    /// Create a category and append the server's copy (with its assigned id).
    #[tracing::instrument(name = "store.save_category", skip(self, request), fields(title = %request.title))]
    pub async fn save_category(&self, request: CategoryRequest) -> Result<()> {
        let Some(session) = self.session_for("save_category").await else {
            return Ok(());
        };

        let url = self.endpoints.categories(session.user_id)?;
        let resource = Resource::<CategoryResponse>::post_json(url, &request)?;
        let created = self.client.load(&resource).await?;
        let id = created.id;

        self.state.write().await.categories.push(created);
        info!("[GroceryStore] Saved category {}", id);
        self.emit(StoreEvent::CategoryAdded { id });
        Ok(())
    }

    /// Create an item in `category_id`. It is appended locally when the
    /// current item list belongs to that category.
    #[tracing::instrument(name = "store.save_item", skip(self, request), fields(title = %request.title))]
    pub async fn save_item(&self, category_id: Uuid, request: ItemRequest) -> Result<()> {
        let Some(session) = self.session_for("save_item").await else {
            return Ok(());
        };

        let url = self.endpoints.items(session.user_id, category_id)?;
        let resource = Resource::<ItemResponse>::post_json(url, &request)?;
        let created = self.client.load(&resource).await?;
        let id = created.id;

        let appended = {
            let mut state = self.state.write().await;
            if state.items_category_id == Some(category_id) {
                state.items.push(created);
                true
            } else {
                false
            }
        };
        info!("[GroceryStore] Saved item {} in category {}", id, category_id);
        if appended {
            self.emit(StoreEvent::ItemAdded { category_id, id });
        }
        Ok(())
    }

    /// Delete a category on the server.
    ///
    /// With `delete_from_model` the local entry whose id matches the server's
    /// reply is removed; without it the local list is left for the caller
    /// (the batch coordinator) to reconcile.
    #[tracing::instrument(name = "store.delete_category", skip(self))]
    pub async fn delete_category(&self, category_id: Uuid, delete_from_model: bool) -> Result<()> {
        let Some(session) = self.session_for("delete_category").await else {
            return Ok(());
        };
        self.delete_category_as(&session, category_id, delete_from_model)
            .await
    }

    #[tracing::instrument(name = "store.delete_item", skip(self))]
    pub async fn delete_item(
        &self,
        category_id: Uuid,
        item_id: Uuid,
        delete_from_model: bool,
    ) -> Result<()> {
        let Some(session) = self.session_for("delete_item").await else {
            return Ok(());
        };
        self.delete_item_as(&session, category_id, item_id, delete_from_model)
            .await
    }

    pub(crate) async fn delete_category_as(
        &self,
        session: &Session,
        category_id: Uuid,
        delete_from_model: bool,
    ) -> Result<()> {
        let url = self.endpoints.category(session.user_id, category_id)?;
        let deleted: CategoryResponse = self.load_deleted(url, category_id).await?;

        if delete_from_model {
            self.state
                .write()
                .await
                .remove_categories(&[deleted.id]);
            info!("[GroceryStore] Deleted category {}", deleted.id);
            self.emit(StoreEvent::CategoriesRemoved {
                ids: vec![deleted.id],
            });
        }
        Ok(())
    }

    pub(crate) async fn delete_item_as(
        &self,
        session: &Session,
        category_id: Uuid,
        item_id: Uuid,
        delete_from_model: bool,
    ) -> Result<()> {
        let url = self.endpoints.item(session.user_id, category_id, item_id)?;
        let deleted: ItemResponse = self.load_deleted(url, item_id).await?;

        if delete_from_model {
            let removed = self
                .state
                .write()
                .await
                .remove_items(category_id, &[deleted.id]);
            info!("[GroceryStore] Deleted item {}", deleted.id);
            if removed {
                self.emit(StoreEvent::ItemsRemoved {
                    category_id,
                    ids: vec![deleted.id],
                });
            }
        }
        Ok(())
    }

    /// Issue a DELETE and check the reply names the entity that was asked for.
    async fn load_deleted<T>(&self, url: url::Url, expected: Uuid) -> Result<T>
    where
        T: DeserializeOwned + HasId,
    {
        let deleted: T = self.client.load(&Resource::delete(url)).await?;
        if deleted.id() != expected {
            return Err(ClientError::IdMismatch {
                expected,
                actual: deleted.id(),
            });
        }
        Ok(deleted)
    }

    /// Create an account. A server-side rejection comes back as a response
    /// with `error == true`, not as an `Err`.
    #[tracing::instrument(name = "store.register", skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<RegisterResponse> {
        let url = self.endpoints.register()?;
        let resource =
            Resource::<RegisterResponse>::post_json(url, &Credentials::new(username, password))?;
        let response = recover_rejection(self.client.load(&resource).await)?;

        if response.error {
            info!(
                "[GroceryStore] Registration rejected: {}",
                response.reason.as_deref().unwrap_or("no reason given")
            );
        }
        Ok(response)
    }

    /// Sign in and persist the session.
    ///
    /// `error == false` must come with both a token and a user id; anything
    /// less is a `ContractViolation` and nothing is stored.
    #[tracing::instrument(name = "store.sign_in", skip(self, password))]
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignInResponse> {
        let url = self.endpoints.sign_in()?;
        let resource =
            Resource::<SignInResponse>::post_json(url, &Credentials::new(username, password))?;
        let response = recover_rejection(self.client.load(&resource).await)?;

        if response.error {
            info!(
                "[GroceryStore] Sign-in rejected: {}",
                response.reason.as_deref().unwrap_or("no reason given")
            );
            return Ok(response);
        }

        let Session { token, user_id } = response.session()?;

        self.credentials.set_token(Some(token)).await;
        self.credentials.set_user_id(Some(user_id)).await;
        info!("[GroceryStore] Signed in as {}", user_id);
        self.emit(StoreEvent::SignedIn { user_id });
        Ok(response)
    }

    /// Forget the session and all cached data. Does not contact the server.
    pub async fn sign_out(&self) {
        self.credentials.clear().await;
        *self.state.write().await = StoreState::default();
        info!("[GroceryStore] Signed out");
        self.emit(StoreEvent::SignedOut);
    }
}

/// Entities that can be matched against a delete request.
pub(crate) trait HasId {
    fn id(&self) -> Uuid;
}

impl HasId for CategoryResponse {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl HasId for ItemResponse {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Envelope replies (`{"error": true, "reason": ...}`) may arrive with a
/// non-2xx status. Hand those back as the decoded envelope so the caller sees
/// the reason; any other failure passes through.
fn recover_rejection<T>(result: Result<T>) -> Result<T>
where
    T: DeserializeOwned + Rejection,
{
    match result {
        Err(ClientError::Server { status, body }) => match serde_json::from_str::<T>(&body) {
            Ok(envelope) if envelope.is_rejection() => {
                debug!("[GroceryStore] HTTP {} carried a rejection envelope", status);
                Ok(envelope)
            }
            _ => Err(ClientError::Server { status, body }),
        },
        other => other,
    }
}

trait Rejection {
    fn is_rejection(&self) -> bool;
}

impl Rejection for SignInResponse {
    fn is_rejection(&self) -> bool {
        self.error
    }
}

impl Rejection for RegisterResponse {
    fn is_rejection(&self) -> bool {
        self.error
    }
}
