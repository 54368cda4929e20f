//! Change notifications published by the grocery store
//!
//! Subscribers receive one `StoreEvent` per applied mutation. Events carry ids
//! only; the current state is read back from the store snapshot accessors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// The category list was replaced by a fresh fetch
    CategoriesReplaced { count: usize },
    CategoryAdded { id: Uuid },
    /// Categories removed in one reconciliation pass
    CategoriesRemoved { ids: Vec<Uuid> },
    /// The item list of `category_id` was replaced by a fresh fetch
    ItemsReplaced { category_id: Uuid, count: usize },
    ItemAdded { category_id: Uuid, id: Uuid },
    ItemsRemoved { category_id: Uuid, ids: Vec<Uuid> },
    ActiveCategoryChanged { id: Option<Uuid> },
    SignedIn { user_id: Uuid },
    SignedOut,
}
