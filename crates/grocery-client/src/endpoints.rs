//! URL templates for the grocery server
//!
//! ```text
//! {base}/register
//! {base}/sign-in
//! {base}/users/{userID}/grocery-categories[/{categoryID}[/grocery-items[/{itemID}]]]
//! ```

use grocery_api::{ClientError, Result};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn register(&self) -> Result<Url> {
        self.join(&["register"])
    }

    pub fn sign_in(&self) -> Result<Url> {
        self.join(&["sign-in"])
    }

    /// Collection URL: GET lists, POST saves.
    pub fn categories(&self, user_id: Uuid) -> Result<Url> {
        self.join(&["users", &user_id.to_string(), "grocery-categories"])
    }

    pub fn category(&self, user_id: Uuid, category_id: Uuid) -> Result<Url> {
        self.join(&[
            "users",
            &user_id.to_string(),
            "grocery-categories",
            &category_id.to_string(),
        ])
    }

    /// Collection URL for the items of one category.
    pub fn items(&self, user_id: Uuid, category_id: Uuid) -> Result<Url> {
        self.join(&[
            "users",
            &user_id.to_string(),
            "grocery-categories",
            &category_id.to_string(),
            "grocery-items",
        ])
    }

    pub fn item(&self, user_id: Uuid, category_id: Uuid, item_id: Uuid) -> Result<Url> {
        self.join(&[
            "users",
            &user_id.to_string(),
            "grocery-categories",
            &category_id.to_string(),
            "grocery-items",
            &item_id.to_string(),
        ])
    }

    fn join(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "base URL cannot carry path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
