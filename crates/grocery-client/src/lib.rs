//! Client-side data access for the grocery list server
//!
//! This crate provides:
//!
//! ## Request Path
//! - `resource` - Resource descriptors (URL, verb, expected response type)
//! - `endpoints` - URL builders for every server route
//! - `client` - HttpClient executing descriptors with default headers
//! - `transport` - Transport seam and the reqwest-backed implementation
//!
//! ## State
//! - `store` - GroceryStore, the observable model with CRUD operations
//! - `batch` - Concurrent multi-delete with one reconciliation step
//! - `credentials` - CredentialStore holding the signed-in session
//!
//! ## Support
//! - `config` - ClientConfig loaded from YAML or the environment
//! - `fake` - FakeGroceryServer for tests and offline use

pub mod batch;
pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoints;
#[cfg(not(target_arch = "wasm32"))]
pub mod fake;
pub mod resource;
pub mod store;
pub mod transport;

pub use batch::{BatchReport, ReconcilePolicy};
pub use client::HttpClient;
pub use config::ClientConfig;
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use endpoints::Endpoints;
pub use resource::{HttpMethod, Resource};
pub use store::GroceryStore;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

// Re-export the wire types so callers need only this crate
pub use grocery_api;
