//! Shared types for the grocery client
//!
//! - `dto` - wire request/response shapes
//! - `error` - `ClientError` taxonomy and the user-facing `ErrorReport`
//! - `streaming` - `StoreEvent` change notifications

pub mod dto;
pub mod error;
pub mod streaming;

pub use dto::{
    CategoryRequest, CategoryResponse, Credentials, ItemRequest, ItemResponse, RegisterResponse,
    Session, SignInResponse,
};
pub use error::{BatchFailure, ClientError, ErrorReport};
pub use streaming::StoreEvent;

pub type Result<T> = std::result::Result<T, ClientError>;
