//! In-process fake of the grocery server
//!
//! FakeGroceryServer implements `Transport`, so an `HttpClient` pointed at it
//! runs the full request path (URL building, headers, status validation,
//! decoding) without a network:
//! - users, bearer tokens, categories and items are kept per user
//! - register / sign-in answer with the same envelopes as the real server
//! - failures, misreported deletes, canned responses and latency can be
//!   injected per test
//! - every executed request is counted

use async_trait::async_trait;
use grocery_api::{
    CategoryRequest, CategoryResponse, ClientError, Credentials, ItemRequest, ItemResponse,
    Result, Session,
};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::transport::{HttpRequest, HttpResponse, Transport};

const FAKE_BASE_URL: &str = "http://fake.grocery.local/api";

/// Failure returned instead of performing a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Answer with this HTTP status and an error envelope
    Status(u16),
    /// Fail as if the connection dropped
    Transport,
}

struct FakeUser {
    id: Uuid,
    password: String,
}

#[derive(Default)]
struct FakeState {
    users: HashMap<String, FakeUser>,
    tokens: HashMap<String, Uuid>,
    /// (owner, category) in creation order
    categories: Vec<(Uuid, CategoryResponse)>,
    /// (category, item) in creation order
    items: Vec<(Uuid, ItemResponse)>,
    delete_failures: HashMap<Uuid, InjectedFailure>,
    delete_misreports: HashMap<Uuid, serde_json::Value>,
    /// (method, path relative to the base, response)
    overrides: Vec<(Method, String, HttpResponse)>,
    delay: Option<Duration>,
}

pub struct FakeGroceryServer {
    base_url: Url,
    state: Mutex<FakeState>,
    requests: AtomicUsize,
}

impl Default for FakeGroceryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGroceryServer {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse(FAKE_BASE_URL).expect("Invalid fake base URL"),
            state: Mutex::new(FakeState::default()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Base URL to build `Endpoints` from.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of categories stored across all users.
    pub fn category_count(&self) -> usize {
        self.lock().categories.len()
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    /// Register a user and issue a token without going through the wire.
    pub fn seed_user(&self, username: &str, password: &str) -> Session {
        let mut state = self.lock();
        let id = Uuid::new_v4();
        state.users.insert(
            username.to_string(),
            FakeUser {
                id,
                password: password.to_string(),
            },
        );
        let token = issue_token(&mut state, id);
        Session { token, user_id: id }
    }

    pub fn seed_category(&self, user_id: Uuid, title: &str, color: &str) -> CategoryResponse {
        let category = CategoryResponse {
            id: Uuid::new_v4(),
            title: title.to_string(),
            color: color.to_string(),
        };
        self.lock().categories.push((user_id, category.clone()));
        category
    }

    pub fn seed_item(
        &self,
        category_id: Uuid,
        title: &str,
        price: f64,
        quantity: i64,
    ) -> ItemResponse {
        let item = ItemResponse {
            id: Uuid::new_v4(),
            title: title.to_string(),
            price,
            quantity,
        };
        self.lock().items.push((category_id, item.clone()));
        item
    }

    /// Make every DELETE of `id` fail with `failure`.
    pub fn fail_delete_of(&self, id: Uuid, failure: InjectedFailure) {
        self.lock().delete_failures.insert(id, failure);
    }

    /// Delete `id` but answer with `reply` instead of the deleted entity.
    pub fn misreport_delete(&self, id: Uuid, reply: impl Serialize) {
        let reply = serde_json::to_value(reply).unwrap_or(serde_json::Value::Null);
        self.lock().delete_misreports.insert(id, reply);
    }

    /// Answer `method` on `path` (relative to the base, e.g. `"sign-in"`)
    /// with `response` without consulting any state.
    pub fn override_response(&self, method: Method, path: &str, response: HttpResponse) {
        self.lock()
            .overrides
            .push((method, path.trim_matches('/').to_string(), response));
    }

    /// Wait this long before answering each request.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake server state poisoned")
    }

    /// Path segments below the base URL.
    fn relative_segments(&self, url: &Url) -> Option<Vec<String>> {
        let base: Vec<&str> = self
            .base_url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let path: Vec<&str> = url
            .path_segments()?
            .filter(|seg| !seg.is_empty())
            .collect();
        if !path.starts_with(&base) {
            return None;
        }
        Some(path[base.len()..].iter().map(|s| s.to_string()).collect())
    }

    fn route(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let Some(segments) = self.relative_segments(&request.url) else {
            return Ok(not_found());
        };
        let mut state = self.lock();

        let joined = segments.join("/");
        if let Some((_, _, response)) = state
            .overrides
            .iter()
            .find(|(method, path, _)| *method == request.method && *path == joined)
        {
            return Ok(response.clone());
        }

        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["register"]) => Ok(register(&mut state, request)),
            ("POST", ["sign-in"]) => Ok(sign_in(&mut state, request)),
            (_, ["users", user, rest @ ..]) => {
                let Some(user_id) = parse_id(user) else {
                    return Ok(not_found());
                };
                if authorized_user(&state, request) != Some(user_id) {
                    return Ok(envelope(401, "Unauthorized"));
                }
                user_route(&mut state, request, user_id, rest)
            }
            _ => Ok(not_found()),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Transport for FakeGroceryServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!("[FakeGroceryServer] {} {}", request.method, request.url);

        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.route(&request)
    }
}

fn user_route(
    state: &mut FakeState,
    request: &HttpRequest,
    user_id: Uuid,
    rest: &[&str],
) -> Result<HttpResponse> {
    let body = request.body.as_deref().unwrap_or_default();
    match (request.method.as_str(), rest) {
        ("GET", ["grocery-categories"]) => {
            let categories: Vec<&CategoryResponse> = state
                .categories
                .iter()
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, category)| category)
                .collect();
            Ok(json_response(200, &categories))
        }
        ("POST", ["grocery-categories"]) => {
            let Some(saved) = decode_body::<CategoryRequest>(body) else {
                return Ok(envelope(400, "Invalid category"));
            };
            let category = CategoryResponse {
                id: Uuid::new_v4(),
                title: saved.title,
                color: saved.color,
            };
            state.categories.push((user_id, category.clone()));
            Ok(json_response(200, &category))
        }
        ("DELETE", ["grocery-categories", category]) => {
            let Some(category_id) = parse_id(category) else {
                return Ok(not_found());
            };
            if let Some(failure) = injected(state, category_id) {
                return failure;
            }
            let Some(position) = state
                .categories
                .iter()
                .position(|(owner, c)| *owner == user_id && c.id == category_id)
            else {
                return Ok(not_found());
            };
            let (_, deleted) = state.categories.remove(position);
            state.items.retain(|(owner, _)| *owner != category_id);
            Ok(deleted_reply(state, category_id, &deleted))
        }
        (method, ["grocery-categories", category, "grocery-items", tail @ ..]) => {
            let Some(category_id) = parse_id(category) else {
                return Ok(not_found());
            };
            if !owns_category(state, user_id, category_id) {
                return Ok(not_found());
            }
            item_route(state, method, body, category_id, tail)
        }
        _ => Ok(not_found()),
    }
}

fn item_route(
    state: &mut FakeState,
    method: &str,
    body: &[u8],
    category_id: Uuid,
    tail: &[&str],
) -> Result<HttpResponse> {
    match (method, tail) {
        ("GET", []) => {
            let items: Vec<&ItemResponse> = state
                .items
                .iter()
                .filter(|(owner, _)| *owner == category_id)
                .map(|(_, item)| item)
                .collect();
            Ok(json_response(200, &items))
        }
        ("POST", []) => {
            let Some(saved) = decode_body::<ItemRequest>(body) else {
                return Ok(envelope(400, "Invalid item"));
            };
            let item = ItemResponse {
                id: Uuid::new_v4(),
                title: saved.title,
                price: saved.price,
                quantity: saved.quantity,
            };
            state.items.push((category_id, item.clone()));
            Ok(json_response(200, &item))
        }
        ("DELETE", [item]) => {
            let Some(item_id) = parse_id(item) else {
                return Ok(not_found());
            };
            if let Some(failure) = injected(state, item_id) {
                return failure;
            }
            let Some(position) = state
                .items
                .iter()
                .position(|(owner, i)| *owner == category_id && i.id == item_id)
            else {
                return Ok(not_found());
            };
            let (_, deleted) = state.items.remove(position);
            Ok(deleted_reply(state, item_id, &deleted))
        }
        _ => Ok(not_found()),
    }
}

fn owns_category(state: &FakeState, user_id: Uuid, category_id: Uuid) -> bool {
    state
        .categories
        .iter()
        .any(|(owner, c)| *owner == user_id && c.id == category_id)
}

fn injected(state: &FakeState, id: Uuid) -> Option<Result<HttpResponse>> {
    let failure = state.delete_failures.get(&id)?;
    debug!("[FakeGroceryServer] Injecting {:?} for delete of {}", failure, id);
    Some(match failure {
        InjectedFailure::Status(status) => Ok(envelope(*status, "Injected failure")),
        InjectedFailure::Transport => Err(ClientError::Transport {
            message: format!("connection reset while deleting {}", id),
            timeout: false,
        }),
    })
}

/// The deleted entity, unless a misreport was registered for `id`.
fn deleted_reply<T: Serialize>(state: &FakeState, id: Uuid, deleted: &T) -> HttpResponse {
    match state.delete_misreports.get(&id) {
        Some(reply) => json_response(200, reply),
        None => json_response(200, deleted),
    }
}

fn register(state: &mut FakeState, request: &HttpRequest) -> HttpResponse {
    let Some(credentials) = decode_body::<Credentials>(request.body.as_deref().unwrap_or_default())
    else {
        return envelope(400, "Invalid registration");
    };
    if state.users.contains_key(&credentials.username) {
        return json_response(
            200,
            &json!({"error": true, "reason": "Username is already taken."}),
        );
    }
    state.users.insert(
        credentials.username,
        FakeUser {
            id: Uuid::new_v4(),
            password: credentials.password,
        },
    );
    json_response(200, &json!({"error": false}))
}

fn sign_in(state: &mut FakeState, request: &HttpRequest) -> HttpResponse {
    let Some(credentials) = decode_body::<Credentials>(request.body.as_deref().unwrap_or_default())
    else {
        return envelope(400, "Invalid credentials");
    };
    let user_id = match state.users.get(&credentials.username) {
        Some(user) if user.password == credentials.password => user.id,
        _ => return envelope(401, "Invalid username or password."),
    };
    let token = issue_token(state, user_id);
    json_response(
        200,
        &json!({"error": false, "token": token, "userID": user_id}),
    )
}

fn issue_token(state: &mut FakeState, user_id: Uuid) -> String {
    let token = Uuid::new_v4().simple().to_string();
    state.tokens.insert(token.clone(), user_id);
    token
}

fn authorized_user(state: &FakeState, request: &HttpRequest) -> Option<Uuid> {
    let header = request.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    state.tokens.get(token).copied()
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Option<T> {
    serde_json::from_slice(body).ok()
}

fn json_response<T: Serialize + ?Sized>(status: u16, value: &T) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(value).unwrap_or_default())
}

fn envelope(status: u16, reason: &str) -> HttpResponse {
    json_response(status, &json!({"error": true, "reason": reason}))
}

fn not_found() -> HttpResponse {
    envelope(404, "Not Found")
}
