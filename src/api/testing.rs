//! Test doubles for the API and credential storage
//!
//! `FakeServer` is an in-memory stand-in for the chat server that speaks the
//! same paths and JSON shapes, so sessions can be exercised end to end.

use super::{ApiError, ApiRequest, Method, RequestBody, Transport};
use crate::storage::{CredentialStore, MemoryStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Logical endpoint a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    IssueToken,
    CreateAccount,
    ListConversations,
    CreateConversation,
    PostMessage,
    ListMessages,
}

impl Route {
    pub fn of(method: Method, path: &str) -> Option<(Route, Option<i64>)> {
        match (method, path) {
            (Method::Post, "/token") => Some((Route::IssueToken, None)),
            (Method::Post, "/users/") => Some((Route::CreateAccount, None)),
            (Method::Get, "/chats/") => Some((Route::ListConversations, None)),
            (Method::Post, "/chats/") => Some((Route::CreateConversation, None)),
            _ => {
                let id = path
                    .strip_prefix("/chats/")?
                    .strip_suffix("/messages/")?
                    .parse()
                    .ok()?;
                match method {
                    Method::Post => Some((Route::PostMessage, Some(id))),
                    Method::Get => Some((Route::ListMessages, Some(id))),
                }
            }
        }
    }
}

// ============================================================================
// Fake Server
// ============================================================================

#[derive(Default)]
struct ServerState {
    /// email -> (user id, password)
    users: HashMap<String, (i64, String)>,
    /// token -> user id
    tokens: HashMap<String, i64>,
    /// chat id -> (owner, title, created_at)
    chats: Vec<(i64, i64, String, String)>,
    /// chat id -> messages as wire JSON
    messages: HashMap<i64, Vec<Value>>,
    next_id: i64,
}

impl ServerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory chat server
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
    overrides: Mutex<HashMap<Route, VecDeque<Result<Value, ApiError>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

#[allow(dead_code)]
impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user directly, bypassing the API
    pub fn add_user(&self, email: &str, password: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state
            .users
            .insert(email.to_string(), (id, password.to_string()));
        id
    }

    /// Make the next request to `route` fail with `error`
    pub fn fail_next(&self, route: Route, error: ApiError) {
        self.overrides
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(Err(error));
    }

    /// Make the next request to `route` return `value` verbatim
    pub fn respond_raw(&self, route: Route, value: Value) {
        self.overrides
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(Ok(value));
    }

    /// Invalidate every issued token (server-side expiry)
    pub fn revoke_tokens(&self) {
        self.state.lock().unwrap().tokens.clear();
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, route: Route) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| Route::of(r.method, &r.path).map(|(rt, _)| rt) == Some(route))
            .count()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Server-side transcript of a conversation
    pub fn messages(&self, chat_id: i64) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&chat_id)
            .cloned()
            .unwrap_or_default()
    }

    fn handle(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let Some((route, chat_id)) = Route::of(request.method, &request.path) else {
            return Err(ApiError::status(404, Some("Not Found"), Some("Not Found".to_string())));
        };

        if let Some(result) = self
            .overrides
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }

        let mut state = self.state.lock().unwrap();
        match route {
            Route::IssueToken => {
                let RequestBody::Form(fields) = &request.body else {
                    return Err(unprocessable());
                };
                let field = |name: &str| {
                    fields
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                };
                let (username, password) = (field("username"), field("password"));
                let user_id = state
                    .users
                    .get(&username)
                    .filter(|(_, stored)| *stored == password)
                    .map(|(id, _)| *id);
                let Some(user_id) = user_id else {
                    return Err(ApiError::status(
                        401,
                        Some("Unauthorized"),
                        Some("Incorrect email or password".to_string()),
                    ));
                };
                let token = format!("token-{}", uuid::Uuid::new_v4());
                state.tokens.insert(token.clone(), user_id);
                Ok(json!({ "access_token": token, "token_type": "bearer" }))
            }
            Route::CreateAccount => {
                let RequestBody::Json(body) = &request.body else {
                    return Err(unprocessable());
                };
                let email = body["email"].as_str().unwrap_or_default().to_string();
                let password = body["password"].as_str().unwrap_or_default().to_string();
                if email.is_empty() || password.is_empty() {
                    return Err(unprocessable());
                }
                if state.users.contains_key(&email) {
                    return Err(ApiError::status(
                        400,
                        Some("Bad Request"),
                        Some("Email already registered".to_string()),
                    ));
                }
                let id = state.next_id();
                state.users.insert(email.clone(), (id, password));
                Ok(json!({ "id": id, "email": email, "chats": [] }))
            }
            Route::ListConversations => {
                let user_id = authorize(&state, request)?;
                let chats: Vec<Value> = state
                    .chats
                    .iter()
                    .filter(|(_, owner, _, _)| *owner == user_id)
                    .map(|(id, owner, title, created_at)| {
                        json!({
                            "id": id,
                            "user_id": owner,
                            "title": title,
                            "created_at": created_at,
                            "messages": state.messages.get(id).cloned().unwrap_or_default(),
                        })
                    })
                    .collect();
                Ok(Value::Array(chats))
            }
            Route::CreateConversation => {
                let user_id = authorize(&state, request)?;
                let RequestBody::Json(body) = &request.body else {
                    return Err(unprocessable());
                };
                let title = body["title"].as_str().unwrap_or_default().to_string();
                let id = state.next_id();
                let created_at = now();
                state.chats.push((id, user_id, title.clone(), created_at.clone()));
                state.messages.insert(id, Vec::new());
                Ok(json!({
                    "id": id,
                    "user_id": user_id,
                    "title": title,
                    "created_at": created_at,
                    "messages": [],
                }))
            }
            Route::PostMessage => {
                authorize(&state, request)?;
                let chat_id = chat_id.unwrap_or_default();
                let RequestBody::Json(body) = &request.body else {
                    return Err(unprocessable());
                };
                let role = body["role"].as_str().unwrap_or("user").to_string();
                let content = body["content"].as_str().unwrap_or_default().to_string();
                let user_msg_id = state.next_id();
                let reply_id = state.next_id();
                let user_msg = wire_message(user_msg_id, chat_id, &role, &content);
                let reply = wire_message(reply_id, chat_id, "assistant", &format!("You said: {content}"));
                let transcript = state.messages.entry(chat_id).or_default();
                transcript.push(user_msg);
                transcript.push(reply.clone());
                Ok(reply)
            }
            Route::ListMessages => {
                authorize(&state, request)?;
                let chat_id = chat_id.unwrap_or_default();
                Ok(Value::Array(
                    state.messages.get(&chat_id).cloned().unwrap_or_default(),
                ))
            }
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.handle(&request)
    }
}

fn authorize(state: &ServerState, request: &ApiRequest) -> Result<i64, ApiError> {
    request
        .bearer
        .as_ref()
        .and_then(|c| state.tokens.get(c.expose()).copied())
        .ok_or_else(|| {
            ApiError::status(
                401,
                Some("Unauthorized"),
                Some("Could not validate credentials".to_string()),
            )
        })
}

fn unprocessable() -> ApiError {
    ApiError::status(422, Some("Unprocessable Entity"), None)
}

fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn wire_message(id: i64, chat_id: i64, role: &str, content: &str) -> Value {
    json!({
        "id": id,
        "chat_id": chat_id,
        "role": role,
        "content": content,
        "timestamp": now(),
    })
}

// ============================================================================
// Delayed Transport (for in-flight testing)
// ============================================================================

/// Wraps a transport and holds requests to one route for `delay`
pub struct DelayedTransport<T> {
    inner: T,
    route: Route,
    delay: Duration,
    /// Signalled when a delayed request starts (stores a permit if nobody waits yet)
    pub request_started: Arc<Notify>,
}

impl<T: Transport> DelayedTransport<T> {
    pub fn new(inner: T, route: Route, delay: Duration) -> Self {
        Self {
            inner,
            route,
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for DelayedTransport<T> {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        if Route::of(request.method, &request.path).map(|(r, _)| r) == Some(self.route) {
            self.request_started.notify_one();
            tokio::time::sleep(self.delay).await;
        }
        self.inner.send(request).await
    }
}

// ============================================================================
// Recording Store
// ============================================================================

/// Storage operation as observed by `RecordingStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Set(String, String),
    Remove(String),
}

/// In-memory store that records writes and can be made to fail
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    ops: Mutex<Vec<StoreOp>>,
    fail_writes: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.inner.set(key, value).unwrap();
        store
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )));
        }
        Ok(())
    }
}

impl CredentialStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.ops
            .lock()
            .unwrap()
            .push(StoreOp::Set(key.to_string(), value.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.ops
            .lock()
            .unwrap()
            .push(StoreOp::Remove(key.to_string()));
        self.inner.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_parsed_from_paths() {
        assert_eq!(
            Route::of(Method::Post, "/chats/12/messages/"),
            Some((Route::PostMessage, Some(12)))
        );
        assert_eq!(
            Route::of(Method::Get, "/chats/12/messages/"),
            Some((Route::ListMessages, Some(12)))
        );
        assert_eq!(Route::of(Method::Get, "/chats/"), Some((Route::ListConversations, None)));
        assert_eq!(Route::of(Method::Get, "/nowhere"), None);
    }

    #[tokio::test]
    async fn override_is_consumed_once() {
        let server = FakeServer::new();
        server.fail_next(Route::CreateAccount, ApiError::network("down"));

        let request = ApiRequest::post(
            "/users/",
            RequestBody::Json(json!({"email": "a@x.com", "password": "pw"})),
        );
        assert!(server.send(request.clone()).await.is_err());
        assert!(server.send(request).await.is_ok());
        assert_eq!(server.requests_to(Route::CreateAccount), 2);
    }
}
