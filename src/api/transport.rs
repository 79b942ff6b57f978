//! Transport abstraction for API calls
//!
//! The sessions only ever talk to a `Transport`, which lets tests run the
//! full synchronization flow against an in-memory server.

use super::ApiError;
use crate::domain::Credential;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// HTTP method subset used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
}

/// A single request/response exchange
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer: Option<Credential>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: RequestBody::Empty,
            bearer: None,
        }
    }

    pub fn post(path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, credential: &Credential) -> Self {
        self.bearer = Some(credential.clone());
        self
    }
}

/// Request/response exchange with the chat server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and return the decoded JSON body (`Null` if empty)
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        (**self).send(request).await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let method = request.method;
        let path = request.path.clone();
        let start = std::time::Instant::now();
        let result = self.inner.send(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::debug!(
                    %method,
                    path = %path,
                    duration_ms = %duration.as_millis(),
                    "API request completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    %method,
                    path = %path,
                    duration_ms = %duration.as_millis(),
                    status = ?e.status,
                    error = %e,
                    "API request failed"
                );
            }
        }

        result
    }
}
