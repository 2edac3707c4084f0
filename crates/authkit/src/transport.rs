//! Transport trait and implementations for Quill API calls.
//!
//! This module provides the [`Transport`] trait and the [`HttpTransport`]
//! implementation backed by ureq. The trait exists so the token lifecycle
//! and the request client can be exercised without network access.
//!
//! # Testing
//!
//! Use [`MockTransport`] to script responses:
//!
//! ```
//! use authkit::transport::{MockTransport, Method, RawResponse, Transport, ApiRequest};
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Get, "auth/jwt", RawResponse::json(200, r#"{"token":"at-1"}"#));
//!
//! let request = ApiRequest::new(Method::Get, "https://api.example.dev/v1/auth/jwt");
//! let response = mock.execute(&request).unwrap();
//! assert_eq!(response.status, 200);
//! ```

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Uppercase wire name of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single outgoing API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers (name, value). `Authorization` goes here too.
    pub headers: Vec<(String, String)>,
    /// Optional JSON body (POST/PUT).
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Attach a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A raw HTTP response before content-type-aware decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Type`, empty when the server sent none.
    pub content_type: String,
    /// Raw response body.
    pub body: String,
}

impl RawResponse {
    /// Build a JSON response (for tests and mocks).
    #[must_use]
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: body.into(),
        }
    }

    /// Build a CSV response (for tests and mocks).
    #[must_use]
    pub fn csv(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/csv".to_string(),
            body: body.into(),
        }
    }

    /// Build a plain-text response (for tests and mocks).
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: body.into(),
        }
    }
}

/// Transport abstraction over the HTTP layer.
///
/// `Send + Sync` because batch fetches issue requests from a worker pool.
pub trait Transport: Send + Sync {
    /// Execute one request and return the raw response.
    ///
    /// Implementations return `Ok` for any response that carries an HTTP
    /// status, including non-2xx; `Err(Error::Network)` is reserved for
    /// failures where no status was received.
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// ureq-backed transport.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with default agent settings.
    ///
    /// Non-2xx statuses are surfaced as responses, not errors, so the
    /// caller can extract error messages from the body.
    #[must_use]
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut builder = match request.method {
            Method::Get => self.agent.get(&request.url),
            Method::Delete => self.agent.delete(&request.url),
            // POST/PUT carry a body and go through send_json instead.
            Method::Post => return self.execute_with_body(request, false),
            Method::Put => return self.execute_with_body(request, true),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.call().map_err(Error::from)?;
        Self::read_response(&mut response)
    }
}

impl HttpTransport {
    fn execute_with_body(&self, request: &ApiRequest, put: bool) -> Result<RawResponse> {
        let mut builder = if put {
            self.agent.put(&request.url)
        } else {
            self.agent.post(&request.url)
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = request.body.clone().unwrap_or(serde_json::Value::Null);
        let mut response = builder.send_json(body).map_err(Error::from)?;
        Self::read_response(&mut response)
    }

    fn read_response(response: &mut ureq::http::Response<ureq::Body>) -> Result<RawResponse> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// In-memory transport for tests.
///
/// Responses are scripted per `(method, path suffix)` and consumed in FIFO
/// order; every executed request is recorded for assertions. Clones share
/// state, so a test can keep a handle after moving the transport into a
/// client.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<(Method, String), VecDeque<ScriptedResult>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

enum ScriptedResult {
    Response(RawResponse),
    NetworkError(String),
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for the next request whose URL ends with `path`.
    pub fn respond(&self, method: Method, path: impl Into<String>, response: RawResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.into()))
            .or_default()
            .push_back(ScriptedResult::Response(response));
    }

    /// Script a transport-level failure for the next matching request.
    pub fn fail(&self, method: Method, path: impl Into<String>, message: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.into()))
            .or_default()
            .push_back(ScriptedResult::NetworkError(message.into()));
    }

    /// All requests executed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests matching a method and URL suffix.
    #[must_use]
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(path))
            .count()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let key = routes
            .keys()
            .find(|(method, path)| *method == request.method && request.url.ends_with(path))
            .cloned();

        let Some(key) = key else {
            return Err(Error::Network(format!(
                "no scripted response for {} {}",
                request.method, request.url
            )));
        };

        match routes.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(ScriptedResult::Response(response)) => Ok(response),
            Some(ScriptedResult::NetworkError(message)) => Err(Error::Network(message)),
            None => Err(Error::Network(format!(
                "scripted responses exhausted for {} {}",
                request.method, request.url
            ))),
        }
    }
}
