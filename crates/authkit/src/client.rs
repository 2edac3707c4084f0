//! Authenticated request client.
//!
//! Single choke-point for every remote call that needs identity. Each
//! request walks the full credential pipeline: load the refresh token,
//! renew it when it is inside the renewal window, exchange it for a
//! one-shot access token, then issue the call with a Bearer header.
//! Access tokens are never cached across requests.

use crate::error::{Error, Result};
use crate::token::{self, TokenManager};
use crate::transport::{ApiRequest, Method, RawResponse, Transport};
use serde_json::Value;
use std::sync::Mutex;

/// Persistence seam for the refresh token.
///
/// The CLI backs this with its workspace config file; tests use
/// [`MemoryTokenStore`]. Renewal rewrites only the token entry, so other
/// configuration survives untouched.
pub trait TokenStore: Send {
    /// The stored refresh token, if any.
    fn refresh_token(&self) -> Option<String>;

    /// Replace the stored refresh token.
    fn save_refresh_token(&mut self, token: &str) -> std::io::Result<()>;
}

/// In-memory token store for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl MemoryTokenStore {
    /// Create a store holding a token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Create an empty store.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn refresh_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn save_refresh_token(&mut self, token: &str) -> std::io::Result<()> {
        self.token = Some(token.to_string());
        Ok(())
    }
}

/// Decoded response payload, tagged by how the body was interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body parsed as JSON.
    Json(Value),
    /// CSV body, returned raw.
    Csv(String),
    /// Anything else, returned raw.
    Text(String),
}

/// A decoded successful API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Decoded payload.
    pub payload: Payload,
}

impl ApiResponse {
    /// The payload as JSON, when it decoded as such.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The payload rendered as text, whatever its tag.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.payload {
            Payload::Json(value) => value.to_string(),
            Payload::Csv(raw) | Payload::Text(raw) => raw.clone(),
        }
    }
}

/// Authenticated API client.
///
/// Cheap to share across a worker pool: requests take `&self`, and the
/// token store sits behind a mutex so at most one renewal is in flight
/// per process (two competing renewals would race on the config rewrite).
pub struct Client {
    transport: Box<dyn Transport>,
    api_base: String,
    store: Mutex<Box<dyn TokenStore>>,
}

impl Client {
    /// Create a client over an explicit transport (tests use a mock).
    #[must_use]
    pub fn new(
        transport: Box<dyn Transport>,
        api_base: impl Into<String>,
        store: Box<dyn TokenStore>,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            store: Mutex::new(store),
        }
    }

    /// The API base URL this client talks to.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Issue an authenticated request.
    ///
    /// `path` is relative to the API base, e.g. `"script"` or
    /// `"script/42"`. Expected failures come back as `Err` variants, never
    /// panics, so callers can map them to exit codes or isolate them
    /// inside batches.
    pub fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse> {
        let refresh = self.current_refresh_token()?;

        let manager = TokenManager::new(self.transport.as_ref(), &self.api_base);
        let access = manager.exchange_for_access_token(&refresh)?;

        let mut request = ApiRequest::new(method, format!("{}/{}", self.api_base, path))
            .header("Authorization", format!("Bearer {access}"));
        if let Some(body) = body {
            request = request.json(body);
        }

        let raw = self.transport.execute(&request)?;
        Self::decode(&raw)
    }

    /// Load the refresh token, renewing it when inside the renewal window.
    ///
    /// Holds the store lock for the whole check-and-renew step so a second
    /// caller observes either the old or the fully persisted new token.
    fn current_refresh_token(&self) -> Result<String> {
        let mut store = self.store.lock().unwrap();

        let Some(current) = store.refresh_token() else {
            return Err(Error::Auth(
                "no refresh token found; run `quill configure` first".to_string(),
            ));
        };

        let check = token::needs_renewal(&current);
        if !check.needs_renewal {
            return Ok(current);
        }

        log::info!(
            "refresh token has {} day(s) of validity left, renewing",
            check.days_remaining
        );

        let manager = TokenManager::new(self.transport.as_ref(), &self.api_base);
        match manager.renew(&current) {
            Ok(renewed) => {
                if let Err(e) = store.save_refresh_token(&renewed) {
                    log::warn!("renewed token could not be persisted: {e}");
                }
                Ok(renewed)
            }
            Err(Error::TokenExpired) => Err(Error::TokenExpired),
            Err(e) => {
                // A renewal hiccup must not block an otherwise-valid request.
                log::warn!("token renewal failed, continuing with current token: {e}");
                Ok(current)
            }
        }
    }

    /// Decode a raw response: non-2xx becomes `Error::Http` with a
    /// body-derived message, 2xx is decoded by declared content type.
    fn decode(raw: &RawResponse) -> Result<ApiResponse> {
        if !(200..300).contains(&raw.status) {
            return Err(Error::http(raw.status, error_message(raw)));
        }

        let content_type = raw.content_type.to_ascii_lowercase();
        let payload = if content_type.contains("csv") {
            Payload::Csv(raw.body.clone())
        } else if content_type.contains("json") || content_type.is_empty() {
            // Some endpoints omit the content type; parse tentatively and
            // fall back to raw text when the body is not JSON after all.
            match serde_json::from_str(&raw.body) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Text(raw.body.clone()),
            }
        } else {
            Payload::Text(raw.body.clone())
        };

        Ok(ApiResponse {
            status: raw.status,
            payload,
        })
    }
}

/// Derive a human-usable message from an error response body.
///
/// JSON bodies yield their `error` or `message` field; HTML error pages
/// are suppressed in favor of the status line; anything else is used raw.
fn error_message(raw: &RawResponse) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(&raw.body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }

    let trimmed = raw.body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        format!("HTTP {}", raw.status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TOKEN_LIFETIME_SECS;
    use crate::transport::MockTransport;
    use chrono::{Duration, Utc};

    fn make_token(days_remaining: i64) -> String {
        let exp = Utc::now() + Duration::days(days_remaining);
        let iat = exp - Duration::seconds(TOKEN_LIFETIME_SECS);
        let encode = |value: &serde_json::Value| {
            base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                value.to_string(),
            )
        };
        let header = encode(&serde_json::json!({"alg": "HS256"}));
        let payload = encode(&serde_json::json!({
            "iat": iat.timestamp(),
            "exp": exp.timestamp(),
            "aud": "build-host",
        }));
        format!("{header}.{payload}.sig")
    }

    fn client_with(mock: MockTransport, token: Option<String>) -> Client {
        let store = match token {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::empty(),
        };
        Client::new(
            Box::new(mock),
            "https://api.example.dev/v1",
            Box::new(store),
        )
    }

    fn script_access_token(mock: &MockTransport) {
        mock.respond(
            Method::Get,
            "auth/jwt",
            RawResponse::json(200, r#"{"token":"at-1"}"#),
        );
    }

    #[test]
    fn test_request_without_token_fails_fast() {
        let client = client_with(MockTransport::new(), None);
        let err = client.request(Method::Get, "script", None).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("quill configure"));
    }

    #[test]
    fn test_fresh_token_skips_renewal() {
        let mock = MockTransport::new();
        let probe = mock.clone();
        script_access_token(&mock);
        mock.respond(Method::Get, "script", RawResponse::json(200, "[]"));

        let client = client_with(mock, Some(make_token(20)));
        let response = client.request(Method::Get, "script", None).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(probe.request_count(Method::Post, "auth/jwt/refresh"), 0);
    }

    #[test]
    fn test_bearer_header_carries_access_token() {
        let mock = MockTransport::new();
        let probe = mock.clone();
        script_access_token(&mock);
        mock.respond(Method::Get, "script", RawResponse::json(200, "[]"));

        let client = client_with(mock, Some(make_token(20)));
        client.request(Method::Get, "script", None).unwrap();

        let requests = probe.requests();
        let call = requests.iter().find(|r| r.url.ends_with("/script")).unwrap();
        let auth = &call
            .headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .unwrap()
            .1;
        assert_eq!(auth, "Bearer at-1");
    }

    #[test]
    fn test_stale_token_renews_and_persists() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            "auth/jwt/refresh",
            RawResponse::json(200, r#"{"token":"rt-renewed"}"#),
        );
        script_access_token(&mock);
        mock.respond(Method::Get, "script", RawResponse::json(200, "[]"));

        let client = client_with(mock, Some(make_token(10)));
        client.request(Method::Get, "script", None).unwrap();

        let stored = client.store.lock().unwrap().refresh_token();
        assert_eq!(stored.as_deref(), Some("rt-renewed"));
    }

    #[test]
    fn test_renewal_failure_degrades_to_old_token() {
        // Scenario D: a simulated 500 on renewal must leave the original
        // token usable for the current request.
        let stale = make_token(10);
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            "auth/jwt/refresh",
            RawResponse::text(500, "internal error"),
        );
        script_access_token(&mock);
        mock.respond(Method::Get, "script", RawResponse::json(200, "[]"));

        let client = client_with(mock, Some(stale.clone()));
        let response = client.request(Method::Get, "script", None).unwrap();
        assert_eq!(response.status, 200);

        let stored = client.store.lock().unwrap().refresh_token();
        assert_eq!(stored.as_deref(), Some(stale.as_str()));
    }

    #[test]
    fn test_renewal_401_is_fatal() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, "auth/jwt/refresh", RawResponse::json(401, "{}"));

        let client = client_with(mock, Some(make_token(3)));
        let err = client.request(Method::Get, "script", None).unwrap_err();
        assert!(matches!(err, Error::TokenExpired));
    }

    #[test]
    fn test_undecodable_token_forces_renewal_path() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            "auth/jwt/refresh",
            RawResponse::json(200, r#"{"token":"rt-fixed"}"#),
        );
        script_access_token(&mock);
        mock.respond(Method::Get, "script", RawResponse::json(200, "[]"));

        let client = client_with(mock, Some("not-a-jwt".to_string()));
        client.request(Method::Get, "script", None).unwrap();

        let stored = client.store.lock().unwrap().refresh_token();
        assert_eq!(stored.as_deref(), Some("rt-fixed"));
    }

    #[test]
    fn test_json_payload_decoding() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.respond(
            Method::Get,
            "script",
            RawResponse::json(200, r#"[{"id":1,"name":"greet"}]"#),
        );

        let client = client_with(mock, Some(make_token(20)));
        let response = client.request(Method::Get, "script", None).unwrap();
        let json = response.json().unwrap();
        assert_eq!(json[0]["name"], "greet");
    }

    #[test]
    fn test_csv_payload_stays_raw() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.respond(
            Method::Post,
            "data/sql",
            RawResponse::csv(200, "id,name\n1,greet\n"),
        );

        let client = client_with(mock, Some(make_token(20)));
        let response = client
            .request(Method::Post, "data/sql", Some(serde_json::json!({"query": "select 1"})))
            .unwrap();
        assert_eq!(response.payload, Payload::Csv("id,name\n1,greet\n".to_string()));
    }

    #[test]
    fn test_empty_content_type_falls_back_to_text() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.respond(
            Method::Get,
            "script/1/logs",
            RawResponse {
                status: 200,
                content_type: String::new(),
                body: "plain log line".to_string(),
            },
        );

        let client = client_with(mock, Some(make_token(20)));
        let response = client.request(Method::Get, "script/1/logs", None).unwrap();
        assert_eq!(response.payload, Payload::Text("plain log line".to_string()));
    }

    #[test]
    fn test_empty_content_type_parses_json_when_possible() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.respond(
            Method::Get,
            "script/1",
            RawResponse {
                status: 200,
                content_type: String::new(),
                body: r#"{"id":1}"#.to_string(),
            },
        );

        let client = client_with(mock, Some(make_token(20)));
        let response = client.request(Method::Get, "script/1", None).unwrap();
        assert!(response.json().is_some());
    }

    #[test]
    fn test_error_message_from_json_error_field() {
        let raw = RawResponse::json(422, r#"{"error":"name already taken"}"#);
        assert_eq!(error_message(&raw), "name already taken");
    }

    #[test]
    fn test_error_message_from_json_message_field() {
        let raw = RawResponse::json(400, r#"{"message":"missing app_id"}"#);
        assert_eq!(error_message(&raw), "missing app_id");
    }

    #[test]
    fn test_error_message_html_suppressed() {
        let raw = RawResponse {
            status: 502,
            content_type: "text/html".to_string(),
            body: "<html><body>Bad Gateway</body></html>".to_string(),
        };
        assert_eq!(error_message(&raw), "HTTP 502");
    }

    #[test]
    fn test_error_message_raw_body() {
        let raw = RawResponse::text(500, "  disk full  ");
        assert_eq!(error_message(&raw), "disk full");
    }

    #[test]
    fn test_non_2xx_surfaces_as_http_error() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.respond(
            Method::Get,
            "script/99",
            RawResponse::json(404, r#"{"error":"no such script"}"#),
        );

        let client = client_with(mock, Some(make_token(20)));
        let err = client.request(Method::Get, "script/99", None).unwrap_err();
        match err {
            Error::Http { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "no such script");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_network_failure_surfaces_as_network_error() {
        let mock = MockTransport::new();
        script_access_token(&mock);
        mock.fail(Method::Get, "script", "connection refused");

        let client = client_with(mock, Some(make_token(20)));
        let err = client.request(Method::Get, "script", None).unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
