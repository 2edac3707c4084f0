//! Shared fixtures for unit tests.

use authkit::{Client, MemoryTokenStore, MockTransport, TOKEN_LIFETIME_SECS};
use chrono::{Duration, Utc};

/// A well-formed refresh token comfortably outside the renewal window.
pub fn fresh_token() -> String {
    let exp = Utc::now() + Duration::days(25);
    let iat = exp - Duration::seconds(TOKEN_LIFETIME_SECS);
    let encode = |value: &serde_json::Value| {
        base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            value.to_string(),
        )
    };
    let header = encode(&serde_json::json!({"alg": "HS256", "typ": "JWT"}));
    let payload = encode(&serde_json::json!({
        "iat": iat.timestamp(),
        "exp": exp.timestamp(),
        "aud": "build-host",
    }));
    format!("{header}.{payload}.sig")
}

/// A client over a mock transport with a fresh token in memory.
pub fn client_over(mock: MockTransport) -> Client {
    Client::new(
        Box::new(mock),
        "https://api.example.dev/v1",
        Box::new(MemoryTokenStore::with_token(fresh_token())),
    )
}

/// Script `count` access-token exchanges on the mock.
pub fn script_access_tokens(mock: &MockTransport, count: usize) {
    for _ in 0..count {
        mock.respond(
            authkit::Method::Get,
            "auth/jwt",
            authkit::RawResponse::json(200, r#"{"token":"at"}"#),
        );
    }
}
