//! Refresh-token lifecycle: claim decoding, renewal checks, exchanges.
//!
//! Tokens are self-describing JWTs. The client never verifies signatures
//! (that is the server's job); it only reads the expiry claims to decide
//! when to renew. A token that cannot be decoded is treated as
//! "renew immediately" so a malformed or legacy token never bricks the CLI.

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Method, Transport};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Refresh-token lifetime requested on every exchange: 30 days.
pub const TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

/// Renew once remaining validity drops below this many days.
///
/// Half the lifetime, so several invocations' worth of buffer remains
/// before hard expiry even when renewals keep failing.
pub const RENEWAL_THRESHOLD_DAYS: i64 = 15;

/// Expiry claims read from a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// `iat` claim.
    pub issued_at: DateTime<Utc>,
    /// `exp` claim.
    pub expires_at: DateTime<Utc>,
    /// `aud` claim binding the token to the machine that requested it.
    pub audience: Option<String>,
}

/// Outcome of a renewal check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalCheck {
    /// Whether the token should be renewed before use.
    pub needs_renewal: bool,
    /// Whole days of validity left (0 when the token is undecodable).
    pub days_remaining: i64,
}

#[derive(Deserialize)]
struct RawClaims {
    iat: i64,
    exp: i64,
    #[serde(default)]
    aud: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Decode the expiry claims of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns `Error::Decode` when the token is not three dot-separated
/// base64url segments with a JSON claims payload. Callers treat this as
/// "assume renewal needed", not as a hard failure.
pub fn decode_expiry(token: &str) -> Result<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(Error::Decode(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let payload = base64::Engine::decode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        segments[1],
    )
    .map_err(|e| Error::Decode(format!("payload is not base64url: {e}")))?;

    let claims: RawClaims = serde_json::from_slice(&payload)
        .map_err(|e| Error::Decode(format!("claims are not valid JSON: {e}")))?;

    let issued_at = Utc
        .timestamp_opt(claims.iat, 0)
        .single()
        .ok_or_else(|| Error::Decode(format!("iat {} out of range", claims.iat)))?;
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| Error::Decode(format!("exp {} out of range", claims.exp)))?;

    Ok(TokenClaims {
        issued_at,
        expires_at,
        audience: claims.aud,
    })
}

/// Check whether a token needs renewal right now.
#[must_use]
pub fn needs_renewal(token: &str) -> RenewalCheck {
    renewal_check_at(token, Utc::now())
}

/// Renewal check against an explicit clock.
///
/// Exactly [`RENEWAL_THRESHOLD_DAYS`] remaining does NOT trigger renewal;
/// the threshold is strict. An undecodable token always needs renewal.
#[must_use]
pub fn renewal_check_at(token: &str, now: DateTime<Utc>) -> RenewalCheck {
    match decode_expiry(token) {
        Ok(claims) => {
            let days_remaining = (claims.expires_at - now).num_days().max(0);
            RenewalCheck {
                needs_renewal: days_remaining < RENEWAL_THRESHOLD_DAYS,
                days_remaining,
            }
        }
        Err(e) => {
            log::debug!("token undecodable, forcing renewal: {e}");
            RenewalCheck {
                needs_renewal: true,
                days_remaining: 0,
            }
        }
    }
}

/// The audience claim value for this machine.
#[must_use]
pub fn machine_audience() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Token exchange operations against the auth endpoints.
pub struct TokenManager<'a> {
    transport: &'a dyn Transport,
    api_base: &'a str,
}

impl<'a> TokenManager<'a> {
    /// Create a manager over a transport and API base URL.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, api_base: &'a str) -> Self {
        Self {
            transport,
            api_base,
        }
    }

    /// Exchange email/password for a fresh 30-day refresh token.
    ///
    /// Used only by initial setup; the credentials are sent once under
    /// Basic auth and never stored.
    pub fn initial_exchange(&self, email: &str, password: &str) -> Result<String> {
        let basic = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{email}:{password}"),
        );
        let request = self
            .refresh_request()
            .header("Authorization", format!("Basic {basic}"));

        let response = self.transport.execute(&request)?;
        if response.status == 401 {
            return Err(Error::Auth("invalid email or password".to_string()));
        }
        Self::parse_token(&response.body, response.status)
    }

    /// Exchange a still-valid refresh token for a new 30-day one.
    ///
    /// # Errors
    ///
    /// HTTP 401 means the old token is past hard expiry and surfaces as
    /// `Error::TokenExpired`; any other failure propagates so the caller
    /// can degrade to the old token.
    pub fn renew(&self, old_token: &str) -> Result<String> {
        let request = self
            .refresh_request()
            .header("Authorization", format!("Bearer {old_token}"));

        let response = self.transport.execute(&request)?;
        if response.status == 401 {
            return Err(Error::TokenExpired);
        }
        Self::parse_token(&response.body, response.status)
    }

    /// Exchange a refresh token for a short-lived access token.
    ///
    /// One shot, no retry, no caching; a fresh access token is obtained
    /// for every authenticated request and discarded afterwards.
    pub fn exchange_for_access_token(&self, refresh_token: &str) -> Result<String> {
        let request = ApiRequest::new(Method::Get, format!("{}/auth/jwt", self.api_base))
            .header("Authorization", format!("Bearer {refresh_token}"));

        let response = self.transport.execute(&request)?;
        if response.status == 401 || response.status == 403 {
            return Err(Error::Auth(
                "refresh token rejected; run `quill configure` to sign in again".to_string(),
            ));
        }
        Self::parse_token(&response.body, response.status)
    }

    fn refresh_request(&self) -> ApiRequest {
        ApiRequest::new(Method::Post, format!("{}/auth/jwt/refresh", self.api_base)).json(
            serde_json::json!({
                "lifetime_seconds": TOKEN_LIFETIME_SECS,
                "audience": machine_audience(),
            }),
        )
    }

    fn parse_token(body: &str, status: u16) -> Result<String> {
        if !(200..300).contains(&status) {
            return Err(Error::http(status, body.trim().to_string()));
        }
        let parsed: TokenResponse = serde_json::from_str(body)
            .map_err(|e| Error::Other(format!("token response is not valid JSON: {e}")))?;
        Ok(parsed.token)
    }
}
