//! # authkit
//!
//! Pure Rust library for talking to the Quill API.
//!
//! This crate owns the credential lifecycle and the authenticated request
//! path used by the `quill` CLI:
//! - Refresh-token claim decoding (no signature verification) and the
//!   15-of-30-day renewal policy
//! - Token exchanges: initial (Basic auth), renewal, and per-request
//!   access tokens
//! - A single authenticated request choke-point with content-type-aware
//!   response decoding and body-derived error messages
//!
//! ## Example
//!
//! ```no_run
//! use authkit::{Client, HttpTransport, MemoryTokenStore, Method};
//!
//! let client = Client::new(
//!     Box::new(HttpTransport::new()),
//!     "https://api.quill.dev/v1",
//!     Box::new(MemoryTokenStore::with_token("<refresh token>")),
//! );
//!
//! let scripts = client.request(Method::Get, "script", None).unwrap();
//! println!("{}", scripts.text());
//! ```
//!
//! ## Testing
//!
//! All network behavior goes through the [`Transport`] trait; use
//! [`MockTransport`] to script responses and failures without a server.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod token;
pub mod transport;

pub use client::{ApiResponse, Client, MemoryTokenStore, Payload, TokenStore};
pub use error::{Error, ErrorCategory, Result};
pub use token::{
    RENEWAL_THRESHOLD_DAYS, RenewalCheck, TOKEN_LIFETIME_SECS, TokenClaims, TokenManager,
    decode_expiry, machine_audience, needs_renewal, renewal_check_at,
};
pub use transport::{ApiRequest, HttpTransport, Method, MockTransport, RawResponse, Transport};
