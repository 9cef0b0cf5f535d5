//! Authorization strategies.
//!
//! A strategy knows how to (re-)establish the client's bearer token. The
//! client calls [`AuthStrategy::authorize`] before every operation and
//! stores the returned token; a failed call leaves the stored token as it
//! was.

use std::fmt;

use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::executor::{decode, encode, execute};
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::types::AuthResponse;

/// Collection that holds admin accounts.
pub const SUPERUSERS_COLLECTION: &str = "_superusers";

/// Obtains the bearer token attached to every request.
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    /// Returns the token to use from now on, or `None` when this strategy
    /// does not authenticate. `current` is the last token this strategy
    /// produced, empty before the first success.
    fn authorize(&self, transport: &dyn Transport, current: &str) -> Result<Option<String>, ApiError>;
}

/// Sends no credentials and never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthStrategy for NoAuth {
    fn authorize(&self, _transport: &dyn Transport, _current: &str) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Exchanges an identity and password for a token on every call.
#[derive(Debug)]
pub struct EmailPasswordAuth {
    url: String,
    identity: String,
    password: Secret<String>,
}

impl EmailPasswordAuth {
    pub fn new(base_url: &str, collection: &str, identity: &str, password: &str) -> Self {
        Self {
            url: format!(
                "{}/api/collections/{}/auth-with-password",
                base_url.trim_end_matches('/'),
                urlencoding::encode(collection)
            ),
            identity: identity.to_string(),
            password: Secret::new(password.to_string()),
        }
    }

    pub fn admin(base_url: &str, email: &str, password: &str) -> Self {
        Self::new(base_url, SUPERUSERS_COLLECTION, email, password)
    }

    pub fn user(base_url: &str, email: &str, password: &str) -> Self {
        Self::new(base_url, "users", email, password)
    }
}

impl AuthStrategy for EmailPasswordAuth {
    fn authorize(&self, transport: &dyn Transport, _current: &str) -> Result<Option<String>, ApiError> {
        const OP: &str = "authorize";
        let body = encode(
            OP,
            &json!({
                "identity": self.identity,
                "password": self.password.expose_secret(),
            }),
        )?;
        let request = HttpRequest::new(HttpMethod::Post, &self.url).with_body(body);
        let auth = exchange(transport, OP, request)?;
        debug!(identity = %self.identity, record = %auth.record.id, "authorized with password");
        Ok(Some(auth.token))
    }
}

/// Keeps a pre-issued token alive through the refresh endpoint.
///
/// The first call refreshes the seed token; later calls refresh whatever the
/// previous call returned.
#[derive(Debug)]
pub struct TokenRefreshAuth {
    url: String,
    seed: Secret<String>,
}

impl TokenRefreshAuth {
    pub fn new(base_url: &str, collection: &str, token: &str) -> Self {
        Self {
            url: format!(
                "{}/api/collections/{}/auth-refresh",
                base_url.trim_end_matches('/'),
                urlencoding::encode(collection)
            ),
            seed: Secret::new(token.to_string()),
        }
    }

    pub fn admin(base_url: &str, token: &str) -> Self {
        Self::new(base_url, SUPERUSERS_COLLECTION, token)
    }

    pub fn user(base_url: &str, token: &str) -> Self {
        Self::new(base_url, "users", token)
    }
}

impl AuthStrategy for TokenRefreshAuth {
    fn authorize(&self, transport: &dyn Transport, current: &str) -> Result<Option<String>, ApiError> {
        const OP: &str = "authorize";
        let token = if current.is_empty() {
            self.seed.expose_secret().as_str()
        } else {
            current
        };
        let request = HttpRequest::new(HttpMethod::Post, &self.url).with_bearer(token);
        let auth = exchange(transport, OP, request)?;
        debug!(record = %auth.record.id, "refreshed token");
        Ok(Some(auth.token))
    }
}

fn exchange(transport: &dyn Transport, op: &'static str, request: HttpRequest) -> Result<AuthResponse, ApiError> {
    let response = execute(transport, op, request).map_err(|e| e.into_auth(op, "credentials rejected"))?;
    let auth: AuthResponse = decode(op, &response).map_err(|e| e.into_auth(op, "unreadable auth response"))?;
    if auth.token.is_empty() {
        return Err(ApiError::auth(op, "server returned an empty token"));
    }
    Ok(auth)
}
