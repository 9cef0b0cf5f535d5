//! The client: configuration, token ownership and request execution.
//!
//! # Design
//! `Client` owns both tokens it ever holds: the bearer token produced by its
//! [`AuthStrategy`] and the record session token set by the auth-record
//! flows. Each sits behind its own lock, so a `Client` can be shared across
//! threads; concurrent re-authorizations still race, and the last writer
//! wins. `Collection` values borrow the client and hold no state of their
//! own.
//!
//! Every operation goes through [`Client::send`]: authorize, attach the
//! bearer token, hand the request to the transport, classify the response,
//! decode.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::auth::{AuthStrategy, EmailPasswordAuth, NoAuth, TokenRefreshAuth};
use crate::collection::Collection;
use crate::config::{ClientConfig, DebugFlags, RetryPolicy};
use crate::error::ApiError;
use crate::executor::{decode, execute};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::transport::UreqTransport;
use crate::types::RecordMap;

/// Synchronous client for a PocketBase server.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    strategy: Box<dyn AuthStrategy>,
    token: RwLock<String>,
    session_token: RwLock<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("strategy", &self.strategy)
            .field("authorized", &!self.token.read().is_empty())
            .field("has_session", &!self.session_token.read().is_empty())
            .finish()
    }
}

impl Client {
    /// Client with default settings and no credentials.
    pub fn new(base_url: &str) -> Self {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.config.debug
    }

    /// Run the authorization strategy and store the token it returns.
    ///
    /// On failure the previously stored token is kept.
    pub fn authorize(&self) -> Result<(), ApiError> {
        let current = self.token.read().clone();
        match self.strategy.authorize(self.transport.as_ref(), &current) {
            Ok(Some(token)) => {
                *self.token.write() = token;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(err.into_auth("authorize", "authorization failed")),
        }
    }

    /// Last token obtained by [`Client::authorize`]; empty if it never
    /// succeeded.
    pub fn token(&self) -> String {
        self.token.read().clone()
    }

    /// Record session token set by the auth-record flows; empty if none.
    pub fn session_token(&self) -> String {
        self.session_token.read().clone()
    }

    pub fn set_session_token(&self, token: impl Into<String>) {
        *self.session_token.write() = token.into();
    }

    pub fn clear_session_token(&self) {
        self.session_token.write().clear();
    }

    /// Typed accessor for `collection`.
    pub fn collection<T>(&self, name: &str) -> Collection<'_, T> {
        Collection::new(self, name)
    }

    /// Accessor for `collection` that works with free-form records.
    pub fn records(&self, name: &str) -> Collection<'_, RecordMap> {
        Collection::new(self, name)
    }

    /// Authorized GET of any API path (e.g. `/api/health`), decoded into `R`.
    pub fn get_to<R: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<R, ApiError> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.url(path));
        for (key, value) in query {
            request = request.with_query(key, *value);
        }
        self.send("get", request)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Execute `request` and decode its body.
    pub(crate) fn send<R: DeserializeOwned>(&self, op: &'static str, request: HttpRequest) -> Result<R, ApiError> {
        let response = self.dispatch(op, request)?;
        decode(op, &response)
    }

    /// Execute `request`; success is the absence of an error.
    pub(crate) fn send_empty(&self, op: &'static str, request: HttpRequest) -> Result<(), ApiError> {
        self.dispatch(op, request).map(|_| ())
    }

    fn dispatch(&self, op: &'static str, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.authorize()?;
        if request.header("authorization").is_none() {
            let token = self.token.read();
            if !token.is_empty() {
                request = request.with_bearer(&token);
            }
        }
        execute(self.transport.as_ref(), op, request)
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    strategy: Box<dyn AuthStrategy>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            config: ClientConfig::new(base_url),
            strategy: Box::new(NoAuth),
            transport: None,
        }
    }

    /// Use a custom authorization strategy.
    pub fn auth(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Authenticate as a superuser with email and password.
    pub fn admin_email_password(self, email: &str, password: &str) -> Self {
        let strategy = EmailPasswordAuth::admin(&self.config.base_url, email, password);
        self.auth(strategy)
    }

    /// Authenticate as a record of the `users` collection.
    pub fn user_email_password(self, email: &str, password: &str) -> Self {
        let strategy = EmailPasswordAuth::user(&self.config.base_url, email, password);
        self.auth(strategy)
    }

    /// Authenticate as a record of any auth collection.
    pub fn collection_email_password(self, collection: &str, email: &str, password: &str) -> Self {
        let strategy = EmailPasswordAuth::new(&self.config.base_url, collection, email, password);
        self.auth(strategy)
    }

    /// Keep a superuser token alive through the refresh endpoint.
    pub fn admin_token(self, token: &str) -> Self {
        let strategy = TokenRefreshAuth::admin(&self.config.base_url, token);
        self.auth(strategy)
    }

    /// Keep a `users` token alive through the refresh endpoint.
    pub fn user_token(self, token: &str) -> Self {
        let strategy = TokenRefreshAuth::user(&self.config.base_url, token);
        self.auth(strategy)
    }

    pub fn collection_token(self, collection: &str, token: &str) -> Self {
        let strategy = TokenRefreshAuth::new(&self.config.base_url, collection, token);
        self.auth(strategy)
    }

    /// Per-request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Retry envelope of the default transport (defaults: 3, 3s, 10s).
    pub fn retry(mut self, count: u32, wait: Duration, max_wait: Duration) -> Self {
        self.config.retry = RetryPolicy {
            count,
            wait,
            max_wait,
        };
        self
    }

    pub fn debug(mut self, flags: DebugFlags) -> Self {
        self.config.debug = flags;
        self
    }

    /// Replace the default `ureq` transport. Timeout and retry settings are
    /// then up to `transport`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Client {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(UreqTransport::new(&self.config)),
        };
        Client {
            config: self.config,
            transport,
            strategy: self.strategy,
            token: RwLock::new(String::new()),
            session_token: RwLock::new(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::executor::testing::FakeTransport;

    const BASE: &str = "http://127.0.0.1:8090";

    fn client(transport: &Arc<FakeTransport>) -> ClientBuilder {
        Client::builder(BASE).transport(transport.clone())
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn client_is_shareable_across_threads() {
        assert_send_sync::<Client>();
        assert_send_sync::<ClientBuilder>();
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = Client::new("http://127.0.0.1:8090/");
        assert_eq!(client.base_url(), BASE);
        assert_eq!(client.url("/api/health"), "http://127.0.0.1:8090/api/health");
    }

    #[test]
    fn token_is_empty_before_authorize() {
        let transport = Arc::new(FakeTransport::new());
        let client = client(&transport).user_email_password("a@b.c", "pw").build();
        assert_eq!(client.token(), "");
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn no_auth_client_sends_no_authorization_header() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(200, r#"{"code":200}"#);
        let client = client(&transport).build();
        let health: serde_json::Value = client.get_to("/api/health", &[]).unwrap();
        assert_eq!(health["code"], 200);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].header("authorization").is_none());
    }

    #[test]
    fn strategy_token_is_attached_to_requests() {
        let transport = Arc::new(FakeTransport::new());
        transport
            .respond(200, r#"{"token":"tok-1"}"#)
            .respond(200, "{}");
        let client = client(&transport).admin_email_password("admin@example.com", "pw").build();

        let _: serde_json::Value = client.get_to("/api/settings", &[("fields", "meta")]).unwrap();
        assert_eq!(client.token(), "tok-1");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "http://127.0.0.1:8090/api/settings");
        assert_eq!(requests[1].query_param("fields"), Some("meta"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer tok-1"));
    }

    #[test]
    fn failed_authorize_keeps_previous_token() {
        let transport = Arc::new(FakeTransport::new());
        transport
            .respond(200, r#"{"token":"tok-1"}"#)
            .respond(400, r#"{"message":"Failed to authenticate."}"#)
            .fail(TransportError::Timeout);
        let client = client(&transport).user_email_password("a@b.c", "pw").build();

        client.authorize().unwrap();
        assert_eq!(client.token(), "tok-1");

        let err = client.authorize().unwrap_err();
        assert!(err.is_auth());
        assert_eq!(client.token(), "tok-1");

        let err = client.authorize().unwrap_err();
        assert!(err.is_auth());
        assert_eq!(client.token(), "tok-1");
    }

    #[test]
    fn authorization_failure_short_circuits_the_request() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(400, r#"{"message":"Failed to authenticate."}"#);
        let client = client(&transport).user_email_password("bad", "creds").build();

        let err = client.get_to::<serde_json::Value>("/api/health", &[]).unwrap_err();
        assert!(err.is_auth());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn session_token_is_independent_of_strategy_token() {
        let client = Client::new(BASE);
        assert_eq!(client.session_token(), "");
        client.set_session_token("record-token");
        assert_eq!(client.session_token(), "record-token");
        assert_eq!(client.token(), "");
        client.clear_session_token();
        assert_eq!(client.session_token(), "");
    }

    #[test]
    fn debug_output_hides_tokens() {
        let client = Client::new(BASE);
        client.set_session_token("very-secret");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("has_session: true"));
    }

    #[test]
    fn builder_records_transport_settings() {
        let client = Client::builder(BASE)
            .timeout(Duration::from_secs(5))
            .retry(1, Duration::from_millis(10), Duration::from_millis(20))
            .debug(DebugFlags {
                rest: true,
                sse: false,
            })
            .build();
        assert_eq!(client.config.timeout, Duration::from_secs(5));
        assert_eq!(client.config.retry.count, 1);
        assert!(client.debug_flags().rest);
    }
}
