//! Synchronous typed client for the PocketBase records API.
//!
//! # Overview
//! A [`Client`] connects to one server and owns its credentials. Typed
//! [`Collection`] views borrowed from it expose CRUD, paged and full
//! listing, and the auth-record flows (password, OAuth2, refresh,
//! verification, password reset, email change).
//!
//! # Design
//! - Every operation authorizes first through the client's
//!   [`AuthStrategy`] (no credentials, email + password, or token refresh).
//! - Requests and responses are plain data; a [`Transport`] performs the I/O.
//!   The default [`UreqTransport`] applies the timeout and retry envelope.
//! - Failures are classified into [`ApiError`]: authorization, transport,
//!   server status (body kept verbatim) and decoding.
//!
//! ```no_run
//! use pocketbase_core::{Client, ListParams};
//!
//! # fn main() -> Result<(), pocketbase_core::ApiError> {
//! let client = Client::builder("http://127.0.0.1:8090")
//!     .admin_email_password("admin@example.com", "secret")
//!     .build();
//! let posts = client.records("posts").full_list(&ListParams::new().sort("-created"))?;
//! println!("{} posts", posts.items.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
mod executor;
mod form;
pub mod http;
mod records;
pub mod transport;
pub mod types;

pub use auth::{AuthStrategy, EmailPasswordAuth, NoAuth, TokenRefreshAuth};
pub use client::{Client, ClientBuilder};
pub use collection::{Collection, FULL_LIST_PAGE_SIZE};
pub use config::{env_is_truthy, ClientConfig, DebugFlags, RetryPolicy};
pub use error::{ApiError, FullListError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use transport::UreqTransport;
pub use types::{
    AuthMethods, AuthRecord, AuthResponse, CreateResponse, ListParams, ListResponse, OAuth2Response,
    RecordMap,
};
