//! Shared plumbing for the brocade OpenID 2.0 crates.
//!
//! This crate carries the seams the protocol engine is generic over:
//!
//! - [`http_client::HttpClient`] — a minimal async HTTP trait over
//!   `http::Request`/`http::Response`, with a `reqwest` implementation
//!   behind the `reqwest-client` feature.
//! - [`session::SessionStore`] — pluggable short-lived storage, used by
//!   the relying party for single-use correlation tokens.
//! - [`error::TransportError`] — the transport-level error vocabulary
//!   shared by discovery, verification, and provider lookups.

pub mod error;
pub mod http_client;
pub mod session;

pub use error::TransportError;
pub use http_client::HttpClient;
pub use session::{MemorySessionStore, SessionStore, SessionStoreError};
