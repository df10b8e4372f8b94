//! OpenID 2.0 relying-party protocol engine.
//!
//! A relying party redirects the user agent to an identity provider,
//! the provider authenticates the user and redirects back with a signed
//! assertion, and the relying party independently verifies that
//! assertion — including the mandatory `check_authentication`
//! round-trip — before trusting the claimed identity.
//!
//! The engine is a plain library composed over three host-supplied
//! seams:
//!
//! - [`brocade_common::HttpClient`] for all outbound calls,
//! - [`brocade_common::SessionStore`] for the single-use correlation
//!   token (conventionally a cookie),
//! - [`StateCodec`] for tamper-evident protection of the challenge
//!   state (conventionally the framework's data-protection facility).
//!
//! ## Flow
//!
//! ```no_run
//! use brocade_common::session::MemorySessionStore;
//! use brocade_openid::{PlainStateCodec, RelyingParty, RelyingPartyConfig};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelyingPartyConfig::new()
//!     .authority(Url::parse("https://provider.example/")?)
//!     .realm(Url::parse("https://app.example/")?)
//!     .return_to(Url::parse("https://app.example/signin-openid")?)
//!     .build();
//!
//! let rp = RelyingParty::new(
//!     reqwest::Client::new(),
//!     MemorySessionStore::default(),
//!     PlainStateCodec,
//!     config,
//! )?;
//!
//! // Challenge: 302 the user agent to `login.url`.
//! let login = rp.start_login(Url::parse("https://app.example/")?).await?;
//!
//! // Callback: validate what the provider sent back.
//! let request = brocade_openid::CallbackRequest::get("openid.mode=id_res&...")?;
//! let outcome = rp.callback(&request).await?;
//! println!("signed in: {}", outcome.assertion.claimed_identifier);
//! # Ok(())
//! # }
//! ```

mod challenge;

pub mod claims;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod state;
pub mod verify;

pub use claims::{Claim, ClaimKind, VerifiedAssertion};
pub use client::{Authenticated, LoginRedirect, ProviderHook, RelyingParty};
pub use config::{RelyingPartyConfig, default_attributes};
pub use error::{ConfigError, OpenIdError, RejectionReason, Result};
pub use message::{AX_NAMESPACE, IDENTIFIER_SELECT, OPENID2_NAMESPACE, OpenIdMessage};
pub use state::{ChallengeState, CorrelationToken, PlainStateCodec, StateCodec};
pub use verify::CallbackRequest;
