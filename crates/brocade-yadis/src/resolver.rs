//! Endpoint resolution: provider authority → authentication endpoint.
//!
//! The Yadis algorithm walks a bounded chain of indirections, where each
//! hop is one of three document shapes:
//!
//! - an XRDS document (terminal: yields the endpoint or fails),
//! - an `X-XRDS-Location` response header (next hop),
//! - an HTML/XHTML page carrying a `<meta http-equiv="X-XRDS-Location">`
//!   hint (next hop).
//!
//! Resolution is a pure function of the authority address; callers may
//! cache the result indefinitely and re-run it on a miss.

use std::future::Future;

use bon::Builder;
use brocade_common::TransportError;
use http::StatusCode;
use miette::Diagnostic;
use thiserror::Error;
use url::Url;

/// Errors that can occur during Yadis discovery.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    /// The configured redirection bound is zero
    #[error("the maximal number of redirections must be a non-zero positive number")]
    #[diagnostic(code(brocade_yadis::redirection_bound))]
    InvalidRedirectionBound,
    /// HTTP transport failure while fetching a discovery document
    #[error("HTTP error: {0}")]
    #[diagnostic(
        code(brocade_yadis::http),
        help("check network connectivity and TLS configuration")
    )]
    Http(#[from] TransportError),
    /// The provider answered a discovery request with a non-2xx status
    #[error("HTTP status {status} from discovery document")]
    #[diagnostic(code(brocade_yadis::http_status))]
    HttpStatus {
        /// Status of the failing response
        status: StatusCode,
        /// Response body, captured for diagnostics
        body: String,
    },
    /// An XRDS document could not be parsed
    #[error("invalid XRDS document: {0}")]
    #[diagnostic(code(brocade_yadis::invalid_xrds))]
    InvalidXrds(String),
    /// The XRDS document had no qualifying service endpoint
    #[error("XRDS document did not contain the authentication endpoint address")]
    #[diagnostic(
        code(brocade_yadis::missing_endpoint),
        help("expected a <Service> with <Type>http://specs.openid.net/auth/2.0/server</Type>")
    )]
    MissingEndpoint,
    /// A hop or endpoint address was not an absolute URL
    #[error("discovery returned an invalid address: {value}")]
    #[diagnostic(code(brocade_yadis::invalid_address))]
    InvalidAddress {
        /// The offending address value
        value: String,
        /// Parse failure it produced
        #[source]
        source: url::ParseError,
    },
    /// No XRDS document location was found within the redirection bound
    #[error("the XRDS document location was not found")]
    #[diagnostic(
        code(brocade_yadis::location_not_found),
        help("the provider sent neither an XRDS document nor a location hint")
    )]
    LocationNotFound,
}

pub type Result<T> = core::result::Result<T, DiscoveryError>;

/// A successfully discovered OpenID 2.0 provider configuration.
///
/// The protocol defines no expiry for this value; hosts may cache it per
/// authority for as long as they like and re-discover on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    /// The provider's authentication endpoint address.
    pub authentication_endpoint: Url,
}

/// Configurable discovery options.
#[derive(Debug, Clone, Builder)]
#[builder(start_fn = new)]
pub struct ResolverOptions {
    /// Maximal number of roundtrips before discovery is aborted. Must be
    /// at least 1.
    #[builder(default = 5)]
    pub max_redirections: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::new().build()
    }
}

/// Trait for endpoint resolution, for pluggable implementations.
///
/// The provided [`YadisResolver`](crate::YadisResolver) implements the
/// full Yadis algorithm over an injected HTTP client; hosts with an
/// out-of-band endpoint can supply their own implementation (or bypass
/// resolution entirely through the relying-party configuration).
#[trait_variant::make(Send)]
pub trait EndpointResolver {
    /// Resolve the authentication endpoint for a provider authority.
    fn resolve(&self, authority: &Url) -> impl Future<Output = Result<DiscoveredEndpoint>>;
}

impl<T: EndpointResolver + Sync> EndpointResolver for std::sync::Arc<T> {
    fn resolve(
        &self,
        authority: &Url,
    ) -> impl Future<Output = Result<DiscoveredEndpoint>> + Send {
        self.as_ref().resolve(authority)
    }
}

/// Parse a candidate hop or endpoint address, requiring it to be absolute.
pub(crate) fn parse_absolute(value: &str) -> Result<Url> {
    Url::parse(value).map_err(|source| DiscoveryError::InvalidAddress {
        value: value.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = ResolverOptions::default();
        assert_eq!(opts.max_redirections, 5);
    }

    #[test]
    fn relative_addresses_are_rejected() {
        let err = parse_absolute("/xrds.xml").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidAddress { .. }));
    }
}
