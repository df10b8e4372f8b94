//! Yadis/XRDS endpoint discovery for OpenID 2.0 providers.
//!
//! Resolves a provider authority (or a dedicated metadata address) to
//! the provider's authentication endpoint, following the Yadis
//! algorithm across a bounded number of indirections.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use brocade_yadis::{YadisResolver, resolver::EndpointResolver};
//! use url::Url;
//!
//! let resolver = YadisResolver::new(reqwest::Client::new(), Default::default());
//! let endpoint = resolver
//!     .resolve(&Url::parse("https://steamcommunity.com/openid/")?)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolution order per hop
//!
//! 1. XRDS (or generic XML) response body — terminal: parse and return
//!    the endpoint, or fail.
//! 2. `X-XRDS-Location` response header — next hop, body not parsed.
//! 3. HTML/XHTML body with a `<meta http-equiv="X-XRDS-Location">`
//!    hint — next hop.
//!
//! Anything else fails immediately; discovery failures are not
//! transient-retryable at this layer.

pub mod resolver;

mod html;
mod xrds;

use brocade_common::http_client::HttpClient;
use http::{Method, Request, header};
use url::Url;

use crate::resolver::{
    DiscoveredEndpoint, DiscoveryError, EndpointResolver, ResolverOptions, Result, parse_absolute,
};

const MEDIA_XRDS: &str = "application/xrds+xml";
const MEDIA_HTML: &str = "text/html";
const MEDIA_XHTML: &str = "application/xhtml+xml";

const XRDS_LOCATION_HEADER: &str = "x-xrds-location";

/// Default resolver implementing the Yadis algorithm over an injected
/// HTTP client.
#[derive(Clone)]
pub struct YadisResolver<T> {
    http: T,
    opts: ResolverOptions,
}

impl<T> YadisResolver<T> {
    /// Create a resolver from an HTTP client and options.
    pub fn new(http: T, opts: ResolverOptions) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            max_redirections = opts.max_redirections,
            "yadis resolver created"
        );

        Self { http, opts }
    }

    /// Access the configured options.
    pub fn options(&self) -> &ResolverOptions {
        &self.opts
    }
}

impl<T> YadisResolver<T>
where
    T: HttpClient + Sync,
{
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(authority = %authority))
    )]
    async fn discover(&self, authority: &Url) -> Result<DiscoveredEndpoint> {
        if self.opts.max_redirections < 1 {
            return Err(DiscoveryError::InvalidRedirectionBound);
        }

        let mut address = authority.clone();

        for _ in 0..self.opts.max_redirections {
            let response = self.fetch(&address).await?;

            if !response.status().is_success() {
                return Err(DiscoveryError::HttpStatus {
                    status: response.status(),
                    body: String::from_utf8_lossy(response.body()).into_owned(),
                });
            }

            let media = media_type(&response);

            // application/xrds+xml is the standard content type but
            // generic XML is frequent.
            if matches!(media.as_deref(), Some(MEDIA_XRDS | "text/xml" | "application/xml")) {
                let body = String::from_utf8_lossy(response.body());
                let endpoint = xrds::authentication_endpoint(&body)?;

                #[cfg(feature = "tracing")]
                tracing::debug!(endpoint = %endpoint, "discovered authentication endpoint");

                return Ok(DiscoveredEndpoint {
                    authentication_endpoint: endpoint,
                });
            }

            // The header hint takes precedence over parsing the body.
            if let Some(location) = response
                .headers()
                .get(XRDS_LOCATION_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                address = parse_absolute(location)?;
                continue;
            }

            if matches!(media.as_deref(), Some(MEDIA_HTML | MEDIA_XHTML)) {
                let body = String::from_utf8_lossy(response.body());
                if let Some(location) = html::xrds_location(&body) {
                    address = parse_absolute(&location)?;
                    continue;
                }
            }

            return Err(DiscoveryError::LocationNotFound);
        }

        Err(DiscoveryError::LocationNotFound)
    }

    async fn fetch(&self, address: &Url) -> Result<http::Response<Vec<u8>>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(address.as_str())
            // XRDS first so a content-negotiating server can skip the
            // extra round trip.
            .header(
                header::ACCEPT,
                format!("{MEDIA_XRDS}, {MEDIA_HTML}, {MEDIA_XHTML}"),
            )
            .body(Vec::new())
            .map_err(brocade_common::TransportError::from)?;

        self.http
            .send_http(request)
            .await
            .map_err(|e| DiscoveryError::Http(brocade_common::TransportError::other(e)))
    }
}

impl<T> EndpointResolver for YadisResolver<T>
where
    T: HttpClient + Sync,
{
    async fn resolve(&self, authority: &Url) -> Result<DiscoveredEndpoint> {
        self.discover(authority).await
    }
}

/// Media type of a response, lowercased and stripped of parameters.
fn media_type(response: &http::Response<Vec<u8>>) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or(value)
                .trim()
                .to_ascii_lowercase()
        })
}
