//! Relying-party configuration.

use std::collections::BTreeMap;

use bon::Builder;
use smol_str::SmolStr;
use url::Url;

use crate::error::ConfigError;

/// Immutable configuration for a relying party, fixed at construction.
///
/// Either an `authority` (or `metadata_address`) for Yadis discovery or
/// an explicit `authentication_endpoint` must be set; the endpoint, when
/// present, bypasses discovery entirely.
#[derive(Debug, Clone, Builder)]
#[builder(start_fn = new)]
pub struct RelyingPartyConfig {
    /// Authentication scheme name. Keys the correlation store and is
    /// the default claims issuer.
    #[builder(default = SmolStr::new_static("openid"))]
    pub scheme: SmolStr,

    /// Absolute URL of the OpenID 2.0 provider, used as the discovery
    /// starting point.
    pub authority: Option<Url>,

    /// Dedicated XRDS document address. Takes precedence over
    /// `authority` as the discovery starting point.
    pub metadata_address: Option<Url>,

    /// Explicit authentication endpoint; skips discovery when set.
    pub authentication_endpoint: Option<Url>,

    /// The realm presented to the provider, conventionally the
    /// application's scheme + host + base path.
    pub realm: Url,

    /// Absolute callback address the provider redirects back to.
    pub return_to: Url,

    /// Attribute exchange attributes requested on each challenge, as
    /// key → type URI. Defaults to [`default_attributes`]; set an empty
    /// map to request none.
    #[builder(default = default_attributes())]
    pub attributes: BTreeMap<SmolStr, SmolStr>,

    /// Maximal number of discovery roundtrips. Must be at least 1.
    #[builder(default = 5)]
    pub max_redirections: usize,

    /// Issuer recorded on synthesized claims; defaults to the scheme
    /// name.
    pub claims_issuer: Option<SmolStr>,
}

impl RelyingPartyConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.authentication_endpoint.is_none()
            && self.authority.is_none()
            && self.metadata_address.is_none()
        {
            return Err(ConfigError::MissingAuthority);
        }
        if self.max_redirections < 1 {
            return Err(ConfigError::InvalidRedirectionBound);
        }
        Ok(())
    }

    /// The issuer recorded on synthesized claims.
    pub fn issuer(&self) -> SmolStr {
        self.claims_issuer.clone().unwrap_or_else(|| self.scheme.clone())
    }

    /// The address discovery starts from, when discovery applies.
    pub(crate) fn discovery_address(&self) -> Option<&Url> {
        self.metadata_address.as_ref().or(self.authority.as_ref())
    }
}

/// The default attribute exchange request set.
///
/// Covers the common profile attributes under both the `axschema.org`
/// vocabulary and the legacy `schema.openid.net` one, since providers
/// disagree on which they answer to.
pub fn default_attributes() -> BTreeMap<SmolStr, SmolStr> {
    [
        ("email", "http://axschema.org/contact/email"),
        ("name", "http://axschema.org/namePerson"),
        ("first", "http://axschema.org/namePerson/first"),
        ("last", "http://axschema.org/namePerson/last"),
        ("email2", "http://schema.openid.net/contact/email"),
        ("name2", "http://schema.openid.net/namePerson"),
        ("first2", "http://schema.openid.net/namePerson/first"),
        ("last2", "http://schema.openid.net/namePerson/last"),
    ]
    .into_iter()
    .map(|(key, value)| (SmolStr::new_static(key), SmolStr::new_static(value)))
    .collect()
}
