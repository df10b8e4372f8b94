//! Steam provider specialization for the brocade OpenID 2.0 engine.
//!
//! Steam's OpenID 2.0 endpoint asserts identifiers of the form
//! `https://steamcommunity.com/openid/id/<steamid64>` and returns no
//! attribute exchange data. This crate extracts the bare SteamID from a
//! verified assertion and, when a Web API key is configured, enriches
//! the claim set from the `GetPlayerSummaries` endpoint.
//!
//! ```no_run
//! use brocade_common::session::MemorySessionStore;
//! use brocade_openid::{PlainStateCodec, RelyingParty};
//! use brocade_steam::SteamProfile;
//! use std::sync::Arc;
//! use url::Url;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = reqwest::Client::new();
//! let config = brocade_steam::relying_party_config(
//!     Url::parse("https://app.example/")?,
//!     Url::parse("https://app.example/signin-steam")?,
//! );
//!
//! let rp = RelyingParty::new(http.clone(), MemorySessionStore::default(), PlainStateCodec, config)?
//!     .with_provider_hook(Arc::new(SteamProfile::new(http).with_application_key("my-web-api-key")));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use brocade_common::TransportError;
use brocade_common::http_client::HttpClient;
use brocade_openid::{
    Claim, ClaimKind, OpenIdError, ProviderHook, RelyingPartyConfig, VerifiedAssertion,
};
use http::{Method, Request, StatusCode, header};
use miette::Diagnostic;
use serde::Deserialize;
use smol_str::SmolStr;
use thiserror::Error;
use url::Url;

/// The Steam OpenID 2.0 authority.
pub const AUTHORITY: &str = "https://steamcommunity.com/openid/";

/// Conventional callback path for the Steam scheme.
pub const CALLBACK_PATH: &str = "/signin-steam";

/// The Steam Web API user-info endpoint.
pub const USER_INFO_ENDPOINT: &str =
    "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v0002/";

const IDENTIFIER_PREFIX: &str = "https://steamcommunity.com/openid/id/";
const LEGACY_IDENTIFIER_PREFIX: &str = "http://steamcommunity.com/openid/id/";

/// Claim names for profile fields from the user-info endpoint.
///
/// See <https://developer.valvesoftware.com/wiki/Steam_Web_API#GetPlayerSummaries_.28v0002.29>.
pub mod claim_types {
    pub const STEAM_ID: &str = "steamid";
    pub const DISPLAY_NAME: &str = "personaname";
    pub const REAL_NAME: &str = "realname";
    pub const PROFILE_URL: &str = "profileurl";
    pub const AVATAR: &str = "avatar";
    pub const AVATAR_MEDIUM: &str = "avatarmedium";
    pub const AVATAR_FULL: &str = "avatarfull";
    pub const COUNTRY_CODE: &str = "loccountrycode";
    pub const STATE_CODE: &str = "locstatecode";
}

/// Errors emitted by the Steam specialization.
///
/// Unlike the base protocol's discovery and verification steps, a
/// configured user-info lookup is assumed required: its failures
/// propagate as hard errors rather than degrading to an unenriched
/// result.
#[derive(Debug, Error, Diagnostic)]
pub enum SteamError {
    /// The claimed identifier did not carry a known Steam prefix
    #[error("the claimed identifier was not recognized: {0}")]
    #[diagnostic(
        code(brocade_steam::unrecognized_identifier),
        help("expected an identifier under https://steamcommunity.com/openid/id/")
    )]
    UnrecognizedIdentifier(String),
    /// HTTP transport failure during the user-info request
    #[error("HTTP error: {0}")]
    #[diagnostic(code(brocade_steam::http))]
    Http(#[from] TransportError),
    /// The user-info request returned a non-2xx status
    #[error("the user info request failed with HTTP status {status}")]
    #[diagnostic(code(brocade_steam::http_status))]
    Status {
        /// Status of the failing response
        status: StatusCode,
        /// Response body, captured for diagnostics
        body: String,
    },
    /// The user-info payload could not be deserialized
    #[error("failed to deserialize the user info payload: {0}")]
    #[diagnostic(code(brocade_steam::payload))]
    Payload(#[from] serde_json::Error),
}

/// Extract the bare SteamID64 from a claimed identifier.
///
/// Steam has asserted identifiers under both the historical HTTP prefix
/// and the current HTTPS one; both are accepted. Anything else is a
/// hard error — an unrecognized identifier must never pass through
/// unstripped.
pub fn steam_id(claimed_identifier: &str) -> Result<&str, SteamError> {
    claimed_identifier
        .strip_prefix(IDENTIFIER_PREFIX)
        .or_else(|| claimed_identifier.strip_prefix(LEGACY_IDENTIFIER_PREFIX))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SteamError::UnrecognizedIdentifier(claimed_identifier.to_owned()))
}

/// One entry of the `GetPlayerSummaries` players array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerSummary {
    pub steamid: SmolStr,
    #[serde(default)]
    pub personaname: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub profileurl: Option<Url>,
    #[serde(default)]
    pub avatar: Option<Url>,
    #[serde(default)]
    pub avatarmedium: Option<Url>,
    #[serde(default)]
    pub avatarfull: Option<Url>,
    #[serde(default)]
    pub loccountrycode: Option<String>,
    #[serde(default)]
    pub locstatecode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoPayload {
    response: UserInfoBody,
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

/// Post-verification hook performing the authenticated profile lookup.
///
/// Without an application key the lookup is skipped entirely and the
/// base protocol result stands alone.
#[derive(Debug, Clone)]
pub struct SteamProfile<T> {
    http: T,
    application_key: Option<SmolStr>,
    user_info_endpoint: Url,
}

impl<T> SteamProfile<T> {
    /// Create a profile hook without an application key; the lookup is
    /// skipped until one is set.
    pub fn new(http: T) -> Self {
        Self {
            http,
            application_key: None,
            user_info_endpoint: Url::parse(USER_INFO_ENDPOINT).expect("endpoint is a valid URL"),
        }
    }

    /// Set the Steam Web API application key.
    pub fn with_application_key(mut self, key: impl Into<SmolStr>) -> Self {
        self.application_key = Some(key.into());
        self
    }

    /// Override the user-info endpoint.
    pub fn with_user_info_endpoint(mut self, endpoint: Url) -> Self {
        self.user_info_endpoint = endpoint;
        self
    }
}

impl<T> SteamProfile<T>
where
    T: HttpClient + Sync,
{
    /// Fetch the player summary for a bare SteamID64.
    ///
    /// Returns `None` when the players array is empty (private or
    /// deleted profiles).
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, key))
    )]
    pub async fn fetch_player(
        &self,
        key: &str,
        steam_id: &str,
    ) -> Result<Option<PlayerSummary>, SteamError> {
        let mut address = self.user_info_endpoint.clone();
        address
            .query_pairs_mut()
            .append_pair("key", key)
            .append_pair("steamids", steam_id);

        let request = Request::builder()
            .method(Method::GET)
            .uri(address.as_str())
            .header(header::ACCEPT, "application/json")
            .body(Vec::new())
            .map_err(TransportError::from)?;

        let response = self
            .http
            .send_http(request)
            .await
            .map_err(|e| SteamError::Http(TransportError::other(e)))?;

        if !response.status().is_success() {
            return Err(SteamError::Status {
                status: response.status(),
                body: String::from_utf8_lossy(response.body()).into_owned(),
            });
        }

        let payload: UserInfoPayload = serde_json::from_slice(response.body())?;
        Ok(payload.response.players.into_iter().next())
    }
}

#[async_trait]
impl<T> ProviderHook for SteamProfile<T>
where
    T: HttpClient + Send + Sync,
{
    async fn post_verify(
        &self,
        assertion: &VerifiedAssertion,
        claims: &mut Vec<Claim>,
    ) -> Result<(), OpenIdError> {
        let steam_id =
            steam_id(&assertion.claimed_identifier).map_err(OpenIdError::specialization)?;

        let Some(key) = self.application_key.as_deref() else {
            return Ok(());
        };

        let Some(player) = self
            .fetch_player(key, steam_id)
            .await
            .map_err(OpenIdError::specialization)?
        else {
            #[cfg(feature = "tracing")]
            tracing::debug!(steam_id, "user info response carried no player");
            return Ok(());
        };

        let issuer = claims
            .first()
            .map(|claim| claim.issuer.clone())
            .unwrap_or_else(|| SmolStr::new_static("steam"));

        if let Some(name) = player.personaname.as_deref().filter(|name| !name.is_empty()) {
            claims.retain(|claim| claim.kind != ClaimKind::Name);
            claims.push(Claim::new(ClaimKind::Name, name, issuer.clone()));
        }

        let mut profile_claim = |kind: &'static str, value: Option<String>| {
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                claims.push(Claim::new(
                    ClaimKind::Other(SmolStr::new_static(kind)),
                    value,
                    issuer.clone(),
                ));
            }
        };

        profile_claim(claim_types::REAL_NAME, player.realname);
        profile_claim(
            claim_types::PROFILE_URL,
            player.profileurl.map(|url| url.to_string()),
        );
        profile_claim(claim_types::AVATAR, player.avatar.map(|url| url.to_string()));
        profile_claim(
            claim_types::AVATAR_FULL,
            player.avatarfull.map(|url| url.to_string()),
        );
        profile_claim(claim_types::COUNTRY_CODE, player.loccountrycode);

        Ok(())
    }
}

/// A relying-party configuration preset for Steam.
pub fn relying_party_config(realm: Url, return_to: Url) -> RelyingPartyConfig {
    RelyingPartyConfig::new()
        .scheme(SmolStr::new_static("steam"))
        .authority(Url::parse(AUTHORITY).expect("authority is a valid URL"))
        .realm(realm)
        .return_to(return_to)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn strips_the_current_prefix() {
        assert_eq!(
            steam_id("https://steamcommunity.com/openid/id/76561198000000000").unwrap(),
            "76561198000000000"
        );
    }

    #[test]
    fn strips_the_legacy_prefix() {
        assert_eq!(
            steam_id("http://steamcommunity.com/openid/id/76561198000000000").unwrap(),
            "76561198000000000"
        );
    }

    #[test]
    fn unknown_prefixes_are_a_hard_error() {
        let err = steam_id("https://example.com/openid/id/76561198000000000").unwrap_err();
        assert!(matches!(err, SteamError::UnrecognizedIdentifier(_)));
    }

    #[test]
    fn empty_ids_are_a_hard_error() {
        let err = steam_id("https://steamcommunity.com/openid/id/").unwrap_err();
        assert!(matches!(err, SteamError::UnrecognizedIdentifier(_)));
    }

    #[derive(Clone, Default)]
    struct MockClient {
        resp: Arc<Mutex<Option<http::Response<Vec<u8>>>>>,
        sent: Arc<Mutex<Option<http::Request<Vec<u8>>>>>,
    }

    impl MockClient {
        fn respond(response: http::Response<Vec<u8>>) -> Self {
            Self {
                resp: Arc::new(Mutex::new(Some(response))),
                sent: Arc::default(),
            }
        }

        fn json(body: &str) -> Self {
            Self::respond(
                http::Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/json")
                    .body(body.as_bytes().to_vec())
                    .unwrap(),
            )
        }
    }

    impl HttpClient for MockClient {
        type Error = std::convert::Infallible;
        fn send_http(
            &self,
            request: http::Request<Vec<u8>>,
        ) -> impl core::future::Future<
            Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
        > + Send {
            let resp = self.resp.clone();
            let sent = self.sent.clone();
            async move {
                *sent.lock().await = Some(request);
                Ok(resp.lock().await.take().unwrap())
            }
        }
    }

    fn assertion() -> VerifiedAssertion {
        VerifiedAssertion {
            claimed_identifier: String::from(
                "https://steamcommunity.com/openid/id/76561198000000000",
            ),
            attributes: BTreeMap::new(),
        }
    }

    fn base_claims() -> Vec<Claim> {
        vec![Claim::new(
            ClaimKind::NameIdentifier,
            "https://steamcommunity.com/openid/id/76561198000000000",
            SmolStr::new_static("steam"),
        )]
    }

    const PLAYER_JSON: &str = r#"{
        "response": {
            "players": [{
                "steamid": "76561198000000000",
                "personaname": "schnose",
                "profileurl": "https://steamcommunity.com/id/schnose/",
                "avatar": "https://avatars.steamstatic.com/abc.jpg",
                "loccountrycode": "DE"
            }]
        }
    }"#;

    #[tokio::test]
    async fn lookup_overrides_the_name_claim() {
        let client = MockClient::json(PLAYER_JSON);
        let hook = SteamProfile::new(client.clone()).with_application_key("steam-application-key");

        let mut claims = base_claims();
        claims.push(Claim::new(
            ClaimKind::Name,
            "old name",
            SmolStr::new_static("steam"),
        ));
        hook.post_verify(&assertion(), &mut claims).await.unwrap();

        let names: Vec<_> = claims
            .iter()
            .filter(|claim| claim.kind == ClaimKind::Name)
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].value, "schnose");

        // The NameIdentifier claim always carries through.
        assert!(
            claims
                .iter()
                .any(|claim| claim.kind == ClaimKind::NameIdentifier)
        );

        // The identifier prefix was stripped before the request.
        let sent = client.sent.lock().await.take().unwrap();
        let url = Url::parse(&sent.uri().to_string()).unwrap();
        let query: BTreeMap<_, _> = url.query_pairs().collect();
        assert_eq!(query.get("steamids").map(|v| v.as_ref()), Some("76561198000000000"));
        assert_eq!(
            query.get("key").map(|v| v.as_ref()),
            Some("steam-application-key")
        );
    }

    #[tokio::test]
    async fn profile_fields_become_claims() {
        let client = MockClient::json(PLAYER_JSON);
        let hook = SteamProfile::new(client).with_application_key("steam-application-key");

        let mut claims = base_claims();
        hook.post_verify(&assertion(), &mut claims).await.unwrap();

        let other = |name: &'static str| {
            claims
                .iter()
                .find(|claim| claim.kind == ClaimKind::Other(SmolStr::new_static(name)))
                .map(|claim| claim.value.as_str())
        };
        assert_eq!(
            other(claim_types::PROFILE_URL),
            Some("https://steamcommunity.com/id/schnose/")
        );
        assert_eq!(other(claim_types::COUNTRY_CODE), Some("DE"));
    }

    #[tokio::test]
    async fn missing_application_key_skips_the_lookup() {
        let client = MockClient::default();
        let hook = SteamProfile::new(client.clone());

        let mut claims = base_claims();
        hook.post_verify(&assertion(), &mut claims).await.unwrap();

        assert_eq!(claims, base_claims());
        assert!(client.sent.lock().await.is_none());
    }

    #[tokio::test]
    async fn unrecognized_identifiers_fail_even_without_a_key() {
        let hook = SteamProfile::new(MockClient::default());

        let assertion = VerifiedAssertion {
            claimed_identifier: String::from("https://example.com/openid/id/42"),
            attributes: BTreeMap::new(),
        };
        let err = hook
            .post_verify(&assertion, &mut base_claims())
            .await
            .unwrap_err();
        assert!(matches!(err, OpenIdError::Specialization(_)));
    }

    #[tokio::test]
    async fn failed_lookups_are_hard_errors() {
        let client = MockClient::respond(
            http::Response::builder()
                .status(StatusCode::FORBIDDEN)
                .body(b"key revoked".to_vec())
                .unwrap(),
        );
        let hook = SteamProfile::new(client).with_application_key("steam-application-key");

        let err = hook
            .post_verify(&assertion(), &mut base_claims())
            .await
            .unwrap_err();
        assert!(matches!(err, OpenIdError::Specialization(_)));
    }

    #[tokio::test]
    async fn empty_player_lists_leave_claims_untouched() {
        let client = MockClient::json(r#"{"response": {"players": []}}"#);
        let hook = SteamProfile::new(client).with_application_key("steam-application-key");

        let mut claims = base_claims();
        hook.post_verify(&assertion(), &mut claims).await.unwrap();
        assert_eq!(claims, base_claims());
    }

    #[test]
    fn config_preset_targets_the_steam_authority() {
        let config = relying_party_config(
            Url::parse("https://app.example/").unwrap(),
            Url::parse("https://app.example/signin-steam").unwrap(),
        );
        assert_eq!(config.scheme, "steam");
        assert_eq!(
            config.authority.as_ref().unwrap().as_str(),
            "https://steamcommunity.com/openid/"
        );
    }
}
