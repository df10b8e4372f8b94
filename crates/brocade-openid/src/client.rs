//! The relying-party orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use brocade_common::http_client::HttpClient;
use brocade_common::session::SessionStore;
use brocade_yadis::YadisResolver;
use brocade_yadis::resolver::{EndpointResolver, ResolverOptions};
use http::Method;
use smol_str::SmolStr;
use tokio::sync::RwLock;
use url::Url;

use crate::challenge;
use crate::claims::{self, Claim, VerifiedAssertion};
use crate::config::RelyingPartyConfig;
use crate::error::{RejectionReason, Result};
use crate::message::{OPENID2_NAMESPACE, OpenIdMessage, modes, params};
use crate::state::{ChallengeState, CorrelationToken, StateCodec, append_state};
use crate::verify::{self, CallbackRequest};

/// Instruction to redirect the user agent to the provider.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Fully encoded provider address to 302 the user agent to.
    pub url: Url,
    /// The correlation token persisted in the store for this attempt.
    pub correlation: CorrelationToken,
}

/// The outcome of a successfully verified callback.
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// The verified assertion, the sole source of the claims below.
    pub assertion: VerifiedAssertion,
    /// Synthesized identity claims.
    pub claims: Vec<Claim>,
    /// Where the host should send the user agent next.
    pub redirect_uri: Url,
    /// Host-defined properties carried through the round trip.
    pub extra: BTreeMap<String, String>,
}

/// Provider-specific post-verification hook.
///
/// Runs after the generic engine has produced a [`VerifiedAssertion`]
/// and its claims, and may add or override profile-sourced claims. Hook
/// failures are hard errors: once a specialization is configured it is
/// assumed required.
#[async_trait]
pub trait ProviderHook: Send + Sync {
    async fn post_verify(
        &self,
        assertion: &VerifiedAssertion,
        claims: &mut Vec<Claim>,
    ) -> Result<()>;
}

/// A generic OpenID 2.0 relying party.
///
/// Composes the discovery resolver, the message model, the challenge
/// builder and the assertion verifier over host-supplied seams: an HTTP
/// client, a correlation store, and a state codec. One instance serves
/// one provider configuration; attempts are request-scoped and safe to
/// run concurrently.
pub struct RelyingParty<T, S, C>
where
    T: HttpClient + Send + Sync,
    S: SessionStore<SmolStr, CorrelationToken>,
    C: StateCodec,
{
    http: Arc<T>,
    store: S,
    codec: C,
    config: RelyingPartyConfig,
    resolver: YadisResolver<Arc<T>>,
    // Discovery is a pure function of the authority; racing recomputes
    // are harmless.
    endpoint: RwLock<Option<Url>>,
    on_redirect: Option<fn(&mut OpenIdMessage)>,
    hook: Option<Arc<dyn ProviderHook>>,
}

impl<T, S, C> RelyingParty<T, S, C>
where
    T: HttpClient + Send + Sync,
    S: SessionStore<SmolStr, CorrelationToken>,
    C: StateCodec,
{
    /// Create a relying party over the given seams and configuration.
    pub fn new(
        http: T,
        store: S,
        codec: C,
        config: RelyingPartyConfig,
    ) -> core::result::Result<Self, crate::error::ConfigError> {
        config.validate()?;

        let http = Arc::new(http);
        let resolver = YadisResolver::new(
            Arc::clone(&http),
            ResolverOptions::new()
                .max_redirections(config.max_redirections)
                .build(),
        );

        Ok(Self {
            http,
            store,
            codec,
            config,
            resolver,
            endpoint: RwLock::new(None),
            on_redirect: None,
            hook: None,
        })
    }

    /// Install a pre-redirect hook, invoked over the outbound message
    /// before it is encoded into the redirect address.
    pub fn with_redirect_hook(mut self, hook: fn(&mut OpenIdMessage)) -> Self {
        self.on_redirect = Some(hook);
        self
    }

    /// Install a provider specialization hook.
    pub fn with_provider_hook(mut self, hook: Arc<dyn ProviderHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Access the configuration.
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// The provider's authentication endpoint, discovering it on first
    /// use when no explicit endpoint is configured.
    pub async fn endpoint(&self) -> Result<Url> {
        if let Some(endpoint) = &self.config.authentication_endpoint {
            return Ok(endpoint.clone());
        }

        if let Some(endpoint) = self.endpoint.read().await.as_ref() {
            return Ok(endpoint.clone());
        }

        let address = self
            .config
            .discovery_address()
            .ok_or(crate::error::ConfigError::MissingAuthority)?;
        let discovered = self.resolver.resolve(address).await?;

        let endpoint = discovered.authentication_endpoint;
        *self.endpoint.write().await = Some(endpoint.clone());

        Ok(endpoint)
    }

    /// Build a challenge: the provider redirect plus the persisted
    /// correlation token.
    ///
    /// `redirect_uri` is where the user agent should land after the
    /// whole round trip, carried through the protected state.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(scheme = %self.config.scheme))
    )]
    pub async fn start_login(&self, redirect_uri: Url) -> Result<LoginRedirect> {
        self.start_login_with(redirect_uri, BTreeMap::new()).await
    }

    /// [`start_login`](Self::start_login) with additional host-defined
    /// properties embedded in the state.
    pub async fn start_login_with(
        &self,
        redirect_uri: Url,
        extra: BTreeMap<String, String>,
    ) -> Result<LoginRedirect> {
        let endpoint = self.endpoint().await?;

        let token = CorrelationToken::generate();
        let state = ChallengeState {
            redirect_uri,
            return_to: self.config.return_to.clone(),
            token: token.clone(),
            extra,
        };
        let protected = self.codec.protect(&state)?;

        let mut message = challenge::build_message(&self.config, &protected);
        if let Some(hook) = self.on_redirect {
            hook(&mut message);
        }

        let url = challenge::redirect_url(&endpoint, &message);

        self.store
            .set(self.config.scheme.clone(), token.clone())
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %endpoint, "built authentication challenge");

        Ok(LoginRedirect {
            url,
            correlation: token,
        })
    }

    /// Validate an inbound callback and produce the authenticated
    /// outcome.
    ///
    /// The correlation record is consumed exactly once per attempt, on
    /// success and failure alike. Rejections surface as
    /// [`OpenIdError::Rejected`](crate::OpenIdError::Rejected) with a
    /// machine-readable reason; no claims are ever emitted from a
    /// rejected callback.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(scheme = %self.config.scheme))
    )]
    pub async fn callback(&self, request: &CallbackRequest) -> Result<Authenticated> {
        // OpenID 2.0 responses MUST be made using either GET or POST.
        if request.method != Method::GET && request.method != Method::POST {
            return Err(RejectionReason::InvalidMethod.into());
        }

        if request.method == Method::POST {
            let form = request
                .content_type
                .as_deref()
                .is_some_and(|value| {
                    value
                        .to_ascii_lowercase()
                        .starts_with("application/x-www-form-urlencoded")
                });
            if !form {
                return Err(RejectionReason::InvalidContentType.into());
            }
        }

        // Single use: the stored token is consumed before any further
        // validation, so a replayed callback can never match again.
        let stored = self.store.get(&self.config.scheme).await;
        self.store.del(&self.config.scheme).await?;

        let Some(raw_state) = request.param(params::STATE) else {
            return Err(RejectionReason::MissingState.into());
        };

        let Some(state) = self.codec.unprotect(raw_state) else {
            return Err(RejectionReason::InvalidState.into());
        };

        if stored.as_ref() != Some(&state.token) {
            return Err(RejectionReason::CorrelationMismatch.into());
        }

        let message = OpenIdMessage::from_pairs(
            request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        if message.namespace() != Some(OPENID2_NAMESPACE) {
            return Err(RejectionReason::UnsupportedVersion.into());
        }

        match message.mode() {
            Some(modes::ID_RES) => {}
            Some(modes::CANCEL) => return Err(RejectionReason::Cancelled.into()),
            Some(modes::ERROR) => {
                let detail = message
                    .error()
                    .filter(|value| !value.is_empty())
                    .unwrap_or("unspecified error")
                    .to_owned();
                return Err(RejectionReason::ProviderError(detail).into());
            }
            _ => return Err(RejectionReason::InvalidAssertion.into()),
        }

        let endpoint = self.endpoint().await?;
        verify::check_authentication(self.http.as_ref(), &endpoint, &message).await?;

        // See http://openid.net/specs/openid-authentication-2_0.html#verify_return_to
        let expected = append_state(&state.return_to, raw_state);
        if message.return_to() != Some(expected.as_str()) {
            return Err(RejectionReason::ReturnToMismatch.into());
        }

        let claimed_identifier = match message.claimed_id() {
            Some(value) if !value.is_empty() => value.to_owned(),
            _ => return Err(RejectionReason::MissingClaimedIdentifier.into()),
        };

        let assertion = VerifiedAssertion {
            claimed_identifier,
            attributes: message
                .attributes()
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        };

        let issuer = self.config.issuer();
        let mut claims = claims::synthesize(&assertion, &issuer);

        if let Some(hook) = &self.hook {
            hook.post_verify(&assertion, &mut claims).await?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            claimed_id = %assertion.claimed_identifier,
            claims = claims.len(),
            "assertion verified"
        );

        Ok(Authenticated {
            assertion,
            claims,
            redirect_uri: state.redirect_uri,
            extra: state.extra,
        })
    }
}
