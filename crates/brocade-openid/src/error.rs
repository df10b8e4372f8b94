//! Error taxonomy for the relying-party engine.
//!
//! Setup problems are [`ConfigError`] and never retried. Assertion
//! failures are [`RejectionReason`] values wrapped in
//! [`OpenIdError::Rejected`]; they always surface to the caller as an
//! authentication failure with a machine-readable code, and no claims
//! are ever emitted past one.

use brocade_common::SessionStoreError;
use brocade_yadis::resolver::DiscoveryError;
use http::StatusCode;
use miette::Diagnostic;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Setup-time configuration failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Neither an authority, a metadata address, nor an explicit
    /// endpoint is configured
    #[error("no authority, metadata address or authentication endpoint is configured")]
    #[diagnostic(
        code(brocade_openid::config::missing_authority),
        help("set `authority` (or `metadata_address`) for discovery, or `authentication_endpoint` to bypass it")
    )]
    MissingAuthority,
    /// The discovery redirection bound is zero
    #[error("the maximal number of redirections must be a non-zero positive number")]
    #[diagnostic(code(brocade_openid::config::redirection_bound))]
    InvalidRedirectionBound,
}

/// Challenge-state serialization failures.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    /// State serialization failed
    #[error("failed to serialize challenge state: {0}")]
    #[diagnostic(code(brocade_openid::state::serialize))]
    Serialize(#[from] serde_json::Error),
}

/// The reason an inbound assertion was rejected.
///
/// Every rejection carries a stable machine code (see [`code`]) intended
/// for logs and metrics; the `Display` text is the human-readable
/// explanation.
///
/// [`code`]: RejectionReason::code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// Callback used a transport method other than GET or POST
    #[error(
        "the authentication response was rejected because it was made using an invalid method: \
         make sure to use either GET or POST"
    )]
    InvalidMethod,
    /// POST callback without a form-urlencoded Content-Type
    #[error(
        "the authentication response was rejected because it was missing the mandatory \
         'Content-Type' header or used an unsupported content type"
    )]
    InvalidContentType,
    /// The `state` parameter was absent
    #[error("the authentication response was rejected because the state parameter was missing")]
    MissingState,
    /// The `state` parameter failed to unprotect
    #[error("the authentication response was rejected because the state parameter was invalid")]
    InvalidState,
    /// The embedded correlation token did not match the stored one
    #[error("the authentication response was rejected because the anti-forgery token was invalid")]
    CorrelationMismatch,
    /// `openid.ns` was absent or not the OpenID 2.0 namespace
    #[error(
        "the authentication response was rejected because it was missing the mandatory \
         'openid.ns' parameter or because an unsupported version of OpenID was used"
    )]
    UnsupportedVersion,
    /// The provider reported that the user cancelled
    #[error("the authentication response was rejected because the operation was cancelled by the user")]
    Cancelled,
    /// The provider returned an `error` mode with the given message
    #[error("the authentication response was rejected because an error was returned by the identity provider: {0}")]
    ProviderError(String),
    /// The assertion mode was neither `id_res`, `cancel` nor `error`
    #[error("the authentication response was rejected because the identity provider declared it as invalid")]
    InvalidAssertion,
    /// The check_authentication call could not be made
    #[error("the identity provider could not be reached: {0}")]
    ProviderUnreachable(String),
    /// The check_authentication call returned a non-2xx status
    #[error("the check_authentication request failed with HTTP status {status}")]
    CheckAuthenticationStatus {
        /// Status of the failing response
        status: StatusCode,
        /// Response body, captured for diagnostics
        body: String,
    },
    /// The check_authentication response body had no `is_valid` key
    #[error("the identity provider returned an invalid check_authentication response")]
    MalformedCheckAuthentication,
    /// The provider answered `is_valid` with something other than `true`
    #[error("the identity provider declared the security assertion as invalid")]
    AssertionDeclaredInvalid,
    /// `openid.return_to` did not match the recomputed callback address
    #[error("the authentication response was rejected because the return_to parameter was invalid")]
    ReturnToMismatch,
    /// `openid.claimed_id` was absent or empty
    #[error(
        "the authentication response was rejected because it was missing the mandatory \
         'claimed_id' parameter"
    )]
    MissingClaimedIdentifier,
}

impl RejectionReason {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMethod => "invalid_method",
            Self::InvalidContentType => "invalid_content_type",
            Self::MissingState => "missing_state",
            Self::InvalidState => "invalid_state",
            Self::CorrelationMismatch => "correlation_mismatch",
            Self::UnsupportedVersion => "unsupported_version",
            Self::Cancelled => "cancelled",
            Self::ProviderError(_) => "provider_error",
            Self::InvalidAssertion => "invalid_assertion",
            Self::ProviderUnreachable(_) => "provider_unreachable",
            Self::CheckAuthenticationStatus { .. } => "check_authentication_status",
            Self::MalformedCheckAuthentication => "malformed_check_authentication",
            Self::AssertionDeclaredInvalid => "assertion_declared_invalid",
            Self::ReturnToMismatch => "return_to_mismatch",
            Self::MissingClaimedIdentifier => "missing_claimed_identifier",
        }
    }
}

/// Errors emitted by the relying-party engine.
#[derive(Debug, Error, Diagnostic)]
pub enum OpenIdError {
    /// Configuration failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    /// Endpoint discovery failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),
    /// The inbound assertion was rejected
    #[error("authentication failed ({code}): {reason}", code = .0.code(), reason = .0)]
    #[diagnostic(code(brocade_openid::rejected))]
    Rejected(#[from] RejectionReason),
    /// Challenge-state serialization failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),
    /// Correlation store failure
    #[error("correlation store error: {0}")]
    #[diagnostic(code(brocade_openid::storage))]
    Storage(#[from] SessionStoreError),
    /// A configured provider specialization failed
    #[error("provider specialization failed: {0}")]
    #[diagnostic(
        code(brocade_openid::specialization),
        help("a configured specialization is required once enabled; its failures are not downgraded")
    )]
    Specialization(#[source] BoxError),
}

impl OpenIdError {
    /// Wrap a provider-specialization failure.
    pub fn specialization(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Specialization(Box::new(err))
    }

    /// The rejection reason, when this error is an assertion rejection.
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, OpenIdError>;
