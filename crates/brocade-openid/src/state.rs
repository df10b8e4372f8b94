//! Challenge state and the opaque protection seam.
//!
//! The relying party round-trips a small property bag through the
//! provider via the `state` query parameter. Tamper evidence is
//! delegated to the host through [`StateCodec`]; this module only
//! defines what must be embedded and how the callback address carries
//! it.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rngs::ThreadRng};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

use crate::error::StateError;
use crate::message::params;

/// Single-use secret tying a challenge to its eventual callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(SmolStr);

impl CorrelationToken {
    /// Generate a fresh token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        ThreadRng::default().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The property bag embedded in the `state` parameter of a challenge.
///
/// Must be re-derivable from the value echoed back by the provider: the
/// callback recomputes the expected `return_to` address from
/// [`return_to`](Self::return_to) plus the raw echoed `state` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeState {
    /// Where the host should send the user agent after authentication.
    pub redirect_uri: Url,
    /// The callback base address the challenge was built against.
    pub return_to: Url,
    /// The anti-forgery correlation token.
    pub token: CorrelationToken,
    /// Additional host-defined properties carried through the round trip.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Opaque protection for the challenge state ("protect/unprotect a
/// property bag").
///
/// Implementations must tolerate arbitrary previously-protected
/// payloads: `unprotect` returns `None` (never panics) on tamper or
/// corruption.
pub trait StateCodec: Send + Sync {
    /// Serialize and protect a challenge state into a query-safe string.
    fn protect(&self, state: &ChallengeState) -> Result<String, StateError>;

    /// Recover a challenge state from a previously protected value.
    fn unprotect(&self, value: &str) -> Option<ChallengeState>;
}

/// Unauthenticated base64url/JSON codec.
///
/// NOT tamper-proof, only suitable for development and tests; a
/// production host must back [`StateCodec`] with real authenticated
/// encryption (its web framework's data-protection facility, typically).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStateCodec;

impl StateCodec for PlainStateCodec {
    fn protect(&self, state: &ChallengeState) -> Result<String, StateError> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(state)?))
    }

    fn unprotect(&self, value: &str) -> Option<ChallengeState> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Append the protected state to a callback base address.
///
/// Both the challenge builder and the verifier go through this helper,
/// which is what makes the `return_to` comparison an exact string
/// equality rather than a structural one.
pub(crate) fn append_state(base: &Url, state: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(params::STATE, state);
    url
}
