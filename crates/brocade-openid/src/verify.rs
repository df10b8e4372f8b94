//! Assertion verification wire operations.
//!
//! The state machine itself lives on
//! [`RelyingParty::callback`](crate::RelyingParty::callback); this
//! module holds the callback request shape, the Key-Value Form parser,
//! and the mandatory `check_authentication` round-trip — the sole trust
//! anchor of the protocol.

use std::collections::BTreeMap;

use brocade_common::http_client::HttpClient;
use http::{Method, Request, header};
use url::Url;

use crate::error::RejectionReason;
use crate::message::{OpenIdMessage, modes, params};

/// An inbound callback, as handed over by the host's request pipeline.
///
/// The engine never touches the host's framework types; the host
/// extracts the transport method, the Content-Type header, and the
/// decoded query/form pairs.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub method: Method,
    /// The `Content-Type` header, relevant for POST callbacks.
    pub content_type: Option<String>,
    /// Decoded query-string or form parameters, in wire order.
    pub params: Vec<(String, String)>,
}

impl CallbackRequest {
    /// A GET callback from a raw query string.
    pub fn get(query: &str) -> Result<Self, serde_html_form::de::Error> {
        Ok(Self {
            method: Method::GET,
            content_type: None,
            params: serde_html_form::from_str(query)?,
        })
    }

    /// A POST callback from the request's query string and its
    /// form-urlencoded body.
    ///
    /// The provider POSTs to the `return_to` address, so the relying
    /// party's `state` parameter arrives in the query string while the
    /// `openid.*` parameters arrive in the body.
    pub fn post(query: &str, body: &str) -> Result<Self, serde_html_form::de::Error> {
        let mut params: Vec<(String, String)> = serde_html_form::from_str(query)?;
        params.extend(serde_html_form::from_str::<Vec<(String, String)>>(body)?);

        Ok(Self {
            method: Method::POST,
            content_type: Some(String::from("application/x-www-form-urlencoded")),
            params,
        })
    }

    /// First value of the named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parse a Key-Value Form Encoding body (`key:value\n` lines).
///
/// Values may themselves contain colons (the OpenID namespace URI
/// does), so only the first colon splits. Lines without one are
/// skipped.
pub(crate) fn parse_key_value_form(body: &str) -> BTreeMap<&str, &str> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .collect()
}

/// Issue the mandatory `check_authentication` round-trip.
///
/// Posts every parameter of the original assertion except `openid.mode`
/// and the relying party's own `state` back to the provider, with
/// `openid.mode=check_authentication`. Must happen exactly once per
/// callback; no assertion may be accepted without it succeeding.
pub(crate) async fn check_authentication<T>(
    http: &T,
    endpoint: &Url,
    message: &OpenIdMessage,
) -> Result<(), RejectionReason>
where
    T: HttpClient + Sync,
{
    let mode_key = format!("openid.{}", params::MODE);

    let mut payload: BTreeMap<&str, &str> = message
        .parameters()
        .filter(|&(key, _)| key != mode_key && key != params::STATE)
        .collect();
    payload.insert(&mode_key, modes::CHECK_AUTHENTICATION);

    let body = serde_html_form::to_string(&payload)
        .map_err(|e| RejectionReason::ProviderUnreachable(e.to_string()))?;

    let request = Request::builder()
        .method(Method::POST)
        .uri(endpoint.as_str())
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.into_bytes())
        .map_err(|e| RejectionReason::ProviderUnreachable(e.to_string()))?;

    let response = http
        .send_http(request)
        .await
        .map_err(|e| RejectionReason::ProviderUnreachable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RejectionReason::CheckAuthenticationStatus {
            status: response.status(),
            body: String::from_utf8_lossy(response.body()).into_owned(),
        });
    }

    let body = String::from_utf8_lossy(response.body());
    let fields = parse_key_value_form(&body);

    match fields.get(params::IS_VALID) {
        None => Err(RejectionReason::MalformedCheckAuthentication),
        Some(&"true") => Ok(()),
        Some(_) => Err(RejectionReason::AssertionDeclaredInvalid),
    }
}
