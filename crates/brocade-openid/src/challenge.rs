//! Outbound challenge construction.

use url::Url;

use crate::config::RelyingPartyConfig;
use crate::message::{
    AX_ALIAS, AX_NAMESPACE, IDENTIFIER_SELECT, OPENID2_NAMESPACE, OpenIdMessage, modes, params,
};
use crate::state::append_state;

/// Build the outbound authentication request message.
///
/// The provider performs identity selection, so both `claimed_id` and
/// `identity` carry the fixed `identifier_select` sentinel. When the
/// configuration requests attribute exchange attributes, the message
/// additionally declares the AX extension and a `fetch_request` over
/// them.
pub(crate) fn build_message(config: &RelyingPartyConfig, protected_state: &str) -> OpenIdMessage {
    let return_to = append_state(&config.return_to, protected_state);

    let mut message = OpenIdMessage::new();
    message
        .set(params::NS, OPENID2_NAMESPACE)
        .set(params::MODE, modes::CHECKID_SETUP)
        .set(params::CLAIMED_ID, IDENTIFIER_SELECT)
        .set(params::IDENTITY, IDENTIFIER_SELECT)
        .set(params::REALM, config.realm.as_str())
        .set(params::RETURN_TO, return_to.as_str());

    if !config.attributes.is_empty() {
        message.set_parameter("openid.ns", AX_ALIAS, AX_NAMESPACE);
        message.set_parameter("openid.ax", params::MODE, modes::FETCH_REQUEST);

        for (key, attribute_type) in &config.attributes {
            message.set_parameter("openid.ax", &format!("type.{key}"), attribute_type);
        }

        let required = config
            .attributes
            .keys()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(",");
        message.set_parameter("openid.ax", params::REQUIRED, &required);
    }

    message
}

/// Encode a message into the redirect address for an endpoint.
pub(crate) fn redirect_url(endpoint: &Url, message: &OpenIdMessage) -> Url {
    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in message.parameters() {
            pairs.append_pair(key, value);
        }
    }
    url
}
