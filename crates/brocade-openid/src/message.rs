//! OpenID 2.0 message model.
//!
//! An OpenID message is a flat set of prefix-qualified parameters
//! (`openid.mode`, `openid.ns.ax`, `openid.ax.value.email`, ...).
//! Parameter names are case-sensitive and unique; extension parameters
//! are additionally qualified by a provider-assigned alias declared
//! through an `openid.ns.<alias>` pair.

use std::collections::BTreeMap;

/// The OpenID 2.0 protocol namespace.
pub const OPENID2_NAMESPACE: &str = "http://specs.openid.net/auth/2.0";

/// The attribute exchange 1.0 extension namespace.
pub const AX_NAMESPACE: &str = "http://openid.net/srv/ax/1.0";

/// Sentinel identifier instructing the provider to select the identity.
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Default parameter prefix.
pub const OPENID_PREFIX: &str = "openid";

/// The alias conventionally assigned to the attribute exchange extension.
pub const AX_ALIAS: &str = "ax";

/// Core parameter names (unprefixed).
pub mod params {
    pub const NS: &str = "ns";
    pub const MODE: &str = "mode";
    pub const CLAIMED_ID: &str = "claimed_id";
    pub const IDENTITY: &str = "identity";
    pub const REALM: &str = "realm";
    pub const RETURN_TO: &str = "return_to";
    pub const ERROR: &str = "error";
    pub const IS_VALID: &str = "is_valid";
    pub const REQUIRED: &str = "required";

    /// The relying party's own state parameter. Not part of the OpenID
    /// message proper; it flows through the `return_to` address.
    pub const STATE: &str = "state";
}

/// Protocol modes.
pub mod modes {
    pub const ID_RES: &str = "id_res";
    pub const CANCEL: &str = "cancel";
    pub const ERROR: &str = "error";
    pub const CHECKID_SETUP: &str = "checkid_setup";
    pub const CHECK_AUTHENTICATION: &str = "check_authentication";
    pub const FETCH_REQUEST: &str = "fetch_request";
}

/// An OpenID 2.0 request or response message.
///
/// Constructed fresh for an outbound challenge or parsed from inbound
/// query-string/form data. Storage is a deterministic ordered map; a
/// duplicate key on the wire keeps the last value seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenIdMessage {
    parameters: BTreeMap<String, String>,
}

impl OpenIdMessage {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message from raw wire pairs, skipping empty keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut message = Self::new();
        for (key, value) in pairs {
            if key.as_ref().is_empty() {
                continue;
            }
            message
                .parameters
                .insert(key.as_ref().to_owned(), value.as_ref().to_owned());
        }
        message
    }

    /// Add, replace or remove the parameter composed from the given
    /// prefix and name. An empty value removes the parameter.
    ///
    /// # Panics
    ///
    /// Panics when `prefix` or `name` is empty; composing a parameter
    /// from empty segments is a programming error, not wire input.
    pub fn set_parameter(&mut self, prefix: &str, name: &str, value: &str) -> &mut Self {
        assert!(!prefix.is_empty(), "the parameter prefix cannot be empty");
        assert!(!name.is_empty(), "the parameter name cannot be empty");

        if value.is_empty() {
            self.parameters.remove(&format!("{prefix}.{name}"));
        } else {
            self.parameters
                .insert(format!("{prefix}.{name}"), value.to_owned());
        }

        self
    }

    /// [`set_parameter`](Self::set_parameter) with the default prefix.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        self.set_parameter(OPENID_PREFIX, name, value)
    }

    /// Get the parameter composed from the given prefix and name.
    ///
    /// # Panics
    ///
    /// Panics when `prefix` or `name` is empty.
    pub fn get_parameter(&self, prefix: &str, name: &str) -> Option<&str> {
        assert!(!prefix.is_empty(), "the parameter prefix cannot be empty");
        assert!(!name.is_empty(), "the parameter name cannot be empty");

        self.parameters
            .get(&format!("{prefix}.{name}"))
            .map(String::as_str)
    }

    /// [`get_parameter`](Self::get_parameter) with the default prefix.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_parameter(OPENID_PREFIX, name)
    }

    /// The `openid.ns` parameter.
    pub fn namespace(&self) -> Option<&str> {
        self.get(params::NS)
    }

    /// The `openid.mode` parameter.
    pub fn mode(&self) -> Option<&str> {
        self.get(params::MODE)
    }

    /// The `openid.claimed_id` parameter.
    pub fn claimed_id(&self) -> Option<&str> {
        self.get(params::CLAIMED_ID)
    }

    /// The `openid.identity` parameter.
    pub fn identity(&self) -> Option<&str> {
        self.get(params::IDENTITY)
    }

    /// The `openid.realm` parameter.
    pub fn realm(&self) -> Option<&str> {
        self.get(params::REALM)
    }

    /// The `openid.return_to` parameter.
    pub fn return_to(&self) -> Option<&str> {
        self.get(params::RETURN_TO)
    }

    /// The `openid.error` parameter.
    pub fn error(&self) -> Option<&str> {
        self.get(params::ERROR)
    }

    /// All parameters, in deterministic order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// The extensions declared by this message, as namespace → alias.
    ///
    /// Scans `openid.ns.<alias>` declarations, which allows several
    /// extensions to be active at once.
    pub fn extensions(&self) -> BTreeMap<&str, &str> {
        let prefix = format!("{OPENID_PREFIX}.{}.", params::NS);

        self.parameters
            .iter()
            .filter_map(|(key, value)| {
                let alias = key.strip_prefix(&prefix)?;
                (!alias.is_empty()).then_some((value.as_str(), alias))
            })
            .collect()
    }

    /// The attribute exchange attributes carried by this message, as
    /// attribute type URI → value.
    ///
    /// Resolves the AX alias through [`extensions`](Self::extensions);
    /// a message without an AX declaration yields an empty map, not an
    /// error. Entries with a missing name, type, or value are skipped.
    pub fn attributes(&self) -> BTreeMap<&str, &str> {
        let mut attributes = BTreeMap::new();

        let extensions = self.extensions();
        let Some(alias) = extensions.get(AX_NAMESPACE) else {
            return attributes;
        };

        let type_prefix = format!("{OPENID_PREFIX}.{alias}.type.");

        for (key, attribute_type) in &self.parameters {
            let Some(name) = key.strip_prefix(&type_prefix) else {
                continue;
            };
            if name.is_empty() || attribute_type.is_empty() {
                continue;
            }

            let value_key = format!("{OPENID_PREFIX}.{alias}.value.{name}");
            match self.parameters.get(&value_key) {
                Some(value) if !value.is_empty() => {
                    attributes.insert(attribute_type.as_str(), value.as_str());
                }
                _ => {}
            }
        }

        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_upserts_and_empty_removes() {
        let mut message = OpenIdMessage::new();
        message.set(params::MODE, modes::CHECKID_SETUP);
        assert_eq!(message.mode(), Some(modes::CHECKID_SETUP));

        message.set(params::MODE, modes::ID_RES);
        assert_eq!(message.mode(), Some(modes::ID_RES));

        message.set(params::MODE, "");
        assert_eq!(message.mode(), None);
    }

    #[test]
    #[should_panic(expected = "prefix cannot be empty")]
    fn empty_prefix_panics() {
        OpenIdMessage::new().set_parameter("", "mode", "id_res");
    }

    #[test]
    #[should_panic(expected = "name cannot be empty")]
    fn empty_name_panics() {
        OpenIdMessage::new().set_parameter("openid", "", "id_res");
    }

    #[test]
    fn from_pairs_skips_empty_keys_and_keeps_last_value() {
        let message = OpenIdMessage::from_pairs([
            ("", "ignored"),
            ("openid.mode", "cancel"),
            ("openid.mode", "id_res"),
        ]);
        assert_eq!(message.mode(), Some("id_res"));
        assert_eq!(message.parameters().count(), 1);
    }

    #[test]
    fn extensions_invert_namespace_declarations() {
        let mut message = OpenIdMessage::new();
        message.set_parameter("openid.ns", "ax", AX_NAMESPACE);
        message.set_parameter("openid.ns", "sreg", "http://openid.net/extensions/sreg/1.1");

        let extensions = message.extensions();
        assert_eq!(extensions.get(AX_NAMESPACE), Some(&"ax"));
        assert_eq!(
            extensions.get("http://openid.net/extensions/sreg/1.1"),
            Some(&"sreg")
        );
    }

    #[test]
    fn attributes_without_ax_alias_are_empty() {
        let mut message = OpenIdMessage::new();
        message.set_parameter("openid.ax", "type.email", "http://axschema.org/contact/email");
        message.set_parameter("openid.ax", "value.email", "john@john-smith.local");

        assert!(message.attributes().is_empty());
    }

    #[test]
    fn attributes_resolve_through_declared_alias() {
        let mut message = OpenIdMessage::new();
        message.set_parameter("openid.ns", "ext1", AX_NAMESPACE);
        message.set_parameter("openid.ext1", "type.email", "http://axschema.org/contact/email");
        message.set_parameter("openid.ext1", "value.email", "john@john-smith.local");

        let attributes = message.attributes();
        assert_eq!(
            attributes.get("http://axschema.org/contact/email"),
            Some(&"john@john-smith.local")
        );
    }

    #[test]
    fn orphaned_type_entries_are_skipped() {
        let mut message = OpenIdMessage::new();
        message.set_parameter("openid.ns", "ax", AX_NAMESPACE);
        message.set_parameter("openid.ax", "type.email", "http://axschema.org/contact/email");
        message.set_parameter("openid.ax", "type.first", "http://axschema.org/namePerson/first");
        message.set_parameter("openid.ax", "value.first", "John");

        let attributes = message.attributes();
        assert_eq!(attributes.len(), 1);
        assert_eq!(
            attributes.get("http://axschema.org/namePerson/first"),
            Some(&"John")
        );
    }

    #[test]
    fn empty_attribute_values_are_skipped() {
        let message = OpenIdMessage::from_pairs([
            ("openid.ns.ax", AX_NAMESPACE),
            ("openid.ax.type.email", "http://axschema.org/contact/email"),
            ("openid.ax.value.email", ""),
        ]);

        assert!(message.attributes().is_empty());
    }
}
