//! Claim synthesis from verified assertions.

use std::collections::BTreeMap;

use smol_str::SmolStr;

/// Well-known attribute exchange type URIs.
///
/// Providers use either the `axschema.org` vocabulary or the legacy
/// `schema.openid.net` one; claim extraction recognizes both.
pub mod attribute_types {
    pub const EMAIL: &str = "http://axschema.org/contact/email";
    pub const NAME: &str = "http://axschema.org/namePerson";
    pub const FIRST_NAME: &str = "http://axschema.org/namePerson/first";
    pub const LAST_NAME: &str = "http://axschema.org/namePerson/last";

    pub const LEGACY_EMAIL: &str = "http://schema.openid.net/contact/email";
    pub const LEGACY_NAME: &str = "http://schema.openid.net/namePerson";
    pub const LEGACY_FIRST_NAME: &str = "http://schema.openid.net/namePerson/first";
    pub const LEGACY_LAST_NAME: &str = "http://schema.openid.net/namePerson/last";
}

/// The kind of an identity claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    /// The verified claimed identifier
    NameIdentifier,
    /// Display / full name
    Name,
    /// First name
    GivenName,
    /// Last name
    Surname,
    /// Email address
    Email,
    /// Provider-specific claim, keyed by its wire name
    Other(SmolStr),
}

/// A single identity claim. Claims form a flat, append-only set per
/// authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub kind: ClaimKind,
    pub value: String,
    /// The authentication scheme that issued this claim.
    pub issuer: SmolStr,
}

impl Claim {
    pub fn new(kind: ClaimKind, value: impl Into<String>, issuer: SmolStr) -> Self {
        Self {
            kind,
            value: value.into(),
            issuer,
        }
    }
}

/// An assertion that passed namespace/mode checks and the provider
/// round-trip. The sole input claims may be derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    /// The verified `openid.claimed_id` value.
    pub claimed_identifier: String,
    /// Attribute exchange attributes, as type URI → value.
    pub attributes: BTreeMap<String, String>,
}

/// Synthesize the claim set for a verified assertion.
///
/// Always yields a `NameIdentifier` claim. Well-known AX attributes map
/// to their typed claims, and when the assertion carried first and last
/// names but no full name, one is joined from the two as a convenience.
pub fn synthesize(assertion: &VerifiedAssertion, issuer: &SmolStr) -> Vec<Claim> {
    let mut claims = vec![Claim::new(
        ClaimKind::NameIdentifier,
        assertion.claimed_identifier.clone(),
        issuer.clone(),
    )];

    for (attribute_type, value) in &assertion.attributes {
        let kind = match attribute_type.as_str() {
            attribute_types::EMAIL | attribute_types::LEGACY_EMAIL => ClaimKind::Email,
            attribute_types::NAME | attribute_types::LEGACY_NAME => ClaimKind::Name,
            attribute_types::FIRST_NAME | attribute_types::LEGACY_FIRST_NAME => {
                ClaimKind::GivenName
            }
            attribute_types::LAST_NAME | attribute_types::LEGACY_LAST_NAME => ClaimKind::Surname,
            _ => continue,
        };
        claims.push(Claim::new(kind, value.clone(), issuer.clone()));
    }

    if !has_kind(&claims, &ClaimKind::Name) {
        let given = find_value(&claims, &ClaimKind::GivenName);
        let surname = find_value(&claims, &ClaimKind::Surname);
        if let (Some(given), Some(surname)) = (given, surname) {
            let full = format!("{given} {surname}");
            claims.push(Claim::new(ClaimKind::Name, full, issuer.clone()));
        }
    }

    claims
}

pub(crate) fn has_kind(claims: &[Claim], kind: &ClaimKind) -> bool {
    claims.iter().any(|claim| claim.kind == *kind)
}

fn find_value<'c>(claims: &'c [Claim], kind: &ClaimKind) -> Option<&'c str> {
    claims
        .iter()
        .find(|claim| claim.kind == *kind)
        .map(|claim| claim.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(attributes: &[(&str, &str)]) -> VerifiedAssertion {
        VerifiedAssertion {
            claimed_identifier: String::from("https://provider.example/id/42"),
            attributes: attributes
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }

    fn issuer() -> SmolStr {
        SmolStr::new_static("openid")
    }

    #[test]
    fn name_identifier_is_always_present() {
        let claims = synthesize(&assertion(&[]), &issuer());
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimKind::NameIdentifier);
        assert_eq!(claims[0].value, "https://provider.example/id/42");
    }

    #[test]
    fn well_known_attributes_become_typed_claims() {
        let claims = synthesize(
            &assertion(&[
                (attribute_types::EMAIL, "john@john-smith.local"),
                (attribute_types::NAME, "John Smith"),
                ("http://axschema.org/pref/language", "en"),
            ]),
            &issuer(),
        );

        assert!(claims.contains(&Claim::new(
            ClaimKind::Email,
            "john@john-smith.local",
            issuer()
        )));
        assert!(claims.contains(&Claim::new(ClaimKind::Name, "John Smith", issuer())));
        // Unknown attribute types yield no claim.
        assert_eq!(claims.len(), 3);
    }

    #[test]
    fn legacy_schema_uris_are_recognized() {
        let claims = synthesize(
            &assertion(&[(attribute_types::LEGACY_EMAIL, "john@john-smith.local")]),
            &issuer(),
        );
        assert!(has_kind(&claims, &ClaimKind::Email));
    }

    #[test]
    fn full_name_is_joined_from_parts() {
        let claims = synthesize(
            &assertion(&[
                (attribute_types::FIRST_NAME, "John"),
                (attribute_types::LAST_NAME, "Smith"),
            ]),
            &issuer(),
        );
        assert!(claims.contains(&Claim::new(ClaimKind::Name, "John Smith", issuer())));
    }

    #[test]
    fn join_does_not_run_when_a_name_exists() {
        let claims = synthesize(
            &assertion(&[
                (attribute_types::NAME, "Johnny"),
                (attribute_types::FIRST_NAME, "John"),
                (attribute_types::LAST_NAME, "Smith"),
            ]),
            &issuer(),
        );
        let names: Vec<_> = claims
            .iter()
            .filter(|claim| claim.kind == ClaimKind::Name)
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].value, "Johnny");
    }

    #[test]
    fn join_does_not_run_without_both_parts() {
        let claims = synthesize(
            &assertion(&[(attribute_types::FIRST_NAME, "John")]),
            &issuer(),
        );
        assert!(!has_kind(&claims, &ClaimKind::Name));
    }
}
