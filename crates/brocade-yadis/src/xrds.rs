//! XRDS document parsing.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::resolver::{DiscoveryError, Result, parse_absolute};
use url::Url;

/// Service type identifying an OpenID 2.0 provider endpoint.
const SERVER_SERVICE_TYPE: &str = "http://specs.openid.net/auth/2.0/server";

#[derive(Debug, Default)]
struct Service {
    priority: Option<u64>,
    types: Vec<String>,
    uri: Option<String>,
}

/// Extract the authentication endpoint from an XRDS document.
///
/// Qualifying `<Service>` entries (those declaring the OpenID 2.0 server
/// type) are ordered by ascending `priority`; entries without a numeric
/// priority sort last, and ties keep document order. The first entry's
/// `<URI>` wins and must be absolute.
pub(crate) fn authentication_endpoint(document: &str) -> Result<Url> {
    let services = parse_services(document)?;

    let mut candidates: Vec<(u64, usize, &Service)> = services
        .iter()
        .enumerate()
        .filter(|(_, service)| declares_openid_server(service))
        .map(|(index, service)| (service.priority.unwrap_or(u64::MAX), index, service))
        .collect();
    candidates.sort_by_key(|&(priority, index, _)| (priority, index));

    let Some((_, _, service)) = candidates.first() else {
        return Err(DiscoveryError::MissingEndpoint);
    };

    match service.uri.as_deref() {
        Some(uri) if !uri.is_empty() => parse_absolute(uri),
        _ => Err(DiscoveryError::MissingEndpoint),
    }
}

fn declares_openid_server(service: &Service) -> bool {
    service
        .types
        .iter()
        .any(|declared| declared == SERVER_SERVICE_TYPE)
}

/// Element context inside a `<Service>` subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Type,
    Uri,
}

fn parse_services(document: &str) -> Result<Vec<Service>> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut services = Vec::new();
    let mut current: Option<Service> = None;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match std::str::from_utf8(name.as_ref()).unwrap_or("") {
                    "Service" => {
                        let mut service = Service::default();
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"priority" {
                                let value = attr.unescape_value().unwrap_or_default();
                                service.priority = value.trim().parse().ok();
                            }
                        }
                        current = Some(service);
                    }
                    "Type" if current.is_some() => field = Field::Type,
                    "URI" if current.is_some() => field = Field::Uri,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(service) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default();
                    match field {
                        Field::Type => service.types.push(text.trim().to_owned()),
                        // The XRDS schema allows several URIs per service;
                        // the first one is authoritative.
                        Field::Uri => {
                            if service.uri.is_none() {
                                service.uri = Some(text.trim().to_owned());
                            }
                        }
                        Field::None => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                match std::str::from_utf8(name.as_ref()).unwrap_or("") {
                    "Service" => {
                        if let Some(service) = current.take() {
                            services.push(service);
                        }
                    }
                    "Type" | "URI" => field = Field::None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::InvalidXrds(e.to_string())),
            _ => {}
        }
    }

    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRDS_NS: &str = r#"xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)""#;

    fn document(services: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS {XRDS_NS}><XRD>{services}</XRD></xrds:XRDS>"#
        )
    }

    #[test]
    fn lowest_priority_wins() {
        let doc = document(
            r#"<Service priority="20">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://second.example/login</URI>
               </Service>
               <Service priority="10">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://first.example/login</URI>
               </Service>"#,
        );
        let endpoint = authentication_endpoint(&doc).unwrap();
        assert_eq!(endpoint.as_str(), "https://first.example/login");
    }

    #[test]
    fn missing_priority_sorts_last() {
        let doc = document(
            r#"<Service>
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://unprioritized.example/login</URI>
               </Service>
               <Service priority="99">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://prioritized.example/login</URI>
               </Service>"#,
        );
        let endpoint = authentication_endpoint(&doc).unwrap();
        assert_eq!(endpoint.as_str(), "https://prioritized.example/login");
    }

    #[test]
    fn ties_keep_document_order() {
        let doc = document(
            r#"<Service priority="1">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://a.example/login</URI>
               </Service>
               <Service priority="1">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://b.example/login</URI>
               </Service>"#,
        );
        let endpoint = authentication_endpoint(&doc).unwrap();
        assert_eq!(endpoint.as_str(), "https://a.example/login");
    }

    #[test]
    fn other_service_types_are_ignored() {
        let doc = document(
            r#"<Service priority="1">
                 <Type>http://specs.openid.net/signon/1.0</Type>
                 <URI>https://legacy.example/login</URI>
               </Service>
               <Service priority="2">
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>https://current.example/login</URI>
               </Service>"#,
        );
        let endpoint = authentication_endpoint(&doc).unwrap();
        assert_eq!(endpoint.as_str(), "https://current.example/login");
    }

    #[test]
    fn no_qualifying_service_is_an_error() {
        let doc = document(
            r#"<Service>
                 <Type>http://specs.openid.net/signon/1.0</Type>
                 <URI>https://legacy.example/login</URI>
               </Service>"#,
        );
        let err = authentication_endpoint(&doc).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingEndpoint));
    }

    #[test]
    fn missing_uri_is_an_error() {
        let doc = document(
            r#"<Service>
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
               </Service>"#,
        );
        let err = authentication_endpoint(&doc).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingEndpoint));
    }

    #[test]
    fn relative_uri_is_an_error() {
        let doc = document(
            r#"<Service>
                 <Type>http://specs.openid.net/auth/2.0/server</Type>
                 <URI>/login</URI>
               </Service>"#,
        );
        let err = authentication_endpoint(&doc).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidAddress { .. }));
    }

    #[test]
    fn unparsable_document_is_an_error() {
        let err = authentication_endpoint("<xrds:XRDS><XRD></Service>").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidXrds(_)));
    }
}
