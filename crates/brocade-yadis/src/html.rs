//! HTML/XHTML location-hint extraction.
//!
//! A provider page may point at its XRDS document through
//! `<meta http-equiv="X-XRDS-Location" content="...">`. Real pages are
//! rarely well-formed XML, so the scan runs with relaxed end-tag
//! checking and stops quietly at the first parse error — an unreadable
//! page simply carries no hint.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

const XRDS_LOCATION: &str = "x-xrds-location";

/// Scan an HTML document for the XRDS location hint.
pub(crate) fn xrds_location(document: &str) -> Option<String> {
    let mut reader = Reader::from_str(document);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                let name = e.local_name();
                if std::str::from_utf8(name.as_ref())
                    .unwrap_or("")
                    .eq_ignore_ascii_case("meta")
                {
                    if let Some(content) = meta_content(&e) {
                        return Some(content);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn meta_content(element: &BytesStart<'_>) -> Option<String> {
    let mut http_equiv = None;
    let mut content = None;

    for attr in element.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
        let value = attr.unescape_value().unwrap_or_default();

        if key.eq_ignore_ascii_case("http-equiv") {
            http_equiv = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("content") {
            content = Some(value.to_string());
        }
    }

    if http_equiv?.eq_ignore_ascii_case(XRDS_LOCATION) {
        content
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_meta_hint() {
        let html = r#"<html><head>
            <title>provider</title>
            <meta http-equiv="X-XRDS-Location" content="https://provider.example/xrds"/>
        </head><body/></html>"#;
        assert_eq!(
            xrds_location(html).as_deref(),
            Some("https://provider.example/xrds")
        );
    }

    #[test]
    fn http_equiv_comparison_is_case_insensitive() {
        let html = r#"<html><head>
            <meta HTTP-EQUIV="x-xrds-location" content="https://provider.example/xrds"/>
        </head></html>"#;
        assert_eq!(
            xrds_location(html).as_deref(),
            Some("https://provider.example/xrds")
        );
    }

    #[test]
    fn unrelated_meta_tags_are_skipped() {
        let html = r#"<html><head>
            <meta http-equiv="refresh" content="0; url=https://elsewhere.example"/>
        </head></html>"#;
        assert_eq!(xrds_location(html), None);
    }

    #[test]
    fn missing_hint_yields_none() {
        assert_eq!(xrds_location("<html><head></head><body></body></html>"), None);
    }
}
