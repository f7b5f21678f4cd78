//! Document input model and the on-disk `URL\nRAW_HTTP_RESPONSE` file format.
//!
//! Grounded on `util.cc::MakeDocFromFile` and `base/webutil.cc::SkipHttpHeaders`
//! from the original source (see SPEC_FULL.md §4.8).

/// The content type of a [`Document`], matching §6 of the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Unknown,
    Html,
    Xml,
}

/// A document to be parsed: a URL, its body, and a declared content type.
///
/// `url` and `content` are borrowed views; the caller's storage must outlive
/// the `Document`, matching the "borrowed views" lifecycle note in §6.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    pub url: &'a str,
    pub content: &'a str,
    pub content_type: ContentType,
}

impl<'a> Document<'a> {
    pub fn new(url: &'a str, content: &'a str, content_type: ContentType) -> Self {
        Document { url, content, content_type }
    }
}

/// Strip HTTP headers from a raw HTTP response by scanning for the first
/// blank-line separator. Falls back to the whole input if no separator is
/// found (the input is assumed to already be a bare body).
pub fn strip_http_headers(raw: &str) -> &str {
    if let Some(idx) = raw.find("\r\n\r\n") {
        &raw[idx + 4..]
    } else if let Some(idx) = raw.find("\n\n") {
        &raw[idx + 2..]
    } else {
        raw
    }
}

/// Split the on-disk `URL\nRAW_HTTP_RESPONSE` format into its URL and body,
/// with headers already stripped from the body.
pub fn split_url_and_body(raw: &str) -> (&str, &str) {
    match raw.find('\n') {
        Some(idx) => {
            let url = raw[..idx].trim_end_matches('\r');
            (url, strip_http_headers(&raw[idx + 1..]))
        }
        None => (raw, ""),
    }
}
