//! Naive base-relative URL joining.
//!
//! This is a direct port of the original `URL(base_url, url)` constructor,
//! which the upstream source itself documents as simplistic and sometimes
//! wrong (see SPEC_FULL.md §9, open question i). It is deliberately kept
//! exactly as specified rather than upgraded to RFC 3986 resolution.

/// Resolve `url` against `base_url` using the three-case rule:
///
/// - `url` contains a `/` at an index other than 0 → treated as absolute,
///   replacing the base entirely.
/// - `url` starts with `/` → replaces the base's path from its last `/`
///   (i.e. `base[..base.rfind('/')] + url`), not merely its scheme and host.
/// - otherwise → appended after the base's last `/`.
///
/// The underlying C++ `URL::is_valid()` always returns true in the
/// reference implementation, so this never actually fails; it still
/// returns `Option` to preserve the "implementation may declare failure"
/// latitude called out in §4.1.
pub fn absolutize(base_url: &str, url: &str) -> Option<String> {
    match url.find('/') {
        Some(idx) if idx != 0 => Some(url.to_string()),
        Some(_) => match base_url.rfind('/') {
            // url starts with '/': truncate the base at its last `/` (not
            // including it) and append url, which supplies its own leading
            // slash — mirrors `URL::URL`'s `base.substr(0, last_slash_idx)`.
            Some(last_slash) => Some(format!("{}{}", &base_url[..last_slash], url)),
            None => Some(url.to_string()),
        },
        None => match base_url.rfind('/') {
            Some(last_slash) => Some(format!("{}{}", &base_url[..last_slash + 1], url)),
            None => Some(url.to_string()),
        },
    }
}

/// `QueryDef.query` ends with `/@href` or `/@src` is the signal that its
/// results should be absolutized before any other post-processing op runs.
pub fn query_returns_urls(xpath: &str) -> bool {
    xpath.ends_with("/@href") || xpath.ends_with("/@src")
}

/// True when `xpath`'s final step is an attribute axis (`/@name`). A scalar
/// result from such an expression is always attribute text, never a genuine
/// XPath boolean/number — those only arise from `count()`, comparisons and
/// the like, which take a different shape.
pub fn ends_with_attribute_step(xpath: &str) -> bool {
    xpath.rsplit('/').next().is_some_and(|segment| segment.starts_with('@'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_after_last_slash_when_relative() {
        assert_eq!(
            absolutize("http://x/p/", "a.png").as_deref(),
            Some("http://x/p/a.png")
        );
    }

    #[test]
    fn replaces_path_when_absolute_path() {
        assert_eq!(
            absolutize("http://x/p/q", "/img/a.png").as_deref(),
            Some("http://x/p/img/a.png")
        );
    }

    #[test]
    fn replaces_path_from_last_slash_keeping_sibling_directories() {
        assert_eq!(
            absolutize("http://x/dir/index.html", "/bios/alice.html").as_deref(),
            Some("http://x/dir/bios/alice.html")
        );
    }

    #[test]
    fn treated_as_absolute_when_slash_not_at_start() {
        assert_eq!(
            absolutize("http://x/p/", "http://y/z").as_deref(),
            Some("http://y/z")
        );
    }

    #[test]
    fn query_returns_urls_detects_href_and_src() {
        assert!(query_returns_urls("//img/@src"));
        assert!(query_returns_urls("//a/@href"));
        assert!(!query_returns_urls("//title"));
    }

    #[test]
    fn ends_with_attribute_step_detects_trailing_attribute_axis() {
        assert!(ends_with_attribute_step("//a/@href"));
        assert!(ends_with_attribute_step("//x/@data"));
        assert!(!ends_with_attribute_step("//title"));
        assert!(!ends_with_attribute_step("count(//a) > 0"));
    }
}
