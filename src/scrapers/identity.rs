use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static ROOM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/rooms/(\d+)(?:[/?#]|$)").expect("valid room id regex"));

/// Derive the stable listing identifier from a listing URL.
///
/// Only the numeric path segment after `/rooms/` counts; host, scheme and
/// query string are ignored, so relative and absolute links to the same
/// listing resolve to the same id.
pub fn listing_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    ROOM_ID_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turn a card href into an absolute URL on the marketplace origin.
///
/// Returns `None` when the href cannot be joined against the base.
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}
