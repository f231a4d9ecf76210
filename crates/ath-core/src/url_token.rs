//! The "returned from homescreen" URL marker.
//!
//! Three encodings exist: `#ath`, a trailing `/ath` path segment, and an
//! empty `ath=` query parameter. Any one of them counts as a token. Removal
//! always tries all three so a marker left by an earlier configuration is
//! still cleaned up. All functions here are pure string transforms; the
//! caller applies the result through history replacement.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SMART_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/ath(/)?$").unwrap());
static SMART_URL_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(/)?$").unwrap());
static QUERY_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?&]ath=[^&]*$|&ath=[^&]*(&))").unwrap());

const HASH_TOKEN: &str = "#ath";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenMode {
    #[serde(rename = "hash")]
    Hash,
    #[serde(rename = "queryString")]
    QueryString,
    #[serde(rename = "smartURL")]
    SmartUrl,
}

impl TokenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenMode::Hash => "hash",
            TokenMode::QueryString => "queryString",
            TokenMode::SmartUrl => "smartURL",
        }
    }
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An href split into `base` (scheme, host, path), `search` and `hash`.
/// `search` keeps its leading `?` and `hash` its leading `#`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Location {
    base: String,
    search: String,
    hash: String,
}

impl Location {
    fn parse(href: &str) -> Self {
        let (rest, hash) = match href.find('#') {
            Some(i) => (&href[..i], &href[i..]),
            None => (href, ""),
        };
        let (base, search) = match rest.find('?') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        Self {
            base: base.to_string(),
            search: search.to_string(),
            hash: hash.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.base, self.search, self.hash)
    }
}

/// True if `href` carries the marker in any of the three encodings.
pub fn has_token(href: &str) -> bool {
    let loc = Location::parse(href);
    loc.hash == HASH_TOKEN || SMART_URL.is_match(&loc.base) || QUERY_STRING.is_match(&loc.search)
}

/// Append the marker for `mode`. Callers add it at most once per navigation.
pub fn add_token(href: &str, mode: TokenMode) -> String {
    let mut loc = Location::parse(href);
    match mode {
        TokenMode::Hash => return format!("{href}{HASH_TOKEN}"),
        TokenMode::SmartUrl => {
            loc.base = SMART_URL_TAIL
                .replace(&loc.base, "/ath$1")
                .into_owned();
        }
        TokenMode::QueryString => {
            let sep = if loc.search.is_empty() { '?' } else { '&' };
            loc.search.push(sep);
            loc.search.push_str("ath=");
        }
    }
    loc.to_string()
}

/// Strip every marker encoding. A token-free href comes back unchanged.
pub fn remove_token(href: &str) -> String {
    let mut loc = Location::parse(href);
    if loc.hash == HASH_TOKEN {
        loc.hash.clear();
    }
    if SMART_URL.is_match(&loc.base) {
        loc.base = SMART_URL.replace(&loc.base, "$1").into_owned();
    }
    if QUERY_STRING.is_match(&loc.search) {
        loc.search = QUERY_STRING.replace(&loc.search, "$2").into_owned();
    }
    loc.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PAGE: &str = "https://example.com/app/index.html";

    #[test]
    fn test_hash_token() {
        let tagged = add_token(PAGE, TokenMode::Hash);
        assert_eq!(tagged, "https://example.com/app/index.html#ath");
        assert!(has_token(&tagged));
        assert_eq!(remove_token(&tagged), PAGE);
    }

    #[test]
    fn test_hash_must_be_exact() {
        assert!(!has_token("https://example.com/#athens"));
        assert_eq!(remove_token("https://example.com/#athens"), "https://example.com/#athens");
    }

    #[test]
    fn test_smart_url_without_trailing_slash() {
        let tagged = add_token("https://example.com/app", TokenMode::SmartUrl);
        assert_eq!(tagged, "https://example.com/app/ath");
        assert!(has_token(&tagged));
        assert_eq!(remove_token(&tagged), "https://example.com/app");
    }

    #[test]
    fn test_smart_url_with_trailing_slash() {
        let tagged = add_token("https://example.com/app/", TokenMode::SmartUrl);
        assert_eq!(tagged, "https://example.com/app/ath/");
        assert!(has_token(&tagged));
        assert_eq!(remove_token(&tagged), "https://example.com/app/");
    }

    #[test]
    fn test_smart_url_keeps_query() {
        let tagged = add_token("https://example.com/app?x=1", TokenMode::SmartUrl);
        assert_eq!(tagged, "https://example.com/app/ath?x=1");
        assert_eq!(remove_token(&tagged), "https://example.com/app?x=1");
    }

    #[test]
    fn test_query_string_fresh() {
        let tagged = add_token(PAGE, TokenMode::QueryString);
        assert_eq!(tagged, "https://example.com/app/index.html?ath=");
        assert!(has_token(&tagged));
        assert_eq!(remove_token(&tagged), PAGE);
    }

    #[test]
    fn test_query_string_appended() {
        let page = "https://example.com/?lang=en";
        let tagged = add_token(page, TokenMode::QueryString);
        assert_eq!(tagged, "https://example.com/?lang=en&ath=");
        assert_eq!(remove_token(&tagged), page);
    }

    #[test]
    fn test_query_string_middle_consumes_separator() {
        let url = "https://example.com/?a=1&ath=&b=2";
        assert!(has_token(url));
        assert_eq!(remove_token(url), "https://example.com/?a=1&b=2");
    }

    #[test]
    fn test_remove_cleans_every_encoding() {
        let url = "https://example.com/app/ath?x=1&ath=#ath";
        assert!(has_token(url));
        assert_eq!(remove_token(url), "https://example.com/app?x=1");
    }

    #[test]
    fn test_no_token() {
        assert!(!has_token(PAGE));
        assert!(!has_token("https://example.com/path?bath=1"));
        assert!(!has_token("https://example.com/athletics"));
    }

    #[test]
    fn test_mode_serde_names() {
        let m: TokenMode = serde_json::from_str(r#""smartURL""#).unwrap();
        assert_eq!(m, TokenMode::SmartUrl);
        let m: TokenMode = serde_json::from_str(r#""queryString""#).unwrap();
        assert_eq!(m, TokenMode::QueryString);
    }

    fn token_free_url() -> impl Strategy<Value = String> {
        (
            "[a-z]{1,10}",
            proptest::collection::vec("[a-z0-9]{1,8}", 0..4),
            proptest::option::of("[a-z]{1,5}=[a-z0-9]{0,5}"),
        )
            .prop_map(|(host, segments, query)| {
                let mut url = format!("https://{host}.test");
                for seg in segments {
                    url.push('/');
                    url.push_str(&seg);
                }
                if let Some(q) = query {
                    url.push('?');
                    url.push_str(&q);
                }
                url
            })
            .prop_filter("must not already carry a marker", |u| !has_token(u))
    }

    proptest! {
        #[test]
        fn prop_remove_is_noop_without_token(url in token_free_url()) {
            prop_assert_eq!(remove_token(&url), url);
        }

        #[test]
        fn prop_add_then_remove_restores(url in token_free_url()) {
            for mode in [TokenMode::Hash, TokenMode::SmartUrl, TokenMode::QueryString] {
                let tagged = add_token(&url, mode);
                prop_assert!(has_token(&tagged));
                prop_assert_eq!(remove_token(&tagged), url.clone());
            }
        }
    }
}
