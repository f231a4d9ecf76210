//! Touch-icon selection from the page's `<link>` elements.

use serde::{Deserialize, Serialize};

use crate::environment::Os;

/// One `<link rel=... sizes=... href=...>` from the document head.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconLink {
    pub rel: String,
    #[serde(default)]
    pub sizes: Option<String>,
    pub href: String,
}

impl IconLink {
    pub fn new(rel: &str, sizes: Option<&str>, href: &str) -> Self {
        Self {
            rel: rel.to_string(),
            sizes: sizes.map(str::to_string),
            href: href.to_string(),
        }
    }

    /// `rel` begins with `prefix`, as `[rel^=...]` matches.
    fn rel_starts_with(&self, prefix: &str) -> bool {
        self.rel.starts_with(prefix)
    }

    fn has_size(&self, sizes: &str) -> bool {
        self.sizes.as_deref() == Some(sizes)
    }
}

const IOS_SIZES: [&str; 4] = ["152x152", "144x144", "120x120", "114x114"];

/// Highest-resolution icon declared for `os`.
///
/// iOS prefers sized `apple-touch-icon`s, largest first, then any
/// `apple-touch-icon`. Everything else prefers a 196px `shortcut icon`.
pub fn best_icon(links: &[IconLink], os: Os) -> Option<&IconLink> {
    let touch = |l: &&IconLink| l.rel_starts_with("apple-touch-icon");

    let preferred = match os {
        Os::Ios => IOS_SIZES
            .iter()
            .find_map(|size| links.iter().filter(touch).find(|l| l.has_size(size))),
        _ => links
            .iter()
            .find(|l| l.rel_starts_with("shortcut icon") && l.has_size("196x196")),
    };

    preferred.or_else(|| links.iter().find(touch))
}
