//! HTML sanitization for user-authored content.
//!
//! Two entry points: `sanitize_rich_text` keeps a small allow-list of
//! formatting tags for post bodies, `sanitize_plain_text` strips all markup
//! for fields that must never contain HTML (excerpts, SEO fields, URLs).
//! The allow-lists live in one place so they can be audited at a glance.

use ammonia::Builder;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Allow-list configuration for rich-text cleaning.
pub struct SanitizePolicy {
    pub tags: &'static [&'static str],
    pub generic_attributes: &'static [&'static str],
    pub tag_attributes: &'static [(&'static str, &'static [&'static str])],
    pub url_schemes: &'static [&'static str],
}

/// The single policy applied to post bodies.
pub const RICH_TEXT_POLICY: SanitizePolicy = SanitizePolicy {
    tags: &[
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "em",
        "figcaption",
        "figure",
        "h2",
        "h3",
        "h4",
        "hr",
        "img",
        "li",
        "ol",
        "p",
        "pre",
        "strong",
        "ul",
    ],
    generic_attributes: &["class"],
    tag_attributes: &[
        ("a", &["href", "title", "rel", "target"]),
        ("img", &["src", "alt", "title", "loading", "width", "height"]),
    ],
    url_schemes: &["http", "https", "mailto"],
};

static RICH_TEXT_CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(RICH_TEXT_POLICY.tags.iter().copied().collect::<HashSet<_>>())
        .generic_attributes(
            RICH_TEXT_POLICY
                .generic_attributes
                .iter()
                .copied()
                .collect::<HashSet<_>>(),
        )
        .tag_attributes(
            RICH_TEXT_POLICY
                .tag_attributes
                .iter()
                .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect::<HashSet<_>>()))
                .collect::<HashMap<_, _>>(),
        )
        .url_schemes(
            RICH_TEXT_POLICY
                .url_schemes
                .iter()
                .copied()
                .collect::<HashSet<_>>(),
        )
        // rel is caller-controlled, so the automatic rel rewriting must be off.
        .link_rel(None);
    builder
});

static PLAIN_TEXT_CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(HashSet::new())
        .generic_attributes(HashSet::new())
        .link_rel(None);
    builder
});

/// Clean a rich-text fragment down to the allow-listed tags, attributes and
/// URL schemes. Disallowed tags are stripped but their text is kept, except
/// script/style whose content is removed entirely.
pub fn sanitize_rich_text(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    RICH_TEXT_CLEANER.clean(value).to_string().trim().to_string()
}

/// Strip all markup, returning trimmed plain text.
pub fn sanitize_plain_text(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    PLAIN_TEXT_CLEANER.clean(value).to_string().trim().to_string()
}
