//! Topic link rewriting.
//!
//! Generated pages link to related topics with arbitrary hrefs. Every anchor
//! is pointed at `#` instead and its visible text is copied into a
//! `data-topic` attribute, which the front-end turns into a new search.
//! This is regex matching over generated output, not an HTML parser.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder href written into rewritten anchors.
pub const TOPIC_HREF: &str = "#";

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href=["']?([^"'>\s]+)["']?>([^<]+)</a>"#).expect("ANCHOR_RE")
});

/// Rewrite every `<a href="...">text</a>` in `html` into a topic link.
///
/// Anchors whose visible text is blank are left as they are.
pub fn rewrite_links(html: &str) -> String {
    ANCHOR_RE
        .replace_all(html, |caps: &regex::Captures| {
            match caps.get(2).map(|m| m.as_str()) {
                Some(topic) if !topic.trim().is_empty() => topic_anchor(topic),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn topic_anchor(topic: &str) -> String {
    format!(
        r#"<a href="{}" data-topic="{}">{}</a>"#,
        TOPIC_HREF,
        topic.replace('"', "&quot;"),
        topic
    )
}
