use regex::Regex;
use std::sync::LazyLock;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>(.*?)</think>").expect("THINK_BLOCK_RE"));

/// Output of [`extract_think`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkExtraction {
    /// Input with every `<think>...</think>` span removed.
    pub cleaned: String,
    /// Non-empty block contents in document order, separated by a blank line.
    pub think_text: String,
}

/// Returns true if the model name indicates a reasoning ("thinking") model.
pub fn is_thinking_model(model: &str) -> bool {
    model.to_lowercase().contains("think")
}

/// Remove all `<think>` blocks from `html` and collect their trimmed contents.
///
/// Matching is case-insensitive, non-greedy and spans newlines. Nested tags
/// are not unwound: the first closing tag ends the block.
pub fn extract_think(html: &str) -> ThinkExtraction {
    let mut segments = Vec::new();

    let cleaned = THINK_BLOCK_RE.replace_all(html, |caps: &regex::Captures| {
        let inner = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !inner.is_empty() {
            segments.push(inner.to_string());
        }
        ""
    });

    ThinkExtraction {
        cleaned: cleaned.into_owned(),
        think_text: segments.join("\n\n"),
    }
}
