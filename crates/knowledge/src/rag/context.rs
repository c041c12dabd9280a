//! Citation-tagged context assembly.

use super::types::CitedTopic;
use crate::types::RankedTopic;

/// Excerpt limits below this value are raised to it.
pub const MIN_EXCERPT_CHARS: usize = 200;

/// Shown in place of missing or blank content.
pub const CONTENT_UNAVAILABLE: &str = "Content unavailable.";

/// Shown in place of a missing title.
pub const UNTITLED: &str = "Untitled";

const ELLIPSIS: char = '…';

/// Shorten `content` to at most `limit` characters (plus an ellipsis).
///
/// The text is trimmed first. Long text is cut at `limit`, then backed off
/// to the last whitespace so no word is split; a single word longer than
/// the limit is cut where it stands. `limit` is at least
/// [`MIN_EXCERPT_CHARS`].
pub fn excerpt(content: Option<&str>, limit: usize) -> String {
    let text = content.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return CONTENT_UNAVAILABLE.to_string();
    }

    let limit = limit.max(MIN_EXCERPT_CHARS);
    let Some((cut, _)) = text.char_indices().nth(limit) else {
        return text.to_string();
    };

    let (head, rest) = text.split_at(cut);
    let kept = if rest.starts_with(char::is_whitespace) {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(pos) => &head[..pos],
            None => head,
        }
    };

    let mut out = kept.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}

/// Turns ranked topics into cited excerpts and a prompt context.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    char_limit: usize,
}

impl ContextBuilder {
    pub fn new(char_limit: usize) -> Self {
        Self {
            char_limit: char_limit.max(MIN_EXCERPT_CHARS),
        }
    }

    pub fn char_limit(&self) -> usize {
        self.char_limit
    }

    /// Excerpt every topic, keeping rank order.
    pub fn cite(&self, ranked: &[RankedTopic]) -> Vec<CitedTopic> {
        ranked
            .iter()
            .map(|item| CitedTopic {
                rank: item.rank,
                topic_id: item.topic.id,
                title: item.topic.title.clone(),
                url: item.topic.url.clone(),
                excerpt: excerpt(item.topic.content.as_deref(), self.char_limit),
                similarity: item.similarity,
            })
            .collect()
    }

    /// Format cited topics as blank-line separated `[DocN]` blocks.
    ///
    /// An empty list gives an empty string.
    pub fn build(&self, cited: &[CitedTopic]) -> String {
        cited
            .iter()
            .map(format_block)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn format_block(doc: &CitedTopic) -> String {
    let title = doc
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);

    let mut block = format!("{} {}", doc.tag(), title);
    if !doc.url.trim().is_empty() {
        block.push_str(&format!("\nURL: {}", doc.url));
    }
    block.push_str(&format!("\nExcerpt: {}", doc.excerpt));
    block
}
