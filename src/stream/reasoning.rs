//! Separation of reasoning text from answer text, per model capability.

use regex::Regex;

use crate::models::{ModelCapability, ReasoningChannel};

/// Answer text and reasoning split out of the accumulated stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedContent {
    pub content: String,
    /// `None` when no reasoning was found; never `Some("")`.
    pub reasoning: Option<String>,
}

/// Strategy resolved once per message from the model's capability.
#[derive(Debug, Clone)]
pub enum ReasoningExtractor {
    /// Everything is answer text.
    Plain,
    /// Reasoning is interleaved in the answer between `open` and `close` tags.
    Delimited {
        open: String,
        close: String,
        block: Regex,
    },
    /// Reasoning arrives on its own stream channel.
    Structured,
}

impl ReasoningExtractor {
    pub fn for_capability(capability: &ModelCapability) -> Self {
        if !capability.supports_reasoning {
            return ReasoningExtractor::Plain;
        }
        match &capability.reasoning_channel {
            ReasoningChannel::None => ReasoningExtractor::Plain,
            ReasoningChannel::Structured => ReasoningExtractor::Structured,
            ReasoningChannel::Delimited { tag } => Self::delimited(tag),
        }
    }

    /// Extractor for `<tag>...</tag>` blocks.
    pub fn delimited(tag: &str) -> Self {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        let pattern = format!("(?s){}(.*?){}", regex::escape(&open), regex::escape(&close));
        match Regex::new(&pattern) {
            Ok(block) => ReasoningExtractor::Delimited { open, close, block },
            Err(err) => {
                tracing::warn!(tag, error = %err, "invalid reasoning tag, treating as plain");
                ReasoningExtractor::Plain
            }
        }
    }

    /// Split the accumulated stream while it is still arriving.
    ///
    /// `raw` is the accumulated answer channel, `structured` the accumulated
    /// reasoning channel (empty for models without one). A trailing prefix of
    /// an opening tag is withheld until the next chunk decides it.
    pub fn extract(&self, raw: &str, structured: &str) -> ExtractedContent {
        self.split(raw, structured, true)
    }

    /// Split the complete stream. Nothing is withheld.
    pub fn extract_final(&self, raw: &str, structured: &str) -> ExtractedContent {
        self.split(raw, structured, false)
    }

    fn split(&self, raw: &str, structured: &str, streaming: bool) -> ExtractedContent {
        match self {
            ReasoningExtractor::Plain => ExtractedContent {
                content: raw.to_string(),
                reasoning: None,
            },
            ReasoningExtractor::Structured => ExtractedContent {
                content: raw.to_string(),
                reasoning: non_empty(structured.to_string()),
            },
            ReasoningExtractor::Delimited { open, close, block } => {
                extract_delimited(raw, open, close, block, streaming)
            }
        }
    }
}

fn extract_delimited(
    raw: &str,
    open: &str,
    close: &str,
    block: &Regex,
    streaming: bool,
) -> ExtractedContent {
    let mut reasoning_parts: Vec<&str> = Vec::new();
    let mut content = String::with_capacity(raw.len());
    let mut cursor = 0;

    for captures in block.captures_iter(raw) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        content.push_str(&raw[cursor..whole.start()]);
        reasoning_parts.push(inner.as_str().trim());
        cursor = whole.end();
    }

    let mut rest = &raw[cursor..];
    if let Some(start) = rest.find(open) {
        // Unclosed block: everything after the tag is reasoning still streaming.
        content.push_str(&rest[..start]);
        reasoning_parts.push(rest[start + open.len()..].trim());
        rest = "";
    } else if let Some(partial) = partial_tag_suffix(rest, open)
        .max(partial_tag_suffix(rest, close))
        .filter(|_| streaming)
    {
        // Withhold a tag prefix split across chunks, e.g. "<thi" or "</thi".
        rest = &rest[..rest.len() - partial];
    }
    content.push_str(rest);
    if content.contains(close) {
        content = content.replace(close, "");
    }

    let reasoning = non_empty(
        reasoning_parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    // Trimmed from the first chunk on, whether or not a block has shown up
    // yet, so the answer only ever grows by appending.
    let content = content.trim_start().to_string();
    ExtractedContent { content, reasoning }
}

/// Length of the longest proper prefix of `tag` that `text` ends with.
fn partial_tag_suffix(text: &str, tag: &str) -> Option<usize> {
    (1..tag.len())
        .rev()
        .find(|&len| tag.is_char_boundary(len) && text.ends_with(&tag[..len]))
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
