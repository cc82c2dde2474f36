//! Response normalization: size bounding and payload assembly

use crate::types::{ExtractResponse, ExtractedContent};

/// Cut `text` to its first `max_chars` characters
///
/// A raw cut on Unicode scalar values, with no attempt to respect word
/// boundaries and no ellipsis appended.
pub fn truncate_text(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut text = text;
            text.truncate(byte_idx);
            text
        }
        None => text,
    }
}

/// Build the success payload for `raw_url`
///
/// `raw_url` is the caller-supplied string, never a redirect target.
pub fn assemble(content: ExtractedContent, raw_url: &str, max_chars: usize) -> ExtractResponse {
    ExtractResponse {
        text: truncate_text(content.text, max_chars),
        title: content.title,
        company: content.company,
        url: raw_url.to_string(),
    }
}
