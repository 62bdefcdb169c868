//! Snippet extraction around a search match.
//!
//! Positions and window sizes count characters, not bytes, so multi-byte content
//! never gets split inside a code point.

/// Characters kept on each side of a match.
pub const CONTEXT_CHARS: usize = 50;

/// Length of the preview used when a native search hit has no locatable match.
pub const PREVIEW_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Window around the first case-sensitive occurrence of `query`.
///
/// Returns `None` when the query does not occur. `...` is added on a side only when
/// the window was clamped there.
pub fn extract_snippet(content: &str, query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }
    let byte_pos = content.find(query)?;
    Some(window_at(content, byte_pos, query))
}

/// Snippet for hits coming back from a provider's own search index.
///
/// Tries an exact match first, then an ASCII case-insensitive one, and falls back
/// to the head of the file when the indexed hit cannot be located in the content.
/// The fallback walk only ever uses [`extract_snippet`].
pub fn native_hit_snippet(content: &str, query: &str) -> String {
    if let Some(snippet) = extract_snippet(content, query) {
        return snippet;
    }

    if !query.is_empty() {
        // ASCII lowering keeps byte offsets aligned with `content`
        let lowered = content.to_ascii_lowercase();
        if let Some(byte_pos) = lowered.find(&query.to_ascii_lowercase()) {
            return window_at(content, byte_pos, query);
        }
    }

    preview(content)
}

/// First [`PREVIEW_CHARS`] characters, with a trailing marker when cut.
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ELLIPSIS),
        None => content.to_string(),
    }
}

fn window_at(content: &str, byte_pos: usize, query: &str) -> String {
    let match_start = content[..byte_pos].chars().count();
    let match_len = query.chars().count();
    let total = content.chars().count();

    let start = match_start.saturating_sub(CONTEXT_CHARS);
    let end = (match_start + match_len + CONTEXT_CHARS).min(total);

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.extend(content.chars().skip(start).take(end - start));
    if end < total {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}
