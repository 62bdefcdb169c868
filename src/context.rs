//! Prompt context assembled from fetched repository files.

use crate::models::FileContent;

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 60_000;

const FENCE_CLOSE: &str = "\n```\n\n";
const TRUNCATED: &str = "\n[truncated]";

fn header(file: &FileContent) -> String {
    if file.language.is_empty() {
        format!("File: {}\n```\n", file.path)
    } else {
        format!("File: {} ({})\n```{}\n", file.path, file.language, file.language)
    }
}

/// Render files as fenced blocks, in order, within `max_chars` characters.
///
/// The first file that does not fit is cut and marked `[truncated]`; nothing after
/// it is included.
pub fn build_context(files: &[FileContent], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for file in files {
        let header = header(file);
        let header_len = header.chars().count();
        let body_len = file.content.chars().count();
        let remaining = max_chars.saturating_sub(used);

        let full_len = header_len + body_len + FENCE_CLOSE.len();
        if full_len <= remaining {
            out.push_str(&header);
            out.push_str(&file.content);
            out.push_str(FENCE_CLOSE);
            used += full_len;
            continue;
        }

        let overhead = header_len + TRUNCATED.len() + FENCE_CLOSE.len();
        if remaining > overhead {
            out.push_str(&header);
            out.extend(file.content.chars().take(remaining - overhead));
            out.push_str(TRUNCATED);
            out.push_str(FENCE_CLOSE);
        }
        break;
    }

    out
}
