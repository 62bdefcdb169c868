use pretty_assertions::assert_eq;
use repochat::search::snippet::{CONTEXT_CHARS, PREVIEW_CHARS};
use repochat::search::{extract_snippet, native_hit_snippet};

#[test]
fn test_window_around_match_in_long_line() {
    let mut content = "x".repeat(120);
    content.replace_range(60..66, "NEEDLE");

    let snippet = extract_snippet(&content, "NEEDLE").expect("match expected");
    assert_eq!(
        snippet,
        format!("...{}NEEDLE{}...", "x".repeat(50), "x".repeat(50))
    );
}

#[test]
fn test_markers_only_where_clamped() {
    let filler = "abcdefghij";
    for before in [0usize, 10, 49, 50, 51, 120] {
        for after in [0usize, 10, 50, 51, 90] {
            let content = format!(
                "{}HIT{}",
                filler.repeat(12).chars().take(before).collect::<String>(),
                filler.repeat(12).chars().take(after).collect::<String>()
            );
            let snippet = extract_snippet(&content, "HIT").unwrap();

            assert_eq!(
                snippet.starts_with("..."),
                before > CONTEXT_CHARS,
                "leading marker for before={} after={}",
                before,
                after
            );
            assert_eq!(
                snippet.ends_with("..."),
                after > CONTEXT_CHARS,
                "trailing marker for before={} after={}",
                before,
                after
            );
            let body = snippet.trim_start_matches("...").trim_end_matches("...");
            assert!(body.chars().count() <= CONTEXT_CHARS * 2 + 3);
            assert!(body.contains("HIT"));
        }
    }
}

#[test]
fn test_first_occurrence_wins() {
    let content = format!("one TODO{}two TODO", " ".repeat(200));
    let snippet = extract_snippet(&content, "TODO").unwrap();
    assert!(snippet.starts_with("one TODO"));
    assert!(snippet.ends_with("..."));
}

#[test]
fn test_no_match_is_none() {
    assert_eq!(extract_snippet("fn main() {}", "missing"), None);
    assert_eq!(extract_snippet("", "x"), None);
}

#[test]
fn test_native_hit_preview_length() {
    let content = "z".repeat(PREVIEW_CHARS + 1);
    let snippet = native_hit_snippet(&content, "not there");
    assert_eq!(snippet.chars().count(), PREVIEW_CHARS + 3);
    assert!(snippet.ends_with("..."));

    let exact = "z".repeat(PREVIEW_CHARS);
    assert_eq!(native_hit_snippet(&exact, "not there"), exact);
}

#[test]
fn test_native_hit_prefers_exact_match() {
    let content = format!("todo first{}TODO later", "-".repeat(100));
    let snippet = native_hit_snippet(&content, "TODO");
    assert!(snippet.ends_with("TODO later"));
    assert!(snippet.starts_with("..."));
}
