//! Track Link Extraction
//!
//! Turns free-form chat text into a deduplicated, ordered list of track
//! link surface forms. Three recognizers run in priority order: the web
//! link form, the URI form, and bare 22-character track IDs. A normalized-id
//! set suppresses duplicates across all three passes so a track mentioned as
//! both a link and a bare ID is only tokenized once.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Web link form, with optional scheme and optional locale path segment.
/// Captures exactly the 22-character identifier so trailing query strings
/// and punctuation never leak into the ID.
static TRACK_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:https?://)?(?:open\.)?spotify\.com/(?:intl-[a-z]{2}(?:-[a-z]{2})?/)?track/([A-Za-z0-9]{22})",
    )
    .unwrap()
});

/// URI scheme form.
static TRACK_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"spotify:track:([A-Za-z0-9]{22})").unwrap());

/// Bare 22-character alphanumeric token. Word boundaries keep a valid ID
/// embedded in a longer alphanumeric run from matching.
static BARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9]{22}\b").unwrap());

/// Exact-match form used when normalizing a single candidate string.
static EXACT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{22}$").unwrap());

/// Extract track link surface forms from a message.
///
/// Each returned string maps to a unique normalized identifier; for a track
/// that appears in several forms, the first matched surface form wins.
/// Output preserves first-seen order within each recognizer pass.
pub fn extract_track_links(text: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();

    for caps in TRACK_URL_RE.captures_iter(text) {
        let id = &caps[1];
        if seen.insert(id.to_string()) {
            links.push(caps[0].to_string());
        }
    }

    for caps in TRACK_URI_RE.captures_iter(text) {
        let id = &caps[1];
        if seen.insert(id.to_string()) {
            links.push(caps[0].to_string());
        }
    }

    for m in BARE_ID_RE.find_iter(text) {
        if preceded_by_track_scheme(text, m.start()) {
            continue;
        }
        let id = m.as_str();
        if seen.insert(id.to_string()) {
            links.push(id.to_string());
        }
    }

    links
}

/// Normalize any surface form (bare ID, web link, URI) to the underlying
/// 22-character track identifier.
pub fn parse_track_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("spotify:track:") {
        return EXACT_ID_RE.is_match(rest).then(|| rest.to_string());
    }

    if let Some(caps) = TRACK_URL_RE.captures(trimmed) {
        return Some(caps[1].to_string());
    }

    EXACT_ID_RE.is_match(trimmed).then(|| trimmed.to_string())
}

/// True when the bare token starting at `start` sits directly behind one of
/// the two scheme prefixes, meaning a link recognizer already owns it (or it
/// belongs to a path on some other domain and must not be treated as an ID).
fn preceded_by_track_scheme(text: &str, start: usize) -> bool {
    let window = &text[..start];
    let tail_start = window
        .char_indices()
        .rev()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = window[tail_start..].to_lowercase();
    tail.ends_with("track/") || tail.ends_with("track:")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "4gMgiXfqyzZLMhsksGmbQV";

    #[test]
    fn test_extracts_web_link() {
        let text = format!("check this out https://open.spotify.com/track/{}", ID);
        let links = extract_track_links(&text);
        assert_eq!(links, vec![format!("https://open.spotify.com/track/{}", ID)]);
        assert_eq!(parse_track_id(&links[0]).as_deref(), Some(ID));
    }

    #[test]
    fn test_extracts_intl_link_and_trims_query() {
        let text = format!(
            "https://open.spotify.com/intl-de/track/{}?si=abc123, nice song",
            ID
        );
        let links = extract_track_links(&text);
        assert_eq!(links.len(), 1);
        assert_eq!(parse_track_id(&links[0]).as_deref(), Some(ID));
    }

    #[test]
    fn test_extracts_uri_form() {
        let text = format!("spotify:track:{}", ID);
        let links = extract_track_links(&text);
        assert_eq!(links, vec![text.clone()]);
        assert_eq!(parse_track_id(&text).as_deref(), Some(ID));
    }

    #[test]
    fn test_link_and_bare_id_count_once() {
        let text = format!(
            "https://open.spotify.com/track/{} and again bare: {}",
            ID, ID
        );
        let links = extract_track_links(&text);
        assert_eq!(links.len(), 1);
        assert!(links[0].starts_with("https://"));
    }

    #[test]
    fn test_bare_id_inside_longer_run_does_not_match() {
        // 23 alphanumeric characters containing a valid 22-char ID.
        let text = format!("{}X", ID);
        assert!(extract_track_links(&text).is_empty());
        let text = format!("X{}", ID);
        assert!(extract_track_links(&text).is_empty());
    }

    #[test]
    fn test_foreign_domain_track_path_is_not_a_bare_id() {
        let text = format!("https://example.com/track/{}", ID);
        assert!(extract_track_links(&text).is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = format!(
            "a {} b spotify:track:{} c https://open.spotify.com/track/{}",
            ID, ID, ID
        );
        let first = extract_track_links(&text);
        let rejoined = first.join(" ");
        let second = extract_track_links(&rejoined);
        let normalize = |links: &[String]| -> Vec<String> {
            links.iter().filter_map(|l| parse_track_id(l)).collect()
        };
        assert_eq!(normalize(&first), normalize(&second));
        assert_eq!(extract_track_links(&text), first);
    }

    #[test]
    fn test_distinct_ids_preserve_order() {
        let other = "7ouMYWpwJ422jRcDASZB7P";
        let text = format!(
            "https://open.spotify.com/track/{} then https://open.spotify.com/track/{}",
            ID, other
        );
        let links = extract_track_links(&text);
        assert_eq!(links.len(), 2);
        assert_eq!(parse_track_id(&links[0]).as_deref(), Some(ID));
        assert_eq!(parse_track_id(&links[1]).as_deref(), Some(other));
    }

    #[test]
    fn test_parse_track_id_rejects_junk() {
        assert_eq!(parse_track_id(""), None);
        assert_eq!(parse_track_id("spotify:track:tooshort"), None);
        assert_eq!(parse_track_id("https://example.com/other"), None);
        assert_eq!(parse_track_id("hello world"), None);
    }
}
