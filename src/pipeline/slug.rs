use chrono::{DateTime, Utc};

pub const MAX_SLUG_LEN: usize = 60;
const MAX_SUFFIX: u32 = 100;
const EMPTY_SLUG: &str = "untitled";
// Digits in a millisecond timestamp, the longest suffix ever appended.
const TIMESTAMP_DIGITS: usize = 13;

/// Lowercase ASCII slug: alphanumerics kept, spaces and hyphens become single
/// hyphens, everything else dropped, at most 60 characters.
pub fn base_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = truncate(&slug, MAX_SLUG_LEN);
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// First free slug among `base`, `base-2` .. `base-99`, then a
/// timestamp-suffixed slug once that range is exhausted.
pub fn allocate_slug(title: &str, is_taken: impl Fn(&str) -> bool, now: DateTime<Utc>) -> String {
    let base = base_slug(title);
    if !is_taken(&base) {
        return base;
    }

    (2..MAX_SUFFIX)
        .map(|n| with_suffix(&base, &n.to_string()))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| with_suffix(&base, &now.timestamp_millis().to_string()))
}

/// A prefix shared by every slug `allocate_slug` can produce for `base`,
/// for loading the occupied candidates in one query.
pub fn probe_prefix(base: &str) -> &str {
    &base[..base.len().min(MAX_SLUG_LEN - 1 - TIMESTAMP_DIGITS)]
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len() + 1);
    format!("{}-{}", truncate(base, room), suffix)
}

// Slugs are ASCII, so byte truncation is char-safe.
fn truncate(slug: &str, max: usize) -> String {
    slug[..slug.len().min(max)].trim_matches('-').to_string()
}
