//! Heading anchor generation with collision tracking.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"(?i)<[!/a-z].*?>").unwrap();
    static ref SLUG_PUNCTUATION: Regex = Regex::new(
        "[\u{2000}-\u{206F}\u{2E00}-\u{2E7F}\\\\'!\"#$%&()*+,./:;<=>?@\\[\\]^`{|}~]"
    )
    .unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s").unwrap();
}

/// Derives unique, URL-safe ids for headings. Each id handed out is
/// remembered so later duplicates pick up a numeric suffix.
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercases, strips tags and punctuation, and hyphenates whitespace.
    fn serialize(value: &str) -> String {
        let lowered = value.to_lowercase();
        let stripped = HTML_TAG.replace_all(lowered.trim(), "");
        let stripped = SLUG_PUNCTUATION.replace_all(&stripped, "");
        WHITESPACE.replace_all(&stripped, "-").into_owned()
    }

    fn next_safe_slug(&mut self, base: &str, dry_run: bool) -> String {
        let mut slug = base.to_string();
        let mut count = 0;
        if self.seen.contains_key(base) {
            count = self.seen[base];
            loop {
                count += 1;
                slug = format!("{}-{}", base, count);
                if !self.seen.contains_key(&slug) {
                    break;
                }
            }
        }
        if !dry_run {
            self.seen.insert(base.to_string(), count);
            self.seen.insert(slug.clone(), 0);
        }
        slug
    }

    /// Returns a slug for `value` that no earlier call has produced,
    /// suffixing `-1`, `-2`, ... on collision.
    pub fn slug(&mut self, value: &str) -> String {
        let base = Self::serialize(value);
        self.next_safe_slug(&base, false)
    }

    /// Computes what [`slug`](Self::slug) would return without
    /// recording it, so the same id stays available.
    pub fn slug_dry_run(&mut self, value: &str) -> String {
        let base = Self::serialize(value);
        self.next_safe_slug(&base, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_strips_markup() {
        assert_eq!(Slugger::serialize("Hello, World!"), "hello-world");
        assert_eq!(Slugger::serialize("  A <em>B</em> C  "), "a-b-c");
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("foo bar"), "foo-bar");
        assert_eq!(slugger.slug("foo bar"), "foo-bar-1");
        assert_eq!(slugger.slug("foo bar"), "foo-bar-2");
    }

    #[test]
    fn test_dry_run_does_not_record() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("a"), "a");
        assert_eq!(slugger.slug_dry_run("a"), "a-1");
        assert_eq!(slugger.slug_dry_run("a"), "a-1");
        assert_eq!(slugger.slug("a"), "a-1");
    }

    #[test]
    fn test_explicit_suffix_does_not_clash() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("a"), "a");
        assert_eq!(slugger.slug("a-1"), "a-1");
        assert_eq!(slugger.slug("a"), "a-2");
    }
}
