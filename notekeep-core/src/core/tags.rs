//! Hashtags derived from note text.
//!
//! Tags are never stored; they are recomputed from title and content every
//! time they are asked for.

use crate::{Note, Tag};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\w-]+)").expect("tag pattern is valid"));

/// Tags marked with `#` in `text`, without the marker, with occurrence counts.
///
/// A marker only counts at the start of the text or after whitespace, so
/// `mail#1` and `##` are not tags.
pub fn extract_tags(text: &str) -> BTreeMap<String, usize> {
    let mut tags = BTreeMap::new();
    for captures in TAG_RE.captures_iter(text) {
        *tags.entry(captures[1].to_string()).or_insert(0) += 1;
    }
    tags
}

/// Number of notes each tag appears in, sorted case-insensitively by text.
pub fn aggregate_tags(notes: &[Note]) -> Vec<Tag> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for note in notes {
        for tag in extract_tags(&note.text()).into_keys() {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    let mut tags: Vec<Tag> = counts
        .into_iter()
        .map(|(text, count)| Tag { text, count })
        .collect();
    tags.sort_by(|a, b| {
        a.text
            .to_lowercase()
            .cmp(&b.text.to_lowercase())
            .then_with(|| a.text.cmp(&b.text))
    });
    tags
}

/// Whole-token AND match over a fixed tag list, compiled once.
///
/// Tags are matched literally, including any `#` the caller passes. An empty
/// list matches nothing.
#[derive(Debug, Clone)]
pub struct TagFilter {
    patterns: Vec<Regex>,
    unusable: bool,
}

impl TagFilter {
    pub fn new(tags: &[String]) -> Self {
        let mut patterns = Vec::with_capacity(tags.len());
        let mut unusable = false;
        for tag in tags {
            let pattern = format!(r"(?m)(?:\s|^){}(?:\s|$)", regex::escape(tag));
            match Regex::new(&pattern) {
                Ok(re) => patterns.push(re),
                Err(e) => {
                    log::warn!("Unusable tag '{tag}': {e}");
                    unusable = true;
                }
            }
        }
        Self { patterns, unusable }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && !self.unusable
    }

    /// Whether every tag occurs in `text` as a whitespace-delimited token.
    pub fn matches(&self, text: &str) -> bool {
        !self.unusable
            && !self.patterns.is_empty()
            && self.patterns.iter().all(|re| re.is_match(text))
    }
}

/// Whether every one of `tags` occurs in `text` as a whitespace-delimited token.
///
/// Compiles the tags on each call; use [`TagFilter`] to test many texts.
pub fn matches_all_tags(text: &str, tags: &[String]) -> bool {
    TagFilter::new(tags).matches(text)
}

/// Splits a comma separated tag list, dropping blanks.
pub fn split_tag_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
