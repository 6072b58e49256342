//! Structural analysis of agent output text.
//!
//! Agent output is loosely formatted markdown. This module extracts the
//! pieces a contract can check:
//!
//! - Sections: `#`-headings, bold-only lines (`**Key Insights**`), or short
//!   label lines ending in `:` (`Key Insights:`)
//! - List items: top-level `-`, `*`, `+`, `•` or `1.` / `1)` bullets, with
//!   deeper-indented lines folded into the item they follow
//! - Words: whitespace-separated tokens with at least one alphanumeric
//!   character, hashtags excluded
//! - Hashtags: `#tag` tokens, counted case-insensitively

use regex::Regex;
use std::sync::LazyLock;

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)(?:[-*+•]|\d{1,3}[.)])\s+(.*)$").expect("Invalid bullet regex")
});

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w&#])#([A-Za-z][A-Za-z0-9_]*)").expect("Invalid hashtag regex")
});

/// Longest line still treated as a `Label:` heading.
const MAX_LABEL_LEN: usize = 80;

/// A top-level list item and its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Text following the bullet marker on the first line.
    pub headline: String,
    /// Headline plus every continuation line.
    pub text: String,
}

/// Normalize a section or field label for comparison.
pub fn normalize_label(label: &str) -> String {
    label
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a heading-like line and return its normalized label.
fn parse_heading(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || BULLET.is_match(line) {
        return None;
    }

    let is_heading = if trimmed.starts_with('#') {
        // `#tag` is a hashtag, not a heading.
        trimmed.trim_start_matches('#').starts_with(' ')
    } else if trimmed.starts_with("**") {
        let inner = trimmed.trim_end_matches(':');
        inner.len() > 4 && inner.ends_with("**")
    } else {
        trimmed.ends_with(':')
            && trimmed.len() <= MAX_LABEL_LEN
            && !trimmed[..trimmed.len() - 1].contains(':')
    };
    if !is_heading {
        return None;
    }

    let label = trimmed
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '*' || c == '_' || c == ':' || c.is_whitespace());
    if label.is_empty() {
        None
    } else {
        Some(normalize_label(label))
    }
}

/// Extract sections in document order as `(normalized label, body)`.
pub fn extract_sections(text: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        if let Some(label) = parse_heading(line) {
            if let Some((name, body)) = current.take() {
                sections.push((name, body.trim_end().to_string()));
            }
            current = Some((label, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some((name, body)) = current {
        sections.push((name, body.trim_end().to_string()));
    }

    sections
}

/// Body of the first section labelled `name`, if present.
pub fn find_section(text: &str, name: &str) -> Option<String> {
    let wanted = normalize_label(name);
    extract_sections(text)
        .into_iter()
        .find(|(label, _)| *label == wanted)
        .map(|(_, body)| body)
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Extract top-level list items.
pub fn list_items(text: &str) -> Vec<ListItem> {
    let Some(top_indent) = text
        .lines()
        .filter(|line| BULLET.is_match(line))
        .map(indent_width)
        .min()
    else {
        return Vec::new();
    };

    let mut items: Vec<ListItem> = Vec::new();
    let mut open = false;
    let mut after_blank = false;

    for line in text.lines() {
        if parse_heading(line).is_some() {
            open = false;
            continue;
        }

        if let Some(caps) = BULLET.captures(line)
            && indent_width(line) == top_indent
        {
            let headline = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            items.push(ListItem {
                text: headline.clone(),
                headline,
            });
            open = true;
            after_blank = false;
            continue;
        }

        if line.trim().is_empty() {
            after_blank = true;
            continue;
        }

        // A flush paragraph after a blank line closes the list.
        if after_blank && indent_width(line) <= top_indent && !BULLET.is_match(line) {
            open = false;
        }
        after_blank = false;

        if open && let Some(item) = items.last_mut() {
            item.text.push('\n');
            item.text.push_str(line.trim());
        }
    }

    items
}

/// Whether `item` carries a `Field:` label (case-insensitive, emphasis ignored).
pub fn has_field(item: &ListItem, field: &str) -> bool {
    let haystack = item.text.replace(['*', '_'], "").to_lowercase();
    let needle = format!("{}:", normalize_label(field));
    haystack.contains(&needle)
}

/// Count words, excluding hashtags and tokens without letters or digits.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| !token.starts_with('#'))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Distinct hashtags, lowercased, in order of first appearance.
pub fn hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in HASHTAG.captures_iter(text) {
        if let Some(tag) = caps.get(1) {
            let tag = tag.as_str().to_lowercase();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}
