//! Find/replace match tracking over the plain-text projection.
//!
//! Matching is literal and case-insensitive, left to right without overlap,
//! and never crosses a tag boundary. Every mutation is followed by a full
//! rescan of the new content.

use std::ops::Range;

use tracing::debug;

use crate::markup::Projection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLocation {
    /// Character range within the plain-text projection.
    pub text: Range<usize>,
    /// Byte range of the matched characters within the markup.
    pub markup: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    HasMatches,
    NoMatches,
}

/// One-based position of the current match, `{0, 0}` without matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchCount {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MatchTracker {
    term: String,
    matches: Vec<MatchLocation>,
    current: Option<usize>,
}

impl MatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search_term(&mut self, term: &str, content: &str) {
        self.term = term.to_string();
        self.rescan(content);
        self.current = if self.matches.is_empty() { None } else { Some(0) };
        debug!(term, matches = self.matches.len(), "search term set");
    }

    /// Re-derives matches for the current term after the content changed.
    pub fn refresh(&mut self, content: &str) {
        let term = std::mem::take(&mut self.term);
        self.set_search_term(&term, content);
    }

    pub fn clear(&mut self) {
        self.term.clear();
        self.matches.clear();
        self.current = None;
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn state(&self) -> SearchState {
        if self.term.is_empty() {
            SearchState::Idle
        } else if self.matches.is_empty() {
            SearchState::NoMatches
        } else {
            SearchState::HasMatches
        }
    }

    pub fn matches(&self) -> &[MatchLocation] {
        &self.matches
    }

    pub fn current(&self) -> Option<&MatchLocation> {
        self.current.map(|idx| &self.matches[idx])
    }

    pub fn next(&mut self) -> Option<&MatchLocation> {
        let idx = self.current?;
        let next = (idx + 1) % self.matches.len();
        self.current = Some(next);
        Some(&self.matches[next])
    }

    pub fn prev(&mut self) -> Option<&MatchLocation> {
        let idx = self.current?;
        let prev = if idx == 0 {
            self.matches.len() - 1
        } else {
            idx - 1
        };
        self.current = Some(prev);
        Some(&self.matches[prev])
    }

    pub fn count(&self) -> MatchCount {
        match self.current {
            Some(idx) => MatchCount {
                current: idx + 1,
                total: self.matches.len(),
            },
            None => MatchCount::default(),
        }
    }

    /// Replaces the current match in `content` and returns the new content.
    ///
    /// Matches are recomputed from scratch and the cursor returns to the
    /// first match, as after a fresh search.
    pub fn replace_current(&mut self, replacement: &str, content: &str) -> Option<String> {
        let location = self.current()?.clone();
        let mut updated = content.to_string();
        updated.replace_range(location.markup, replacement);
        debug!(at = location.text.start, "replaced current match");
        self.refresh(&updated);
        Some(updated)
    }

    /// Replaces every match in one pass and returns the new content.
    pub fn replace_all(&mut self, replacement: &str, content: &str) -> Option<String> {
        if self.matches.is_empty() {
            return None;
        }
        let mut updated = content.to_string();
        for location in self.matches.iter().rev() {
            updated.replace_range(location.markup.clone(), replacement);
        }
        debug!(replaced = self.matches.len(), "replaced all matches");
        self.refresh(&updated);
        Some(updated)
    }

    fn rescan(&mut self, content: &str) {
        self.matches = if self.term.is_empty() {
            Vec::new()
        } else {
            find_matches(&self.term, content)
        };
    }
}

fn find_matches(term: &str, content: &str) -> Vec<MatchLocation> {
    let needle: Vec<char> = term.chars().collect();
    let mut found = Vec::new();

    for run in Projection::of(content).runs() {
        let haystack: Vec<char> = run.text().chars().collect();
        let mut start = 0;
        while start + needle.len() <= haystack.len() {
            let window = &haystack[start..start + needle.len()];
            if window.iter().zip(&needle).all(|(a, b)| chars_match(*a, *b)) {
                let chars = start..start + needle.len();
                if let Some(markup) = run.markup_range(chars.clone()) {
                    found.push(MatchLocation {
                        text: run.char_offset() + chars.start..run.char_offset() + chars.end,
                        markup,
                    });
                }
                start += needle.len();
            } else {
                start += 1;
            }
        }
    }
    found
}

fn chars_match(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
