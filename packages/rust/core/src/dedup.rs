//! Duplicate-topic detection by title word overlap.

use std::collections::HashSet;

/// Lowercase, turn everything outside `[a-z0-9]` and whitespace into a
/// space, collapse whitespace runs, trim.
pub fn normalize_title(title: &str) -> String {
    let replaced: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct normalized words of a title.
pub fn title_word_set(title: &str) -> HashSet<String> {
    normalize_title(title)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Shared words divided by the smaller word-set size; 0 when either is empty.
pub fn word_overlap_ratio(a: &str, b: &str) -> f64 {
    let a = title_word_set(a);
    let b = title_word_set(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let shared = a.intersection(&b).count();
    shared as f64 / a.len().min(b.len()) as f64
}

/// A title rejected by the gate and the earlier title it collided with.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarTitle {
    pub previous: String,
    pub ratio: f64,
}

/// Titles processed so far in one run.
///
/// A title passes when its overlap with every recorded title is at most
/// `threshold`; passing titles are recorded.
#[derive(Debug, Clone)]
pub struct TopicGate {
    threshold: f64,
    seen: Vec<String>,
}

impl TopicGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            seen: Vec::new(),
        }
    }

    /// The first recorded title overlapping `title` by more than the threshold.
    pub fn check(&self, title: &str) -> Option<SimilarTitle> {
        self.seen.iter().find_map(|previous| {
            let ratio = word_overlap_ratio(title, previous);
            (ratio > self.threshold).then(|| SimilarTitle {
                previous: previous.clone(),
                ratio,
            })
        })
    }

    /// Record `title` unless it collides; returns the collision if any.
    pub fn admit(&mut self, title: &str) -> Option<SimilarTitle> {
        if let Some(similar) = self.check(title) {
            return Some(similar);
        }
        self.seen.push(title.to_string());
        None
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
