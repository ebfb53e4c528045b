use std::collections::HashMap;
use std::collections::HashSet;

use crate::matcher::{ratio, similarity};
use crate::normalize::{contains_arabic, normalize};

/// Candidates scoring below this similarity are not suggested.
const SUGGESTION_CUTOFF: u32 = 50;

/// Global term-frequency table feeding autocomplete-style word
/// suggestions. Populated during index construction from filenames and
/// extracted content.
#[derive(Debug, Default)]
pub struct WordTable {
    counts: HashMap<String, u32>,
}

impl WordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one text into the table. Arabic words are weighted by
    /// repetition; other words count once per text.
    pub fn add_text(&mut self, text: &str) {
        let normalized = normalize(text);
        let mut seen: HashSet<&str> = HashSet::new();
        for word in normalized.split_whitespace() {
            let word = word.trim_matches(['_', '-']);
            if word.chars().count() < 2 {
                continue;
            }
            if contains_arabic(word) {
                *self.counts.entry(word.to_string()).or_insert(0) += 1;
            } else if seen.insert(word) {
                *self.counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fuzzy word suggestions for a query, Arabic candidates first, each
    /// pool ordered by similarity then frequency.
    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<String> {
        let normalized = normalize(query);
        if normalized.chars().count() < 2 || limit == 0 {
            return Vec::new();
        }

        let mut arabic: Vec<(&str, u32, u32)> = Vec::new();
        let mut other: Vec<(&str, u32, u32)> = Vec::new();
        for (word, &freq) in &self.counts {
            if contains_arabic(word) {
                let score = similarity(&normalized, word);
                if score >= SUGGESTION_CUTOFF {
                    arabic.push((word, score, freq));
                }
            } else {
                let score = ratio(&normalized, word);
                if score >= SUGGESTION_CUTOFF {
                    other.push((word, score, freq));
                }
            }
        }

        let by_score = |a: &(&str, u32, u32), b: &(&str, u32, u32)| {
            b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(b.0))
        };
        arabic.sort_by(by_score);
        other.sort_by(by_score);

        arabic
            .into_iter()
            .chain(other)
            .take(limit)
            .map(|(word, _, _)| word.to_string())
            .collect()
    }
}
