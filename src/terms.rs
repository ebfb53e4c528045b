use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::normalize;

/// Cap on terms extracted from a filename.
pub const FILENAME_TERM_CAP: usize = 8;

/// Cap on terms extracted from document content, which is longer and
/// noisier than a filename.
pub const CONTENT_TERM_CAP: usize = 20;

/// Cap on the variant list attached to a single term.
const VARIANT_CAP: usize = 10;

/// Cap on letter-substitution variants (separator swaps come on top).
const SUBSTITUTION_VARIANT_CAP: usize = 4;

/// Letter substitutions producing plausible alternate spellings of an
/// Arabic term. Keys are canonical (post-normalization) letters.
const SUBSTITUTIONS: &[(char, &[char])] = &[
    ('ا', &['أ', 'إ', 'آ']),
    ('ي', &['ى', 'ئ']),
    ('ه', &['ة']),
    ('ة', &['ه']),
    ('و', &['ؤ']),
];

static ARABIC_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[؀-ۿݐ-ݿ_\-]{2,}").unwrap());
static LATIN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]{2,}").unwrap());
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Lexical class of an extracted term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Arabic,
    Latin,
    Numeric,
}

/// An atomic search unit extracted from normalized text, carrying its
/// plausible Arabic spelling variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub text: String,
    pub kind: TermKind,
    pub variants: Vec<String>,
}

impl SearchTerm {
    fn new(text: String, kind: TermKind) -> Self {
        let variants = match kind {
            TermKind::Arabic => arabic_variants(&text),
            _ => Vec::new(),
        };
        Self {
            text,
            kind,
            variants,
        }
    }

    /// The term text followed by every variant, in insertion order.
    pub fn forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str()).chain(self.variants.iter().map(String::as_str))
    }
}

/// Extract search terms from raw text.
///
/// The text is normalized first, then scanned for Arabic runs, Latin
/// runs, and standalone digit runs. The result is deduplicated in
/// insertion order and capped at `max_terms`.
pub fn extract_terms(text: &str, max_terms: usize) -> Vec<SearchTerm> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut terms: Vec<SearchTerm> = Vec::new();
    let mut push = |text: &str, kind: TermKind| {
        if terms.len() < max_terms && !terms.iter().any(|t| t.text == text) {
            terms.push(SearchTerm::new(text.to_string(), kind));
        }
    };

    for m in ARABIC_RUN.find_iter(&normalized) {
        // separator-only runs carry no letters
        if m.as_str().chars().any(|c| c != '_' && c != '-') {
            push(m.as_str(), TermKind::Arabic);
        }
    }
    for m in LATIN_RUN.find_iter(&normalized) {
        push(m.as_str(), TermKind::Latin);
    }
    for m in DIGIT_RUN.find_iter(&normalized) {
        push(m.as_str(), TermKind::Numeric);
    }

    terms
}

/// Generate alternate spellings of an Arabic term.
///
/// Each entry of the substitution table that occurs in the term yields a
/// variant with all occurrences of that letter replaced; terms containing
/// `_` or `-` additionally yield separator-swapped forms. The list is
/// deduplicated preserving insertion order and capped.
pub fn arabic_variants(term: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    let mut push = |v: String| {
        if v != term && !variants.contains(&v) && variants.len() < VARIANT_CAP {
            variants.push(v);
        }
    };

    let mut substitutions = 0;
    'subs: for (letter, replacements) in SUBSTITUTIONS {
        if !term.contains(*letter) {
            continue;
        }
        for replacement in *replacements {
            if substitutions >= SUBSTITUTION_VARIANT_CAP {
                break 'subs;
            }
            push(term.replace(*letter, &replacement.to_string()));
            substitutions += 1;
        }
    }

    if term.contains('_') || term.contains('-') {
        push(term.replace(['_', '-'], " "));
        push(term.replace(['_', ' '], "-"));
        push(term.replace(['-', ' '], "_"));
    }

    variants
}
