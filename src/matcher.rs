use crate::normalize::{contains_arabic, normalize};
use crate::terms::{CONTENT_TERM_CAP, FILENAME_TERM_CAP, SearchTerm, TermKind, extract_terms};

/// Content prefix (in chars) sampled for tier-6 matching.
pub const CONTENT_SAMPLE: usize = 1_500;

/// Minimum retained score for Latin queries.
pub const MIN_SCORE: i64 = 30;

/// Minimum retained score for Arabic-bearing queries, which carry more
/// base noise from OCR and transliteration.
pub const MIN_SCORE_ARABIC: i64 = 20;

// Tier bonuses. Exact values are tunable; the ordering
// exact > substring > normalized > phrase > term points > content
// is what the ranking relies on.
const EXACT_NAME_BONUS: i64 = 100;
const SUBSTRING_BONUS: i64 = 60;
const NORMALIZED_EQUAL_BONUS: i64 = 40;
const PHRASE_BONUS: i64 = 25;
const CONTENT_RAW_BONUS: i64 = 10;
const CONTENT_NORMALIZED_BONUS: i64 = 8;
const CONTENT_TERM_ARABIC_BONUS: i64 = 5;
const CONTENT_TERM_BONUS: i64 = 3;

/// A parsed user query: name part, optional extension filter, extracted
/// terms, and the Arabic-detection flag that widens scan and result
/// bounds downstream.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub raw: String,
    pub normalized: String,
    pub terms: Vec<SearchTerm>,
    pub extension: Option<String>,
    pub is_arabic: bool,
}

impl ParsedQuery {
    /// Parse a raw query string. A trailing `.ext` with an alphanumeric
    /// extension of at most 4 chars becomes an extension filter, and
    /// terms are re-extracted from the name portion only.
    pub fn parse(query: &str) -> Self {
        let trimmed = query.trim();
        let (name, extension) = split_extension(trimmed);
        Self {
            raw: name.to_string(),
            normalized: normalize(name),
            terms: extract_terms(name, FILENAME_TERM_CAP),
            extension,
            is_arabic: contains_arabic(trimmed),
        }
    }

    pub fn min_score(&self) -> i64 {
        if self.is_arabic {
            MIN_SCORE_ARABIC
        } else {
            MIN_SCORE
        }
    }
}

fn split_extension(query: &str) -> (&str, Option<String>) {
    if let Some((name, ext)) = query.rsplit_once('.') {
        let valid = !name.is_empty()
            && !ext.is_empty()
            && ext.len() <= 4
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            return (name, Some(ext.to_ascii_lowercase()));
        }
    }
    (query, None)
}

/// Score a document against a parsed query using additive tiers:
/// exact name, raw substring, normalized equality, verbatim phrase,
/// per-term best similarity, and content-sample matches.
pub fn score_document(
    query: &ParsedQuery,
    original_name: &str,
    filename_terms: &[SearchTerm],
    content: Option<&str>,
) -> i64 {
    let mut score = 0;

    let raw_lower = query.raw.to_lowercase();
    let name_lower = original_name.to_lowercase();

    if !raw_lower.is_empty() && raw_lower == name_lower {
        score += EXACT_NAME_BONUS;
    }
    if !raw_lower.is_empty() && name_lower.contains(&raw_lower) {
        score += SUBSTRING_BONUS;
    }

    let name_normalized = normalize(original_name);
    if !query.normalized.is_empty() && query.normalized == name_normalized {
        score += NORMALIZED_EQUAL_BONUS;
    }

    // Queries with an explicit separator are treated as phrases.
    let is_phrase = query.raw.contains('_') || query.raw.contains('-');
    if is_phrase && name_lower.contains(&raw_lower) {
        score += PHRASE_BONUS;
    }

    for term in &query.terms {
        let best = filename_terms
            .iter()
            .map(|ft| similarity(&term.text, &ft.text))
            .max()
            .unwrap_or(0);
        score += similarity_points(best);
    }

    if let Some(content) = content {
        let sample: String = content.chars().take(CONTENT_SAMPLE).collect();
        let sample_lower = sample.to_lowercase();
        let sample_normalized = normalize(&sample);

        if !raw_lower.is_empty() && sample_lower.contains(&raw_lower) {
            score += CONTENT_RAW_BONUS;
        }
        if !query.normalized.is_empty() && sample_normalized.contains(&query.normalized) {
            score += CONTENT_NORMALIZED_BONUS;
        }

        let content_terms = extract_terms(&sample, CONTENT_TERM_CAP);
        for term in &query.terms {
            let matched = term.forms().any(|form| {
                sample_normalized.contains(form)
                    || content_terms.iter().any(|ct| ct.text.contains(form))
            });
            if matched {
                score += match term.kind {
                    TermKind::Arabic => CONTENT_TERM_ARABIC_BONUS,
                    _ => CONTENT_TERM_BONUS,
                };
            }
        }
    }

    score
}

/// Arabic-aware pairwise similarity on a 0–100 scale.
///
/// Exact 100, separator-folded exact 95, normalized exact 90, substring
/// either direction 85, variant-expanded substring 80, otherwise an
/// edit-distance ratio (maximized over variant pairs when both sides are
/// Arabic).
pub fn similarity(a: &str, b: &str) -> u32 {
    if a == b {
        return 100;
    }

    let a_folded = a.replace(['_', '-'], " ");
    let b_folded = b.replace(['_', '-'], " ");
    if a_folded == b_folded {
        return 95;
    }

    let a_norm = normalize(a);
    let b_norm = normalize(b);
    if a_norm.is_empty() || b_norm.is_empty() {
        return 0;
    }
    if a_norm == b_norm {
        return 90;
    }

    let contained = |x: &str, y: &str| x.chars().count() >= 2 && y.contains(x);
    if contained(&a_norm, &b_norm) || contained(&b_norm, &a_norm) {
        return 85;
    }

    let a_forms = all_forms(&a_norm);
    let b_forms = all_forms(&b_norm);
    for af in &a_forms {
        for bf in &b_forms {
            if contained(af, bf) || contained(bf, af) {
                return 80;
            }
        }
    }

    if contains_arabic(&a_norm) && contains_arabic(&b_norm) {
        a_forms
            .iter()
            .flat_map(|af| b_forms.iter().map(move |bf| ratio(af, bf)))
            .max()
            .unwrap_or(0)
    } else {
        ratio(&a_norm, &b_norm)
    }
}

fn all_forms(term: &str) -> Vec<String> {
    let mut forms = vec![term.to_string()];
    forms.extend(crate::terms::arabic_variants(term));
    forms
}

/// Map a best-pairwise similarity into a tiered point bonus.
pub fn similarity_points(best: u32) -> i64 {
    match best {
        90..=u32::MAX => 40,
        80..=89 => 30,
        70..=79 => 20,
        60..=69 => 15,
        50..=59 => 10,
        _ => 0,
    }
}

/// Normalized edit-distance ratio on a 0–100 scale.
pub fn ratio(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let longest = a_chars.len().max(b_chars.len());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein(&a_chars, &b_chars);
    (100 * (longest - distance) / longest) as u32
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars("hello"), &chars("hello")), 0);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("")), 3);
    }

    #[test]
    fn ratio_scale() {
        assert_eq!(ratio("2024", "2024"), 100);
        assert_eq!(ratio("2024", "2025"), 75);
        assert_eq!(ratio("", ""), 100);
        assert_eq!(ratio("ab", "xy"), 0);
    }

    #[test]
    fn similarity_exact_and_separator() {
        assert_eq!(similarity("invoice", "invoice"), 100);
        assert_eq!(similarity("a_b", "a-b"), 95);
        assert_eq!(similarity("a_b", "a b"), 95);
    }

    #[test]
    fn similarity_normalized_equal() {
        // hamza variant collapses under normalization
        assert_eq!(similarity("أحمد", "احمد"), 90);
        assert_eq!(similarity("Invoice", "invoice"), 90);
    }

    #[test]
    fn similarity_substring() {
        assert_eq!(similarity("invoice", "invoices"), 85);
        assert_eq!(similarity("فاتوره", "فاتوره123"), 85);
    }

    #[test]
    fn similarity_falls_back_to_ratio() {
        let s = similarity("report", "peport");
        assert!((80..90).contains(&s), "got {s}");
    }

    #[test]
    fn similarity_points_tiers() {
        assert_eq!(similarity_points(100), 40);
        assert_eq!(similarity_points(90), 40);
        assert_eq!(similarity_points(85), 30);
        assert_eq!(similarity_points(75), 20);
        assert_eq!(similarity_points(65), 15);
        assert_eq!(similarity_points(55), 10);
        assert_eq!(similarity_points(40), 0);
    }

    #[test]
    fn parse_plain_query() {
        let q = ParsedQuery::parse("  invoice 2024 ");
        assert_eq!(q.raw, "invoice 2024");
        assert!(q.extension.is_none());
        assert!(!q.is_arabic);
        assert_eq!(q.terms.len(), 2);
    }

    #[test]
    fn parse_extension_qualified() {
        let q = ParsedQuery::parse("report.pdf");
        assert_eq!(q.raw, "report");
        assert_eq!(q.extension.as_deref(), Some("pdf"));
        assert_eq!(q.terms.len(), 1);
        assert_eq!(q.terms[0].text, "report");
    }

    #[test]
    fn parse_rejects_long_extension() {
        let q = ParsedQuery::parse("archive.backup");
        assert!(q.extension.is_none());
        assert_eq!(q.raw, "archive.backup");
    }

    #[test]
    fn parse_detects_arabic() {
        assert!(ParsedQuery::parse("فاتوره").is_arabic);
        assert_eq!(ParsedQuery::parse("فاتوره").min_score(), MIN_SCORE_ARABIC);
        assert_eq!(ParsedQuery::parse("invoice").min_score(), MIN_SCORE);
    }

    #[test]
    fn exact_name_outranks_near_name() {
        let q = ParsedQuery::parse("invoice_2024");
        let terms_2024 = extract_terms("invoice_2024", FILENAME_TERM_CAP);
        let terms_2025 = extract_terms("invoice_2025", FILENAME_TERM_CAP);

        let exact = score_document(&q, "invoice_2024", &terms_2024, None);
        let near = score_document(&q, "invoice_2025", &terms_2025, None);
        assert!(
            exact > near,
            "exact {exact} should strictly outrank near {near}"
        );
    }

    #[test]
    fn phrase_query_gets_phrase_bonus() {
        let q = ParsedQuery::parse("annual_report");
        let terms = extract_terms("annual_report_2024", FILENAME_TERM_CAP);
        let with_phrase = score_document(&q, "annual_report_2024", &terms, None);

        let q_space = ParsedQuery::parse("annual report");
        let without_phrase = score_document(&q_space, "annual_report_2024", &terms, None);
        assert!(with_phrase > without_phrase);
    }

    #[test]
    fn content_matches_are_additive() {
        let q = ParsedQuery::parse("مناقصه");
        let terms = extract_terms("scan_001", FILENAME_TERM_CAP);
        let without = score_document(&q, "scan_001", &terms, None);
        let with = score_document(
            &q,
            "scan_001",
            &terms,
            Some("اعلان عن مناقصة عامة لتوريد معدات"),
        );
        assert!(with > without);
    }

    #[test]
    fn arabic_variant_scores_nonzero() {
        let q = ParsedQuery::parse("مؤسسه");
        let terms = extract_terms("مؤسسة", FILENAME_TERM_CAP);
        let score = score_document(&q, "مؤسسة", &terms, None);
        assert!(score > 0, "variant spelling should still match, got {score}");
    }
}
