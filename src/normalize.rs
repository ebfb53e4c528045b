use percent_encoding::percent_decode_str;

/// Maximum number of percent-decoding passes applied to the input.
///
/// Query strings arriving from upload forms are sometimes double-encoded;
/// decoding is repeated until the text stops changing, bounded so a stray
/// `%` can never loop forever.
const MAX_DECODE_PASSES: usize = 3;

/// Canonicalize raw text or a filename for comparison and indexing.
///
/// The passes, in order: bounded percent-decoding, Arabic diacritic
/// stripping, letter unification (hamza carriers, taa marbuta, alef
/// maksura), lowercasing, punctuation folding, and whitespace collapsing.
/// The function is total and idempotent; empty input yields an empty
/// string.
pub fn normalize(text: &str) -> String {
    let decoded = decode_percent_escapes(text);

    let mut out = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        if is_arabic_mark(c) {
            continue;
        }
        let c = unify_letter(c);
        if c == '/' || c == '|' || c == '\\' {
            out.push(' ');
        } else if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        } else {
            out.push(' ');
        }
    }

    collapse_whitespace(&out)
}

/// True if the string contains at least one character from the main
/// Arabic Unicode block.
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(is_arabic_char)
}

pub(crate) fn is_arabic_char(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}')
}

fn decode_percent_escapes(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        if !current.contains('%') {
            break;
        }
        match percent_decode_str(&current).decode_utf8() {
            Ok(decoded) => {
                if decoded == current {
                    break;
                }
                current = decoded.into_owned();
            }
            Err(_) => break,
        }
    }
    current
}

/// Arabic combining marks and formatting controls stripped wholesale:
/// honorifics (U+0610..U+061A), harakat (U+064B..U+065F), superscript
/// alef, Quranic annotation signs, and the tatweel stretch character.
fn is_arabic_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}'
            | '\u{064B}'..='\u{065F}'
            | '\u{0670}'
            | '\u{06D6}'..='\u{06ED}'
            | '\u{0640}'
    )
}

/// Collapse visually or phonetically equivalent Arabic letters to one
/// canonical form so OCR output and free typing compare equal.
fn unify_letter(c: char) -> char {
    match c {
        // hamza carriers and alef wasla -> bare alef
        'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
        // taa marbuta -> haa
        'ة' => 'ه',
        // alef maksura / hamza-on-yaa -> yaa
        'ى' | 'ئ' => 'ي',
        // hamza-on-waw -> waw
        'ؤ' => 'و',
        // Persian/Urdu compatibility forms seen in OCR output
        'ک' | 'گ' => 'ك',
        'ی' | 'ے' => 'ي',
        'ۀ' | 'ە' => 'ه',
        'پ' => 'ب',
        'چ' => 'ج',
        'ژ' => 'ز',
        'ڤ' => 'ف',
        _ => c,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "Hello World",
            "كِتَاب",
            "عرض%20أسعار",
            "A/B|C\\D",
            "  mixed_نص  123 ",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(normalize("كِتَاب"), normalize("كتاب"));
    }

    #[test]
    fn unifies_hamza_variants() {
        let a = normalize("أحمد");
        assert_eq!(a, normalize("احمد"));
        assert_eq!(a, normalize("إحمد"));
        assert_eq!(a, normalize("آحمد"));
    }

    #[test]
    fn unifies_taa_marbuta_and_maksura() {
        assert_eq!(normalize("مؤسسة"), normalize("موسسه"));
        assert_eq!(normalize("مستشفى"), normalize("مستشفي"));
    }

    #[test]
    fn percent_decoding_is_bounded_and_repeated() {
        // single-encoded
        assert_eq!(normalize("hello%20world"), "hello world");
        // double-encoded space
        assert_eq!(normalize("hello%2520world"), "hello world");
        // malformed escape does not panic
        assert_eq!(normalize("100%"), "100");
    }

    #[test]
    fn folds_separators_and_punctuation() {
        assert_eq!(normalize("a/b|c\\d"), "a b c d");
        assert_eq!(normalize("report (final).pdf!"), "report final pdf");
        assert_eq!(normalize("keep_under-score"), "keep_under-score");
    }

    #[test]
    fn lowercases_latin_only() {
        assert_eq!(normalize("Invoice REPORT"), "invoice report");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn detects_arabic() {
        assert!(contains_arabic("فاتورة"));
        assert!(contains_arabic("invoice فاتورة"));
        assert!(!contains_arabic("invoice 2024"));
    }
}
