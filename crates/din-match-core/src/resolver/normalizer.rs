//! Text and strength normalization shared by both resolution paths.
//!
//! Handles:
//! - Whitespace/case folding of names
//! - Trademark glyph and parenthesized-note removal
//! - Strength fingerprints (digit-group concatenation)
//! - Dosage-form suffix stripping (Tylenol ER → tylenol)

/// Trailing dosage-form tokens stripped by the fuzzy brand stage.
pub const DOSAGE_FORM_SUFFIXES: [&str; 8] = ["er", "cd", "xl", "sr", "la", "cr", "dr", "xr"];

const TRADEMARK_GLYPHS: [char; 3] = ['®', '™', '©'];

/// Lowercase, trim, and collapse whitespace runs to one space.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strip trademark glyphs and parenthesized annotations, then trim.
///
/// Parentheses behave like the pattern `\([^)]*\)`: an opening parenthesis
/// without a closing one is kept.
pub fn clean_search_term(s: &str) -> String {
    let without_glyphs: String = s.chars().filter(|c| !TRADEMARK_GLYPHS.contains(c)).collect();

    let mut out = String::with_capacity(without_glyphs.len());
    let mut rest = without_glyphs.as_str();
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Clean then normalize: the comparable form of any free-text name.
pub fn search_key(s: &str) -> String {
    normalize_text(&clean_search_term(s))
}

/// Concatenate every numeric token (integer or decimal) in order of appearance.
///
/// "500 mg / 12.5 mg" → "50012.5". Units and separators are discarded, so
/// distinct strengths can collide; comparisons built on this are plain
/// string equality/containment.
pub fn normalize_strength(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        // A decimal point only belongs to the token when digits follow it
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        out.push_str(&s[start..i]);
    }
    out
}

/// Remove one trailing dosage-form token (separated by a space or hyphen)
/// from an already normalized name.
pub fn strip_dosage_suffix(normalized: &str) -> String {
    if let Some(pos) = normalized.rfind(|c: char| c == ' ' || c == '-') {
        let (head, tail) = (&normalized[..pos], &normalized[pos + 1..]);
        if !head.trim().is_empty()
            && DOSAGE_FORM_SUFFIXES
                .iter()
                .any(|suffix| tail.eq_ignore_ascii_case(suffix))
        {
            return head.trim_end().to_string();
        }
    }
    normalized.to_string()
}

/// Split a semicolon-delimited ingredient list into search keys, dropping empty segments.
pub fn ingredient_tokens(text: &str) -> Vec<String> {
    text.split(';')
        .map(search_key)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Bidirectional containment: either string holds the other.
pub fn loosely_contains(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// True if every token loosely matches at least one of `names`.
pub fn tokens_covered<S: AsRef<str>>(tokens: &[String], names: &[S]) -> bool {
    tokens
        .iter()
        .all(|token| names.iter().any(|name| loosely_contains(token, name.as_ref())))
}
