//! Unit code normalization
//!
//! Codes are ASCII, uppercase and dash separated. Each character is reduced
//! to ASCII by compatibility decomposition without diacritics, or by
//! transliteration when decomposition does not reach ASCII (`µ`, `ß`,
//! Cyrillic). Every run of other characters collapses into one `-`.

use deunicode::deunicode_char;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a shortcut (or an explicit code) into a unit code.
///
/// Returns an empty string when nothing alphanumeric survives.
pub fn normalize_code(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        for c in ascii_form(ch).chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_uppercase());
            } else {
                pending_dash = true;
            }
        }
    }

    out
}

/// ASCII spelling of one character; unknown characters become a separator
fn ascii_form(c: char) -> String {
    if c.is_ascii() {
        return c.to_string();
    }

    let decomposed: String = c.nfkd().filter(|d| !is_combining_mark(*d)).collect();
    if !decomposed.is_empty() && decomposed.is_ascii() {
        return decomposed;
    }

    deunicode_char(c).unwrap_or(" ").to_string()
}
