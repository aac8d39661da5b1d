//! Text normalization for speech synthesis.
//!
//! Raw PDF text carries control characters, zero-width and bidi marks, exotic
//! spaces and math notation. Engines either choke on these or read them out
//! character by character. [`normalize`] turns any input into a string that is
//! safe to hand to an engine and is never empty.

use once_cell::sync::Lazy;
use regex::Regex;

use super::math::{latex_phrase, symbol_phrase};

/// Returned in place of text that normalizes to nothing.
pub const EMPTY_PLACEHOLDER: &str = "No content available for speech synthesis.";

/// LaTeX math delimiters, longest first so `$$` wins over `$`.
const LATEX_DELIMITERS: &[&str] = &["\\(", "\\)", "\\[", "\\]", "$$", "$"];

/// Macros whose opening brace belongs to the macro itself.
const BRACED_COMMANDS: &[&str] = &["frac", "sqrt"];

static MULTI_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Normalize text for speech synthesis.
///
/// In order:
/// - Removes ASCII control characters except newline and tab
/// - Removes zero-width and directional formatting characters
/// - Replaces non-breaking, typographic and ideographic spaces with a space
/// - Replaces LaTeX math delimiters with a space, keeping the math inside
/// - Speaks LaTeX macros, `^{`, `_{` and Unicode math symbols as words
/// - Collapses runs of whitespace and trims
///
/// Idempotent. Never returns an empty string.
pub fn normalize(text: &str) -> String {
    normalize_content(text).unwrap_or_else(|| EMPTY_PLACEHOLDER.to_string())
}

/// Like [`normalize`], but returns `None` instead of the placeholder.
pub fn normalize_content(text: &str) -> Option<String> {
    let text = strip_invisible(text);
    let text = strip_latex_delimiters(&text);
    let text = speak_latex(&text);
    let text = speak_symbols(&text);
    let text = MULTI_WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    (!text.is_empty()).then(|| text.to_string())
}

/// Whether normalization found nothing to say in `text`.
pub fn is_placeholder(text: &str) -> bool {
    text == EMPTY_PLACEHOLDER
}

/// Drop control, zero-width and bidi characters; flatten exotic spaces.
fn strip_invisible(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        if is_removed_control(c) || is_zero_width(c) || is_directional(c) {
            continue;
        }
        if is_exotic_space(c) {
            result.push(' ');
        } else {
            result.push(c);
        }
    }

    result
}

/// ASCII control characters other than tab and newline.
fn is_removed_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

fn is_directional(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

/// Spaces other than U+0020 that engines mishandle.
fn is_exotic_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{2000}'..='\u{200F}'
            | '\u{2028}'..='\u{202F}'
            | '\u{205F}'..='\u{206F}'
            | '\u{3000}'
    )
}

/// Replace `\(`, `\)`, `\[`, `\]`, `$$` and `$` with a space.
fn strip_latex_delimiters(text: &str) -> String {
    let mut result = text.to_string();
    for delimiter in LATEX_DELIMITERS {
        if result.contains(delimiter) {
            result = result.replace(delimiter, " ");
        }
    }
    result
}

/// Replace known LaTeX macros, `^{`, `_{` and `}` with spoken words.
///
/// A macro is a backslash followed by its whole run of ASCII letters, so
/// `\in` never fires inside `\infty`. Unknown macros pass through untouched.
fn speak_latex(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphabetic() {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }

                match latex_phrase(&name) {
                    Some(phrase) => {
                        if BRACED_COMMANDS.contains(&name.as_str()) && chars.peek() == Some(&'{') {
                            chars.next();
                        }
                        push_phrase(&mut result, phrase);
                    }
                    None => {
                        result.push('\\');
                        result.push_str(&name);
                    }
                }
            }
            '^' if chars.peek() == Some(&'{') => {
                chars.next();
                push_phrase(&mut result, "to the power of");
            }
            '_' if chars.peek() == Some(&'{') => {
                chars.next();
                push_phrase(&mut result, "sub");
            }
            '}' => result.push(' '),
            _ => result.push(c),
        }
    }

    result
}

/// Replace Unicode math symbols with spoken words.
fn speak_symbols(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match symbol_phrase(c) {
            Some(phrase) => push_phrase(&mut result, phrase),
            None => result.push(c),
        }
    }

    result
}

/// Append a phrase padded with spaces so it never fuses with its neighbours.
fn push_phrase(result: &mut String, phrase: &str) {
    result.push(' ');
    result.push_str(phrase);
    result.push(' ');
}
