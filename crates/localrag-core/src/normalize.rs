//! Deterministic cleanup of extracted text.
//!
//! Rules run in a fixed order; later rules assume the earlier ones ran:
//!
//! 1. drop lines that are only a page number (`Page 12`)
//! 2. rejoin words hyphenated across a line break (`word-\nbreak` -> `wordbreak`)
//! 3. collapse whitespace runs, newlines included, to one space
//! 4. drop every character outside printable ASCII and the typographic
//!    allow-list (bullet, en/em dash, curly quotes). This is lossy: accented
//!    letters, CJK text and emoji are removed, not transliterated.
//! 5. remove whitespace before `.`, `,`, `!`, `?`
//! 6. split merged words at a lowercase -> uppercase transition (`wordWord` ->
//!    `word Word`); camel-case identifiers are split too
//! 7. trim
//!
//! The rule set is repeated until the text stops changing, which makes
//! [`normalize`] idempotent even when a deletion in rule 4 exposes a new
//! whitespace run.

use regex::Regex;
use std::sync::LazyLock;

static PAGE_NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Page \d+\s*$").expect("static regex"));
static HYPHENATED_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)-\s*\n\s*(\w+)").expect("static regex"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,!?])").expect("static regex"));
static MERGED_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));

const TYPOGRAPHIC_ALLOW_LIST: [char; 7] = ['\u{2022}', '\u{2013}', '\u{2014}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

const MAX_PASSES: usize = 8;

/// Clean raw extracted text. Total: the worst case is an empty string.
pub fn normalize(text: &str) -> String {
    let mut current = apply_rules(text);
    for _ in 1..MAX_PASSES {
        let next = apply_rules(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn apply_rules(text: &str) -> String {
    let text = PAGE_NUMBER_LINE.replace_all(text, "");
    let text = HYPHENATED_BREAK.replace_all(&text, "${1}${2}");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text: String = text.chars().filter(|c| is_kept_char(*c)).collect();
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "${1}");
    let text = MERGED_WORDS.replace_all(&text, "${1} ${2}");
    text.trim().to_string()
}

fn is_kept_char(c: char) -> bool {
    matches!(c, '\x20'..='\x7E') || TYPOGRAPHIC_ALLOW_LIST.contains(&c)
}
