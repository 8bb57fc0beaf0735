//! Tilde Expansion
//!
//! A leading unquoted `~` at the start of a word becomes `$HOME`.
//! `~user` is unsupported and stays literal.

use crate::ast::types::{Quoting, Word, WordPart};
use crate::interpreter::state::ShellState;

pub fn expand_tilde(word: Word, state: &ShellState) -> Word {
    let Some(WordPart::Literal {
        text,
        quoting: Quoting::None,
    }) = word.parts.first()
    else {
        return word;
    };
    if !text.starts_with('~') {
        return word;
    }

    // Only bare `~` or `~/…`; a named user stays as written.
    let rest = &text[1..];
    if !(rest.is_empty() || rest.starts_with('/')) {
        return word;
    }

    let home = state.get_env("HOME").unwrap_or("/").to_string();
    let mut parts = word.parts.clone();
    parts[0] = WordPart::Literal {
        text: format!("{}{}", home, rest),
        quoting: Quoting::None,
    };
    Word { parts }
}

// ============================================================================
// Tests
// ============================================================================
