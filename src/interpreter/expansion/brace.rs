//! Brace Expansion
//!
//! `a{b,c}d` → `abd acd`, applied before every other expansion and only
//! to unquoted literal text. A brace group needs at least one unquoted
//! comma; anything else (including `${…}`, which the lexer already turned
//! into parameter parts) stays literal.

use crate::ast::types::{Quoting, Word, WordPart};

/// Expand one word into its brace alternatives, recursively. Words with
/// no expandable group come back unchanged as a single entry.
pub fn expand_braces(word: &Word) -> Vec<Word> {
    for (part_index, part) in word.parts.iter().enumerate() {
        let WordPart::Literal {
            text,
            quoting: Quoting::None,
        } = part
        else {
            continue;
        };
        let Some((start, end)) = find_group(text) else {
            continue;
        };

        let prefix = &text[..start];
        let body = &text[start + 1..end];
        let suffix = &text[end + 1..];

        let mut words = Vec::new();
        for alternative in split_alternatives(body) {
            let mut parts = Vec::with_capacity(word.parts.len() + 1);
            parts.extend(word.parts[..part_index].iter().cloned());
            let text = format!("{}{}{}", prefix, alternative, suffix);
            if !text.is_empty() {
                parts.push(WordPart::Literal {
                    text,
                    quoting: Quoting::None,
                });
            }
            parts.extend(word.parts[part_index + 1..].iter().cloned());
            // The rewritten word may hold further groups.
            words.extend(expand_braces(&Word { parts }));
        }
        return words;
    }
    vec![word.clone()]
}

/// First complete `{…}` group containing a top-level comma. Returns the
/// byte offsets of the braces.
fn find_group(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut open = None;
    let mut depth = 0_i32;
    let mut has_comma = false;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    open = Some(i);
                    has_comma = false;
                }
                depth += 1;
            }
            b',' if depth == 1 => has_comma = true,
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if has_comma {
                        return Some((open.unwrap(), i));
                    }
                    open = None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Split the group body on top-level commas.
fn split_alternatives(body: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0_i32;
    for c in body.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => alternatives.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    alternatives.push(current);
    alternatives
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(text: &str) -> Vec<String> {
        expand_braces(&Word::literal(text))
            .iter()
            .map(|w| {
                w.parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal { text, .. } => text.clone(),
                        _ => String::new(),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_simple_group() {
        assert_eq!(expand("a{b,c}d"), vec!["abd", "acd"]);
    }

    #[test]
    fn test_multiple_groups() {
        assert_eq!(expand("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_nested_groups() {
        assert_eq!(expand("{a,b{1,2}}"), vec!["a", "b1", "b2"]);
    }

    #[test]
    fn test_empty_alternative() {
        assert_eq!(expand("x{,y}"), vec!["x", "xy"]);
    }

    #[test]
    fn test_no_comma_stays_literal() {
        assert_eq!(expand("a{bc}d"), vec!["a{bc}d"]);
        assert_eq!(expand("{}"), vec!["{}"]);
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(expand("plain"), vec!["plain"]);
    }

    #[test]
    fn test_quoted_braces_not_expanded() {
        let word = Word {
            parts: vec![WordPart::Literal {
                text: "a{b,c}d".to_string(),
                quoting: Quoting::Single,
            }],
        };
        assert_eq!(expand_braces(&word).len(), 1);
    }
}
