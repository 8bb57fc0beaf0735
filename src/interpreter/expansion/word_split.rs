//! Word Splitting
//!
//! IFS field splitting over expansion fragments. Only unquoted expansion
//! results split; quoted fragments join adjacent fields and can anchor an
//! empty field. Runs of IFS characters collapse into single boundaries,
//! and empty unquoted expansions contribute nothing.

/// A piece of expanded text flowing toward field splitting. Only
/// expansion results are splittable; literal source text never is, even
/// under a custom IFS.
#[derive(Debug, Clone, PartialEq)]
pub enum Frag {
    Text {
        text: String,
        /// Came from quoted context: joins fields and can anchor an
        /// empty one
        quoted: bool,
        /// Unquoted expansion result, subject to IFS splitting
        splittable: bool,
    },
    /// Hard field boundary (between `"$@"` positionals)
    Sep,
}

/// Split fragments into argv fields using the given IFS characters.
pub fn split_fields(frags: &[Frag], ifs: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    // `Some` means a field is open, even when still empty (anchored by a
    // quoted fragment).
    let mut current: Option<String> = None;

    for frag in frags {
        match frag {
            Frag::Sep => {
                fields.push(current.take().unwrap_or_default());
            }
            Frag::Text { text, quoted: true, .. } => {
                current.get_or_insert_with(String::new).push_str(text);
            }
            Frag::Text {
                text,
                splittable: false,
                ..
            } => {
                if !text.is_empty() {
                    current.get_or_insert_with(String::new).push_str(text);
                }
            }
            Frag::Text { text, .. } => {
                if ifs.is_empty() {
                    if !text.is_empty() {
                        current.get_or_insert_with(String::new).push_str(text);
                    }
                    continue;
                }
                let (leading, tokens, trailing) = split_by_ifs(text, ifs);
                if leading {
                    if let Some(field) = current.take() {
                        fields.push(field);
                    }
                }
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        if let Some(field) = current.take() {
                            fields.push(field);
                        }
                    }
                    current.get_or_insert_with(String::new).push_str(token);
                }
                if trailing {
                    if let Some(field) = current.take() {
                        fields.push(field);
                    }
                }
            }
        }
    }

    if let Some(field) = current {
        fields.push(field);
    }
    fields
}

/// Split on IFS runs, reporting whether the text began/ended with a
/// delimiter.
fn split_by_ifs(text: &str, ifs: &str) -> (bool, Vec<String>, bool) {
    let is_delim = |c: char| ifs.contains(c);
    let leading = text.chars().next().map(is_delim).unwrap_or(false);
    let trailing = text.chars().last().map(is_delim).unwrap_or(false);
    let tokens = text
        .split(is_delim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    (leading, tokens, trailing)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IFS: &str = " \t\n";

    /// An unquoted expansion result (splittable).
    fn text(s: &str) -> Frag {
        Frag::Text {
            text: s.to_string(),
            quoted: false,
            splittable: true,
        }
    }

    fn quoted(s: &str) -> Frag {
        Frag::Text {
            text: s.to_string(),
            quoted: true,
            splittable: false,
        }
    }

    fn literal(s: &str) -> Frag {
        Frag::Text {
            text: s.to_string(),
            quoted: false,
            splittable: false,
        }
    }

    #[test]
    fn test_plain_split() {
        assert_eq!(split_fields(&[text("a b  c")], IFS), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_leading_trailing_collapse() {
        assert_eq!(split_fields(&[text("  a b ")], IFS), vec!["a", "b"]);
    }

    #[test]
    fn test_quoted_never_splits() {
        assert_eq!(split_fields(&[quoted("a b c")], IFS), vec!["a b c"]);
    }

    #[test]
    fn test_empty_unquoted_contributes_nothing() {
        assert_eq!(split_fields(&[text("")], IFS), Vec::<String>::new());
    }

    #[test]
    fn test_empty_quoted_anchors_field() {
        assert_eq!(split_fields(&[quoted("")], IFS), vec![""]);
    }

    #[test]
    fn test_mixed_joins_adjacent() {
        // x$a with a="1 2": unquoted split joins its first token to "x".
        assert_eq!(
            split_fields(&[text("x"), text("1 2")], IFS),
            vec!["x1", "2"]
        );
        // Quoted tail joins the last field.
        assert_eq!(
            split_fields(&[text("1 2"), quoted("3 4")], IFS),
            vec!["1", "23 4"]
        );
    }

    #[test]
    fn test_separators() {
        assert_eq!(
            split_fields(&[quoted("a"), Frag::Sep, quoted("b")], IFS),
            vec!["a", "b"]
        );
        // An empty positional still yields a field under "$@".
        assert_eq!(
            split_fields(&[quoted(""), Frag::Sep, quoted("x")], IFS),
            vec!["", "x"]
        );
    }

    #[test]
    fn test_custom_ifs() {
        assert_eq!(split_fields(&[text("a:b:c")], ":"), vec!["a", "b", "c"]);
        // Literal source text never splits, whatever IFS says.
        assert_eq!(split_fields(&[literal("a:b:c")], ":"), vec!["a:b:c"]);
    }

    #[test]
    fn test_trailing_delimiter_then_quoted() {
        // "a " then quoted "b" → two fields.
        assert_eq!(
            split_fields(&[text("a "), quoted("b")], IFS),
            vec!["a", "b"]
        );
    }
}
