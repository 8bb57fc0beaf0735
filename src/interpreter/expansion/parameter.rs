//! Parameter Expansion
//!
//! Resolution of `$name` / `${name…}` including the modifier family:
//! defaults (`:-` `:=` `:+` `:?`), length (`#`), substrings, prefix and
//! suffix stripping (`#` `##` `%` `%%`), and pattern replacement (`/`
//! `//`). Modifier operands are themselves expanded, so defaults and
//! patterns can reference variables and substitutions.

use crate::interpreter::errors::ExpandError;
use crate::interpreter::expansion::word_split::Frag;
use crate::interpreter::expansion::{encode_result, pattern, Expander};
use crate::parser::lexer::lex_embedded_parts;

impl<'a> Expander<'a> {
    /// Resolve one parameter part into fragments.
    pub(crate) async fn resolve_param(
        &mut self,
        name: &str,
        modifier: Option<&str>,
        quoted: bool,
        out: &mut Vec<Frag>,
    ) -> Result<(), ExpandError> {
        // `$@` / `$*` produce multiple fields.
        if name == "@" || name == "*" {
            return self.resolve_positional_list(name, quoted, out);
        }

        let base = self.param_base_value(name);
        let value = match modifier {
            None => base.unwrap_or_default(),
            Some("#") => base.unwrap_or_default().chars().count().to_string(),
            Some(modifier) => match self.apply_modifier(name, base, modifier).await? {
                Some(value) => value,
                None => return Ok(()),
            },
        };
        out.push(encode_result(&value, quoted));
        Ok(())
    }

    fn resolve_positional_list(
        &mut self,
        name: &str,
        quoted: bool,
        out: &mut Vec<Frag>,
    ) -> Result<(), ExpandError> {
        let positionals = self.state.positional_params.clone();
        if name == "*" && quoted {
            // "$*": one field, joined on the first IFS character.
            let sep = self.state.ifs().chars().next().unwrap_or(' ').to_string();
            out.push(encode_result(&positionals.join(&sep), true));
            return Ok(());
        }
        for (i, positional) in positionals.iter().enumerate() {
            if i > 0 {
                out.push(Frag::Sep);
            }
            out.push(encode_result(positional, quoted));
        }
        Ok(())
    }

    /// Plain value of a parameter, before modifiers. `None` = unset.
    fn param_base_value(&self, name: &str) -> Option<String> {
        match name {
            "?" => Some(self.state.last_exit_code.to_string()),
            "#" => Some(self.state.positional_params.len().to_string()),
            "$" => Some(self.state.shell_pid().to_string()),
            "!" => self.state.last_background_pid.map(|pid| pid.to_string()),
            "0" => Some(self.state.shell_name.clone()),
            _ => {
                if let Ok(n) = name.parse::<usize>() {
                    return self.state.positional_params.get(n - 1).cloned();
                }
                self.state.get_env(name).map(str::to_string)
            }
        }
    }

    /// Apply a `${name<modifier>}` operator. `Ok(None)` means the
    /// expansion contributes nothing (`:+` on an unset variable).
    async fn apply_modifier(
        &mut self,
        name: &str,
        base: Option<String>,
        modifier: &str,
    ) -> Result<Option<String>, ExpandError> {
        let set_and_nonempty = base.as_deref().map(|v| !v.is_empty()).unwrap_or(false);

        if let Some(rest) = modifier.strip_prefix(":-") {
            return if set_and_nonempty {
                Ok(base)
            } else {
                Ok(Some(self.expand_operand_text(rest).await?))
            };
        }
        if let Some(rest) = modifier.strip_prefix(":=") {
            if set_and_nonempty {
                return Ok(base);
            }
            let value = self.expand_operand_text(rest).await?;
            self.state.set_env(name, value.clone());
            return Ok(Some(value));
        }
        if let Some(rest) = modifier.strip_prefix(":+") {
            return if set_and_nonempty {
                Ok(Some(self.expand_operand_text(rest).await?))
            } else {
                Ok(None)
            };
        }
        if let Some(rest) = modifier.strip_prefix(":?") {
            if set_and_nonempty {
                return Ok(base);
            }
            let message = if rest.is_empty() {
                "parameter null or not set".to_string()
            } else {
                self.expand_operand_text(rest).await?
            };
            return Err(ExpandError::new(format!("{}: {}", name, message)));
        }

        if let Some(rest) = modifier.strip_prefix("##") {
            let pat = self.expand_operand_pattern(rest).await?;
            return Ok(Some(pattern::strip_prefix_match(
                &base.unwrap_or_default(),
                &pat,
                true,
            )));
        }
        if let Some(rest) = modifier.strip_prefix('#') {
            let pat = self.expand_operand_pattern(rest).await?;
            return Ok(Some(pattern::strip_prefix_match(
                &base.unwrap_or_default(),
                &pat,
                false,
            )));
        }
        if let Some(rest) = modifier.strip_prefix("%%") {
            let pat = self.expand_operand_pattern(rest).await?;
            return Ok(Some(pattern::strip_suffix_match(
                &base.unwrap_or_default(),
                &pat,
                true,
            )));
        }
        if let Some(rest) = modifier.strip_prefix('%') {
            let pat = self.expand_operand_pattern(rest).await?;
            return Ok(Some(pattern::strip_suffix_match(
                &base.unwrap_or_default(),
                &pat,
                false,
            )));
        }

        if let Some(rest) = modifier.strip_prefix("//") {
            let (pat, rep) = self.split_replacement(rest).await?;
            return Ok(Some(pattern::replace_match(
                &base.unwrap_or_default(),
                &pat,
                &rep,
                true,
            )));
        }
        if let Some(rest) = modifier.strip_prefix('/') {
            let (pat, rep) = self.split_replacement(rest).await?;
            return Ok(Some(pattern::replace_match(
                &base.unwrap_or_default(),
                &pat,
                &rep,
                false,
            )));
        }

        if let Some(rest) = modifier.strip_prefix(':') {
            return Ok(Some(self.substring(&base.unwrap_or_default(), rest)?));
        }

        Err(ExpandError::new(format!(
            "${{{}{}}}: bad substitution",
            name, modifier
        )))
    }

    /// `${VAR:off[:len]}`. Offsets are arithmetic expressions; a negative
    /// offset counts back from the end.
    fn substring(&mut self, value: &str, spec: &str) -> Result<String, ExpandError> {
        let (off_expr, len_expr) = match split_top_level_colon(spec) {
            Some((off, len)) => (off, Some(len)),
            None => (spec, None),
        };

        let chars: Vec<char> = value.chars().collect();
        let offset = crate::interpreter::arithmetic::eval_arith(off_expr, self.state)?;
        let start = if offset < 0 {
            chars.len().saturating_sub(offset.unsigned_abs() as usize)
        } else {
            (offset as usize).min(chars.len())
        };

        let end = match len_expr {
            None => chars.len(),
            Some(expr) => {
                let len = crate::interpreter::arithmetic::eval_arith(expr, self.state)?;
                if len < 0 {
                    return Err(ExpandError::new(format!("{}: substring expression < 0", spec)));
                }
                (start + len as usize).min(chars.len())
            }
        };
        Ok(chars[start..end].iter().collect())
    }

    /// `pat/rep` split at the first unescaped `/`.
    async fn split_replacement(&mut self, rest: &str) -> Result<(String, String), ExpandError> {
        let chars: Vec<char> = rest.chars().collect();
        let mut i = 0;
        let mut split_at = None;
        while i < chars.len() {
            match chars[i] {
                '\\' => i += 2,
                '/' => {
                    split_at = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        let (pat_text, rep_text) = match split_at {
            Some(at) => (
                chars[..at].iter().collect::<String>(),
                chars[at + 1..].iter().collect::<String>(),
            ),
            None => (rest.to_string(), String::new()),
        };
        let pat = self.expand_operand_pattern(&pat_text).await?;
        let rep = self.expand_operand_text(&rep_text).await?;
        Ok((pat, rep))
    }

    /// Expand modifier operand text to a plain string.
    async fn expand_operand_text(&mut self, text: &str) -> Result<String, ExpandError> {
        let parts = lex_embedded_parts(text).map_err(|e| ExpandError::new(e.message))?;
        let mut frags = Vec::new();
        self.parts_to_frags(&parts, &mut frags).await?;
        let joined: String = frags
            .iter()
            .map(|f| match f {
                Frag::Text { text, .. } => text.as_str(),
                Frag::Sep => " ",
            })
            .collect();
        Ok(pattern::glob_unescape(&joined))
    }

    /// Expand modifier operand text keeping glob metacharacters active.
    async fn expand_operand_pattern(&mut self, text: &str) -> Result<String, ExpandError> {
        let parts = lex_embedded_parts(text).map_err(|e| ExpandError::new(e.message))?;
        let mut frags = Vec::new();
        self.parts_to_frags(&parts, &mut frags).await?;
        Ok(frags
            .iter()
            .map(|f| match f {
                Frag::Text { text, .. } => text.as_str(),
                Frag::Sep => " ",
            })
            .collect())
    }
}

/// Split `a:b` at the first top-level colon.
fn split_top_level_colon(spec: &str) -> Option<(&str, &str)> {
    spec.find(':').map(|at| (&spec[..at], &spec[at + 1..]))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interpreter::interpreter::Interpreter;
    use crate::interpreter::state::ShellState;
    use tokio_util::sync::CancellationToken;

    async fn expand(state: &mut ShellState, source: &str) -> String {
        let interp = Interpreter::for_tests();
        let cancel = CancellationToken::new();
        let stderr = std::sync::Arc::new(crate::exec::context::BufferedWriter::new());
        let mut expander =
            crate::interpreter::expansion::Expander::new(&interp, state, &cancel, stderr);
        let word = match crate::parser::parse(&format!("x {}", source)) {
            Ok(script) => match &script.lists[0].entries[0].pipeline.commands[0] {
                crate::ast::types::CompoundCommand::Simple(cmd) => cmd.words[1].clone(),
                _ => panic!("expected simple command"),
            },
            Err(e) => panic!("parse failed: {}", e),
        };
        expander.expand_word_text(&word).await.unwrap()
    }

    #[tokio::test]
    async fn test_plain_and_unset() {
        let mut state = ShellState::default();
        state.set_env("NAME", "world");
        assert_eq!(expand(&mut state, "${NAME}").await, "world");
        assert_eq!(expand(&mut state, "${MISSING}").await, "");
    }

    #[tokio::test]
    async fn test_length() {
        let mut state = ShellState::default();
        state.set_env("FILE", "image.tar.gz");
        assert_eq!(expand(&mut state, "${#FILE}").await, "12");
    }

    #[tokio::test]
    async fn test_default_family() {
        let mut state = ShellState::default();
        state.set_env("SET", "value");
        state.set_env("EMPTY", "");

        assert_eq!(expand(&mut state, "${SET:-fallback}").await, "value");
        assert_eq!(expand(&mut state, "${EMPTY:-fallback}").await, "fallback");
        assert_eq!(expand(&mut state, "${MISSING:-fallback}").await, "fallback");

        assert_eq!(expand(&mut state, "${SET:+alt}").await, "alt");
        assert_eq!(expand(&mut state, "${MISSING:+alt}").await, "");

        assert_eq!(expand(&mut state, "${ASSIGNED:=given}").await, "given");
        assert_eq!(state.get_env("ASSIGNED"), Some("given"));
    }

    #[tokio::test]
    async fn test_default_expands_variables() {
        let mut state = ShellState::default();
        state.set_env("HOME", "/home/user");
        assert_eq!(expand(&mut state, "${MISSING:-$HOME/x}").await, "/home/user/x");
    }

    #[tokio::test]
    async fn test_error_if_unset() {
        let mut state = ShellState::default();
        let interp = Interpreter::for_tests();
        let cancel = CancellationToken::new();
        let stderr = std::sync::Arc::new(crate::exec::context::BufferedWriter::new());
        let mut expander =
            crate::interpreter::expansion::Expander::new(&interp, &mut state, &cancel, stderr);
        let word = crate::ast::types::Word {
            parts: vec![crate::ast::types::WordPart::Param {
                name: "GONE".to_string(),
                modifier: Some(":?not configured".to_string()),
                quoted: false,
            }],
        };
        let err = expander.expand_word_text(&word).await.unwrap_err();
        assert!(err.message.contains("GONE"));
        assert!(err.message.contains("not configured"));
    }

    #[tokio::test]
    async fn test_prefix_suffix_strip() {
        let mut state = ShellState::default();
        state.set_env("FILE", "image.tar.gz");
        assert_eq!(expand(&mut state, "${FILE%%.*}").await, "image");
        assert_eq!(expand(&mut state, "${FILE%.*}").await, "image.tar");
        assert_eq!(expand(&mut state, "${FILE##*.}").await, "gz");
        assert_eq!(expand(&mut state, "${FILE#*.}").await, "tar.gz");
    }

    #[tokio::test]
    async fn test_replacement() {
        let mut state = ShellState::default();
        state.set_env("PATHISH", "a:b:c");
        assert_eq!(expand(&mut state, "${PATHISH/:/-}").await, "a-b:c");
        assert_eq!(expand(&mut state, "${PATHISH//:/-}").await, "a-b-c");
    }

    #[tokio::test]
    async fn test_substring() {
        let mut state = ShellState::default();
        state.set_env("STR", "abcdefgh");
        assert_eq!(expand(&mut state, "${STR:2}").await, "cdefgh");
        assert_eq!(expand(&mut state, "${STR:2:3}").await, "cde");
        assert_eq!(expand(&mut state, "${STR: -3}").await, "fgh");
        assert_eq!(expand(&mut state, "${STR:0:99}").await, "abcdefgh");
    }

    #[tokio::test]
    async fn test_special_params() {
        let mut state = ShellState::default();
        state.last_exit_code = 42;
        state.positional_params = vec!["one".to_string(), "two".to_string()];
        state.shell_name = "vosh".to_string();

        assert_eq!(expand(&mut state, "$?").await, "42");
        assert_eq!(expand(&mut state, "$#").await, "2");
        assert_eq!(expand(&mut state, "$1").await, "one");
        assert_eq!(expand(&mut state, "$2").await, "two");
        assert_eq!(expand(&mut state, "$0").await, "vosh");
        assert_eq!(expand(&mut state, "$$").await, "1");
    }
}
