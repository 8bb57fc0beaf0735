//! Word Expansion
//!
//! Turns AST words into argv strings, in the mandated order: brace
//! expansion, tilde, parameter expansion, arithmetic, command
//! substitution, IFS word splitting, pathname expansion, quote removal.
//!
//! Internally everything flows as "pattern-encoded" fragments: text that
//! must match literally (quoted context, expansion results) carries
//! backslash escapes in front of glob metacharacters, while unquoted
//! source text keeps its metacharacters active. The final steps either
//! glob-match the encoded field or strip the escapes (quote removal).

pub mod brace;
pub mod glob_expand;
pub mod parameter;
pub mod pattern;
pub mod tilde;
pub mod word_split;

use std::sync::Arc;

use async_recursion::async_recursion;
use tokio_util::sync::CancellationToken;

use crate::ast::types::{Word, WordPart};
use crate::exec::context::OutputStream;
use crate::interpreter::arithmetic::eval_arith;
use crate::interpreter::errors::ExpandError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::state::ShellState;
use word_split::Frag;

/// One expansion pass over words, borrowing the interpreter (for command
/// substitution) and the mutable shell state. The stderr handle lets a
/// substitution's own error output pass through to the surrounding
/// command's stderr.
pub struct Expander<'a> {
    pub interp: &'a Interpreter,
    pub state: &'a mut ShellState,
    pub cancel: &'a CancellationToken,
    pub stderr: Arc<dyn OutputStream>,
}

impl<'a> Expander<'a> {
    pub fn new(
        interp: &'a Interpreter,
        state: &'a mut ShellState,
        cancel: &'a CancellationToken,
        stderr: Arc<dyn OutputStream>,
    ) -> Self {
        Self {
            interp,
            state,
            cancel,
            stderr,
        }
    }

    /// Full expansion of command words into argv strings.
    pub async fn expand_words(&mut self, words: &[Word]) -> Result<Vec<String>, ExpandError> {
        let mut argv = Vec::new();
        for word in words {
            for braced in brace::expand_braces(word) {
                let braced = tilde::expand_tilde(braced, self.state);
                let mut frags = Vec::new();
                self.parts_to_frags(&braced.parts, &mut frags).await?;
                let ifs = self.state.ifs();
                for field in word_split::split_fields(&frags, &ifs) {
                    let vfs = self.interp.vfs();
                    argv.extend(glob_expand::expand_glob_field(&vfs, &self.state.cwd, &field).await);
                }
            }
        }
        Ok(argv)
    }

    /// Expand a word to a single string: no splitting, no globbing.
    /// Used for redirection targets, assignment values, and `case` words.
    pub async fn expand_word_text(&mut self, word: &Word) -> Result<String, ExpandError> {
        let word = tilde::expand_tilde(word.clone(), self.state);
        let mut frags = Vec::new();
        self.parts_to_frags(&word.parts, &mut frags).await?;
        Ok(pattern::glob_unescape(&join_frags(&frags)))
    }

    /// Expand a word keeping glob metacharacters active (quoted parts
    /// escaped). Used for `case` patterns.
    pub async fn expand_word_pattern(&mut self, word: &Word) -> Result<String, ExpandError> {
        let mut frags = Vec::new();
        self.parts_to_frags(&word.parts, &mut frags).await?;
        Ok(join_frags(&frags))
    }

    /// Expand every part into pattern-encoded fragments.
    #[async_recursion]
    pub(crate) async fn parts_to_frags(
        &mut self,
        parts: &[WordPart],
        out: &mut Vec<Frag>,
    ) -> Result<(), ExpandError> {
        for part in parts {
            match part {
                WordPart::Literal { text, quoting } => {
                    if quoting.is_quoted() {
                        out.push(Frag::Text {
                            text: pattern::glob_escape(text),
                            quoted: true,
                            splittable: false,
                        });
                    } else {
                        // Source text: glob chars stay active, but only
                        // expansion results are subject to splitting.
                        out.push(Frag::Text {
                            text: text.clone(),
                            quoted: false,
                            splittable: false,
                        });
                    }
                }
                WordPart::Param {
                    name,
                    modifier,
                    quoted,
                } => {
                    self.resolve_param(name, modifier.as_deref(), *quoted, out)
                        .await?;
                }
                WordPart::Arith { expr, quoted } => {
                    let value = eval_arith(expr, self.state)?;
                    out.push(encode_result(&value.to_string(), *quoted));
                }
                WordPart::CommandSub { source, quoted } => {
                    let output = self.command_substitution(source).await?;
                    out.push(encode_result(&output, *quoted));
                }
            }
        }
        Ok(())
    }

    /// Run `source` in a sub-interpreter over a cloned state, capture its
    /// stdout, strip trailing newlines, and record its exit in `$?`.
    pub(crate) async fn command_substitution(
        &mut self,
        source: &str,
    ) -> Result<String, ExpandError> {
        let (output, code) = self
            .interp
            .run_substitution(self.state, source, self.cancel, self.stderr.clone())
            .await?;
        self.state.last_exit_code = code;
        Ok(output.trim_end_matches('\n').to_string())
    }
}

/// Encode an expansion result: quoted results match literally everywhere;
/// unquoted results split on IFS and keep glob chars active, with their
/// backslashes protected from quote removal.
pub(crate) fn encode_result(text: &str, quoted: bool) -> Frag {
    if quoted {
        Frag::Text {
            text: pattern::glob_escape(text),
            quoted: true,
            splittable: false,
        }
    } else {
        Frag::Text {
            text: escape_backslashes(text),
            quoted: false,
            splittable: true,
        }
    }
}

fn escape_backslashes(text: &str) -> String {
    text.replace('\\', "\\\\")
}

/// Concatenate fragments; `"$@"` separators join with a space.
fn join_frags(frags: &[Frag]) -> String {
    let mut out = String::new();
    for frag in frags {
        match frag {
            Frag::Text { text, .. } => out.push_str(text),
            Frag::Sep => out.push(' '),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
