//! AST Types
//!
//! The complete node set for the POSIX-subset grammar: scripts, and-or
//! lists, pipelines, compound commands, redirections, and words. Words
//! keep their quoting context part-by-part so the expander can apply
//! splitting and globbing rules correctly.

use std::fmt;

// =============================================================================
// POSITIONS
// =============================================================================

/// Source position for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// SCRIPT & LISTS
// =============================================================================

/// Root node: a complete script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub lists: Vec<List>,
}

/// Pipelines joined by `&&` / `||`, optionally backgrounded with `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub entries: Vec<ListEntry>,
    pub background: bool,
}

/// One pipeline in a list, with the connector that precedes it. The
/// first entry always carries `Connector::None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub connector: Connector,
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    None,
    /// `&&` — run only if the previous pipeline succeeded
    AndIf,
    /// `||` — run only if the previous pipeline failed
    OrIf,
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// `cmd1 | cmd2 | cmd3`, optionally negated with `!`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub negated: bool,
    pub commands: Vec<CompoundCommand>,
}

/// Union of all command forms.
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommand {
    Simple(SimpleCommand),
    If(IfCommand),
    For(ForCommand),
    While(WhileCommand),
    Until(UntilCommand),
    Case(CaseCommand),
    FunctionDef(FunctionDef),
    Group(GroupCommand),
}

/// `name args... <redirections>`, with optional leading assignments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommand {
    /// `VAR=value` prefixes
    pub assignments: Vec<(String, Word)>,
    pub words: Vec<Word>,
    pub redirections: Vec<Redirection>,
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// `if … then … [elif … then …] [else …] fi`
#[derive(Debug, Clone, PartialEq)]
pub struct IfCommand {
    /// `if`/`elif` arms in source order
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<List>>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: Vec<List>,
    pub body: Vec<List>,
}

/// `for VAR [in words]; do …; done`. `words == None` iterates `"$@"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForCommand {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<List>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileCommand {
    pub condition: Vec<List>,
    pub body: Vec<List>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UntilCommand {
    pub condition: Vec<List>,
    pub body: Vec<List>,
    pub redirections: Vec<Redirection>,
}

/// `case WORD in pattern) …;; esac`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseCommand {
    pub word: Word,
    pub arms: Vec<CaseArm>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub patterns: Vec<Word>,
    pub body: Vec<List>,
}

/// `name() command`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<CompoundCommand>,
}

/// `{ …; }` with redirections scoped to every command inside.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCommand {
    pub body: Vec<List>,
    pub redirections: Vec<Redirection>,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirOp {
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `<`
    In,
    /// `2>`
    Err,
    /// `2>>`
    ErrAppend,
    /// `&>`
    All,
}

impl fmt::Display for RedirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Out => write!(f, ">"),
            Self::Append => write!(f, ">>"),
            Self::In => write!(f, "<"),
            Self::Err => write!(f, "2>"),
            Self::ErrAppend => write!(f, "2>>"),
            Self::All => write!(f, "&>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirTarget {
    /// Target path, expanded at execution time
    Word(Word),
    /// Collected here-document body
    HereDoc {
        body: String,
        /// `<<-` strips leading tabs
        strip_tabs: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub operator: RedirOp,
    pub target: RedirTarget,
    /// Explicit descriptor, when one was written (`2>` sets it to 2)
    pub fd_hint: Option<u8>,
}

// =============================================================================
// WORDS
// =============================================================================

/// Quoting context a word part was lexed inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    #[default]
    None,
    Single,
    Double,
    /// `$'…'`
    AnsiC,
}

impl Quoting {
    /// Quoted parts are exempt from word splitting and globbing.
    pub fn is_quoted(self) -> bool {
        !matches!(self, Quoting::None)
    }
}

/// A shell word: an ordered sequence of parts that expand and join into
/// one or more argv strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            parts: vec![WordPart::Literal {
                text: text.into(),
                quoting: Quoting::None,
            }],
        }
    }

    /// The word's text if it is a single unquoted literal.
    pub fn as_bare_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [WordPart::Literal {
                text,
                quoting: Quoting::None,
            }] => Some(text),
            _ => None,
        }
    }

    /// True when no part can expand or glob (all literal, however quoted).
    pub fn is_static(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, WordPart::Literal { .. }))
    }
}

/// One part of a word, tagged with its quoting context.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    Literal {
        text: String,
        quoting: Quoting,
    },
    /// `$name` / `${name…}`; the modifier is the raw text after the name
    /// (e.g. `:-default`, `##*/`), interpreted by the expander
    Param {
        name: String,
        modifier: Option<String>,
        quoted: bool,
    },
    /// `$((expr))`
    Arith { expr: String, quoted: bool },
    /// `$(source)` or backticks
    CommandSub { source: String, quoted: bool },
}

impl WordPart {
    pub fn is_quoted(&self) -> bool {
        match self {
            WordPart::Literal { quoting, .. } => quoting.is_quoted(),
            WordPart::Param { quoted, .. }
            | WordPart::Arith { quoted, .. }
            | WordPart::CommandSub { quoted, .. } => *quoted,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
