//! Lexer
//!
//! Tokenises shell source into a stream the parser consumes. Handles
//! operators, quoting (single, double, ANSI-C), `$`-substitution capture,
//! comments, and here-documents. Substitution bodies are captured as raw
//! substrings; interpreting them is the expander's job.

use crate::ast::types::{Position, Quoting, WordPart};
use thiserror::Error;

/// Token variants. Every token carries its source position.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Word(Vec<WordPart>),
    /// `|`
    Pipe,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;`
    Semi,
    /// `;;`
    DoubleSemi,
    /// `&`
    Amp,
    LParen,
    RParen,
    Newline,
    /// `>`
    RedirectOut,
    /// `>>`
    RedirectAppend,
    /// `<`
    RedirectIn,
    /// `2>`
    RedirectErr,
    /// `2>>`
    RedirectErrAppend,
    /// `&>`
    RedirectAll,
    /// `<<` / `<<-`; the body is collected when the line ends
    Heredoc {
        delimiter: String,
        strip_tabs: bool,
        body: String,
    },
    Eof,
}

impl TokenKind {
    /// Short name for parse-error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Word(_) => "word".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Semi => "';'".to_string(),
            TokenKind::DoubleSemi => "';;'".to_string(),
            TokenKind::Amp => "'&'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::RedirectOut => "'>'".to_string(),
            TokenKind::RedirectAppend => "'>>'".to_string(),
            TokenKind::RedirectIn => "'<'".to_string(),
            TokenKind::RedirectErr => "'2>'".to_string(),
            TokenKind::RedirectErrAppend => "'2>>'".to_string(),
            TokenKind::RedirectAll => "'&>'".to_string(),
            TokenKind::Heredoc { .. } => "here-document".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

#[derive(Error, Debug, Clone)]
#[error("line {}: {message}", .pos.line)]
pub struct LexError {
    pub message: String,
    pub pos: Position,
}

impl LexError {
    fn new(message: impl Into<String>, pos: Position) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// Tokenise a complete source string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

/// Lex embedded text (a `${…}` modifier value) into word parts. Operators
/// and whitespace have no special meaning here; quotes and
/// `$`-substitutions do.
pub fn lex_embedded_parts(text: &str) -> Result<Vec<WordPart>, LexError> {
    let mut lexer = Lexer::new(text);
    let mut parts = Vec::new();
    while !lexer.at_end() {
        lexer.word_part(&mut parts, true)?;
    }
    Ok(parts)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    /// Indexes of Heredoc tokens whose body is still owed
    pending_heredocs: Vec<usize>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            self.skip_blanks_and_comments();
            if self.at_end() {
                break;
            }
            let start = self.position();
            let c = self.peek();

            match c {
                '\n' => {
                    self.advance();
                    self.push(TokenKind::Newline, start);
                    self.collect_pending_heredocs()?;
                }
                '|' => {
                    self.advance();
                    if self.peek() == '|' {
                        self.advance();
                        self.push(TokenKind::Or, start);
                    } else {
                        self.push(TokenKind::Pipe, start);
                    }
                }
                '&' => {
                    self.advance();
                    match self.peek() {
                        '&' => {
                            self.advance();
                            self.push(TokenKind::And, start);
                        }
                        '>' => {
                            self.advance();
                            self.push(TokenKind::RedirectAll, start);
                        }
                        _ => self.push(TokenKind::Amp, start),
                    }
                }
                ';' => {
                    self.advance();
                    if self.peek() == ';' {
                        self.advance();
                        self.push(TokenKind::DoubleSemi, start);
                    } else {
                        self.push(TokenKind::Semi, start);
                    }
                }
                '(' => {
                    self.advance();
                    self.push(TokenKind::LParen, start);
                }
                ')' => {
                    self.advance();
                    self.push(TokenKind::RParen, start);
                }
                '>' => {
                    self.advance();
                    if self.peek() == '>' {
                        self.advance();
                        self.push(TokenKind::RedirectAppend, start);
                    } else {
                        self.push(TokenKind::RedirectOut, start);
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == '<' {
                        self.advance();
                        let strip_tabs = self.peek() == '-';
                        if strip_tabs {
                            self.advance();
                        }
                        self.heredoc_operator(strip_tabs, start)?;
                    } else {
                        self.push(TokenKind::RedirectIn, start);
                    }
                }
                '2' if matches!(self.peek_at(1), '>') => {
                    self.advance();
                    self.advance();
                    if self.peek() == '>' {
                        self.advance();
                        self.push(TokenKind::RedirectErrAppend, start);
                    } else {
                        self.push(TokenKind::RedirectErr, start);
                    }
                }
                _ => self.word()?,
            }
        }

        // A final line with no trailing newline still owes its heredocs.
        self.collect_pending_heredocs()?;
        let eof_pos = self.position();
        self.push(TokenKind::Eof, eof_pos);
        Ok(self.tokens)
    }

    // ------------------------------------------------------------------
    // Words
    // ------------------------------------------------------------------

    fn word(&mut self) -> Result<(), LexError> {
        let start = self.position();
        let mut parts: Vec<WordPart> = Vec::new();

        while !self.at_end() {
            let c = self.peek();
            if c.is_ascii_whitespace() || is_operator_start(c) {
                // `2>` splits a word only when the `2` begins it.
                break;
            }
            self.word_part(&mut parts, false)?;
        }

        if parts.is_empty() {
            // A lone escape of a newline produces nothing; skip.
            return Ok(());
        }
        self.push(TokenKind::Word(parts), start);
        Ok(())
    }

    /// One part of a word: a quoted string, a substitution, or a run of
    /// plain characters. With `embedded` set, operator characters and
    /// whitespace are ordinary text (used inside `${…}` modifiers).
    fn word_part(&mut self, parts: &mut Vec<WordPart>, embedded: bool) -> Result<(), LexError> {
        match self.peek() {
            '\'' => {
                let text = self.single_quoted()?;
                parts.push(WordPart::Literal {
                    text,
                    quoting: Quoting::Single,
                });
            }
            '"' => self.double_quoted(parts)?,
            '`' => {
                let source = self.backtick_body()?;
                parts.push(WordPart::CommandSub {
                    source,
                    quoted: false,
                });
            }
            '$' => self.dollar(parts, false)?,
            '\\' => {
                self.advance();
                if self.at_end() {
                    parts.push(WordPart::Literal {
                        text: "\\".to_string(),
                        quoting: Quoting::None,
                    });
                } else {
                    let c = self.advance();
                    if c != '\n' {
                        // An escaped char behaves like a quoted one.
                        parts.push(WordPart::Literal {
                            text: c.to_string(),
                            quoting: Quoting::Single,
                        });
                    }
                }
            }
            _ => {
                let mut text = String::new();
                while !self.at_end() {
                    let c = self.peek();
                    let stop = if embedded {
                        matches!(c, '\'' | '"' | '`' | '$' | '\\')
                    } else {
                        c.is_ascii_whitespace()
                            || is_operator_start(c)
                            || matches!(c, '\'' | '"' | '`' | '$' | '\\')
                    };
                    if stop {
                        break;
                    }
                    text.push(self.advance());
                }
                parts.push(WordPart::Literal {
                    text,
                    quoting: Quoting::None,
                });
            }
        }
        Ok(())
    }

    fn single_quoted(&mut self) -> Result<String, LexError> {
        let start = self.position();
        self.advance(); // opening '
        let mut text = String::new();
        while !self.at_end() {
            let c = self.advance();
            if c == '\'' {
                return Ok(text);
            }
            text.push(c);
        }
        Err(LexError::new("unterminated single quote", start))
    }

    fn double_quoted(&mut self, parts: &mut Vec<WordPart>) -> Result<(), LexError> {
        let start = self.position();
        self.advance(); // opening "
        let mut text = String::new();

        loop {
            if self.at_end() {
                return Err(LexError::new("unterminated double quote", start));
            }
            match self.peek() {
                '"' => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    if self.at_end() {
                        return Err(LexError::new("unterminated double quote", start));
                    }
                    let c = self.advance();
                    match c {
                        '$' | '\\' | '"' | '`' => text.push(c),
                        '\n' => {} // line continuation
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                '$' => {
                    if !text.is_empty() {
                        parts.push(WordPart::Literal {
                            text: std::mem::take(&mut text),
                            quoting: Quoting::Double,
                        });
                    }
                    self.dollar(parts, true)?;
                }
                '`' => {
                    if !text.is_empty() {
                        parts.push(WordPart::Literal {
                            text: std::mem::take(&mut text),
                            quoting: Quoting::Double,
                        });
                    }
                    let source = self.backtick_body()?;
                    parts.push(WordPart::CommandSub {
                        source,
                        quoted: true,
                    });
                }
                _ => text.push(self.advance()),
            }
        }

        // An empty "" still contributes an (empty) quoted literal.
        if !text.is_empty() || parts.is_empty() {
            parts.push(WordPart::Literal {
                text,
                quoting: Quoting::Double,
            });
        }
        Ok(())
    }

    /// ANSI-C `$'…'` body with the escape subset.
    fn ansi_c_quoted(&mut self) -> Result<String, LexError> {
        let start = self.position();
        self.advance(); // $
        self.advance(); // '
        let mut text = String::new();
        while !self.at_end() {
            let c = self.advance();
            match c {
                '\'' => return Ok(text),
                '\\' => {
                    if self.at_end() {
                        break;
                    }
                    let esc = self.advance();
                    match esc {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '\\' => text.push('\\'),
                        '\'' => text.push('\''),
                        'x' => {
                            let mut hex = String::new();
                            while hex.len() < 2 && self.peek().is_ascii_hexdigit() {
                                hex.push(self.advance());
                            }
                            if let Ok(value) = u8::from_str_radix(&hex, 16) {
                                text.push(value as char);
                            }
                        }
                        '0' => {
                            let mut oct = String::new();
                            while oct.len() < 2 && ('0'..='7').contains(&self.peek()) {
                                oct.push(self.advance());
                            }
                            if let Ok(value) = u8::from_str_radix(&oct, 8) {
                                text.push(value as char);
                            } else {
                                text.push('\0');
                            }
                        }
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                _ => text.push(c),
            }
        }
        Err(LexError::new("unterminated $'…' quote", start))
    }

    // ------------------------------------------------------------------
    // Substitutions
    // ------------------------------------------------------------------

    fn dollar(&mut self, parts: &mut Vec<WordPart>, quoted: bool) -> Result<(), LexError> {
        let start = self.position();
        match self.peek_at(1) {
            '\'' if !quoted => {
                let text = self.ansi_c_quoted()?;
                parts.push(WordPart::Literal {
                    text,
                    quoting: Quoting::AnsiC,
                });
            }
            '(' if matches!(self.peek_at(2), '(') => {
                let expr = self.arith_body(start)?;
                parts.push(WordPart::Arith { expr, quoted });
            }
            '(' => {
                let source = self.command_sub_body(start)?;
                parts.push(WordPart::CommandSub { source, quoted });
            }
            '{' => {
                let (name, modifier) = self.braced_param(start)?;
                parts.push(WordPart::Param {
                    name,
                    modifier,
                    quoted,
                });
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                self.advance(); // $
                let mut name = String::new();
                while self.peek() == '_' || self.peek().is_ascii_alphanumeric() {
                    name.push(self.advance());
                }
                parts.push(WordPart::Param {
                    name,
                    modifier: None,
                    quoted,
                });
            }
            c if is_special_param(c) => {
                self.advance(); // $
                let name = self.advance().to_string();
                parts.push(WordPart::Param {
                    name,
                    modifier: None,
                    quoted,
                });
            }
            _ => {
                // A bare `$` is literal.
                self.advance();
                parts.push(WordPart::Literal {
                    text: "$".to_string(),
                    quoting: if quoted { Quoting::Double } else { Quoting::None },
                });
            }
        }
        Ok(())
    }

    /// `${name…}` → (name, raw modifier text).
    fn braced_param(&mut self, start: Position) -> Result<(String, Option<String>), LexError> {
        self.advance(); // $
        self.advance(); // {

        let mut name = String::new();
        if self.peek() == '#' && self.peek_at(1) != '}' {
            // Length form: ${#VAR}
            self.advance();
            while self.peek() == '_' || self.peek().is_ascii_alphanumeric() {
                name.push(self.advance());
            }
            if self.peek() != '}' {
                return Err(LexError::new("bad substitution", start));
            }
            self.advance();
            return Ok((name, Some("#".to_string())));
        }

        if is_special_param(self.peek()) {
            name.push(self.advance());
        } else {
            while self.peek() == '_' || self.peek().is_ascii_alphanumeric() {
                name.push(self.advance());
            }
        }
        if name.is_empty() {
            return Err(LexError::new("bad substitution", start));
        }

        if self.peek() == '}' {
            self.advance();
            return Ok((name, None));
        }

        // Raw modifier: everything up to the matching close brace.
        let mut modifier = String::new();
        let mut depth = 1;
        while !self.at_end() {
            let c = self.peek();
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok((name, Some(modifier)));
                    }
                }
                '\'' => {
                    modifier.push('\'');
                    self.advance();
                    while !self.at_end() && self.peek() != '\'' {
                        modifier.push(self.advance());
                    }
                    if self.at_end() {
                        return Err(LexError::new("unterminated parameter expansion", start));
                    }
                }
                _ => {}
            }
            modifier.push(self.advance());
        }
        Err(LexError::new("unterminated parameter expansion", start))
    }

    /// `$((…))` body, tracking paren depth.
    fn arith_body(&mut self, start: Position) -> Result<String, LexError> {
        self.advance(); // $
        self.advance(); // (
        self.advance(); // (
        let mut expr = String::new();
        let mut depth = 2;
        while !self.at_end() {
            let c = self.advance();
            match c {
                '(' => {
                    depth += 1;
                    expr.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        // The final two closers are consumed; drop the
                        // inner one already pushed.
                        expr.pop();
                        return Ok(expr);
                    }
                    expr.push(c);
                }
                _ => expr.push(c),
            }
        }
        Err(LexError::new("unterminated arithmetic expansion", start))
    }

    /// `$(…)` body, tracking nesting and quotes.
    fn command_sub_body(&mut self, start: Position) -> Result<String, LexError> {
        self.advance(); // $
        self.advance(); // (
        let mut source = String::new();
        let mut depth = 1;
        while !self.at_end() {
            let c = self.advance();
            match c {
                '(' => {
                    depth += 1;
                    source.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(source);
                    }
                    source.push(c);
                }
                '\'' => {
                    source.push(c);
                    while !self.at_end() {
                        let inner = self.advance();
                        source.push(inner);
                        if inner == '\'' {
                            break;
                        }
                    }
                }
                '"' => {
                    source.push(c);
                    while !self.at_end() {
                        let inner = self.advance();
                        source.push(inner);
                        if inner == '\\' && !self.at_end() {
                            source.push(self.advance());
                        } else if inner == '"' {
                            break;
                        }
                    }
                }
                _ => source.push(c),
            }
        }
        Err(LexError::new("unterminated command substitution", start))
    }

    /// `` `…` `` body; `\` escapes the next char.
    fn backtick_body(&mut self) -> Result<String, LexError> {
        let start = self.position();
        self.advance(); // `
        let mut source = String::new();
        while !self.at_end() {
            let c = self.advance();
            match c {
                '`' => return Ok(source),
                '\\' if !self.at_end() => {
                    let next = self.advance();
                    if !matches!(next, '`' | '\\' | '$') {
                        source.push('\\');
                    }
                    source.push(next);
                }
                _ => source.push(c),
            }
        }
        Err(LexError::new("unterminated backtick substitution", start))
    }

    // ------------------------------------------------------------------
    // Here-documents
    // ------------------------------------------------------------------

    fn heredoc_operator(&mut self, strip_tabs: bool, start: Position) -> Result<(), LexError> {
        while matches!(self.peek(), ' ' | '\t') {
            self.advance();
        }

        // Delimiter word, optionally quoted.
        let quote = match self.peek() {
            '\'' | '"' => Some(self.advance()),
            _ => None,
        };
        let mut delimiter = String::new();
        if let Some(q) = quote {
            while !self.at_end() && self.peek() != q {
                delimiter.push(self.advance());
            }
            if self.at_end() {
                return Err(LexError::new("unterminated here-document delimiter", start));
            }
            self.advance();
        } else {
            while !self.at_end() {
                let c = self.peek();
                if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
                    break;
                }
                delimiter.push(self.advance());
            }
        }
        if delimiter.is_empty() {
            return Err(LexError::new("missing here-document delimiter", start));
        }

        self.push(
            TokenKind::Heredoc {
                delimiter,
                strip_tabs,
                body: String::new(),
            },
            start,
        );
        self.pending_heredocs.push(self.tokens.len() - 1);
        Ok(())
    }

    /// Consume lines after a newline into every heredoc opened on the
    /// line just ended, in the order the operators appeared.
    fn collect_pending_heredocs(&mut self) -> Result<(), LexError> {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for token_index in pending {
            let (delimiter, strip_tabs) = match &self.tokens[token_index].kind {
                TokenKind::Heredoc {
                    delimiter,
                    strip_tabs,
                    ..
                } => (delimiter.clone(), *strip_tabs),
                _ => continue,
            };

            let mut body = String::new();
            loop {
                if self.at_end() {
                    // Delimited by end-of-file.
                    break;
                }
                let mut raw_line = String::new();
                while !self.at_end() && self.peek() != '\n' {
                    raw_line.push(self.advance());
                }
                if !self.at_end() {
                    self.advance(); // newline
                }
                let check = if strip_tabs {
                    raw_line.trim_start_matches('\t')
                } else {
                    raw_line.as_str()
                };
                if check == delimiter {
                    break;
                }
                if strip_tabs {
                    body.push_str(raw_line.trim_start_matches('\t'));
                } else {
                    body.push_str(&raw_line);
                }
                body.push('\n');
            }

            if let TokenKind::Heredoc {
                body: ref mut slot, ..
            } = self.tokens[token_index].kind
            {
                *slot = body;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mechanics
    // ------------------------------------------------------------------

    fn skip_blanks_and_comments(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' => {
                    self.advance();
                }
                '#' if self.at_word_boundary() => {
                    while !self.at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                '\\' if self.peek_at(1) == '\n' => {
                    // Line continuation.
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// `#` starts a comment only at the start of a word.
    fn at_word_boundary(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(token) => {
                !matches!(token.kind, TokenKind::Word(_))
                    || self.pos == 0
                    || self
                        .chars
                        .get(self.pos.wrapping_sub(1))
                        .map(|c| c.is_ascii_whitespace())
                        .unwrap_or(true)
            }
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.chars.get(self.pos).copied().unwrap_or('\0');
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn push(&mut self, kind: TokenKind, pos: Position) {
        self.tokens.push(Token { kind, pos });
    }
}

fn is_operator_start(c: char) -> bool {
    matches!(c, '|' | '&' | ';' | '(' | ')' | '<' | '>' | '\n')
}

/// Single-character special parameters: `$?`, `$#`, `$@`, `$*`, `$$`,
/// `$!`, `$0`–`$9`.
fn is_special_param(c: char) -> bool {
    matches!(c, '?' | '#' | '@' | '*' | '$' | '!') || c.is_ascii_digit()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn word_parts(source: &str) -> Vec<WordPart> {
        match kinds(source).into_iter().next().unwrap() {
            TokenKind::Word(parts) => parts,
            other => panic!("expected word, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_words() {
        let tokens = kinds("echo hello world");
        assert_eq!(tokens.len(), 4); // three words + EOF
        assert!(matches!(tokens[0], TokenKind::Word(_)));
        assert!(matches!(tokens[3], TokenKind::Eof));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a | b && c || d ; e & f"),
            vec![
                TokenKind::Word(vec![WordPart::Literal {
                    text: "a".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::Pipe,
                TokenKind::Word(vec![WordPart::Literal {
                    text: "b".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::And,
                TokenKind::Word(vec![WordPart::Literal {
                    text: "c".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::Or,
                TokenKind::Word(vec![WordPart::Literal {
                    text: "d".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::Semi,
                TokenKind::Word(vec![WordPart::Literal {
                    text: "e".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::Amp,
                TokenKind::Word(vec![WordPart::Literal {
                    text: "f".to_string(),
                    quoting: Quoting::None
                }]),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_redirections() {
        let tokens = kinds("cmd > out >> app < in 2> err 2>> err2 &> all");
        let ops: Vec<&TokenKind> = tokens
            .iter()
            .filter(|k| {
                matches!(
                    k,
                    TokenKind::RedirectOut
                        | TokenKind::RedirectAppend
                        | TokenKind::RedirectIn
                        | TokenKind::RedirectErr
                        | TokenKind::RedirectErrAppend
                        | TokenKind::RedirectAll
                )
            })
            .collect();
        assert_eq!(ops.len(), 6);
    }

    #[test]
    fn test_fd_two_inside_word_is_literal() {
        let parts = word_parts("a2b");
        assert_eq!(
            parts,
            vec![WordPart::Literal {
                text: "a2b".to_string(),
                quoting: Quoting::None
            }]
        );
    }

    #[test]
    fn test_single_quotes() {
        let parts = word_parts("'no $expansion here'");
        assert_eq!(
            parts,
            vec![WordPart::Literal {
                text: "no $expansion here".to_string(),
                quoting: Quoting::Single
            }]
        );
    }

    #[test]
    fn test_unterminated_quote_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("$(open").is_err());
    }

    #[test]
    fn test_double_quotes_with_expansion() {
        let parts = word_parts("\"home is $HOME!\"");
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            WordPart::Literal {
                text: "home is ".to_string(),
                quoting: Quoting::Double
            }
        );
        assert_eq!(
            parts[1],
            WordPart::Param {
                name: "HOME".to_string(),
                modifier: None,
                quoted: true
            }
        );
        assert_eq!(
            parts[2],
            WordPart::Literal {
                text: "!".to_string(),
                quoting: Quoting::Double
            }
        );
    }

    #[test]
    fn test_double_quote_escapes() {
        let parts = word_parts(r#""a \$b \"c\" \\d""#);
        assert_eq!(
            parts,
            vec![WordPart::Literal {
                text: "a $b \"c\" \\d".to_string(),
                quoting: Quoting::Double
            }]
        );
    }

    #[test]
    fn test_ansi_c_quotes() {
        let parts = word_parts(r"$'line\n\ttab\x41\041'");
        assert_eq!(
            parts,
            vec![WordPart::Literal {
                text: "line\n\ttabA!".to_string(),
                quoting: Quoting::AnsiC
            }]
        );
    }

    #[test]
    fn test_param_forms() {
        assert_eq!(
            word_parts("$USER"),
            vec![WordPart::Param {
                name: "USER".to_string(),
                modifier: None,
                quoted: false
            }]
        );
        assert_eq!(
            word_parts("${FILE%%.*}"),
            vec![WordPart::Param {
                name: "FILE".to_string(),
                modifier: Some("%%.*".to_string()),
                quoted: false
            }]
        );
        assert_eq!(
            word_parts("${#FILE}"),
            vec![WordPart::Param {
                name: "FILE".to_string(),
                modifier: Some("#".to_string()),
                quoted: false
            }]
        );
        assert_eq!(
            word_parts("$?"),
            vec![WordPart::Param {
                name: "?".to_string(),
                modifier: None,
                quoted: false
            }]
        );
    }

    #[test]
    fn test_arith_and_command_sub() {
        assert_eq!(
            word_parts("$((1 + (2 * 3)))"),
            vec![WordPart::Arith {
                expr: "1 + (2 * 3)".to_string(),
                quoted: false
            }]
        );
        assert_eq!(
            word_parts("$(echo $(inner))"),
            vec![WordPart::CommandSub {
                source: "echo $(inner)".to_string(),
                quoted: false
            }]
        );
        assert_eq!(
            word_parts("`date`"),
            vec![WordPart::CommandSub {
                source: "date".to_string(),
                quoted: false
            }]
        );
    }

    #[test]
    fn test_word_with_mixed_parts() {
        let parts = word_parts("pre$X'mid'post");
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], WordPart::Literal { text, .. } if text == "pre"));
        assert!(matches!(&parts[1], WordPart::Param { name, .. } if name == "X"));
        assert!(matches!(&parts[2], WordPart::Literal { text, quoting: Quoting::Single } if text == "mid"));
        assert!(matches!(&parts[3], WordPart::Literal { text, .. } if text == "post"));
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("echo one # a comment\necho two");
        let words = tokens
            .iter()
            .filter(|k| matches!(k, TokenKind::Word(_)))
            .count();
        assert_eq!(words, 4);
        assert!(tokens.contains(&TokenKind::Newline));
    }

    #[test]
    fn test_hash_inside_word_not_comment() {
        let parts = word_parts("file#1");
        assert_eq!(
            parts,
            vec![WordPart::Literal {
                text: "file#1".to_string(),
                quoting: Quoting::None
            }]
        );
    }

    #[test]
    fn test_heredoc() {
        let tokens = kinds("cat <<EOF\nline one\nline two\nEOF\necho after");
        let heredoc = tokens
            .iter()
            .find_map(|k| match k {
                TokenKind::Heredoc { delimiter, body, .. } => Some((delimiter.clone(), body.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(heredoc.0, "EOF");
        assert_eq!(heredoc.1, "line one\nline two\n");
        // The command after the heredoc still lexes.
        let words = tokens
            .iter()
            .filter(|k| matches!(k, TokenKind::Word(_)))
            .count();
        assert_eq!(words, 3);
    }

    #[test]
    fn test_heredoc_strip_tabs() {
        let tokens = kinds("cat <<-END\n\tindented\n\tEND\n");
        let body = tokens
            .iter()
            .find_map(|k| match k {
                TokenKind::Heredoc { body, .. } => Some(body.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(body, "indented\n");
    }

    #[test]
    fn test_assignment_word_stays_single() {
        let parts = word_parts("FOO=$HOME/bin");
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], WordPart::Literal { text, .. } if text == "FOO="));
        assert!(matches!(&parts[1], WordPart::Param { name, .. } if name == "HOME"));
        assert!(matches!(&parts[2], WordPart::Literal { text, .. } if text == "/bin"));
    }

    #[test]
    fn test_escape_outside_quotes() {
        let parts = word_parts(r"a\ b");
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[1], WordPart::Literal { text, quoting: Quoting::Single } if text == " "));
    }

    #[test]
    fn test_positions_recorded() {
        let tokens = tokenize("echo x\npwd").unwrap();
        assert_eq!(tokens[0].pos.line, 1);
        let pwd = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Word(_)))
            .nth(2)
            .unwrap();
        assert_eq!(pwd.pos.line, 2);
    }

    #[test]
    fn test_lex_embedded_parts() {
        let parts = lex_embedded_parts("hello $USER").unwrap();
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], WordPart::Literal { text, .. } if text == "hello "));
        assert!(matches!(&parts[1], WordPart::Param { name, .. } if name == "USER"));
    }
}
