//! Recursive Descent Parser
//!
//! Consumes the lexer's token stream and produces a `Script`. Follows the
//! POSIX-subset grammar: and-or lists, pipelines, simple commands with
//! assignments and redirections, and the compound forms (`if`, `for`,
//! `while`, `until`, `case`, function definitions, brace groups).
//!
//! Reserved words are ordinary `Word` tokens; the parser recognises them
//! positionally, so `echo if` still echoes the string "if".

use crate::ast::types::*;
use crate::parser::lexer::{tokenize, Token, TokenKind};
use std::fmt;
use thiserror::Error;

/// Guard against runaway nesting in hand-written scripts.
const MAX_PARSE_DEPTH: usize = 200;

#[derive(Error, Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at {}:{}: {}",
            self.pos.line, self.pos.column, self.message
        )
    }
}

impl ParseError {
    fn new(message: impl Into<String>, pos: Position) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }

    fn expected(what: &str, got: &TokenKind, pos: Position) -> Self {
        Self::new(format!("expected {}, got {}", what, got.describe()), pos)
    }
}

/// Parse a source string into a script AST.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source).map_err(|e| ParseError::new(e.message, e.pos))?;
    Parser::new(tokens).parse_script()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse_script(mut self) -> Result<Script, ParseError> {
        let mut lists = Vec::new();
        self.skip_separators();
        while !self.at_eof() {
            let list = self.parse_list()?;
            lists.push(self.finish_list(list)?);
            self.skip_separators();
        }
        Ok(Script { lists })
    }

    /// Consume the separator after a list, flagging `&` background.
    fn finish_list(&mut self, mut list: List) -> Result<List, ParseError> {
        match self.peek_kind() {
            TokenKind::Amp => {
                self.advance();
                list.background = true;
            }
            TokenKind::Semi | TokenKind::Newline => {
                self.advance();
            }
            TokenKind::Eof => {}
            other => {
                let other = other.clone();
                return Err(ParseError::expected(
                    "';', '&' or newline",
                    &other,
                    self.peek_pos(),
                ));
            }
        }
        Ok(list)
    }

    // ------------------------------------------------------------------
    // Lists and pipelines
    // ------------------------------------------------------------------

    fn parse_list(&mut self) -> Result<List, ParseError> {
        let mut entries = vec![ListEntry {
            connector: Connector::None,
            pipeline: self.parse_pipeline()?,
        }];

        loop {
            let connector = match self.peek_kind() {
                TokenKind::And => Connector::AndIf,
                TokenKind::Or => Connector::OrIf,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            entries.push(ListEntry {
                connector,
                pipeline: self.parse_pipeline()?,
            });
        }

        Ok(List {
            entries,
            background: false,
        })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let negated = if self.peek_keyword() == Some("!") {
            self.advance();
            true
        } else {
            false
        };

        let mut commands = vec![self.parse_command()?];
        while matches!(self.peek_kind(), TokenKind::Pipe) {
            self.advance();
            self.skip_newlines();
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline { negated, commands })
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn parse_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(ParseError::new(
                "maximum nesting depth exceeded",
                self.peek_pos(),
            ));
        }
        let result = match self.peek_keyword() {
            Some("if") => self.parse_if().map(CompoundCommand::If),
            Some("for") => self.parse_for().map(CompoundCommand::For),
            Some("while") => self.parse_while().map(CompoundCommand::While),
            Some("until") => self.parse_until().map(CompoundCommand::Until),
            Some("case") => self.parse_case().map(CompoundCommand::Case),
            Some("{") => self.parse_group().map(CompoundCommand::Group),
            _ => {
                if self.at_function_def() {
                    self.parse_function_def().map(CompoundCommand::FunctionDef)
                } else {
                    self.parse_simple_command().map(CompoundCommand::Simple)
                }
            }
        };
        self.depth -= 1;
        result
    }

    /// `name ( )` ahead of a command body?
    fn at_function_def(&self) -> bool {
        let TokenKind::Word(parts) = self.peek_kind() else {
            return false;
        };
        let name = match single_bare_literal(parts) {
            Some(name) => name,
            None => return false,
        };
        if !is_valid_name(name) {
            return false;
        }
        matches!(self.peek_kind_at(1), TokenKind::LParen)
            && matches!(self.peek_kind_at(2), TokenKind::RParen)
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, ParseError> {
        let name = match self.advance_kind() {
            TokenKind::Word(parts) => single_bare_literal(&parts).unwrap_or_default().to_string(),
            _ => unreachable!("checked by at_function_def"),
        };
        self.expect(|k| matches!(k, TokenKind::LParen), "'('")?;
        self.expect(|k| matches!(k, TokenKind::RParen), "')'")?;
        self.skip_newlines();
        let body = self.parse_command()?;
        Ok(FunctionDef {
            name,
            body: Box::new(body),
        })
    }

    // ------------------------------------------------------------------
    // Compound commands
    // ------------------------------------------------------------------

    fn parse_if(&mut self) -> Result<IfCommand, ParseError> {
        self.advance(); // if
        let mut clauses = Vec::new();
        let condition = self.parse_body_until(&["then"])?;
        self.expect_keyword("then")?;
        let body = self.parse_body_until(&["elif", "else", "fi"])?;
        clauses.push(IfClause { condition, body });

        let mut else_body = None;
        loop {
            match self.peek_keyword() {
                Some("elif") => {
                    self.advance();
                    let condition = self.parse_body_until(&["then"])?;
                    self.expect_keyword("then")?;
                    let body = self.parse_body_until(&["elif", "else", "fi"])?;
                    clauses.push(IfClause { condition, body });
                }
                Some("else") => {
                    self.advance();
                    else_body = Some(self.parse_body_until(&["fi"])?);
                }
                Some("fi") => {
                    self.advance();
                    break;
                }
                _ => {
                    let got = self.peek_kind().clone();
                    return Err(ParseError::expected("'elif', 'else' or 'fi'", &got, self.peek_pos()));
                }
            }
        }

        Ok(IfCommand {
            clauses,
            else_body,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    fn parse_for(&mut self) -> Result<ForCommand, ParseError> {
        self.advance(); // for

        let variable = match self.advance_kind() {
            TokenKind::Word(parts) => match single_bare_literal(&parts) {
                Some(name) if is_valid_name(name) => name.to_string(),
                _ => {
                    return Err(ParseError::new("invalid for-loop variable", self.peek_pos()));
                }
            },
            other => {
                return Err(ParseError::expected("variable name", &other, self.peek_pos()));
            }
        };

        let words = if self.peek_keyword() == Some("in") {
            self.advance();
            let mut words = Vec::new();
            while let TokenKind::Word(parts) = self.peek_kind() {
                words.push(Word {
                    parts: parts.clone(),
                });
                self.advance();
            }
            Some(words)
        } else {
            None
        };

        self.skip_separators();
        self.expect_keyword("do")?;
        let body = self.parse_body_until(&["done"])?;
        self.expect_keyword("done")?;

        Ok(ForCommand {
            variable,
            words,
            body,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    fn parse_while(&mut self) -> Result<WhileCommand, ParseError> {
        self.advance(); // while
        let condition = self.parse_body_until(&["do"])?;
        self.expect_keyword("do")?;
        let body = self.parse_body_until(&["done"])?;
        self.expect_keyword("done")?;
        Ok(WhileCommand {
            condition,
            body,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    fn parse_until(&mut self) -> Result<UntilCommand, ParseError> {
        self.advance(); // until
        let condition = self.parse_body_until(&["do"])?;
        self.expect_keyword("do")?;
        let body = self.parse_body_until(&["done"])?;
        self.expect_keyword("done")?;
        Ok(UntilCommand {
            condition,
            body,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    fn parse_case(&mut self) -> Result<CaseCommand, ParseError> {
        self.advance(); // case

        let word = match self.advance_kind() {
            TokenKind::Word(parts) => Word { parts },
            other => return Err(ParseError::expected("word", &other, self.peek_pos())),
        };
        self.skip_newlines();
        self.expect_keyword("in")?;
        self.skip_separators();

        let mut arms = Vec::new();
        while self.peek_keyword() != Some("esac") {
            if self.at_eof() {
                let got = self.peek_kind().clone();
                return Err(ParseError::expected("'esac'", &got, self.peek_pos()));
            }

            if matches!(self.peek_kind(), TokenKind::LParen) {
                self.advance();
            }

            let mut patterns = Vec::new();
            loop {
                match self.advance_kind() {
                    TokenKind::Word(parts) => patterns.push(Word { parts }),
                    other => {
                        return Err(ParseError::expected("pattern", &other, self.peek_pos()));
                    }
                }
                if matches!(self.peek_kind(), TokenKind::Pipe) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(|k| matches!(k, TokenKind::RParen), "')'")?;

            let body = self.parse_body_until_case_end()?;
            if matches!(self.peek_kind(), TokenKind::DoubleSemi) {
                self.advance();
            }
            self.skip_separators();

            arms.push(CaseArm { patterns, body });
        }
        self.expect_keyword("esac")?;

        Ok(CaseCommand {
            word,
            arms,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    fn parse_group(&mut self) -> Result<GroupCommand, ParseError> {
        self.advance(); // {
        let body = self.parse_body_until(&["}"])?;
        self.expect_keyword("}")?;
        Ok(GroupCommand {
            body,
            redirections: self.parse_trailing_redirections()?,
        })
    }

    /// Lists until one of `stops` appears as the next keyword.
    fn parse_body_until(&mut self, stops: &[&str]) -> Result<Vec<List>, ParseError> {
        let mut lists = Vec::new();
        self.skip_separators();
        loop {
            if self.at_eof() {
                let got = self.peek_kind().clone();
                return Err(ParseError::expected(
                    &format!("'{}'", stops.join("' or '")),
                    &got,
                    self.peek_pos(),
                ));
            }
            if let Some(word) = self.peek_keyword() {
                if stops.contains(&word) {
                    break;
                }
            }
            let list = self.parse_list()?;
            lists.push(self.finish_body_list(list, stops)?);
            self.skip_separators();
        }
        Ok(lists)
    }

    fn finish_body_list(&mut self, mut list: List, stops: &[&str]) -> Result<List, ParseError> {
        match self.peek_kind() {
            TokenKind::Amp => {
                self.advance();
                list.background = true;
                Ok(list)
            }
            TokenKind::Semi | TokenKind::Newline => {
                self.advance();
                Ok(list)
            }
            _ => {
                if let Some(word) = self.peek_keyword() {
                    if stops.contains(&word) {
                        return Ok(list);
                    }
                }
                let got = self.peek_kind().clone();
                Err(ParseError::expected(
                    "';', '&' or newline",
                    &got,
                    self.peek_pos(),
                ))
            }
        }
    }

    /// A case arm body runs to `;;` or `esac`.
    fn parse_body_until_case_end(&mut self) -> Result<Vec<List>, ParseError> {
        let mut lists = Vec::new();
        self.skip_newlines();
        loop {
            if self.at_eof() {
                let got = self.peek_kind().clone();
                return Err(ParseError::expected("';;' or 'esac'", &got, self.peek_pos()));
            }
            if matches!(self.peek_kind(), TokenKind::DoubleSemi) || self.peek_keyword() == Some("esac")
            {
                break;
            }
            let mut list = self.parse_list()?;
            match self.peek_kind() {
                TokenKind::Amp => {
                    self.advance();
                    list.background = true;
                }
                TokenKind::Semi | TokenKind::Newline => {
                    self.advance();
                }
                _ => {}
            }
            lists.push(list);
            self.skip_newlines();
        }
        Ok(lists)
    }

    // ------------------------------------------------------------------
    // Simple commands
    // ------------------------------------------------------------------

    fn parse_simple_command(&mut self) -> Result<SimpleCommand, ParseError> {
        let mut command = SimpleCommand::default();
        let mut seen_word = false;

        loop {
            match self.peek_kind() {
                TokenKind::Word(parts) => {
                    let parts = parts.clone();
                    self.advance();

                    if !seen_word {
                        if let Some((name, value)) = split_assignment(&parts) {
                            command.assignments.push((name, value));
                            continue;
                        }
                    }
                    seen_word = true;
                    command.words.push(Word { parts });
                }
                TokenKind::RedirectOut
                | TokenKind::RedirectAppend
                | TokenKind::RedirectIn
                | TokenKind::RedirectErr
                | TokenKind::RedirectErrAppend
                | TokenKind::RedirectAll => {
                    command.redirections.push(self.parse_redirection()?);
                }
                TokenKind::Heredoc {
                    delimiter: _,
                    strip_tabs,
                    body,
                } => {
                    let redirection = Redirection {
                        operator: RedirOp::In,
                        target: RedirTarget::HereDoc {
                            body: body.clone(),
                            strip_tabs: *strip_tabs,
                        },
                        fd_hint: Some(0),
                    };
                    self.advance();
                    command.redirections.push(redirection);
                }
                _ => break,
            }
        }

        if command.words.is_empty() && command.assignments.is_empty() && command.redirections.is_empty()
        {
            let got = self.peek_kind().clone();
            return Err(ParseError::expected("command", &got, self.peek_pos()));
        }
        Ok(command)
    }

    fn parse_redirection(&mut self) -> Result<Redirection, ParseError> {
        let (operator, fd_hint) = match self.advance_kind() {
            TokenKind::RedirectOut => (RedirOp::Out, None),
            TokenKind::RedirectAppend => (RedirOp::Append, None),
            TokenKind::RedirectIn => (RedirOp::In, None),
            TokenKind::RedirectErr => (RedirOp::Err, Some(2)),
            TokenKind::RedirectErrAppend => (RedirOp::ErrAppend, Some(2)),
            TokenKind::RedirectAll => (RedirOp::All, None),
            other => {
                return Err(ParseError::expected("redirection", &other, self.peek_pos()));
            }
        };

        match self.advance_kind() {
            TokenKind::Word(parts) => Ok(Redirection {
                operator,
                target: RedirTarget::Word(Word { parts }),
                fd_hint,
            }),
            other => Err(ParseError::expected(
                "redirection target",
                &other,
                self.peek_pos(),
            )),
        }
    }

    fn parse_trailing_redirections(&mut self) -> Result<Vec<Redirection>, ParseError> {
        let mut redirections = Vec::new();
        while matches!(
            self.peek_kind(),
            TokenKind::RedirectOut
                | TokenKind::RedirectAppend
                | TokenKind::RedirectIn
                | TokenKind::RedirectErr
                | TokenKind::RedirectErrAppend
                | TokenKind::RedirectAll
        ) {
            redirections.push(self.parse_redirection()?);
        }
        Ok(redirections)
    }

    // ------------------------------------------------------------------
    // Token mechanics
    // ------------------------------------------------------------------

    fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_pos(&self) -> Position {
        self.tokens
            .get(self.pos)
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    /// Reserved-word view of the next token, if it is a bare literal.
    fn peek_keyword(&self) -> Option<&str> {
        match self.peek_kind() {
            TokenKind::Word(parts) => single_bare_literal(parts),
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_kind(&mut self) -> TokenKind {
        let kind = self.peek_kind().clone();
        self.pos += 1;
        kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn expect(
        &mut self,
        pred: impl Fn(&TokenKind) -> bool,
        what: &str,
    ) -> Result<(), ParseError> {
        if pred(self.peek_kind()) {
            self.advance();
            Ok(())
        } else {
            let got = self.peek_kind().clone();
            Err(ParseError::expected(what, &got, self.peek_pos()))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        self.skip_newlines();
        if self.peek_keyword() == Some(keyword) {
            self.advance();
            Ok(())
        } else {
            let got = self.peek_kind().clone();
            Err(ParseError::expected(
                &format!("'{}'", keyword),
                &got,
                self.peek_pos(),
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }
}

// ----------------------------------------------------------------------
// Word helpers
// ----------------------------------------------------------------------

fn single_bare_literal(parts: &[WordPart]) -> Option<&str> {
    match parts {
        [WordPart::Literal {
            text,
            quoting: Quoting::None,
        }] => Some(text),
        _ => None,
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// `NAME=value…` at the front of a word → (name, value word).
fn split_assignment(parts: &[WordPart]) -> Option<(String, Word)> {
    let WordPart::Literal {
        text,
        quoting: Quoting::None,
    } = parts.first()?
    else {
        return None;
    };
    let eq = text.find('=')?;
    let name = &text[..eq];
    if !is_valid_name(name) {
        return None;
    }

    let mut value_parts = Vec::new();
    let rest = &text[eq + 1..];
    if !rest.is_empty() {
        value_parts.push(WordPart::Literal {
            text: rest.to_string(),
            quoting: Quoting::None,
        });
    }
    value_parts.extend(parts[1..].iter().cloned());
    Some((name.to_string(), Word { parts: value_parts }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn first_simple(script: &Script) -> &SimpleCommand {
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::Simple(cmd) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_command() {
        let script = parse("echo hello world").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[0].as_bare_literal(), Some("echo"));
    }

    #[test]
    fn test_pipeline() {
        let script = parse("a | b | c").unwrap();
        let pipeline = &script.lists[0].entries[0].pipeline;
        assert_eq!(pipeline.commands.len(), 3);
        assert!(!pipeline.negated);
    }

    #[test]
    fn test_negated_pipeline() {
        let script = parse("! grep x file").unwrap();
        assert!(script.lists[0].entries[0].pipeline.negated);
    }

    #[test]
    fn test_and_or_list() {
        let script = parse("a && b || c").unwrap();
        let entries = &script.lists[0].entries;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].connector, Connector::None);
        assert_eq!(entries[1].connector, Connector::AndIf);
        assert_eq!(entries[2].connector, Connector::OrIf);
    }

    #[test]
    fn test_background_list() {
        let script = parse("sleep 10 &").unwrap();
        assert!(script.lists[0].background);
    }

    #[test]
    fn test_multiple_lists() {
        let script = parse("a; b\nc").unwrap();
        assert_eq!(script.lists.len(), 3);
    }

    #[test]
    fn test_assignments() {
        let script = parse("FOO=bar BAZ=qux cmd arg").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].0, "FOO");
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn test_assignment_only() {
        let script = parse("FOO=bar").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments.len(), 1);
        assert!(cmd.words.is_empty());
    }

    #[test]
    fn test_assignment_after_command_is_word() {
        let script = parse("env FOO=bar").unwrap();
        let cmd = first_simple(&script);
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn test_redirections() {
        let script = parse("cmd > out.txt 2> err.txt < in.txt").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirections.len(), 3);
        assert_eq!(cmd.redirections[0].operator, RedirOp::Out);
        assert_eq!(cmd.redirections[1].operator, RedirOp::Err);
        assert_eq!(cmd.redirections[1].fd_hint, Some(2));
        assert_eq!(cmd.redirections[2].operator, RedirOp::In);
    }

    #[test]
    fn test_heredoc_redirection() {
        let script = parse("cat <<EOF\nbody line\nEOF\n").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirections.len(), 1);
        match &cmd.redirections[0].target {
            RedirTarget::HereDoc { body, strip_tabs } => {
                assert_eq!(body, "body line\n");
                assert!(!strip_tabs);
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn test_if_statement() {
        let script = parse("if true; then echo yes; fi").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::If(cmd) => {
                assert_eq!(cmd.clauses.len(), 1);
                assert!(cmd.else_body.is_none());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        let script = parse("if a; then b; elif c; then d; else e; fi").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::If(cmd) => {
                assert_eq!(cmd.clauses.len(), 2);
                assert!(cmd.else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_for_loop() {
        let script = parse("for i in a b c; do echo $i; done").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::For(cmd) => {
                assert_eq!(cmd.variable, "i");
                assert_eq!(cmd.words.as_ref().unwrap().len(), 3);
                assert_eq!(cmd.body.len(), 1);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_without_in() {
        let script = parse("for arg; do echo $arg; done").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::For(cmd) => assert!(cmd.words.is_none()),
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_while_loop() {
        let script = parse("while test -f lock; do sleep 1; done").unwrap();
        assert!(matches!(
            script.lists[0].entries[0].pipeline.commands[0],
            CompoundCommand::While(_)
        ));
    }

    #[test]
    fn test_until_loop() {
        let script = parse("until test -f ready; do sleep 1; done").unwrap();
        assert!(matches!(
            script.lists[0].entries[0].pipeline.commands[0],
            CompoundCommand::Until(_)
        ));
    }

    #[test]
    fn test_case_statement() {
        let script = parse("case $x in\n  a|b) echo ab;;\n  *) echo other;;\nesac").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::Case(cmd) => {
                assert_eq!(cmd.arms.len(), 2);
                assert_eq!(cmd.arms[0].patterns.len(), 2);
            }
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_case_with_lparen_patterns() {
        let script = parse("case $x in (a) echo a;; esac").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::Case(cmd) => assert_eq!(cmd.arms.len(), 1),
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_function_def() {
        let script = parse("greet() { echo hi; }").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::FunctionDef(def) => {
                assert_eq!(def.name, "greet");
                assert!(matches!(*def.body, CompoundCommand::Group(_)));
            }
            other => panic!("expected function def, got {:?}", other),
        }
    }

    #[test]
    fn test_group_with_redirection() {
        let script = parse("{ echo a; echo b; } > out.txt").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::Group(group) => {
                assert_eq!(group.body.len(), 2);
                assert_eq!(group.redirections.len(), 1);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_redirection_on_loop() {
        let script = parse("for i in 1 2; do echo $i; done > loop.txt").unwrap();
        match &script.lists[0].entries[0].pipeline.commands[0] {
            CompoundCommand::For(cmd) => assert_eq!(cmd.redirections.len(), 1),
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_as_argument() {
        let script = parse("echo if then fi").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.words.len(), 4);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("if true; then echo x").is_err()); // missing fi
        assert!(parse("for do done").is_err());
        assert!(parse("case x esac").is_err()); // missing in
        assert!(parse("|").is_err());
    }

    #[test]
    fn test_error_carries_position() {
        let err = parse("if true\nthen echo x").unwrap_err();
        assert!(err.to_string().contains("parse error at"));
        assert!(err.pos.line >= 1);
    }
}
