//! Scanner turning Hatch source into a token stream.
//!
//! `//` and `/* ... */` comments are skipped. Every token records the
//! indent-stripped text of its source line so diagnostics can reproduce
//! it with a caret.

use crate::diag::Diagnostics;
use crate::token::{Span, Token, TokenKind, TokenValue};

use std::rc::Rc;

/// The scanner.
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    start: usize,
    line: u32,
    line_start: usize,
    file: Rc<str>,
    lines: Vec<Rc<str>>,
    indents: Vec<u32>,
    tokens: Vec<Token>,
}

fn keyword(name: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match name {
        "if" => If,
        "else" => Else,
        "while" => While,
        "for" => For,
        "return" => Return,
        "true" => True,
        "false" => False,
        "let" => Let,
        "function" => Function,
        "import" => Import,
        "struct" => Struct,
        "new" => New,
        "break" => Break,
        "continue" => Continue,
        _ => return None,
    };
    Some(kind)
}

impl Lexer {
    /// A scanner over `source`, attributing tokens to `file`.
    pub fn new(source: &str, file: &str) -> Self {
        let lines: Vec<Rc<str>> = source
            .split('\n')
            .map(|line| Rc::from(line.trim_start()))
            .collect();
        let indents = source
            .split('\n')
            .map(|line| (line.len() - line.trim_start().len()) as u32)
            .collect();

        Self {
            chars: source.chars().collect(),
            position: 0,
            start: 0,
            line: 1,
            line_start: 0,
            file: Rc::from(file),
            lines,
            indents,
            tokens: Vec::new(),
        }
    }

    /// Scans every token, recording malformed input in `diags`. The
    /// stream always ends with an `Eof` token.
    pub fn tokenize(mut self, diags: &mut Diagnostics) -> Vec<Token> {
        while !self.at_end() {
            self.start = self.position;
            self.next_token(diags);
        }
        self.start = self.position;
        self.push(TokenKind::Eof, TokenValue::None);
        self.tokens
    }

    fn at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        self.position += 1;
        self.chars[self.position - 1]
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn span_at_start(&self) -> Span {
        let line_index = (self.line - 1) as usize;
        let indent = self.indents.get(line_index).copied().unwrap_or(0);
        let column = (self.start - self.line_start) as u32;
        Span {
            file: Rc::clone(&self.file),
            line: self.line,
            column: column.saturating_sub(indent),
            line_text: self
                .lines
                .get(line_index)
                .cloned()
                .unwrap_or_else(|| Rc::from("")),
        }
    }

    fn push(&mut self, kind: TokenKind, value: TokenValue) {
        let lexeme: String = self.chars[self.start..self.position].iter().collect();
        let span = self.span_at_start();
        self.tokens.push(Token {
            kind,
            lexeme,
            value,
            span,
        });
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_start = self.position;
    }

    fn next_token(&mut self, diags: &mut Diagnostics) {
        use TokenKind::*;

        let c = self.advance();
        match c {
            '(' => self.push(LParen, TokenValue::None),
            ')' => self.push(RParen, TokenValue::None),
            '{' => self.push(LBrace, TokenValue::None),
            '}' => self.push(RBrace, TokenValue::None),
            '[' => self.push(LBracket, TokenValue::None),
            ']' => self.push(RBracket, TokenValue::None),
            ',' => self.push(Comma, TokenValue::None),
            '.' => self.push(Dot, TokenValue::None),
            '*' => self.push(Star, TokenValue::None),
            ';' => self.push(Semicolon, TokenValue::None),
            '&' => self.push(Ampersand, TokenValue::None),

            '=' => {
                if self.matches('=') {
                    self.push(EqualEqual, TokenValue::None);
                } else {
                    self.push(Equal, TokenValue::None);
                }
            }
            '>' => {
                if self.matches('=') {
                    self.push(GreaterEqual, TokenValue::None);
                } else {
                    self.push(Greater, TokenValue::None);
                }
            }
            '<' => {
                if self.matches('=') {
                    self.push(LessEqual, TokenValue::None);
                } else {
                    self.push(Less, TokenValue::None);
                }
            }
            '!' => {
                if self.matches('=') {
                    self.push(BangEqual, TokenValue::None);
                } else {
                    self.push(Bang, TokenValue::None);
                }
            }
            '+' => {
                if self.matches('+') {
                    self.push(PlusPlus, TokenValue::None);
                } else {
                    self.push(Plus, TokenValue::None);
                }
            }
            '-' => {
                if self.matches('-') {
                    self.push(MinusMinus, TokenValue::None);
                } else {
                    self.push(Minus, TokenValue::None);
                }
            }
            '/' => {
                if self.matches('/') {
                    while !self.at_end() && self.peek() != Some('\n') {
                        self.advance();
                    }
                } else if self.matches('*') {
                    self.block_comment();
                } else {
                    self.push(Slash, TokenValue::None);
                }
            }

            '"' => self.string(diags),

            ' ' | '\r' | '\t' => {}
            '\n' => self.newline(),

            _ if c.is_ascii_digit() => self.number(),
            _ if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                let span = self.span_at_start();
                diags.report(span, format!("Unhandled character '{c}'"));
            }
        }
    }

    fn block_comment(&mut self) {
        while !self.at_end() {
            if self.peek() == Some('\n') {
                self.advance();
                self.newline();
                continue;
            }
            if self.peek() == Some('*') && self.peek_next() == Some('/') {
                self.advance();
                self.advance();
                break;
            }
            self.advance();
        }
    }

    fn string(&mut self, diags: &mut Diagnostics) {
        while !self.at_end() && self.peek() != Some('"') {
            if self.peek() == Some('\n') {
                self.advance();
                self.newline();
            } else {
                self.advance();
            }
        }

        if self.at_end() {
            let span = self.span_at_start();
            diags.report(span, "Unterminated string");
            return;
        }

        self.advance();

        let contents: String = self.chars[self.start + 1..self.position - 1]
            .iter()
            .collect();
        self.push(TokenKind::Str, TokenValue::Text(contents));
    }

    fn number(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        let digits: String = self.chars[self.start..self.position].iter().collect();
        let value = digits.parse::<u32>().unwrap_or(u32::MAX);
        self.push(TokenKind::Number, TokenValue::Int(value));
    }

    fn identifier(&mut self) {
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let name: String = self.chars[self.start..self.position].iter().collect();
        match keyword(&name) {
            Some(kind) => self.push(kind, TokenValue::None),
            None => self.push(TokenKind::Identifier, TokenValue::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        let tokens = Lexer::new(source, "test.hatch").tokenize(&mut diags);
        assert!(!diags.has_errors(), "{diags}");
        tokens
    }

    #[test]
    fn scans_a_let_statement() {
        let kinds: Vec<TokenKind> = scan("let int x = 5;").iter().map(|t| t.kind).collect();
        assert_eq!(
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ],
            kinds
        );
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = scan("a // trailing\n/* block\nspanning */ b");
        let names: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(vec!["a", "b", ""], names);
    }

    #[test]
    fn two_char_operators_bind_together() {
        let kinds: Vec<TokenKind> = scan("i++ <= 10 != x--")
            .iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            vec![
                TokenKind::Identifier,
                TokenKind::PlusPlus,
                TokenKind::LessEqual,
                TokenKind::Number,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::MinusMinus,
                TokenKind::Eof,
            ],
            kinds
        );
    }

    #[test]
    fn spans_strip_indentation() {
        let tokens = scan("    let int x = 5;");
        assert_eq!(0, tokens[0].span.column);
        assert_eq!("let int x = 5;", &*tokens[0].span.line_text);
        // `x` sits 8 characters into the stripped line.
        assert_eq!(8, tokens[2].span.column);
    }
}
