//! Recursive-descent parser.
//!
//! Mirrors the grammar one method per production. On an unexpected token
//! the parser records a diagnostic and resynchronizes at the next
//! plausible statement boundary, so a single run surfaces as many errors
//! as possible; the driver aborts after the pass if anything was
//! reported.
//!
//! `import a.b;` re-enters the lexer and parser on the resolved file and
//! records the result as a submodule under the import's local name.

use crate::ast::{
    BinaryOp, Expr, ExprKind, FunctionDecl, LetDecl, LiteralKind, Module, Param, Stmt, StmtKind,
    StructDecl,
};
use crate::diag::Diagnostics;
use crate::lexer::Lexer;
use crate::loader::ModuleLoader;
use crate::token::{Span, Token, TokenKind, TokenValue};

use std::collections::BTreeMap;
use std::rc::Rc;

use itertools::Itertools;

/// Marker for an already-reported parse error; the catcher resynchronizes.
struct Interrupt;

type PResult<T> = Result<T, Interrupt>;

/// The parser.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    diags: &'a mut Diagnostics,
    loader: &'a dyn ModuleLoader,
    file: Rc<str>,
    is_main_file: bool,
    submodules: BTreeMap<String, Module>,
}

/// Builds the mangled name of a non-`main` function:
/// `base###|type1,type2,…|declaring_file`.
pub fn mangle(base: &str, params: &[Param], file: &str) -> String {
    let types = params
        .iter()
        .map(|p| {
            format!(
                "{}{}",
                p.type_name,
                if p.is_array { "[]" } else { "" }
            )
        })
        .join(",");
    format!("{base}###|{types}|{file}")
}

/// The plain base of a possibly-mangled function name.
pub fn base_name(name: &str) -> &str {
    name.split("###").next().unwrap_or(name)
}

/// Lexes and parses one source file into a [`Module`].
pub fn parse_source(
    source: &str,
    file: &str,
    is_main_file: bool,
    loader: &dyn ModuleLoader,
    diags: &mut Diagnostics,
) -> Module {
    let tokens = Lexer::new(source, file).tokenize(diags);
    Parser {
        tokens,
        position: 0,
        diags,
        loader,
        file: Rc::from(file),
        is_main_file,
        submodules: BTreeMap::new(),
    }
    .parse()
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Module {
        let mut statements = Vec::new();
        while !self.at_end() {
            match self.declaration(false) {
                Ok(Some(stmt)) => statements.push(stmt),
                Ok(None) => {}
                Err(Interrupt) => self.synchronize(),
            }
        }
        Module {
            statements,
            submodules: self.submodules,
        }
    }

    fn at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_end() {
            self.position += 1;
        }
        token
    }

    fn span(&self) -> Span {
        self.current().span.clone()
    }

    fn error<T>(&mut self, span: Span, message: impl Into<String>) -> PResult<T> {
        self.diags.report(span, message);
        Err(Interrupt)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        let token = self.current().clone();
        let message = format!(
            "{message} on line {} in file {}",
            token.span.line, token.span.file
        );
        self.error(token.span, message)
    }

    /// Skips forward to the next plausible statement boundary.
    fn synchronize(&mut self) {
        while !self.at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.current().kind {
                TokenKind::Function
                | TokenKind::Let
                | TokenKind::Struct
                | TokenKind::Import
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn declaration(&mut self, no_let_semicolon: bool) -> PResult<Option<Stmt>> {
        if self.matches(TokenKind::Function) {
            return self.function().map(Some);
        }
        if self.matches(TokenKind::Import) {
            self.import_statement()?;
            return Ok(None);
        }
        if self.matches(TokenKind::Let) {
            return self.let_statement(no_let_semicolon).map(Some);
        }
        if self.matches(TokenKind::Return) {
            return self.return_statement().map(Some);
        }
        if self.matches(TokenKind::Struct) {
            return self.struct_decl().map(Some);
        }
        self.statement().map(Some)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        if self.check(TokenKind::LBrace) {
            return self.block();
        }
        if self.matches(TokenKind::If) {
            return self.if_statement();
        }
        if self.matches(TokenKind::For) {
            return self.for_statement();
        }
        if self.matches(TokenKind::While) {
            return self.while_statement();
        }
        if self.check(TokenKind::Break) || self.check(TokenKind::Continue) {
            return self.flow_control();
        }
        self.expression_statement()
    }

    fn import_statement(&mut self) -> PResult<()> {
        let mut path = Vec::new();
        let mut last;
        loop {
            let name = self.consume(TokenKind::Identifier, "Expected module name")?;
            path.push(name.lexeme.clone());
            last = name;
            if !self.check(TokenKind::Dot) {
                break;
            }
            self.advance();
        }
        self.consume(TokenKind::Semicolon, "Expected semicolon following import")?;

        let Some((source, canonical)) = self.loader.load(&path) else {
            let dotted = path.join(".");
            return self.error(last.span, format!("Could not find module {dotted}"));
        };

        let module = parse_source(&source, &canonical, false, self.loader, self.diags);
        self.submodules.insert(last.lexeme, module);
        Ok(())
    }

    fn function(&mut self) -> PResult<Stmt> {
        let span = self.span();
        let rtype = self.consume(TokenKind::Identifier, "Expected function return type")?;
        let name = self.consume(TokenKind::Identifier, "Expected function name")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let arg_type =
                self.consume(TokenKind::Identifier, "Expected type for function argument")?;
            let mut is_array = false;
            if self.matches(TokenKind::LBracket) {
                self.consume(
                    TokenKind::RBracket,
                    "Expected closing square bracket for array argument",
                )?;
                is_array = true;
            }
            if arg_type.lexeme == "string" {
                is_array = true;
            }

            let is_reference = self.matches(TokenKind::Ampersand);
            let arg_name =
                self.consume(TokenKind::Identifier, "Expected name for function argument")?;

            params.push(Param {
                type_name: arg_type.lexeme,
                name: arg_name.lexeme,
                is_reference,
                is_array,
                is_struct: false,
            });

            if self.check(TokenKind::RParen) {
                break;
            }
            self.consume(TokenKind::Comma, "Comma expected in function args")?;
        }
        self.consume(TokenKind::RParen, "Expected ')' after function args")?;

        let body = match self.block()?.kind {
            StmtKind::Block(stmts) => stmts,
            _ => unreachable!("block() returns a Block"),
        };

        let is_main = name.lexeme == "main" && self.is_main_file;
        let mangled = if is_main {
            name.lexeme
        } else {
            mangle(&name.lexeme, &params, &self.file)
        };

        Ok(Stmt {
            kind: StmtKind::Function(FunctionDecl {
                name: mangled,
                return_type: rtype.lexeme,
                params,
                body,
                file: Rc::clone(&self.file),
                is_main,
            }),
            span,
        })
    }

    fn struct_decl(&mut self) -> PResult<Stmt> {
        let span = self.span();
        let name = self.consume(TokenKind::Identifier, "Expected name for struct")?;
        self.consume(TokenKind::LBrace, "Expected '{' to open struct block")?;

        let mut members = Vec::new();
        loop {
            if self.matches(TokenKind::RBrace) {
                break;
            }
            let member_type =
                self.consume(TokenKind::Identifier, "Expected struct variable type")?;
            let member_name =
                self.consume(TokenKind::Identifier, "Expected struct variable name")?;
            members.push((member_type.lexeme, member_name.lexeme));
            if !self.matches(TokenKind::Comma) {
                self.consume(TokenKind::RBrace, "Expected right brace to close struct")?;
                break;
            }
        }

        Ok(Stmt {
            kind: StmtKind::Struct(StructDecl {
                name: name.lexeme,
                members,
            }),
            span,
        })
    }

    fn block(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.consume(TokenKind::LBrace, "Expected '{' to open block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            match self.declaration(false) {
                Ok(Some(stmt)) => statements.push(stmt),
                Ok(None) => {}
                Err(Interrupt) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' to close block")?;
        Ok(Stmt {
            kind: StmtKind::Block(statements),
            span,
        })
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let span = self.previous().span.clone();
        self.consume(TokenKind::LParen, "Expected '(' after if")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after if condition")?;

        let then = Box::new(self.statement()?);
        let otherwise = if self.matches(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then,
                otherwise,
            },
            span,
        })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        let span = self.previous().span.clone();
        self.consume(TokenKind::LParen, "Expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' to close while statement")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            span,
        })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        let span = self.previous().span.clone();
        self.consume(TokenKind::LParen, "Expected '(' after for")?;
        let declare = match self.declaration(true)? {
            Some(stmt) => Box::new(stmt),
            None => return self.error(span, "Expected declaration in for loop"),
        };
        self.consume(TokenKind::Semicolon, "Expected ';' in for loop")?;
        let condition = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' in for loop")?;
        let action = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after for")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt {
            kind: StmtKind::For {
                declare,
                condition,
                action,
                body,
            },
            span,
        })
    }

    fn flow_control(&mut self) -> PResult<Stmt> {
        let span = self.span();
        if self.matches(TokenKind::Break) {
            self.consume(
                TokenKind::Semicolon,
                "Expected semicolon following break statement",
            )?;
            return Ok(Stmt {
                kind: StmtKind::Break,
                span,
            });
        }
        self.advance();
        self.consume(
            TokenKind::Semicolon,
            "Expected semicolon following continue statement",
        )?;
        Ok(Stmt {
            kind: StmtKind::Continue,
            span,
        })
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let span = self.previous().span.clone();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(
            TokenKind::Semicolon,
            "Expected semicolon after return statement",
        )?;
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span,
        })
    }

    fn let_statement(&mut self, no_semicolon: bool) -> PResult<Stmt> {
        let span = self.previous().span.clone();
        let vtype = self.consume(TokenKind::Identifier, "Expected variable type")?;

        let mut is_array = false;
        let mut length = None;
        if self.matches(TokenKind::LBracket) {
            is_array = true;
            if self.check(TokenKind::RBracket) {
                let span = self.span();
                return self.error(span, "No array length specified");
            }
            length = Some(self.expression()?);
            self.consume(TokenKind::RBracket, "Expected closing square bracket")?;
        }

        let name = self.consume(TokenKind::Identifier, "Expected variable name")?;
        self.consume(TokenKind::Equal, "Expected '=' in let statement")?;

        let initial = if self.matches(TokenKind::New) {
            if is_array {
                return self.error(name.span, "A variable cannot be both struct and array");
            }
            self.struct_create()?
        } else {
            let initial = self.expression()?;
            if vtype.lexeme == "string" {
                if let ExprKind::Array { elements, .. } = &initial.kind {
                    is_array = true;
                    length = Some(Expr {
                        kind: ExprKind::Literal {
                            value: elements.len() as u8,
                            kind: LiteralKind::Int,
                        },
                        span: initial.span.clone(),
                    });
                }
            }
            initial
        };

        if !no_semicolon {
            self.consume(
                TokenKind::Semicolon,
                "Expected semicolon following let statement",
            )?;
        }

        Ok(Stmt {
            kind: StmtKind::Let(LetDecl {
                type_name: vtype.lexeme,
                name: name.lexeme,
                initial,
                is_array,
                length,
            }),
            span,
        })
    }

    fn struct_create(&mut self) -> PResult<Expr> {
        let span = self.previous().span.clone();
        let name = self.consume(TokenKind::Identifier, "Expected a type for struct creation")?;
        self.consume(TokenKind::LParen, "Expected '(' to open struct creation")?;
        let mut args = Vec::new();
        loop {
            args.push(self.expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RParen, "Expected ')' to close struct creation")?;
        Ok(Expr {
            kind: ExprKind::StructCreate {
                type_name: name.lexeme,
                args,
                member_count: None,
            },
            span,
        })
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let span = self.span();
        let expr = self.expression()?;
        self.consume(
            TokenKind::Semicolon,
            "Expected semicolon following expression",
        )?;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            span,
        })
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.equality()?;
        if self.matches(TokenKind::Equal) {
            let value = Box::new(self.assignment()?);
            let span = expr.span.clone();
            return match expr.kind {
                ExprKind::Variable { name, .. } => Ok(Expr {
                    kind: ExprKind::Assign { name, value },
                    span,
                }),
                ExprKind::Index { name, index } => Ok(Expr {
                    kind: ExprKind::AssignIndex { name, index, value },
                    span,
                }),
                ExprKind::Access { path, position } => Ok(Expr {
                    kind: ExprKind::AccessAssign {
                        path,
                        position,
                        value,
                    },
                    span,
                }),
                _ => self.error(span, "Invalid assignment target"),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.matches(TokenKind::EqualEqual) {
                BinaryOp::Eq
            } else if self.matches(TokenKind::BangEqual) {
                BinaryOp::Ne
            } else {
                break;
            };
            let right = self.comparison()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        loop {
            let op = if self.matches(TokenKind::GreaterEqual) {
                BinaryOp::Ge
            } else if self.matches(TokenKind::Greater) {
                BinaryOp::Gt
            } else if self.matches(TokenKind::Less) {
                BinaryOp::Lt
            } else if self.matches(TokenKind::LessEqual) {
                BinaryOp::Le
            } else {
                break;
            };
            let right = self.term()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.factor()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinaryOp::Div
            } else {
                break;
            };
            let right = self.unary()?;
            if op == BinaryOp::Div {
                if let Some(0) = right.as_literal() {
                    let span = right.span.clone();
                    return self.error(span, "Division by zero");
                }
            }
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.matches(TokenKind::Minus) {
            let span = self.previous().span.clone();
            let right = self.unary()?;
            // `-x` on the wraparound register is `0 - x`.
            let zero = Expr {
                kind: ExprKind::Literal {
                    value: 0,
                    kind: LiteralKind::Int,
                },
                span: span.clone(),
            };
            return Ok(binary_spanned(zero, BinaryOp::Sub, right, span));
        }
        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.array_literal()?;
        while self.matches(TokenKind::LParen) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expected ')' to close function call")?;

        let span = callee.span.clone();
        Ok(Expr {
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        })
    }

    fn array_literal(&mut self) -> PResult<Expr> {
        if self.check(TokenKind::LBracket) {
            let span = self.span();
            self.advance();
            let mut elements = Vec::new();
            while !self.check(TokenKind::RBracket) && !self.at_end() {
                elements.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RBracket, "Expected ']' to close array")?;
            return Ok(Expr {
                kind: ExprKind::Array {
                    elements,
                    is_string: false,
                },
                span,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> PResult<Expr> {
        let span = self.span();

        if self.matches(TokenKind::True) {
            return Ok(literal(1, LiteralKind::Bool, span));
        }
        if self.matches(TokenKind::False) {
            return Ok(literal(0, LiteralKind::Bool, span));
        }

        if self.matches(TokenKind::Number) {
            return self.number_literal(span);
        }

        if self.matches(TokenKind::Str) {
            return self.string_literal(span);
        }

        if self.matches(TokenKind::Identifier) {
            let name = self.previous().lexeme.clone();

            if self.matches(TokenKind::LBracket) {
                let index = Box::new(self.expression()?);
                self.consume(TokenKind::RBracket, "Expected ']' to close index")?;
                return Ok(Expr {
                    kind: ExprKind::Index { name, index },
                    span,
                });
            }

            if self.check(TokenKind::Dot) {
                let mut path = vec![name];
                while self.matches(TokenKind::Dot) {
                    let next = self.consume(
                        TokenKind::Identifier,
                        "Expected identifier for variable access",
                    )?;
                    path.push(next.lexeme);
                }
                return Ok(Expr {
                    kind: ExprKind::Access {
                        path,
                        position: None,
                    },
                    span,
                });
            }

            let increment = self.matches(TokenKind::PlusPlus);
            let decrement = !increment && self.matches(TokenKind::MinusMinus);
            return Ok(Expr {
                kind: ExprKind::Variable {
                    name,
                    increment,
                    decrement,
                },
                span,
            });
        }

        self.error(span, "Expected expression")
    }

    fn number_literal(&mut self, span: Span) -> PResult<Expr> {
        let token = self.previous().clone();
        let TokenValue::Int(raw) = token.value else {
            return self.error(span, "Malformed number literal");
        };

        // A trailing `c` marks a char literal, a trailing `b` reads the
        // decimal digits as binary.
        if self.check(TokenKind::Identifier) {
            match self.current().lexeme.to_ascii_lowercase().as_str() {
                "c" => {
                    self.advance();
                    if raw > 255 {
                        return self.error(span, "Integer literal outside range 0-255");
                    }
                    return Ok(literal(raw as u8, LiteralKind::Char, span));
                }
                "b" => {
                    self.advance();
                    let Ok(value) = u8::from_str_radix(&token.lexeme, 2) else {
                        return self.error(span, "Malformed binary literal");
                    };
                    return Ok(literal(value, LiteralKind::Int, span));
                }
                _ => {}
            }
        }

        if raw > 255 {
            return self.error(span, "Integer literal outside range 0-255");
        }
        Ok(literal(raw as u8, LiteralKind::Int, span))
    }

    fn string_literal(&mut self, span: Span) -> PResult<Expr> {
        let token = self.previous().clone();
        let TokenValue::Text(raw) = token.value else {
            return self.error(span, "Malformed string literal");
        };

        let Some(decoded) = unescape(&raw) else {
            return self.error(span, "Malformed escape sequence in string");
        };

        let elements = decoded
            .bytes()
            .map(|byte| literal(byte, LiteralKind::Char, span.clone()))
            .collect();

        Ok(Expr {
            kind: ExprKind::Array {
                elements,
                is_string: true,
            },
            span,
        })
    }
}

fn literal(value: u8, kind: LiteralKind, span: Span) -> Expr {
    Expr {
        kind: ExprKind::Literal { value, kind },
        span,
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let span = left.span.clone();
    binary_spanned(left, op, right, span)
}

fn binary_spanned(left: Expr, op: BinaryOp, right: Expr, span: Span) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}

/// Decodes the standard backslash escapes `\n \t \r \\ \" \0 \xNN`.
/// Returns `None` on a malformed `\x` pair.
fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '0' => out.push('\0'),
            'x' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16).ok()?;
                out.push(byte as char);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn parse_ok(source: &str) -> Module {
        let loader = MemoryLoader::new();
        let mut diags = Diagnostics::new();
        let module = parse_source(source, "main.hatch", true, &loader, &mut diags);
        assert!(!diags.has_errors(), "{diags}");
        module
    }

    #[test]
    fn precedence_nests_factors_under_terms() {
        let module = parse_ok("function void main() { let int x = 1 + 2 * 3; }");
        let StmtKind::Function(func) = &module.statements[0].kind else {
            panic!("expected function");
        };
        let StmtKind::Let(decl) = &func.body[0].kind else {
            panic!("expected let");
        };
        let ExprKind::Binary { op, right, .. } = &decl.initial.kind else {
            panic!("expected binary initializer");
        };
        assert_eq!(BinaryOp::Add, *op);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn non_main_functions_are_mangled() {
        let module = parse_ok("function int add(int a, int b) { return a + b; }");
        let StmtKind::Function(func) = &module.statements[0].kind else {
            panic!("expected function");
        };
        assert_eq!("add###|int,int|main.hatch", func.name);
    }

    #[test]
    fn string_lets_become_char_arrays_with_length() {
        let module = parse_ok(r#"function void main() { let string s = "hi\n"; }"#);
        let StmtKind::Function(func) = &module.statements[0].kind else {
            panic!("expected function");
        };
        let StmtKind::Let(decl) = &func.body[0].kind else {
            panic!("expected let");
        };
        assert!(decl.is_array);
        assert_eq!(Some(3), decl.length.as_ref().and_then(Expr::as_literal));
        let ExprKind::Array { elements, is_string } = &decl.initial.kind else {
            panic!("expected array initializer");
        };
        assert!(*is_string);
        assert_eq!(Some(10), elements[2].as_literal());
    }

    #[test]
    fn char_and_binary_suffixes() {
        let module = parse_ok("function void main() { let char c = 104c; let int b = 101b; }");
        let StmtKind::Function(func) = &module.statements[0].kind else {
            panic!("expected function");
        };
        let StmtKind::Let(c) = &func.body[0].kind else {
            panic!("expected let");
        };
        assert_eq!(Some(104), c.initial.as_literal());
        let StmtKind::Let(b) = &func.body[1].kind else {
            panic!("expected let");
        };
        assert_eq!(Some(5), b.initial.as_literal());
    }

    #[test]
    fn imports_register_submodules() {
        let mut loader = MemoryLoader::new();
        loader.insert("io", "function void print(int n) { __internal_print(n); }");
        let mut diags = Diagnostics::new();
        let module = parse_source(
            "import io; function void main() { io.print(1); }",
            "main.hatch",
            true,
            &loader,
            &mut diags,
        );
        assert!(!diags.has_errors(), "{diags}");
        assert!(module.submodules.contains_key("io"));
        assert_eq!(1, module.submodules["io"].statements.len());
    }

    #[test]
    fn recovery_surfaces_multiple_errors() {
        let loader = MemoryLoader::new();
        let mut diags = Diagnostics::new();
        parse_source(
            "function void main() { let int = 5; let int y 6; }",
            "main.hatch",
            true,
            &loader,
            &mut diags,
        );
        assert!(diags.entries().len() >= 2, "{diags}");
    }

    #[test]
    fn literal_division_by_zero_is_rejected() {
        let loader = MemoryLoader::new();
        let mut diags = Diagnostics::new();
        parse_source(
            "function void main() { let int x = 4 / 0; }",
            "main.hatch",
            true,
            &loader,
            &mut diags,
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn unary_minus_lowers_to_zero_minus() {
        let module = parse_ok("function void main() { let int x = -5; }");
        let StmtKind::Function(func) = &module.statements[0].kind else {
            panic!("expected function");
        };
        let StmtKind::Let(decl) = &func.body[0].kind else {
            panic!("expected let");
        };
        let ExprKind::Binary { left, op, right } = &decl.initial.kind else {
            panic!("expected binary");
        };
        assert_eq!(BinaryOp::Sub, *op);
        assert_eq!(Some(0), left.as_literal());
        assert_eq!(Some(5), right.as_literal());
    }
}
