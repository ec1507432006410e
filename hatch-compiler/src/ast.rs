//! Typed AST of the language, plus the constant-folding pass.
//!
//! Statements and expressions are tagged variants; every node carries the
//! span of its first token so later passes can anchor diagnostics. A few
//! fields (`position`, `member_count`, resolved callee names, parameter
//! struct shapes) start empty and are filled in by the type checker for
//! the emitter to consume.

use crate::token::Span;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

/// A parsed source file: its top-level statements and the modules its
/// imports pulled in, keyed by local name.
#[derive(Debug, Default)]
pub struct Module {
    /// Top-level declarations in source order.
    pub statements: Vec<Stmt>,
    /// Imported modules by local name.
    pub submodules: BTreeMap<String, Module>,
}

/// A statement with its source anchor.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// Variant payload.
    pub kind: StmtKind,
    /// Source anchor of the first token.
    pub span: Span,
}

/// Statement variants.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `function type name(params) { ... }`
    Function(FunctionDecl),
    /// `struct Name { type member, ... }`
    Struct(StructDecl),
    /// `let type name = initial;`
    Let(LetDecl),
    /// `if (condition) then else otherwise`
    If {
        /// Condition; must check as `bool`.
        condition: Expr,
        /// True branch.
        then: Box<Stmt>,
        /// Optional false branch.
        otherwise: Option<Box<Stmt>>,
    },
    /// `while (condition) body`
    While {
        /// Condition; must check as `bool`.
        condition: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `for (declare; condition; action) body`
    For {
        /// Loop variable declaration.
        declare: Box<Stmt>,
        /// Condition; must check as `bool`.
        condition: Expr,
        /// Per-iteration update expression.
        action: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `return;` / `return expr;`
    Return(Option<Expr>),
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// An expression in statement position.
    Expr(Expr),
}

/// A function declaration. Non-`main` names are already mangled by the
/// parser so overloads stay distinguishable through linking.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Mangled name, or plain `main`.
    pub name: String,
    /// Declared return type name.
    pub return_type: String,
    /// Parameters in declaration order.
    pub params: Vec<Param>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// File the function was declared in.
    pub file: Rc<str>,
    /// Whether this is the entry point of the main file.
    pub is_main: bool,
}

/// One function parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Declared type name.
    pub type_name: String,
    /// Parameter name.
    pub name: String,
    /// Declared with `&`.
    pub is_reference: bool,
    /// Declared with `[]` (or of type `string`).
    pub is_array: bool,
    /// Filled by the checker when the type is struct-shaped.
    pub is_struct: bool,
}

/// A struct declaration: ordered `(type, name)` member pairs.
#[derive(Debug, Clone)]
pub struct StructDecl {
    /// Struct type name.
    pub name: String,
    /// Members as `(type name, member name)` in declaration order.
    pub members: Vec<(String, String)>,
}

/// A `let` declaration.
#[derive(Debug, Clone)]
pub struct LetDecl {
    /// Declared type name.
    pub type_name: String,
    /// Variable name.
    pub name: String,
    /// Initializer.
    pub initial: Expr,
    /// Array declaration (or `string`).
    pub is_array: bool,
    /// Declared element count for arrays; strings get theirs from the
    /// literal.
    pub length: Option<Expr>,
}

/// An expression with its source anchor.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Variant payload.
    pub kind: ExprKind,
    /// Source anchor of the first token.
    pub span: Span,
}

/// Literal type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// `int` literal.
    Int,
    /// `bool` literal (`true` = 1, `false` = 0).
    Bool,
    /// `char` literal (`104c`).
    Char,
}

impl LiteralKind {
    /// The language-level type name of the literal.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Char => "char",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    /// Whether the operator yields `bool`.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Rendered operator for dumps and diagnostics.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A literal byte with its language type.
    Literal {
        /// The byte value.
        value: u8,
        /// Literal type tag.
        kind: LiteralKind,
    },
    /// A named value, optionally carrying a postfix `++`/`--` marker.
    Variable {
        /// Name; the checker rewrites function-value references to their
        /// mangled form.
        name: String,
        /// Postfix `++`.
        increment: bool,
        /// Postfix `--`.
        decrement: bool,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `name = value`
    Assign {
        /// Assignment target.
        name: String,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `name[index] = value`
    AssignIndex {
        /// Array variable name.
        name: String,
        /// Index expression.
        index: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `a.b.c` member or module access.
    Access {
        /// Path components; the checker rewrites the last component of a
        /// callee path to its mangled form.
        path: Vec<String>,
        /// Struct member position, filled by the checker.
        position: Option<u8>,
    },
    /// `a.member = value`
    AccessAssign {
        /// Path components.
        path: Vec<String>,
        /// Struct member position, filled by the checker.
        position: Option<u8>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// A call; the callee is a variable, an access path, or another call.
    Call {
        /// Callee expression.
        callee: Box<Expr>,
        /// Arguments in source order.
        args: Vec<Expr>,
    },
    /// Array literal; string literals decode to char arrays with
    /// `is_string` set.
    Array {
        /// Element expressions.
        elements: Vec<Expr>,
        /// Whether this came from a string literal.
        is_string: bool,
    },
    /// `name[index]`
    Index {
        /// Array variable name.
        name: String,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `new Type(args)`
    StructCreate {
        /// Struct type name.
        type_name: String,
        /// Member initializers in position order.
        args: Vec<Expr>,
        /// Member count, filled by the checker.
        member_count: Option<u8>,
    },
    /// `type(value)` reinterpretation between registered cast pairs.
    Cast {
        /// Target type name.
        target: String,
        /// Inner value.
        value: Box<Expr>,
    },
}

impl Expr {
    /// The literal byte, if this is a literal.
    pub fn as_literal(&self) -> Option<u8> {
        match self.kind {
            ExprKind::Literal { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Folds constant subtrees of a module in place: literal arithmetic
/// collapses to literals and `if` over a literal condition collapses to
/// its live arm. Runs before type checking; the emitter keeps its own
/// peepholes separate.
pub fn fold_module(module: &mut Module) {
    for submodule in module.submodules.values_mut() {
        fold_module(submodule);
    }
    for stmt in &mut module.statements {
        fold_stmt(stmt);
    }
}

fn fold_stmt(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Block(stmts) => stmts.iter_mut().for_each(fold_stmt),
        StmtKind::Function(func) => func.body.iter_mut().for_each(fold_stmt),
        StmtKind::Let(decl) => fold_expr(&mut decl.initial),
        StmtKind::If {
            condition,
            then,
            otherwise,
        } => {
            fold_expr(condition);
            fold_stmt(then);
            if let Some(otherwise) = otherwise {
                fold_stmt(otherwise);
            }

            if let ExprKind::Literal { value, .. } = condition.kind {
                let replacement = if value != 0 {
                    std::mem::replace(then.as_mut(), empty_block(stmt.span.clone()))
                } else if let Some(otherwise) = otherwise.take() {
                    *otherwise
                } else {
                    empty_block(stmt.span.clone())
                };
                *stmt = replacement;
            }
        }
        StmtKind::While { condition, body } => {
            fold_expr(condition);
            fold_stmt(body);
        }
        StmtKind::For {
            declare,
            condition,
            action,
            body,
        } => {
            fold_stmt(declare);
            fold_expr(condition);
            fold_expr(action);
            fold_stmt(body);
        }
        StmtKind::Return(Some(value)) => fold_expr(value),
        StmtKind::Expr(expr) => fold_expr(expr),
        StmtKind::Struct(_) | StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
    }
}

fn empty_block(span: Span) -> Stmt {
    Stmt {
        kind: StmtKind::Block(Vec::new()),
        span,
    }
}

fn fold_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Binary { left, op, right } => {
            fold_expr(left);
            fold_expr(right);

            let (Some(a), Some(b)) = (left.as_literal(), right.as_literal()) else {
                return;
            };
            let folded = match op {
                BinaryOp::Add => Some(a.wrapping_add(b)),
                BinaryOp::Sub => Some(a.wrapping_sub(b)),
                BinaryOp::Mul => Some(a.wrapping_mul(b)),
                BinaryOp::Div if b != 0 => Some(a / b),
                _ => None,
            };
            if let Some(value) = folded {
                expr.kind = ExprKind::Literal {
                    value,
                    kind: LiteralKind::Int,
                };
            }
        }
        ExprKind::Assign { value, .. } => fold_expr(value),
        ExprKind::AssignIndex { index, value, .. } => {
            fold_expr(index);
            fold_expr(value);
        }
        ExprKind::AccessAssign { value, .. } => fold_expr(value),
        ExprKind::Call { callee, args } => {
            fold_expr(callee);
            args.iter_mut().for_each(fold_expr);
        }
        ExprKind::Array { elements, .. } => elements.iter_mut().for_each(fold_expr),
        ExprKind::Index { index, .. } => fold_expr(index),
        ExprKind::StructCreate { args, .. } => args.iter_mut().for_each(fold_expr),
        ExprKind::Cast { value, .. } => fold_expr(value),
        ExprKind::Literal { .. } | ExprKind::Variable { .. } | ExprKind::Access { .. } => {}
    }
}

/// Renders an indented dump of a module for `--debug` output.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    for (name, submodule) in &module.submodules {
        let _ = writeln!(out, "<Module {name}>");
        for line in dump_module(submodule).lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    for stmt in &module.statements {
        dump_stmt(stmt, 0, &mut out);
    }
    out
}

fn dump_stmt(stmt: &Stmt, indent: usize, out: &mut String) {
    let pad = "    ".repeat(indent);
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            let _ = writeln!(out, "{pad}<Block> {{");
            for stmt in stmts {
                dump_stmt(stmt, indent + 1, out);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        StmtKind::Function(func) => {
            let params: Vec<String> = func
                .params
                .iter()
                .map(|p| format!("{} {}", p.type_name, p.name))
                .collect();
            let _ = writeln!(
                out,
                "{pad}<Function: {} {} ({})>",
                func.return_type,
                func.name,
                params.join(", ")
            );
            for stmt in &func.body {
                dump_stmt(stmt, indent + 1, out);
            }
        }
        StmtKind::Struct(decl) => {
            let _ = writeln!(out, "{pad}<Struct: {}>", decl.name);
        }
        StmtKind::Let(decl) => {
            let _ = writeln!(
                out,
                "{pad}<Let: {} {} = {}>",
                decl.type_name,
                decl.name,
                dump_expr(&decl.initial)
            );
        }
        StmtKind::If {
            condition,
            then,
            otherwise,
        } => {
            let _ = writeln!(out, "{pad}<If {}>", dump_expr(condition));
            dump_stmt(then, indent + 1, out);
            if let Some(otherwise) = otherwise {
                let _ = writeln!(out, "{pad}<Otherwise>");
                dump_stmt(otherwise, indent + 1, out);
            }
        }
        StmtKind::While { condition, body } => {
            let _ = writeln!(out, "{pad}<While: {}>", dump_expr(condition));
            dump_stmt(body, indent + 1, out);
        }
        StmtKind::For {
            declare,
            condition,
            action,
            body,
        } => {
            let _ = writeln!(out, "{pad}<For: cond {}>", dump_expr(condition));
            dump_stmt(declare, indent + 1, out);
            let _ = writeln!(out, "{pad}    <Action: {}>", dump_expr(action));
            dump_stmt(body, indent + 1, out);
        }
        StmtKind::Return(value) => {
            let rendered = value.as_ref().map(dump_expr).unwrap_or_default();
            let _ = writeln!(out, "{pad}<Return: {rendered}>");
        }
        StmtKind::Break => {
            let _ = writeln!(out, "{pad}<Break>");
        }
        StmtKind::Continue => {
            let _ = writeln!(out, "{pad}<Continue>");
        }
        StmtKind::Expr(expr) => {
            let _ = writeln!(out, "{pad}{}", dump_expr(expr));
        }
    }
}

fn dump_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal { value, kind } => format!("<Literal: {value} {}>", kind.type_name()),
        ExprKind::Variable {
            name,
            increment,
            decrement,
        } => {
            let marker = if *increment {
                "++"
            } else if *decrement {
                "--"
            } else {
                ""
            };
            format!("<Variable: {name}{marker}>")
        }
        ExprKind::Binary { left, op, right } => format!(
            "<Binary: {} {} {}>",
            dump_expr(left),
            op.symbol(),
            dump_expr(right)
        ),
        ExprKind::Assign { name, value } => format!("<Assign: {name} = {}>", dump_expr(value)),
        ExprKind::AssignIndex { name, index, value } => format!(
            "<AssignIndex: {name}[{}] = {}>",
            dump_expr(index),
            dump_expr(value)
        ),
        ExprKind::Access { path, .. } => format!("<Access: {}>", path.join(".")),
        ExprKind::AccessAssign { path, value, .. } => {
            format!("<AccessAssign: {} = {}>", path.join("."), dump_expr(value))
        }
        ExprKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(dump_expr).collect();
            format!("<Call: {} ({})>", dump_expr(callee), args.join(", "))
        }
        ExprKind::Array { elements, .. } => format!("<Array: {} elements>", elements.len()),
        ExprKind::Index { name, index } => format!("<Index: {name}[{}]>", dump_expr(index)),
        ExprKind::StructCreate { type_name, .. } => format!("<StructCreate: {type_name}>"),
        ExprKind::Cast { target, value } => {
            format!("<Cast: {} -> {target}>", dump_expr(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    fn span() -> Span {
        Span {
            file: "test.hatch".into(),
            line: 1,
            column: 0,
            line_text: "".into(),
        }
    }

    fn literal(value: u8) -> Expr {
        Expr {
            kind: ExprKind::Literal {
                value,
                kind: LiteralKind::Int,
            },
            span: span(),
        }
    }

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr {
            kind: ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span: span(),
        }
    }

    #[test]
    fn nested_literal_arithmetic_folds() {
        let mut expr = binary(
            binary(literal(2), BinaryOp::Add, literal(3)),
            BinaryOp::Mul,
            literal(4),
        );
        fold_expr(&mut expr);
        assert_eq!(Some(20), expr.as_literal());
    }

    #[test]
    fn folding_wraps_like_the_machine() {
        let mut expr = binary(literal(200), BinaryOp::Add, literal(100));
        fold_expr(&mut expr);
        assert_eq!(Some(44), expr.as_literal());
    }

    #[test]
    fn literal_if_collapses_to_live_arm() {
        let then = Stmt {
            kind: StmtKind::Return(Some(literal(1))),
            span: span(),
        };
        let mut stmt = Stmt {
            kind: StmtKind::If {
                condition: Expr {
                    kind: ExprKind::Literal {
                        value: 1,
                        kind: LiteralKind::Bool,
                    },
                    span: span(),
                },
                then: Box::new(then),
                otherwise: None,
            },
            span: span(),
        };
        fold_stmt(&mut stmt);
        assert!(matches!(stmt.kind, StmtKind::Return(_)));
    }

    #[test]
    fn division_by_literal_zero_stays_unfolded() {
        let mut expr = binary(literal(8), BinaryOp::Div, literal(0));
        fold_expr(&mut expr);
        assert!(expr.as_literal().is_none());
    }
}
