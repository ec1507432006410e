//! Type checker.
//!
//! Pass 1 gathers struct layouts and function signatures per module; pass
//! 2 walks every function body with a fresh namespace group whose parent
//! is the module scope, resolving overloaded calls by exact
//! `(type, shape)` match and annotating the AST for the emitter (struct
//! member positions, mangled callee names, struct-shaped parameters);
//! pass 3 computes the set of functions transitively reachable from
//! `main`, which is all the emitter will lower.

use crate::ast::{Expr, ExprKind, FunctionDecl, Module, Stmt, StmtKind};
use crate::diag::{CompileError, Diagnostics};
use crate::internal::INTERNAL_FUNCTIONS;
use crate::parser::base_name;
use crate::token::Span;
use crate::types::{StructMember, Type, TypeTable};

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use itertools::Itertools;
use tracing::debug;

/// A resolved function signature: return type plus `(type, is_array)`
/// parameter shapes.
#[derive(Debug)]
pub struct FunctionSig {
    /// Return type.
    pub return_type: Type,
    /// Parameter `(type, is_array)` pairs in order.
    pub params: Vec<(Type, bool)>,
}

/// A name binding inside a namespace group.
#[derive(Debug, Clone)]
enum Binding {
    /// A stack-held value.
    Variable { ty: Type, is_array: bool },
    /// A callable, keyed by its mangled name.
    Function(Rc<FunctionSig>),
    /// A nested group: an imported module, or a struct-shaped local.
    Group(Box<Namespace>),
}

/// A namespace group. Lookup descends through nested groups; the checker
/// clones groups on scope entry so bindings flow down, never back up.
#[derive(Debug, Clone, Default)]
struct Namespace {
    entries: HashMap<String, Binding>,
    /// Set when the group models a struct-shaped value.
    struct_type: Option<Type>,
}

impl Namespace {
    fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.entries.insert(name.into(), binding);
    }

    fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    fn get_path(&self, path: &[String]) -> Option<&Binding> {
        let (first, rest) = path.split_first()?;
        let binding = self.entries.get(first)?;
        if rest.is_empty() {
            return Some(binding);
        }
        match binding {
            Binding::Group(group) => group.get_path(rest),
            _ => None,
        }
    }

    /// The group a path of container names leads to; the empty path is
    /// this group.
    fn group_at(&self, path: &[String]) -> Option<&Namespace> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => match self.entries.get(first)? {
                Binding::Group(group) => group.group_at(rest),
                _ => None,
            },
        }
    }

    /// Overload resolution: an exact-name function, or one whose base
    /// name and `(type, shape)` parameter list match.
    fn find_function(
        &self,
        path: &[String],
        name: &str,
        params: &[(Type, bool)],
    ) -> Option<(String, Rc<FunctionSig>)> {
        let group = self.group_at(path)?;

        if let Some(Binding::Function(sig)) = group.get(name) {
            return Some((name.to_string(), Rc::clone(sig)));
        }

        group.entries.iter().find_map(|(key, binding)| match binding {
            Binding::Function(sig) if base_name(key) == name && sig.params == params => {
                Some((key.clone(), Rc::clone(sig)))
            }
            _ => None,
        })
    }

    /// Every function binding whose base name matches; used for
    /// function-value references, which carry no argument shapes.
    fn functions_with_base(&self, name: &str) -> Vec<(String, Rc<FunctionSig>)> {
        self.entries
            .iter()
            .filter_map(|(key, binding)| match binding {
                Binding::Function(sig) if base_name(key) == name => {
                    Some((key.clone(), Rc::clone(sig)))
                }
                _ => None,
            })
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect()
    }
}

/// A check failure inside one function; reported and recovery continues
/// with the next function.
struct TypeError {
    message: String,
    span: Option<Span>,
}

impl TypeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }
}

type CResult<T> = Result<T, TypeError>;

/// Runs the checker over a parsed module tree, returning the set of
/// function names reachable from `main`.
pub fn check_module(
    module: &mut Module,
    diags: &mut Diagnostics,
) -> Result<HashSet<String>, CompileError> {
    let mut calls = Vec::new();

    TypeChecker {
        diags,
        calls: &mut calls,
        current_function: String::from("main"),
        current_return: None,
        loop_depth: 0,
    }
    .check_tree(module);

    if diags.has_errors() {
        return Err((&*diags).into());
    }

    let mut reachable: HashSet<String> = HashSet::from([String::from("main")]);
    let mut last_size = 0;
    while reachable.len() > last_size {
        last_size = reachable.len();
        for (from, to) in &calls {
            if reachable.contains(from) {
                reachable.insert(to.clone());
            }
        }
    }

    debug!(functions = reachable.len(), "reachability fixed point");
    Ok(reachable)
}

struct TypeChecker<'a> {
    diags: &'a mut Diagnostics,
    calls: &'a mut Vec<(String, String)>,
    current_function: String,
    current_return: Option<Type>,
    loop_depth: u32,
}

impl<'a> TypeChecker<'a> {
    /// Checks one module, submodules first, and returns its exported
    /// function signatures.
    fn check_tree(&mut self, module: &mut Module) -> Vec<(String, Rc<FunctionSig>)> {
        let mut submodule_exports = Vec::new();
        for (name, submodule) in &mut module.submodules {
            let exports = self.check_tree(submodule);
            submodule_exports.push((name.clone(), exports));
        }

        let mut types = TypeTable::new();

        // Pass 1a: struct layouts.
        for stmt in &module.statements {
            let StmtKind::Struct(decl) = &stmt.kind else {
                continue;
            };
            let mut members = Vec::new();
            for (position, (member_type, member_name)) in decl.members.iter().enumerate() {
                match types.get(member_type) {
                    Some(ty) => members.push(StructMember {
                        name: member_name.clone(),
                        position: position as u8 + 1,
                        ty,
                    }),
                    None => self.diags.report(
                        stmt.span.clone(),
                        format!("Unknown type access \"{member_type}\""),
                    ),
                }
            }
            types.define(Type::with_members(decl.name.clone(), members));
        }

        // Pass 1b: function signatures.
        let mut exports = Vec::new();
        for stmt in &module.statements {
            let StmtKind::Function(func) = &stmt.kind else {
                continue;
            };
            match self.signature_of(func, &types) {
                Ok(sig) => exports.push((func.name.clone(), Rc::new(sig))),
                Err(error) => {
                    let span = error.span.unwrap_or_else(|| stmt.span.clone());
                    self.diags.report(span, error.message);
                }
            }
        }

        // Module scope: internal builtins, imported modules, own functions.
        let mut scope = Namespace::default();
        for builtin in INTERNAL_FUNCTIONS {
            let sig = FunctionSig {
                return_type: types.get("void").expect("primitive"),
                params: vec![(types.get(builtin.param_type).expect("primitive"), false)],
            };
            scope.insert(builtin.name, Binding::Function(Rc::new(sig)));
        }
        for (name, functions) in submodule_exports {
            let mut group = Namespace::default();
            for (func_name, sig) in functions {
                group.insert(func_name, Binding::Function(sig));
            }
            scope.insert(name, Binding::Group(Box::new(group)));
        }
        for (name, sig) in &exports {
            scope.insert(name.clone(), Binding::Function(Rc::clone(sig)));
        }

        // Pass 2: function bodies.
        for stmt in &mut module.statements {
            let span = stmt.span.clone();
            match &mut stmt.kind {
                StmtKind::Function(func) => self.check_function(func, scope.clone(), &types),
                StmtKind::Struct(_) => {}
                _ => self.diags.report(
                    span,
                    "Only function, struct and import declarations are allowed at the top level",
                ),
            }
        }

        exports
    }

    fn signature_of(&self, func: &FunctionDecl, types: &TypeTable) -> CResult<FunctionSig> {
        let return_type = types
            .get(&func.return_type)
            .ok_or_else(|| TypeError::new(format!("Unknown type access \"{}\"", func.return_type)))?;
        let mut params = Vec::new();
        for param in &func.params {
            let ty = types
                .get(&param.type_name)
                .ok_or_else(|| TypeError::new(format!("Unknown type access \"{}\"", param.type_name)))?;
            params.push((ty, param.is_array));
        }
        Ok(FunctionSig {
            return_type,
            params,
        })
    }

    fn check_function(&mut self, func: &mut FunctionDecl, mut scope: Namespace, types: &TypeTable) {
        let Some(return_type) = types.get(&func.return_type) else {
            return; // already reported while gathering the signature
        };

        self.current_function = func.name.clone();
        self.current_return = Some(return_type);
        self.loop_depth = 0;

        for param in &mut func.params {
            let Some(ty) = types.get(&param.type_name) else {
                return;
            };
            if ty.has_internal_structure() {
                param.is_struct = true;
                scope.insert(param.name.clone(), struct_binding(&ty));
            } else {
                scope.insert(
                    param.name.clone(),
                    Binding::Variable {
                        ty,
                        is_array: param.is_array,
                    },
                );
            }
        }

        for stmt in &mut func.body {
            let span = stmt.span.clone();
            if let Err(error) = self.check_stmt(stmt, &mut scope, types) {
                self.diags
                    .report(error.span.unwrap_or(span), error.message);
                return;
            }
        }
    }

    fn check_stmt(
        &mut self,
        stmt: &mut Stmt,
        scope: &mut Namespace,
        types: &TypeTable,
    ) -> CResult<()> {
        let span = stmt.span.clone();
        match &mut stmt.kind {
            StmtKind::Block(stmts) => {
                let mut child = scope.clone();
                for stmt in stmts {
                    self.check_stmt(stmt, &mut child, types)?;
                }
                Ok(())
            }

            StmtKind::Function(_) | StmtKind::Struct(_) => Err(TypeError::at(
                "Functions and structs may only be declared at the top level",
                span,
            )),

            StmtKind::Let(decl) => {
                let declared = types.get(&decl.type_name).ok_or_else(|| {
                    TypeError::at(format!("Unknown type access \"{}\"", decl.type_name), span.clone())
                })?;
                if declared.is_void() {
                    return Err(TypeError::at("Cannot create a void variable", span));
                }

                let resolved = self.expr_type(&mut decl.initial, scope, types)?;
                if declared != resolved {
                    return Err(TypeError::at(
                        format!("Let statement type mismatch: {declared} != {resolved}"),
                        span,
                    ));
                }

                if decl.is_array {
                    let length_is_literal = decl
                        .length
                        .as_ref()
                        .and_then(Expr::as_literal)
                        .is_some();
                    if !length_is_literal {
                        return Err(TypeError::at(
                            "Array length must be a compile-time literal",
                            span,
                        ));
                    }
                }

                let binding = if matches!(decl.initial.kind, ExprKind::StructCreate { .. }) {
                    struct_binding(&declared)
                } else {
                    Binding::Variable {
                        ty: declared,
                        is_array: decl.is_array,
                    }
                };
                scope.insert(decl.name.clone(), binding);
                Ok(())
            }

            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                let cond = self.expr_type(condition, scope, types)?;
                if !cond.is_bool() {
                    return Err(TypeError::at(
                        "If statement did not receive boolean expression",
                        span,
                    ));
                }
                self.check_stmt(then, &mut scope.clone(), types)?;
                if let Some(otherwise) = otherwise {
                    self.check_stmt(otherwise, &mut scope.clone(), types)?;
                }
                Ok(())
            }

            StmtKind::While { condition, body } => {
                let cond = self.expr_type(condition, scope, types)?;
                if !cond.is_bool() {
                    return Err(TypeError::at(
                        "Expected boolean expression for while loop condition",
                        span,
                    ));
                }
                self.loop_depth += 1;
                let result = self.check_stmt(body, &mut scope.clone(), types);
                self.loop_depth -= 1;
                result
            }

            StmtKind::For {
                declare,
                condition,
                action,
                body,
            } => {
                let mut child = scope.clone();
                self.check_stmt(declare, &mut child, types)?;
                let cond = self.expr_type(condition, &child, types)?;
                if !cond.is_bool() {
                    return Err(TypeError::at(
                        "Expected boolean expression for for loop condition",
                        span,
                    ));
                }
                self.expr_type(action, &child, types)?;
                self.loop_depth += 1;
                let result = self.check_stmt(body, &mut child.clone(), types);
                self.loop_depth -= 1;
                result
            }

            StmtKind::Return(value) => {
                let resolved = match value {
                    Some(value) => self.expr_type(value, scope, types)?,
                    None => types.get("void").expect("primitive"),
                };
                let expected = self.current_return.clone().expect("inside a function");
                if resolved != expected {
                    return Err(TypeError::at(
                        format!("Return type mismatch: {resolved} != {expected}"),
                        span,
                    ));
                }
                Ok(())
            }

            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(TypeError::at("break/continue outside of a loop", span));
                }
                Ok(())
            }

            StmtKind::Expr(expr) => {
                self.expr_type(expr, scope, types)?;
                Ok(())
            }
        }
    }

    fn expr_type(&mut self, expr: &mut Expr, scope: &Namespace, types: &TypeTable) -> CResult<Type> {
        let span = expr.span.clone();
        match &mut expr.kind {
            ExprKind::Literal { kind, .. } => {
                Ok(types.get(kind.type_name()).expect("primitive"))
            }

            ExprKind::Variable { name, .. } => match scope.get(name) {
                Some(Binding::Variable { ty, .. }) => Ok(ty.clone()),
                Some(Binding::Group(group)) => group.struct_type.clone().ok_or_else(|| {
                    TypeError::at(format!("'{name}' is a module, not a value"), span)
                }),
                Some(Binding::Function(_)) => {
                    self.record_call(name.clone());
                    Ok(types.get("func").expect("primitive"))
                }
                None => {
                    // A function name used as a value resolves through its
                    // base name when unambiguous.
                    let candidates = scope.functions_with_base(name);
                    match candidates.len() {
                        1 => {
                            let (key, _) = candidates.into_iter().next().expect("one candidate");
                            self.record_call(key.clone());
                            *name = key;
                            Ok(types.get("func").expect("primitive"))
                        }
                        0 => Err(TypeError::at(
                            format!("Use of undefined variable '{name}'"),
                            span,
                        )),
                        _ => Err(TypeError::at(
                            format!("Ambiguous reference to overloaded function '{name}'"),
                            span,
                        )),
                    }
                }
            },

            ExprKind::Binary { left, op, right } => {
                let lt = self.expr_type(left, scope, types)?;
                let rt = self.expr_type(right, scope, types)?;
                if lt != rt {
                    let pointerish = (lt.is_int() && rt.is_string())
                        || (lt.is_string() && rt.is_int());
                    if !pointerish {
                        return Err(TypeError::at(
                            format!("Comparison type mismatch {lt} != {rt}"),
                            span,
                        ));
                    }
                }
                if op.is_comparison() {
                    Ok(types.get("bool").expect("primitive"))
                } else {
                    Ok(lt)
                }
            }

            ExprKind::Assign { name, value } => {
                let target = match scope.get(name) {
                    Some(Binding::Variable { ty, .. }) => ty.clone(),
                    _ => {
                        return Err(TypeError::at(
                            format!(
                                "Assignment to uninitialised variable {name}. \
                                 Use 'let type name = value;' to initialise."
                            ),
                            span,
                        ))
                    }
                };
                let assigned = self.expr_type(value, scope, types)?;
                if target != assigned {
                    return Err(TypeError::at(
                        format!("Assignment type mismatch: {target} != {assigned}"),
                        span,
                    ));
                }
                Ok(target)
            }

            ExprKind::AssignIndex { name, index, value } => {
                let element = match scope.get(name) {
                    Some(Binding::Variable { ty, .. }) => {
                        if ty.is_string() {
                            types.get("char").expect("primitive")
                        } else {
                            ty.clone()
                        }
                    }
                    _ => {
                        return Err(TypeError::at(
                            format!("Use of undefined variable '{name}'"),
                            span,
                        ))
                    }
                };
                let index_type = self.expr_type(index, scope, types)?;
                if !index_type.is_int() {
                    return Err(TypeError::at("Array index must be an int", span));
                }
                let assigned = self.expr_type(value, scope, types)?;
                if element != assigned {
                    return Err(TypeError::at(
                        format!("Assignment type mismatch: {element} != {assigned}"),
                        span,
                    ));
                }
                Ok(element)
            }

            ExprKind::Access { path, position } => {
                let (last, parents) = path.split_last().expect("non-empty path");
                if let Some(group) = scope.group_at(parents) {
                    if let Some(struct_type) = &group.struct_type {
                        let member = struct_type.member(last).ok_or_else(|| {
                            TypeError::at(
                                format!(
                                    "Value {} has no attribute \"{last}\"",
                                    parents.last().map(String::as_str).unwrap_or("struct")
                                ),
                                span.clone(),
                            )
                        })?;
                        *position = Some(member.position);
                        return Ok(member.ty.clone());
                    }
                }
                match scope.get_path(path) {
                    Some(Binding::Variable { ty, .. }) => Ok(ty.clone()),
                    Some(Binding::Function(_)) => {
                        let key = path.last().expect("non-empty").clone();
                        self.record_call(key);
                        Ok(types.get("func").expect("primitive"))
                    }
                    _ => Err(TypeError::at(
                        format!("Undefined value {}", path.join(".")),
                        span,
                    )),
                }
            }

            ExprKind::AccessAssign {
                path,
                position,
                value,
            } => {
                let (last, parents) = path.split_last().expect("non-empty path");
                let group = scope.group_at(parents).ok_or_else(|| {
                    TypeError::at(format!("Undefined value {}", path.join(".")), span.clone())
                })?;
                let struct_type = group.struct_type.clone().ok_or_else(|| {
                    TypeError::at(format!("{} is not a struct value", path.join(".")), span.clone())
                })?;
                let member = struct_type.member(last).ok_or_else(|| {
                    TypeError::at(
                        format!(
                            "Value {} has no attribute \"{last}\"",
                            parents.last().map(String::as_str).unwrap_or("struct")
                        ),
                        span.clone(),
                    )
                })?;
                *position = Some(member.position);
                let member_type = member.ty.clone();

                let assigned = self.expr_type(value, scope, types)?;
                if member_type != assigned {
                    return Err(TypeError::at(
                        format!("Assignment type mismatch: {member_type} != {assigned}"),
                        span,
                    ));
                }
                Ok(member_type)
            }

            ExprKind::Call { callee, args } => {
                // A registered type name in call position is a cast; the
                // node is rewritten for the emitter.
                if args.len() == 1 {
                    if let ExprKind::Variable { name, .. } = &callee.kind {
                        if types.exists(name) {
                            let target = name.clone();
                            let mut value = args.pop().expect("one argument");
                            let value_type = self.expr_type(&mut value, scope, types)?;
                            let target_type = types.get(&target).expect("checked above");
                            if !types.is_cast_allowed(&value_type, &target_type) {
                                return Err(TypeError::at(
                                    format!(
                                        "Cast from type {value_type} to type {target_type} is not possible"
                                    ),
                                    span,
                                ));
                            }
                            expr.kind = ExprKind::Cast {
                                target,
                                value: Box::new(value),
                            };
                            return Ok(target_type);
                        }
                    }
                }

                let mut shapes = Vec::new();
                for arg in args.iter_mut() {
                    let ty = self.expr_type(arg, scope, types)?;
                    let is_array = expr_is_array(arg, scope);
                    shapes.push((ty, is_array));
                }

                match &mut callee.kind {
                    ExprKind::Variable { name, .. } => {
                        // Calls through a local function value skip
                        // signature validation; the shape is unknown.
                        if let Some(Binding::Variable { ty, .. }) = scope.get(name) {
                            if ty.is_func() {
                                return Ok(types.get("int").expect("primitive"));
                            }
                        }

                        let (key, sig) = scope
                            .find_function(&[], name, &shapes)
                            .ok_or_else(|| undefined_call(name, &shapes, span.clone()))?;
                        self.validate_args(&sig, &shapes, &span)?;
                        self.record_call(key.clone());
                        *name = key;
                        Ok(sig.return_type.clone())
                    }

                    ExprKind::Access { path, .. } => {
                        let (last, parents) = path.split_last().expect("non-empty path");
                        let (key, sig) = scope
                            .find_function(parents, last, &shapes)
                            .ok_or_else(|| {
                                undefined_call(&path.join("."), &shapes, span.clone())
                            })?;
                        self.validate_args(&sig, &shapes, &span)?;
                        self.record_call(key.clone());
                        *path.last_mut().expect("non-empty") = key;
                        Ok(sig.return_type.clone())
                    }

                    ExprKind::Call { .. } => {
                        let inner = self.expr_type(callee, scope, types)?;
                        if !inner.is_func() {
                            return Err(TypeError::at(
                                "Expression is not callable",
                                span,
                            ));
                        }
                        Ok(types.get("int").expect("primitive"))
                    }

                    _ => Err(TypeError::at("Expression is not callable", span)),
                }
            }

            ExprKind::Array {
                elements,
                is_string,
            } => {
                if *is_string {
                    return Ok(types.get("string").expect("primitive"));
                }
                if elements.is_empty() {
                    return Err(TypeError::at("Empty array literal", span));
                }
                let mut element_types = Vec::new();
                for element in elements.iter_mut() {
                    element_types.push(self.expr_type(element, scope, types)?);
                }
                let first = element_types[0].clone();
                if element_types.iter().any(|ty| *ty != first) {
                    return Err(TypeError::at("Multiple data types in array", span));
                }
                Ok(first)
            }

            ExprKind::Index { name, index } => {
                let index_type = self.expr_type(index, scope, types)?;
                if !index_type.is_int() {
                    return Err(TypeError::at("Array index must be an int", span));
                }
                match scope.get(name) {
                    Some(Binding::Variable { ty, .. }) => {
                        if ty.is_string() {
                            Ok(types.get("char").expect("primitive"))
                        } else {
                            Ok(ty.clone())
                        }
                    }
                    _ => Err(TypeError::at(
                        format!("Use of undefined variable '{name}'"),
                        span,
                    )),
                }
            }

            ExprKind::StructCreate {
                type_name,
                args,
                member_count,
            } => {
                let ty = types.get(type_name).ok_or_else(|| {
                    TypeError::at(format!("Unknown type access \"{type_name}\""), span.clone())
                })?;
                if !ty.has_internal_structure() {
                    return Err(TypeError::at(
                        format!("{type_name} is not a struct type"),
                        span,
                    ));
                }
                *member_count = Some(ty.members().len() as u8);

                if args.len() != ty.members().len() {
                    return Err(TypeError::at(
                        format!(
                            "Wrong number of args: expected {}, got {}",
                            ty.members().len(),
                            args.len()
                        ),
                        span,
                    ));
                }
                for (index, arg) in args.iter_mut().enumerate() {
                    let arg_type = self.expr_type(arg, scope, types)?;
                    let member = &ty.members()[index];
                    if arg_type != member.ty {
                        return Err(TypeError::at(
                            format!(
                                "Argument mismatch: arg ({index}) {} != {arg_type}",
                                member.ty
                            ),
                            span,
                        ));
                    }
                }
                Ok(ty)
            }

            ExprKind::Cast { target, value } => {
                let value_type = self.expr_type(value, scope, types)?;
                let target_type = types.get(target).ok_or_else(|| {
                    TypeError::at(format!("Unknown type access \"{target}\""), span.clone())
                })?;
                if !types.is_cast_allowed(&value_type, &target_type) {
                    return Err(TypeError::at(
                        format!(
                            "Cast from type {value_type} to type {target_type} is not possible"
                        ),
                        span,
                    ));
                }
                Ok(target_type)
            }
        }
    }

    fn validate_args(
        &self,
        sig: &FunctionSig,
        shapes: &[(Type, bool)],
        span: &Span,
    ) -> CResult<()> {
        if sig.params.len() != shapes.len() {
            return Err(TypeError::at(
                format!(
                    "Wrong number of args: expected {}, got {}",
                    sig.params.len(),
                    shapes.len()
                ),
                span.clone(),
            ));
        }
        for (index, ((expected, expected_array), (actual, actual_array))) in
            sig.params.iter().zip(shapes).enumerate()
        {
            if expected != actual {
                return Err(TypeError::at(
                    format!("Argument mismatch: arg ({index}) {expected} != {actual}"),
                    span.clone(),
                ));
            }
            if expected_array != actual_array {
                return Err(TypeError::at(
                    format!(
                        "Argument {index} was {}expecting an array",
                        if *expected_array { "" } else { "not " }
                    ),
                    span.clone(),
                ));
            }
        }
        Ok(())
    }

    fn record_call(&mut self, to: String) {
        self.calls.push((self.current_function.clone(), to));
    }
}

fn struct_binding(ty: &Type) -> Binding {
    let mut group = Namespace {
        entries: HashMap::new(),
        struct_type: Some(ty.clone()),
    };
    for member in ty.members() {
        group.insert(
            member.name.clone(),
            Binding::Variable {
                ty: member.ty.clone(),
                is_array: false,
            },
        );
    }
    Binding::Group(Box::new(group))
}

fn expr_is_array(expr: &Expr, scope: &Namespace) -> bool {
    match &expr.kind {
        ExprKind::Array { .. } => true,
        ExprKind::Variable { name, .. } => matches!(
            scope.get(name),
            Some(Binding::Variable { is_array: true, .. })
        ),
        _ => false,
    }
}

fn undefined_call(name: &str, shapes: &[(Type, bool)], span: Span) -> TypeError {
    let rendered = shapes
        .iter()
        .map(|(ty, is_array)| format!("{ty}{}", if *is_array { "[]" } else { "" }))
        .join(", ");
    TypeError::at(
        format!("Call to undefined function {name}({rendered})"),
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::fold_module;
    use crate::loader::MemoryLoader;
    use crate::parser::parse_source;

    fn check(source: &str) -> (Result<HashSet<String>, CompileError>, Diagnostics) {
        let mut loader = MemoryLoader::new();
        loader.insert(
            "io",
            "function void print(int n) { __internal_print(n); }\n\
             function void print(char c) { __internal_print_char(c); }",
        );
        let mut diags = Diagnostics::new();
        let mut module = parse_source(source, "main.hatch", true, &loader, &mut diags);
        assert!(!diags.has_errors(), "parse failed: {diags}");
        fold_module(&mut module);
        let result = check_module(&mut module, &mut diags);
        (result, diags)
    }

    #[test]
    fn undefined_variables_are_diagnosed() {
        let (result, diags) = check("function void main() { let int x = y; }");
        assert!(result.is_err());
        assert!(diags.to_string().contains("undefined variable 'y'"));
    }

    #[test]
    fn void_lets_are_rejected() {
        let (result, diags) = check("function void main() { let void x = 1; }");
        assert!(result.is_err());
        assert!(diags.to_string().contains("void variable"));
    }

    #[test]
    fn conditions_must_be_boolean() {
        let (result, _) = check("function void main() { let int x = 1; if (x) { } }");
        assert!(result.is_err());
    }

    #[test]
    fn overloads_resolve_by_shape() {
        let (result, diags) = check(
            "import io;\n\
             function void main() { io.print(5); io.print(104c); }",
        );
        assert!(result.is_ok(), "{diags}");
        let reachable = result.unwrap();
        assert!(reachable
            .iter()
            .any(|name| name.starts_with("print###|int|")));
        assert!(reachable
            .iter()
            .any(|name| name.starts_with("print###|char|")));
    }

    #[test]
    fn unreachable_functions_are_pruned() {
        let (result, _) = check(
            "import io;\n\
             function void main() { io.print(5); }",
        );
        let reachable = result.unwrap();
        assert!(!reachable
            .iter()
            .any(|name| name.starts_with("print###|char|")));
    }

    #[test]
    fn overload_failure_lists_argument_types() {
        let (result, diags) = check(
            "import io;\n\
             function void main() { io.print(true); }",
        );
        assert!(result.is_err());
        assert!(diags.to_string().contains("print(bool)"), "{diags}");
    }

    #[test]
    fn struct_access_positions_are_annotated() {
        let source = "struct Car { int wheels, int seats, }\n\
                      function int wps(Car c) { return c.wheels + c.seats; }\n\
                      function void main() {\n\
                          let Car ford = new Car(4, 5);\n\
                          let int w = ford.seats;\n\
                          __internal_print(wps(ford));\n\
                          __internal_print(w);\n\
                      }";
        let mut loader = MemoryLoader::new();
        loader.insert("io", "");
        let mut diags = Diagnostics::new();
        let mut module = parse_source(source, "main.hatch", true, &loader, &mut diags);
        fold_module(&mut module);
        let result = check_module(&mut module, &mut diags);
        assert!(result.is_ok(), "{diags}");

        let StmtKind::Function(main) = &module.statements[2].kind else {
            panic!("expected main");
        };
        let StmtKind::Let(decl) = &main.body[1].kind else {
            panic!("expected let");
        };
        let ExprKind::Access { position, .. } = &decl.initial.kind else {
            panic!("expected access initializer");
        };
        assert_eq!(Some(2), *position);

        // The struct-typed parameter was marked for the emitter.
        let StmtKind::Function(wps) = &module.statements[1].kind else {
            panic!("expected wps");
        };
        assert!(wps.params[0].is_struct);
    }

    #[test]
    fn return_type_mismatches_are_diagnosed() {
        let (result, diags) = check("function int f() { return true; } function void main() { f(); }");
        assert!(result.is_err());
        assert!(diags.to_string().contains("Return type mismatch"));
    }

    #[test]
    fn casts_require_registration() {
        let (ok, diags) = check(
            "function void main() { let char c = 104c; let int x = int(c); __internal_print(x); }",
        );
        assert!(ok.is_ok(), "{diags}");

        let (bad, _) = check("function void main() { let int x = 1; let bool b = bool(x); }");
        assert!(bad.is_err());
    }

    #[test]
    fn function_values_extend_the_call_graph() {
        let (result, diags) = check(
            "function int inc(int b) { return b + 1; }\n\
             function func pick() { return inc; }\n\
             function void main() { let func f = pick(); f(1); }",
        );
        assert!(result.is_ok(), "{diags}");
        let reachable = result.unwrap();
        assert!(reachable.iter().any(|name| name.starts_with("inc###|")));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let (result, _) = check("function void main() { break; }");
        assert!(result.is_err());
    }
}
