//! Bytecode emitter.
//!
//! Lowers the checked AST to (opcode, operand) byte pairs. The emitter
//! mirrors the runtime data stack in a compile-time model (see
//! [`stack`]), decides between inline and data-section construction for
//! aggregates, resolves forward references to functions and data in a
//! final link pass, and emits bodies only for functions the checker
//! proved reachable from `main`.
//!
//! `main` is lowered first; every `CALL`/function-value placeholder left
//! behind then pulls in the body of its target until no unresolved
//! placeholder remains, after which the data section is appended and the
//! single linear fix-up pass produces the final image.

mod data;
mod expr;
mod stack;

use data::{DataId, DataSection};
pub(crate) use expr::CalleeRef;
use stack::{ScopeStack, SlotInfo, StackModel, Uid};

use crate::ast::{
    BinaryOp, Expr, ExprKind, FunctionDecl, LetDecl, Module, Stmt, StmtKind,
};
use crate::diag::CompileError;

use hatch_asm::{mov_operand, AddressFlags, Opcode, RegisterId, PROGRAM_CEILING};

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

/// The linked output of a compilation.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    /// The raw image: instruction pairs followed by the data section.
    pub image: Vec<u8>,
    /// Resolved function entry addresses, `main` included.
    pub function_addresses: BTreeMap<String, usize>,
    /// Offset where the data section begins (equals the image length when
    /// no data section was emitted).
    pub data_start: usize,
}

/// One slot of the pre-link instruction vector.
#[derive(Debug, Clone)]
pub(crate) enum Item {
    /// A concrete byte.
    Byte(u8),
    /// A back-patched code address, validated at link time.
    Addr(usize),
    /// A function entry placeholder, keyed by mangled name.
    Func(String),
    /// A data-section placeholder with a per-reference offset.
    Data {
        id: DataId,
        offset: i16,
    },
}

#[derive(Debug, Default)]
struct LoopFixups {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// Emits a checked module tree into a linked program image.
pub fn emit_module(
    module: &Module,
    reachable: &HashSet<String>,
) -> Result<CompiledProgram, CompileError> {
    let mut functions = HashMap::new();
    let mut main = None;
    collect_functions(module, &mut functions, &mut main);
    let main = main.ok_or(CompileError::NoMainFunction)?;

    let mut emitter = Emitter {
        items: Vec::new(),
        stack: StackModel::new(),
        scopes: ScopeStack::new(),
        loops: Vec::new(),
        functions,
        function_addresses: BTreeMap::from([(String::from("main"), 0)]),
        data: DataSection::new(),
        reachable,
        current_params: Vec::new(),
        in_main: true,
    };

    emitter.emit_main(main)?;

    // Lazy function emission: resolve placeholders until none are left.
    loop {
        let next = emitter.items.iter().find_map(|item| match item {
            Item::Func(name) if !emitter.function_addresses.contains_key(name) => {
                Some(name.clone())
            }
            _ => None,
        });
        let Some(name) = next else { break };

        let func = *emitter
            .functions
            .get(&name)
            .ok_or_else(|| CompileError::UnresolvedFunction { name: name.clone() })?;
        emitter.emit_function(func)?;
    }

    emitter.link()
}

fn collect_functions<'a>(
    module: &'a Module,
    functions: &mut HashMap<String, &'a FunctionDecl>,
    main: &mut Option<&'a FunctionDecl>,
) {
    for stmt in &module.statements {
        if let StmtKind::Function(func) = &stmt.kind {
            if func.is_main {
                *main = Some(func);
            } else {
                functions.insert(func.name.clone(), func);
            }
        }
    }
    for submodule in module.submodules.values() {
        collect_functions(submodule, functions, main);
    }
}

fn stmts_of(stmt: &Stmt) -> &[Stmt] {
    match &stmt.kind {
        StmtKind::Block(stmts) => stmts,
        _ => std::slice::from_ref(stmt),
    }
}

pub(crate) struct Emitter<'ast> {
    items: Vec<Item>,
    pub(crate) stack: StackModel,
    scopes: ScopeStack,
    loops: Vec<LoopFixups>,
    functions: HashMap<String, &'ast FunctionDecl>,
    function_addresses: BTreeMap<String, usize>,
    data: DataSection,
    reachable: &'ast HashSet<String>,
    current_params: Vec<Uid>,
    in_main: bool,
}

impl<'ast> Emitter<'ast> {
    // ---- low-level emission -------------------------------------------

    pub(crate) fn here(&self) -> usize {
        self.items.len()
    }

    fn push_op(&mut self, op: Opcode, flags: AddressFlags, operand: Item) -> usize {
        self.items.push(Item::Byte(op as u8 | flags.bits()));
        self.items.push(operand);
        self.items.len() - 1
    }

    /// Emits `op` with an immediate operand; returns the operand slot
    /// index for back-patching.
    pub(crate) fn op(&mut self, op: Opcode, operand: u8) -> usize {
        self.push_op(op, AddressFlags::empty(), Item::Byte(operand))
    }

    /// Emits `op` with a stack-relative operand.
    pub(crate) fn op_stack(&mut self, op: Opcode, offset: u8) -> usize {
        self.push_op(op, AddressFlags::STACK, Item::Byte(offset))
    }

    /// Emits `op` with any operand item and flags.
    pub(crate) fn op_item(&mut self, op: Opcode, flags: AddressFlags, operand: Item) -> usize {
        self.push_op(op, flags, operand)
    }

    pub(crate) fn patch(&mut self, operand_index: usize, address: usize) {
        self.items[operand_index] = Item::Addr(address);
    }

    pub(crate) fn patch_here(&mut self, operand_index: usize) {
        let here = self.here();
        self.patch(operand_index, here);
    }

    pub(crate) fn intern_data(&mut self, bytes: Vec<u8>) -> DataId {
        self.data.intern(bytes)
    }

    // ---- name resolution ----------------------------------------------

    pub(crate) fn slot(&self, name: &str) -> Result<SlotInfo, CompileError> {
        self.scopes
            .lookup(name)
            .ok_or_else(|| CompileError::Internal(format!("no stack slot for `{name}`")))
    }

    pub(crate) fn local_slot(&self, name: &str) -> Option<SlotInfo> {
        self.scopes.lookup(name)
    }

    pub(crate) fn offset_of(&self, info: SlotInfo) -> Result<u8, CompileError> {
        let offset = self
            .stack
            .offset_of(info.uid)
            .ok_or_else(|| CompileError::Internal(String::from("slot left the stack model")))?;
        u8::try_from(offset)
            .map_err(|_| CompileError::Internal(String::from("stack offset exceeds a byte")))
    }

    pub(crate) fn slot_offset(&self, name: &str) -> Result<u8, CompileError> {
        let info = self.slot(name)?;
        self.offset_of(info)
    }

    pub(crate) fn is_function_name(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    // ---- functions ----------------------------------------------------

    fn emit_main(&mut self, main: &'ast FunctionDecl) -> Result<(), CompileError> {
        debug!("emitting main");
        self.in_main = true;
        let returned = self.emit_statements(&main.body)?;
        if !returned {
            self.release_function()?;
            self.op(Opcode::HLT, 0);
        }
        Ok(())
    }

    fn emit_function(&mut self, func: &'ast FunctionDecl) -> Result<(), CompileError> {
        debug!(name = %func.name, reachable = self.reachable.contains(&func.name), "emitting function");

        self.in_main = false;
        self.stack = StackModel::new();
        self.scopes = ScopeStack::new();
        self.current_params.clear();

        let address = self.here();
        self.function_addresses.insert(func.name.clone(), address);

        for param in &func.params {
            let uid = self.scopes.declare(
                &param.name,
                &mut self.stack,
                param.is_array,
                param.is_struct,
            );
            self.current_params.push(uid);
        }

        let returned = self.emit_statements(&func.body)?;
        if !returned {
            self.release_function()?;
            self.op(Opcode::RET, 0);
        }
        Ok(())
    }

    // ---- statements ---------------------------------------------------

    /// Emits a statement sequence; returns whether a `return` terminated
    /// it (everything after a `return` in a block is dropped).
    fn emit_statements(&mut self, stmts: &[Stmt]) -> Result<bool, CompileError> {
        for stmt in stmts {
            if self.emit_stmt(stmt)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<bool, CompileError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                self.emit_scoped_statements(stmts)?;
                Ok(false)
            }

            // Function bodies are emitted by the placeholder loop; struct
            // declarations carry no code.
            StmtKind::Function(_) | StmtKind::Struct(_) => Ok(false),

            StmtKind::Let(decl) => {
                self.emit_let(decl)?;
                Ok(false)
            }

            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.emit_if(condition, then, otherwise.as_deref())?;
                Ok(false)
            }

            StmtKind::While { condition, body } => {
                self.emit_while(condition, body)?;
                Ok(false)
            }

            StmtKind::For {
                declare,
                condition,
                action,
                body,
            } => {
                self.emit_for(declare, condition, action, body)?;
                Ok(false)
            }

            StmtKind::Return(value) => {
                self.emit_return(value.as_ref())?;
                Ok(true)
            }

            StmtKind::Break => {
                let operand = self.op(Opcode::JMP, 0);
                self.loops
                    .last_mut()
                    .ok_or_else(|| CompileError::Internal(String::from("break outside loop")))?
                    .breaks
                    .push(operand);
                Ok(false)
            }

            StmtKind::Continue => {
                let operand = self.op(Opcode::JMP, 0);
                self.loops
                    .last_mut()
                    .ok_or_else(|| CompileError::Internal(String::from("continue outside loop")))?
                    .continues
                    .push(operand);
                Ok(false)
            }

            StmtKind::Expr(expr) => {
                self.emit_expr_stmt(expr)?;
                Ok(false)
            }
        }
    }

    /// Emits a branch/body statement in its own scope frame, releasing
    /// its locals on the way out.
    fn emit_scoped(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.emit_scoped_statements(stmts_of(stmt))
    }

    fn emit_scoped_statements(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        self.scopes.push_frame();
        let returned = self.emit_statements(stmts)?;
        if !returned {
            self.release_frame()?;
        }
        self.scopes.pop_frame();
        Ok(())
    }

    fn emit_expr_stmt(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                self.emit_call(CalleeRef::Ast(callee), args)?;
                Ok(())
            }
            ExprKind::Assign { name, value } => self.emit_assign(name, value),
            ExprKind::AssignIndex { name, index, value } => {
                self.emit_assign_index(name, index, value)
            }
            ExprKind::AccessAssign {
                path,
                position,
                value,
            } => self.emit_access_assign(path, *position, value),
            ExprKind::Variable {
                name,
                increment,
                decrement,
            } => {
                if *increment {
                    let offset = self.slot_offset(name)?;
                    self.op_stack(Opcode::INC, offset);
                } else if *decrement {
                    let offset = self.slot_offset(name)?;
                    self.op_stack(Opcode::DEC, offset);
                }
                Ok(())
            }
            ExprKind::Binary { .. } => self.emit_binary(expr),
            ExprKind::Cast { value, .. } => self.emit_expr_stmt(value),
            // Value-only expressions in statement position have no
            // effect.
            ExprKind::Literal { .. }
            | ExprKind::Access { .. }
            | ExprKind::Index { .. }
            | ExprKind::Array { .. }
            | ExprKind::StructCreate { .. } => Ok(()),
        }
    }

    // ---- let ----------------------------------------------------------

    fn emit_let(&mut self, decl: &LetDecl) -> Result<(), CompileError> {
        match &decl.initial.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.declare(decl, false, false);
                self.op(Opcode::PUSH, 1);
                self.op(Opcode::LDA, value);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Call { callee, args } => {
                self.emit_call(CalleeRef::Ast(callee), args)?;
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::A, RegisterId::F),
                );
                self.declare(decl, false, false);
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Binary { .. } => {
                self.emit_binary(&decl.initial)?;
                self.declare(decl, false, false);
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Variable { name, .. } if self.is_function_name(name) => {
                self.op_item(
                    Opcode::LDA,
                    AddressFlags::empty(),
                    Item::Func(name.clone()),
                );
                self.op(Opcode::PUSH, 1);
                self.declare(decl, false, false);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Variable { name, .. } => {
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::LDA, offset);
                self.op(Opcode::PUSH, 1);
                self.declare(decl, false, false);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Array { elements, .. } => {
                let length = decl
                    .length
                    .as_ref()
                    .and_then(Expr::as_literal)
                    .unwrap_or(elements.len() as u8);
                self.declare(decl, true, false);
                self.emit_array(elements, Some(length), false)?;
            }

            ExprKind::Index { name, index } => {
                self.emit_index(name, index, RegisterId::A)?;
                self.op(Opcode::PUSH, 1);
                self.declare(decl, false, false);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::StructCreate {
                args, member_count, ..
            } => {
                let count = member_count.ok_or_else(|| {
                    CompileError::Internal(String::from("struct creation missing member count"))
                })?;
                self.declare(decl, false, true);
                self.emit_struct_create(count, args)?;
            }

            _ => {
                self.load_into_register(&decl.initial, RegisterId::A)?;
                self.op(Opcode::PUSH, 1);
                self.declare(decl, false, false);
                self.op_stack(Opcode::STA, 1);
            }
        }
        Ok(())
    }

    fn declare(&mut self, decl: &LetDecl, is_array: bool, is_struct: bool) -> Uid {
        self.scopes.declare(
            &decl.name,
            &mut self.stack,
            is_array || decl.is_array,
            is_struct,
        )
    }

    // ---- assignments --------------------------------------------------

    fn emit_assign(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        match &value.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.op(Opcode::LDA, value);
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, offset);
            }

            ExprKind::Binary { left, op, right } => {
                // In-place increment/decrement peephole: `x = x + 1` is a
                // single INC over the variable's cell.
                if let (
                    ExprKind::Variable {
                        name: src,
                        increment: false,
                        decrement: false,
                    },
                    Some(1),
                ) = (&left.kind, right.as_literal())
                {
                    let bump = match op {
                        BinaryOp::Add => Some(Opcode::INC),
                        BinaryOp::Sub => Some(Opcode::DEC),
                        _ => None,
                    };
                    if let Some(bump) = bump {
                        if src == name {
                            let offset = self.slot_offset(name)?;
                            self.op_stack(bump, offset);
                        } else {
                            let source = self.slot_offset(src)?;
                            self.op_stack(Opcode::LDA, source);
                            let target = self.slot_offset(name)?;
                            self.op_stack(Opcode::STA, target);
                            self.op_stack(bump, target);
                        }
                        return Ok(());
                    }
                }

                self.emit_binary(value)?;
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, offset);
            }

            ExprKind::Variable {
                name: source,
                increment,
                decrement,
            } => {
                let source_offset = self.slot_offset(source)?;
                self.op_stack(Opcode::LDA, source_offset);
                let target = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, target);
                if *increment {
                    self.op_stack(Opcode::INC, source_offset);
                } else if *decrement {
                    self.op_stack(Opcode::DEC, source_offset);
                }
            }

            ExprKind::Call { callee, args } => {
                self.emit_call(CalleeRef::Ast(callee), args)?;
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::A, RegisterId::F),
                );
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, offset);
            }

            ExprKind::Index {
                name: array, index, ..
            } => {
                self.emit_index(array, index, RegisterId::A)?;
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, offset);
            }

            _ => {
                self.load_into_register(value, RegisterId::A)?;
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::STA, offset);
            }
        }
        Ok(())
    }

    fn emit_assign_index(
        &mut self,
        name: &str,
        index: &Expr,
        value: &Expr,
    ) -> Result<(), CompileError> {
        match &index.kind {
            ExprKind::Literal { value: idx, .. } => {
                let position = idx.wrapping_add(1);
                self.emit_index_value(value)?;
                self.op(Opcode::OFF, position);
            }

            ExprKind::Variable {
                name: index_name, ..
            } => {
                self.emit_index_value(value)?;
                let offset = self.slot_offset(index_name)?;
                self.op_stack(Opcode::LDB, offset);
                self.op(Opcode::INC, RegisterId::B.mirror_address());
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::O, RegisterId::B),
                );
            }

            _ => {
                // Computed index: resolve it first and park it, so the
                // value can be loaded while the offset register is still
                // zero.
                self.load_into_register(index, RegisterId::A)?;
                self.op(Opcode::INC, RegisterId::A.mirror_address());
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
                self.stack.temp_extra += 1;

                self.emit_index_value(value)?;

                self.op_stack(Opcode::LDB, 1);
                self.op(Opcode::FREE, 1);
                self.stack.temp_extra -= 1;
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::O, RegisterId::B),
                );
            }
        }

        let offset = self.slot_offset(name)?;
        self.op_stack(Opcode::STA, offset);
        self.op(Opcode::OFF, 0);
        Ok(())
    }

    /// Loads the right-hand side of an indexed assignment into `A`.
    fn emit_index_value(&mut self, value: &Expr) -> Result<(), CompileError> {
        match &value.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.op(Opcode::LDA, value);
                Ok(())
            }
            ExprKind::Variable { name, .. } => {
                let offset = self.slot_offset(name)?;
                self.op_stack(Opcode::LDA, offset);
                Ok(())
            }
            ExprKind::Index { name, index } => self.emit_index(name, index, RegisterId::A),
            _ => self.load_into_register(value, RegisterId::A),
        }
    }

    fn emit_access_assign(
        &mut self,
        path: &[String],
        position: Option<u8>,
        value: &Expr,
    ) -> Result<(), CompileError> {
        let position = position.ok_or_else(|| {
            CompileError::Internal(String::from("member assignment missing position"))
        })?;
        self.load_into_register(value, RegisterId::A)?;
        self.op(Opcode::OFF, position);
        let offset = self.slot_offset(&path[0])?;
        self.op_stack(Opcode::STA, offset);
        self.op(Opcode::OFF, 0);
        Ok(())
    }

    // ---- control flow -------------------------------------------------

    fn emit_if(
        &mut self,
        condition: &Expr,
        then: &Stmt,
        otherwise: Option<&Stmt>,
    ) -> Result<(), CompileError> {
        // Literal conditions normally fold away; handle stragglers.
        if let Some(value) = condition.as_literal() {
            if value != 0 {
                return self.emit_scoped(then);
            }
            if let Some(otherwise) = otherwise {
                return self.emit_scoped(otherwise);
            }
            return Ok(());
        }

        let (true_jump, false_jump) = match &condition.kind {
            ExprKind::Binary { left, op, right } if op.is_comparison() => {
                self.emit_comparison_operands(left, right)?;
                branch_pair(*op)
            }
            _ => {
                // Truthiness: compare the value against 1.
                self.load_into_register(condition, RegisterId::A)?;
                self.op(Opcode::LDB, 1);
                (Opcode::JE, Opcode::JNE)
            }
        };

        self.op(Opcode::CMP, 0);
        let then_operand = self.op(true_jump, 0);
        let else_operand = self.op(false_jump, 0);
        self.patch_here(then_operand);

        self.emit_scoped(then)?;
        let end_operand = self.op(Opcode::JMP, 0);
        self.patch_here(else_operand);

        if let Some(otherwise) = otherwise {
            self.emit_scoped(otherwise)?;
        }
        self.patch_here(end_operand);
        Ok(())
    }

    fn emit_while(&mut self, condition: &Expr, body: &Stmt) -> Result<(), CompileError> {
        if let Some(value) = condition.as_literal() {
            if value == 0 {
                return Ok(());
            }
            // `while (true)`: no comparison, just an unconditional loop.
            let loop_start = self.here();
            self.loops.push(LoopFixups::default());
            self.emit_loop_body(body)?;
            self.op_item(Opcode::JMP, AddressFlags::empty(), Item::Addr(loop_start));
            let end = self.here();
            self.patch_loop(loop_start, end);
            return Ok(());
        }

        let comparison_start = self.here();
        let exit_operand = self.emit_loop_condition(condition)?;

        self.loops.push(LoopFixups::default());
        self.emit_loop_body(body)?;
        self.op_item(
            Opcode::JMP,
            AddressFlags::empty(),
            Item::Addr(comparison_start),
        );
        let end = self.here();
        self.patch(exit_operand, end);
        self.patch_loop(comparison_start, end);
        Ok(())
    }

    fn emit_for(
        &mut self,
        declare: &Stmt,
        condition: &Expr,
        action: &Expr,
        body: &Stmt,
    ) -> Result<(), CompileError> {
        self.scopes.push_frame();
        self.emit_stmt(declare)?;

        let comparison_start = self.here();
        let exit_operand = self.emit_loop_condition(condition)?;

        self.loops.push(LoopFixups::default());

        self.scopes.push_frame();
        let returned = self.emit_statements(stmts_of(body))?;
        let body_slots = self.scopes.current_frame_slots();
        self.scopes.pop_frame();

        if !returned {
            // The update runs before the body's locals are released.
            self.emit_expr_stmt(action)?;
            self.release_slots(&body_slots, true)?;
        }

        self.op_item(
            Opcode::JMP,
            AddressFlags::empty(),
            Item::Addr(comparison_start),
        );
        let end = self.here();
        self.patch(exit_operand, end);
        self.patch_loop(comparison_start, end);

        // Release the loop variable.
        self.release_frame()?;
        self.scopes.pop_frame();
        Ok(())
    }

    /// Lowers a loop condition as an inverted jump to the (not yet known)
    /// end address; returns the operand slot to patch.
    fn emit_loop_condition(&mut self, condition: &Expr) -> Result<usize, CompileError> {
        let exit_jump = match &condition.kind {
            ExprKind::Binary { left, op, right } if op.is_comparison() => {
                self.emit_comparison_operands(left, right)?;
                inverted_branch(*op)
            }
            _ => {
                self.load_into_register(condition, RegisterId::A)?;
                self.op(Opcode::LDB, 1);
                Opcode::JNE
            }
        };
        self.op(Opcode::CMP, 0);
        Ok(self.op(exit_jump, 0))
    }

    fn emit_loop_body(&mut self, body: &Stmt) -> Result<(), CompileError> {
        self.scopes.push_frame();
        let returned = self.emit_statements(stmts_of(body))?;
        if !returned {
            self.release_frame()?;
        }
        self.scopes.pop_frame();
        Ok(())
    }

    fn patch_loop(&mut self, comparison_start: usize, end: usize) {
        let fixups = self.loops.pop().expect("loop context pushed by caller");
        for operand in fixups.breaks {
            self.patch(operand, end);
        }
        for operand in fixups.continues {
            self.patch(operand, comparison_start);
        }
    }

    // ---- return -------------------------------------------------------

    fn emit_return(&mut self, value: Option<&Expr>) -> Result<(), CompileError> {
        // `main` is not entered through CALL, so its returns halt the
        // machine instead of popping an empty call stack.
        if self.in_main {
            if let Some(value) = value {
                self.load_into_register(value, RegisterId::A)?;
            }
            self.release_function()?;
            self.op(Opcode::HLT, 0);
            return Ok(());
        }

        match value.map(|value| &value.kind) {
            None => {
                self.release_function()?;
                self.op(Opcode::RET, 0);
            }

            Some(ExprKind::Literal { value, .. }) => {
                let value = *value;
                self.release_function()?;
                self.op(Opcode::RET, value);
            }

            Some(ExprKind::Variable { name, .. }) if self.is_function_name(name) => {
                self.op_item(
                    Opcode::LDA,
                    AddressFlags::empty(),
                    Item::Func(name.clone()),
                );
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::F, RegisterId::A),
                );
                self.release_function()?;
                self.op_stack(Opcode::RET, 0);
            }

            Some(ExprKind::Call { callee, args }) => {
                // The callee's RET already moved the result into F.
                self.emit_call(CalleeRef::Ast(callee), args)?;
                self.release_function()?;
                self.op_stack(Opcode::RET, 0);
            }

            Some(_) => {
                let value = value.expect("checked above");
                self.load_into_register(value, RegisterId::A)?;
                self.op(
                    Opcode::MOV,
                    mov_operand(RegisterId::F, RegisterId::A),
                );
                self.release_function()?;
                self.op_stack(Opcode::RET, 0);
            }
        }
        Ok(())
    }

    // ---- stack release ------------------------------------------------

    fn release_frame(&mut self) -> Result<(), CompileError> {
        let slots = self.scopes.current_frame_slots();
        self.release_slots(&slots, true)
    }

    fn release_function(&mut self) -> Result<(), CompileError> {
        let slots = self.scopes.all_slots();
        self.release_slots(&slots, false)
    }

    /// Frees the stacked values belonging to `slots`, top of stack
    /// downwards: scalar runs collapse into one `FREE n`; aggregates
    /// release their whole allocation, except DUP-copied parameters which
    /// are only popped.
    fn release_slots(&mut self, slots: &[SlotInfo], unstack: bool) -> Result<(), CompileError> {
        let by_uid: HashMap<Uid, SlotInfo> =
            slots.iter().map(|info| (info.uid, *info)).collect();

        let mut ordered = Vec::new();
        for uid in self.stack.top_down() {
            match by_uid.get(&uid) {
                Some(info) => ordered.push(*info),
                None => break,
            }
        }

        let mut streak: u8 = 0;
        for info in &ordered {
            if !info.is_aggregate() {
                streak += 1;
                continue;
            }
            if streak > 0 {
                self.op(Opcode::FREE, streak);
                streak = 0;
            }
            if self.current_params.contains(&info.uid) {
                self.op(Opcode::POP, 1);
            } else {
                self.op_item(Opcode::FREE, AddressFlags::MEM, Item::Byte(0));
            }
        }
        if streak > 0 {
            self.op(Opcode::FREE, streak);
        }

        if unstack {
            self.stack.unstack(ordered.len());
        }
        Ok(())
    }

    // ---- link ---------------------------------------------------------

    fn link(mut self) -> Result<CompiledProgram, CompileError> {
        let data_start = self.items.len();
        let layout = self.data.layout(data_start);
        let data_bytes: Vec<u8> = self.data.bytes().collect();
        self.items.extend(data_bytes.into_iter().map(Item::Byte));

        let size = self.items.len();
        if size > PROGRAM_CEILING {
            return Err(CompileError::ImageTooLarge {
                size,
                limit: PROGRAM_CEILING,
            });
        }

        let mut image = Vec::with_capacity(size);
        for item in &self.items {
            let value: i64 = match item {
                Item::Byte(byte) => i64::from(*byte),
                Item::Addr(address) => *address as i64,
                Item::Func(name) => {
                    let address = self.function_addresses.get(name).ok_or_else(|| {
                        CompileError::UnresolvedFunction { name: name.clone() }
                    })?;
                    *address as i64
                }
                Item::Data { id, offset } => {
                    let base = layout.get(id).ok_or_else(|| {
                        CompileError::Internal(String::from("data entry missing from layout"))
                    })?;
                    *base as i64 + i64::from(*offset)
                }
            };
            let byte =
                u8::try_from(value).map_err(|_| CompileError::OperandOutOfRange { value })?;
            image.push(byte);
        }

        debug!(
            size,
            data_start,
            functions = self.function_addresses.len(),
            "linked image"
        );

        Ok(CompiledProgram {
            image,
            function_addresses: self.function_addresses,
            data_start,
        })
    }
}

/// `(taken, not taken)` jump pair for an `if` comparison.
fn branch_pair(op: BinaryOp) -> (Opcode, Opcode) {
    match op {
        BinaryOp::Eq => (Opcode::JE, Opcode::JNE),
        BinaryOp::Ne => (Opcode::JNE, Opcode::JE),
        BinaryOp::Lt => (Opcode::JL, Opcode::JGE),
        BinaryOp::Le => (Opcode::JLE, Opcode::JG),
        BinaryOp::Gt => (Opcode::JG, Opcode::JLE),
        BinaryOp::Ge => (Opcode::JGE, Opcode::JL),
        _ => unreachable!("not a comparison"),
    }
}

/// The jump that exits a loop when its comparison fails.
fn inverted_branch(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Eq => Opcode::JNE,
        BinaryOp::Ne => Opcode::JE,
        BinaryOp::Lt => Opcode::JGE,
        BinaryOp::Le => Opcode::JG,
        BinaryOp::Gt => Opcode::JLE,
        BinaryOp::Ge => Opcode::JL,
        _ => unreachable!("not a comparison"),
    }
}
