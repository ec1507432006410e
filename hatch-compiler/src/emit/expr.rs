//! Expression lowering: register loads, binary operations, indexing,
//! aggregate construction and the call protocol.

use super::{Emitter, Item};
use crate::ast::{BinaryOp, Expr, ExprKind};
use crate::diag::CompileError;
use crate::emit::stack::Uid;
use crate::internal::internal_function;

use hatch_asm::{mov_operand, AddressFlags, Opcode, RegisterId};

use tracing::trace;

/// What a call is dispatched through: a callee expression, or a stack
/// cell already holding the target address (curried calls).
pub(crate) enum CalleeRef<'e> {
    Ast(&'e Expr),
    StackSlot(Uid),
}

fn load_op(register: RegisterId) -> Opcode {
    match register {
        RegisterId::A => Opcode::LDA,
        RegisterId::B => Opcode::LDB,
        _ => unreachable!("only A and B are load targets"),
    }
}

/// Whether evaluating this expression into `B` would clobber a value
/// already sitting in `A`. Calls are fine: SAVE/RET restores both
/// registers around them.
fn needs_register_save(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Binary { .. } | ExprKind::Assign { .. } => true,
        ExprKind::Index { index, .. } => !matches!(
            index.kind,
            ExprKind::Literal { .. } | ExprKind::Variable { .. }
        ),
        // A curried call moves F into A between the two dispatches.
        ExprKind::Call { callee, .. } => matches!(callee.kind, ExprKind::Call { .. }),
        ExprKind::Cast { value, .. } => needs_register_save(value),
        _ => false,
    }
}

impl<'ast> Emitter<'ast> {
    /// Lowers an expression so its scalar value lands in `register`.
    pub(crate) fn load_into_register(
        &mut self,
        expr: &Expr,
        register: RegisterId,
    ) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.op(load_op(register), value);
            }

            ExprKind::Variable { name, .. } if self.is_function_name(name) => {
                self.op_item(
                    load_op(register),
                    AddressFlags::empty(),
                    Item::Func(name.clone()),
                );
            }

            ExprKind::Variable {
                name,
                increment,
                decrement,
            } => {
                let offset = self.slot_offset(name)?;
                self.op_stack(load_op(register), offset);
                if *increment {
                    self.op_stack(Opcode::INC, offset);
                } else if *decrement {
                    self.op_stack(Opcode::DEC, offset);
                }
            }

            ExprKind::Call { callee, args } => {
                self.emit_call(CalleeRef::Ast(callee), args)?;
                self.op(Opcode::MOV, mov_operand(register, RegisterId::F));
            }

            ExprKind::Binary { .. } => {
                self.emit_binary(expr)?;
                if register == RegisterId::B {
                    self.op(Opcode::MOV, mov_operand(RegisterId::B, RegisterId::A));
                }
            }

            ExprKind::Index { name, index } => {
                self.emit_index(name, index, register)?;
            }

            ExprKind::Access { path, position } => {
                let position = position.ok_or_else(|| {
                    CompileError::Internal(String::from("member access missing position"))
                })?;
                self.op(Opcode::OFF, position);
                let offset = self.slot_offset(&path[0])?;
                self.op_stack(load_op(register), offset);
                self.op(Opcode::OFF, 0);
            }

            ExprKind::Assign { name, value } => {
                self.emit_assign(name, value)?;
                if register == RegisterId::B {
                    self.op(Opcode::MOV, mov_operand(RegisterId::B, RegisterId::A));
                }
            }

            ExprKind::AssignIndex { name, index, value } => {
                self.emit_assign_index(name, index, value)?;
                if register == RegisterId::B {
                    self.op(Opcode::MOV, mov_operand(RegisterId::B, RegisterId::A));
                }
            }

            ExprKind::Cast { value, .. } => {
                // Registered casts reinterpret the byte; nothing to emit.
                self.load_into_register(value, register)?;
            }

            ExprKind::Array { .. } | ExprKind::StructCreate { .. } | ExprKind::AccessAssign { .. } => {
                return Err(CompileError::Internal(String::from(
                    "aggregate expression in scalar register context",
                )));
            }
        }
        Ok(())
    }

    /// Lowers a binary expression, leaving the result in `A`.
    pub(crate) fn emit_binary(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let ExprKind::Binary { left, op, right } = &expr.kind else {
            return Err(CompileError::Internal(String::from(
                "emit_binary over a non-binary node",
            )));
        };

        self.load_into_register(left, RegisterId::A)?;

        // If the right side needs A itself, park the left value in a
        // temporary stack cell and restore it afterwards.
        let saved = needs_register_save(right);
        if saved {
            self.op(Opcode::PUSH, 1);
            self.op_stack(Opcode::STA, 1);
            self.stack.temp_extra += 1;
        }

        self.load_into_register(right, RegisterId::B)?;

        if saved {
            self.op_stack(Opcode::LDA, 1);
            self.op(Opcode::FREE, 1);
            self.stack.temp_extra -= 1;
        }

        match op {
            BinaryOp::Add => {
                self.op(Opcode::ADD, 0);
            }
            BinaryOp::Sub => {
                self.op(Opcode::NEG, 0);
            }
            BinaryOp::Mul => {
                self.op(Opcode::MUL, 0);
            }
            BinaryOp::Div => {
                self.op(Opcode::DIV, 0);
            }
            comparison => {
                // Materialize the comparison: assume true, jump over the
                // refutation.
                let jump = match comparison {
                    BinaryOp::Eq => Opcode::JE,
                    BinaryOp::Ne => Opcode::JNE,
                    BinaryOp::Lt => Opcode::JL,
                    BinaryOp::Le => Opcode::JLE,
                    BinaryOp::Gt => Opcode::JG,
                    BinaryOp::Ge => Opcode::JGE,
                    _ => unreachable!("arithmetic handled above"),
                };
                self.op(Opcode::CMP, 0);
                self.op(Opcode::LDA, 1);
                let skip = self.op(jump, 0);
                self.op(Opcode::LDA, 0);
                self.patch_here(skip);
            }
        }
        Ok(())
    }

    /// Loads `left` into `A` and `right` into `B` for a `CMP`, parking
    /// `A` if the right side would clobber it.
    pub(crate) fn emit_comparison_operands(
        &mut self,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), CompileError> {
        self.load_into_register(left, RegisterId::A)?;

        let saved = needs_register_save(right);
        if saved {
            self.op(Opcode::PUSH, 1);
            self.op_stack(Opcode::STA, 1);
            self.stack.temp_extra += 1;
        }

        self.load_into_register(right, RegisterId::B)?;

        if saved {
            self.op_stack(Opcode::LDA, 1);
            self.op(Opcode::FREE, 1);
            self.stack.temp_extra -= 1;
        }
        Ok(())
    }

    /// Lowers `name[index]` into `register` via the offset register: the
    /// element sits `index + 1` cells past the array's base (cell 0 is
    /// the length byte).
    pub(crate) fn emit_index(
        &mut self,
        name: &str,
        index: &Expr,
        register: RegisterId,
    ) -> Result<(), CompileError> {
        match &index.kind {
            ExprKind::Literal { value, .. } => {
                self.op(Opcode::OFF, value.wrapping_add(1));
            }
            ExprKind::Variable {
                name: index_name, ..
            } => {
                let offset = self.slot_offset(index_name)?;
                self.op_stack(load_op(register), offset);
                self.op(Opcode::INC, register.mirror_address());
                self.op(Opcode::MOV, mov_operand(RegisterId::O, register));
            }
            ExprKind::Binary { .. } => {
                self.emit_binary(index)?;
                self.op(Opcode::INC, RegisterId::A.mirror_address());
                self.op(Opcode::MOV, mov_operand(RegisterId::O, RegisterId::A));
            }
            _ => {
                self.load_into_register(index, register)?;
                self.op(Opcode::INC, register.mirror_address());
                self.op(Opcode::MOV, mov_operand(RegisterId::O, register));
            }
        }

        let offset = self.slot_offset(name)?;
        self.op_stack(load_op(register), offset);
        self.op(Opcode::OFF, 0);
        Ok(())
    }

    // ---- calls --------------------------------------------------------

    /// Lowers a call. The caller SAVEs its registers, materializes one
    /// stack cell per argument in source order (aggregates are DUPed),
    /// and dispatches; the callee owns parameter cleanup and the matching
    /// RET restores `A` and `B`.
    pub(crate) fn emit_call(
        &mut self,
        callee: CalleeRef<'_>,
        args: &[Expr],
    ) -> Result<(), CompileError> {
        if let CalleeRef::Ast(expr) = &callee {
            match &expr.kind {
                ExprKind::Variable { name, .. } if internal_function(name).is_some() => {
                    return self.emit_internal(name, args);
                }
                ExprKind::Call {
                    callee: inner,
                    args: inner_args,
                } => {
                    // Curried: evaluate the inner call, park its result,
                    // call through the parked cell.
                    self.emit_call(CalleeRef::Ast(inner), inner_args)?;
                    self.op(Opcode::MOV, mov_operand(RegisterId::A, RegisterId::F));
                    self.op(Opcode::PUSH, 1);
                    self.op_stack(Opcode::STA, 1);
                    let parked = self.stack.fresh();
                    self.stack.push(parked);

                    self.emit_call(CalleeRef::StackSlot(parked), args)?;

                    self.op(Opcode::FREE, 1);
                    self.stack.unstack(1);
                    return Ok(());
                }
                _ => {}
            }
        }

        self.op(Opcode::SAVE, 0);
        let saved_temp = self.stack.temp_extra;
        self.stack.temp_extra += 2;

        for arg in args {
            self.emit_call_argument(arg)?;
            self.stack.temp_extra += 1;
        }

        match callee {
            CalleeRef::StackSlot(uid) => {
                let offset = self
                    .stack
                    .offset_of(uid)
                    .ok_or_else(|| CompileError::Internal(String::from("parked callee vanished")))?;
                let offset = u8::try_from(offset).map_err(|_| {
                    CompileError::Internal(String::from("stack offset exceeds a byte"))
                })?;
                self.op_stack(Opcode::CALL, offset);
            }
            CalleeRef::Ast(expr) => match &expr.kind {
                ExprKind::Variable { name, .. } => {
                    match self.local_slot(name) {
                        // A local holding a function address: indirect
                        // call through its cell.
                        Some(info) if self.stack.contains(info.uid) => {
                            let offset = self.offset_of(info)?;
                            self.op_stack(Opcode::CALL, offset);
                        }
                        _ => {
                            self.op_item(
                                Opcode::CALL,
                                AddressFlags::empty(),
                                Item::Func(name.clone()),
                            );
                        }
                    }
                }
                ExprKind::Access { path, .. } => {
                    let target = path.last().expect("non-empty path").clone();
                    self.op_item(Opcode::CALL, AddressFlags::empty(), Item::Func(target));
                }
                _ => {
                    return Err(CompileError::Internal(String::from(
                        "unsupported callee expression",
                    )))
                }
            },
        }

        self.stack.temp_extra = saved_temp;
        Ok(())
    }

    /// Materializes one argument as a fresh data-stack cell (or a DUPed
    /// aggregate).
    fn emit_call_argument(&mut self, arg: &Expr) -> Result<(), CompileError> {
        match &arg.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.op(Opcode::PUSH, 1);
                self.op(Opcode::LDA, value);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Variable { name, .. } if self.is_function_name(name) => {
                self.op_item(
                    Opcode::LDA,
                    AddressFlags::empty(),
                    Item::Func(name.clone()),
                );
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Variable {
                name,
                increment,
                decrement,
            } => {
                let info = self.slot(name)?;
                if info.is_aggregate() {
                    let offset = self.offset_of(info)?;
                    self.op(Opcode::DUP, offset);
                } else {
                    let offset = self.offset_of(info)?;
                    self.op_stack(Opcode::LDA, offset);
                    self.op(Opcode::PUSH, 1);
                    self.op_stack(Opcode::STA, 1);
                    if *increment || *decrement {
                        // The pushed cell shifted the variable's offset.
                        self.stack.temp_extra += 1;
                        let offset = self.offset_of(info)?;
                        let bump = if *increment { Opcode::INC } else { Opcode::DEC };
                        self.op_stack(bump, offset);
                        self.stack.temp_extra -= 1;
                    }
                }
            }

            ExprKind::Binary { .. } => {
                self.emit_binary(arg)?;
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Call { callee, args } => {
                self.emit_call(CalleeRef::Ast(callee), args)?;
                self.op(Opcode::MOV, mov_operand(RegisterId::A, RegisterId::F));
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Index { name, index } => {
                self.emit_index(name, index, RegisterId::A)?;
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Array { elements, .. } => {
                self.emit_array(elements, None, true)?;
            }

            ExprKind::Access { path, position } => {
                let position = position.ok_or_else(|| {
                    CompileError::Internal(String::from("member access missing position"))
                })?;
                self.op(Opcode::OFF, position);
                let offset = self.slot_offset(&path[0])?;
                self.op_stack(Opcode::LDA, offset);
                self.op(Opcode::OFF, 0);
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }

            ExprKind::Cast { value, .. } => {
                self.emit_call_argument(value)?;
            }

            _ => {
                self.load_into_register(arg, RegisterId::A)?;
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
            }
        }
        Ok(())
    }

    /// Lowers a builtin call straight to its print opcode.
    fn emit_internal(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        let builtin = internal_function(name)
            .ok_or_else(|| CompileError::Internal(format!("unknown builtin `{name}`")))?;
        let arg = args
            .first()
            .ok_or_else(|| CompileError::Internal(String::from("builtin call without argument")))?;

        match &arg.kind {
            ExprKind::Literal { value, .. } => {
                let value = *value;
                self.op(builtin.opcode, value);
            }
            ExprKind::Variable {
                name,
                increment: false,
                decrement: false,
            } => {
                let offset = self.slot_offset(name)?;
                self.op_stack(builtin.opcode, offset);
            }
            _ => {
                // Materialize, print through the temporary, release.
                self.load_into_register(arg, RegisterId::A)?;
                self.op(Opcode::PUSH, 1);
                self.op_stack(Opcode::STA, 1);
                self.stack.temp_extra += 1;
                self.op_stack(builtin.opcode, 1);
                self.op(Opcode::FREE, 1);
                self.stack.temp_extra -= 1;
            }
        }
        Ok(())
    }

    // ---- aggregates ---------------------------------------------------

    /// Constructs an array on the stack. The cell for the aggregate must
    /// already be modelled by the caller unless `temporary` is set, in
    /// which case the temporary counter covers it.
    ///
    /// Construction strategy: a run of at least four compile-time
    /// literals is cheaper to copy from the data section (`20 + n` bytes
    /// against `2 + 6n` inline); anything else stores element by element.
    pub(crate) fn emit_array(
        &mut self,
        elements: &[Expr],
        force_length: Option<u8>,
        temporary: bool,
    ) -> Result<(), CompileError> {
        let length = force_length.unwrap_or(elements.len() as u8);
        self.op(Opcode::PUSH, length.wrapping_add(1));
        self.op(Opcode::LDA, length);
        self.op_stack(Opcode::STA, 1);
        if temporary {
            self.stack.temp_extra += 1;
        }

        let literals: Option<Vec<u8>> = elements.iter().map(Expr::as_literal).collect();
        let from_data_cost = 20 + elements.len();
        let inline_cost = 2 + 6 * elements.len();
        let from_data = literals.is_some() && from_data_cost <= inline_cost;
        trace!(
            elements = elements.len(),
            from_data,
            "array construction strategy"
        );

        if let (true, Some(bytes)) = (from_data, literals) {
            let id = self.intern_data(bytes);

            // Tight copy loop: O walks 1..=n, reading data[O - 1].
            self.op(Opcode::OFF, 0);
            let comparison_start = self.here();
            self.op(Opcode::MOV, mov_operand(RegisterId::A, RegisterId::O));
            self.op(Opcode::LDB, elements.len() as u8);
            self.op(Opcode::CMP, 0);
            let exit = self.op(Opcode::JGE, 0);
            self.op(Opcode::INC, RegisterId::O.mirror_address());
            self.op_item(Opcode::LDA, AddressFlags::MEM, Item::Data { id, offset: -1 });
            self.op_stack(Opcode::STA, 1);
            self.op_item(
                Opcode::JMP,
                AddressFlags::empty(),
                Item::Addr(comparison_start),
            );
            self.patch_here(exit);
        } else {
            for (position, element) in elements.iter().enumerate() {
                let position = position as u8 + 1;
                match &element.kind {
                    ExprKind::Literal { value, .. } => {
                        let value = *value;
                        self.op(Opcode::OFF, position);
                        self.op(Opcode::LDA, value);
                        self.op_stack(Opcode::STA, 1);
                    }
                    ExprKind::Variable { name, .. } => {
                        self.op(Opcode::OFF, 0);
                        let offset = self.slot_offset(name)?;
                        self.op_stack(Opcode::LDA, offset);
                        self.op(Opcode::OFF, position);
                        self.op_stack(Opcode::STA, 1);
                    }
                    _ => {
                        self.op(Opcode::OFF, 0);
                        self.load_into_register(element, RegisterId::A)?;
                        self.op(Opcode::OFF, position);
                        self.op_stack(Opcode::STA, 1);
                    }
                }
            }
        }

        self.op(Opcode::OFF, 0);
        if temporary {
            self.stack.temp_extra -= 1;
        }
        Ok(())
    }

    /// Constructs a struct on the stack: length header, then one cell per
    /// member in position order. The offset register is cleared before
    /// every member value load so stack-relative loads are not skewed by
    /// the previous member's position.
    pub(crate) fn emit_struct_create(
        &mut self,
        member_count: u8,
        args: &[Expr],
    ) -> Result<(), CompileError> {
        self.op(Opcode::PUSH, member_count.wrapping_add(1));
        self.op(Opcode::LDA, member_count);
        self.op_stack(Opcode::STA, 1);

        for (index, arg) in args.iter().enumerate() {
            let position = index as u8 + 1;
            match &arg.kind {
                ExprKind::Literal { value, .. } => {
                    let value = *value;
                    self.op(Opcode::LDA, value);
                }
                ExprKind::Variable { name, .. } => {
                    if index > 0 {
                        self.op(Opcode::OFF, 0);
                    }
                    let offset = self.slot_offset(name)?;
                    self.op_stack(Opcode::LDA, offset);
                }
                _ => {
                    if index > 0 {
                        self.op(Opcode::OFF, 0);
                    }
                    self.load_into_register(arg, RegisterId::A)?;
                }
            }
            self.op(Opcode::OFF, position);
            self.op_stack(Opcode::STA, 1);
        }

        self.op(Opcode::OFF, 0);
        Ok(())
    }
}
