//! Lowering of the semantic tree into IR.
//!
//! Every statement becomes a fresh named basic block; statement
//! sequences are linked with explicit branches, so downstream tools
//! can correlate blocks with source tokens. Expression lowering is a
//! `(name, arity)` table over the application catalog; anything
//! outside the catalog is a fatal `MalformedSemantics`.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::values::{BasicValueEnum, InstructionOpcode, InstructionValue, PointerValue};
use inkwell::IntPredicate;

use crate::aslt::ast::{Direction, Expr, LExpr, Stmt, Ty};
use crate::emit::{Cell, EmissionContext, Flag, RegBank, ShiftOp, Val};
use crate::{Error, Result};

/// Entry/exit block pair produced by lowering one statement (or a
/// whole instruction).
pub type BlockPair<'ctx> = (BasicBlock<'ctx>, BasicBlock<'ctx>);

/// The loop index of `for` statements is an unbounded ASL integer,
/// modeled at a fixed 100 bits like integer literals.
const ASL_INT_BITS: u32 = 100;

fn as_instruction<'ctx>(v: Val<'ctx>) -> Option<InstructionValue<'ctx>> {
    match v {
        BasicValueEnum::IntValue(x) => x.as_instruction(),
        BasicValueEnum::FloatValue(x) => x.as_instruction(),
        BasicValueEnum::VectorValue(x) => x.as_instruction(),
        BasicValueEnum::PointerValue(x) => x.as_instruction(),
        _ => None,
    }
}

fn operand_value<'ctx>(instr: InstructionValue<'ctx>, i: u32) -> Result<Val<'ctx>> {
    instr
        .get_operand(i)
        .and_then(inkwell::values::Operand::value)
        .ok_or_else(|| {
            Error::InvariantViolation(format!(
                "missing operand {i} in {:?}",
                instr.get_opcode()
            ))
        })
}

/// Integer behind a literal expression; lane selectors and element
/// sizes must be literals in the supported subset.
fn lit_int(e: &Expr) -> Result<i64> {
    e.as_lit_int()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| Error::MalformedSemantics(format!("expected integer literal, got {e}")))
}

pub struct SemanticsLowerer<'a, 'ctx> {
    ectx: &'a mut EmissionContext<'ctx>,
    debug: bool,
    block_prefix: String,
    locals: HashMap<String, Cell<'ctx>>,
    depth: usize,
    stmt_counts: HashMap<usize, u32>,
}

impl<'a, 'ctx> SemanticsLowerer<'a, 'ctx> {
    pub fn new(ectx: &'a mut EmissionContext<'ctx>, debug: bool) -> Self {
        let block_prefix = format!("aslp_{}", ectx.next_name());
        Self {
            ectx,
            debug,
            block_prefix,
            locals: HashMap::new(),
            depth: 0,
            stmt_counts: HashMap::new(),
        }
    }

    /// Lower one instruction's statement list. The local environment
    /// is scoped to this call.
    pub fn lower_instruction(&mut self, stmts: &[Stmt]) -> Result<BlockPair<'ctx>> {
        self.visit_stmts(stmts)
    }

    fn trace(&self, what: &str, detail: &dyn std::fmt::Display) {
        if self.debug {
            tracing::trace!(depth = self.depth, "{what} {detail}");
        }
    }

    fn new_stmt(&mut self, name: &str) -> BlockPair<'ctx> {
        let count = self.stmt_counts.entry(self.depth).or_insert(0);
        let label = format!("{}__{}_{}_{name}_", self.block_prefix, self.depth, count);
        *count += 1;
        let bb = self.ectx.new_block(&label);
        self.ectx.set_block(bb);
        (bb, bb)
    }

    fn link(&mut self, head: BlockPair<'ctx>, tail: BlockPair<'ctx>) -> Result<BlockPair<'ctx>> {
        self.ectx.set_block(head.1);
        self.ectx.branch(tail.0)?;
        self.ectx.set_block(tail.1);
        Ok((head.0, tail.1))
    }

    fn visit_stmts(&mut self, stmts: &[Stmt]) -> Result<BlockPair<'ctx>> {
        // remember the current block so nesting statements compose
        let saved = self.ectx.cur_block();

        if stmts.is_empty() {
            let empty = self.new_stmt("stmtlist_empty");
            self.ectx.set_block(saved);
            return Ok(empty);
        }

        self.depth += 1;
        self.stmt_counts.insert(self.depth, 0);
        let mut pair = self.visit_stmt(&stmts[0])?;
        for stmt in &stmts[1..] {
            let next = self.visit_stmt(stmt)?;
            pair = self.link(pair, next)?;
        }
        self.depth -= 1;

        self.ectx.set_block(saved);
        Ok(pair)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<BlockPair<'ctx>> {
        let pair = self.visit_stmt_inner(stmt)?;
        self.ectx
            .tag_block_first(pair.0, "aslp.stmt", &stmt.to_string());
        Ok(pair)
    }

    fn visit_stmt_inner(&mut self, stmt: &Stmt) -> Result<BlockPair<'ctx>> {
        match stmt {
            Stmt::Assign(lhs, rhs) => {
                self.trace("assign", stmt);
                let entry = self.new_stmt("assign");
                let cell = self.lexpr(lhs)?;
                let value = self.expr(rhs)?;
                let value = self.coerce(value, cell.ty)?;
                self.ectx.store(value, cell.ptr)?;
                Ok((entry.0, self.ectx.cur_block()))
            }
            Stmt::ConstDecl { ty, name, init } | Stmt::VarDecl { ty, name, init } => {
                self.trace("decl", stmt);
                let entry = self.new_stmt("vardecl");
                let ty = self.lower_ty(ty)?;
                let value = self.expr(init)?;
                let cell = self.ectx.alloc_cell(ty, name)?;
                let value = self.coerce(value, ty)?;
                self.ectx.store(value, cell.ptr)?;
                self.locals.insert(name.clone(), cell);
                Ok((entry.0, self.ectx.cur_block()))
            }
            Stmt::VarDeclsNoInit { ty, names } => {
                let entry = self.new_stmt("vardeclnoinit");
                let ty = self.lower_ty(ty)?;
                for name in names {
                    let cell = self.ectx.alloc_cell(ty, name)?;
                    self.locals.insert(name.clone(), cell);
                }
                Ok((entry.0, self.ectx.cur_block()))
            }
            Stmt::Assert(cond) => {
                let entry = self.new_stmt("assert");
                let cond = self.expr(cond)?;
                self.ectx.assert_true(cond)?;
                Ok((entry.0, self.ectx.cur_block()))
            }
            Stmt::Throw => {
                let entry = self.new_stmt("throw");
                let never = self.ectx.int_const(0, 1).into();
                self.ectx.assert_true(never)?;
                Ok((entry.0, self.ectx.cur_block()))
            }
            Stmt::TCall { name, targs, args } => self.visit_call(name, targs, args),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.trace("conditional", stmt);
                let entry = self.new_stmt("conditional");
                let cond = self.expr(cond)?;
                if self.ectx.value_bits(cond)? != 1 {
                    return Err(Error::InvariantViolation(format!(
                        "condition must have type i1: {cond:?}"
                    )));
                }

                let tstmts = self.visit_stmts(then)?;
                let fstmts = self.visit_stmts(otherwise)?;
                self.ectx.cond_branch(cond, tstmts.0, fstmts.0)?;

                let join = self.new_stmt("conditional_join");
                self.link(tstmts, join)?;
                self.link(fstmts, join)?;
                self.ectx.set_block(join.1);
                Ok((entry.0, join.1))
            }
            Stmt::For {
                var,
                start,
                direction,
                stop,
                body,
            } => {
                self.trace("loop", stmt);
                let up = *direction == Direction::Up;
                let ty = self.ectx.int_ty(ASL_INT_BITS);

                let exit = self.new_stmt("for_exit");
                let entry = self.new_stmt("for_header");

                let start = self.expr(start)?;
                let cell = self.ectx.alloc_cell(ty.into(), var)?;
                let start = self.coerce(start, ty.into())?;
                self.ectx.store(start, cell.ptr)?;
                self.locals.insert(var.clone(), cell);

                let body_pair = self.visit_stmts(body)?;
                self.ectx.set_block(body_pair.1);

                // step the index, then test against the bound
                let index = self.ectx.load_cell(cell)?;
                let one = self.ectx.int_const(1, ASL_INT_BITS).into();
                let stepped = if up {
                    self.ectx.add(index, one)?
                } else {
                    self.ectx.sub(index, one)?
                };
                self.ectx.store(stepped, cell.ptr)?;

                let stop = self.expr(stop)?;
                let pred = if up {
                    IntPredicate::SLT
                } else {
                    IntPredicate::SGT
                };
                let done = self.ectx.icmp(pred, stop, stepped)?;
                self.ectx.cond_branch(done, exit.0, body_pair.0)?;

                self.link(entry, body_pair)?;
                Ok((entry.0, exit.1))
            }
        }
    }

    fn visit_call(&mut self, name: &str, _targs: &[Expr], args: &[Expr]) -> Result<BlockPair<'ctx>> {
        if name == "Mem.set.0" && args.len() == 4 {
            // Mem[address, size, acctype] = value
            let entry = self.new_stmt("call");
            let addr = self.expr(&args[0])?;
            let size = u32::try_from(lit_int(&args[1])?)
                .map_err(|_| Error::MalformedSemantics("bad memory write size".to_string()))?;
            let value = self.expr(&args[3])?;
            let (base, offset) = self.ptr_expr(addr)?;
            self.ectx.store_with_offset(base, offset, size, value)?;
            return Ok((entry.0, self.ectx.cur_block()));
        }
        Err(Error::MalformedSemantics(format!(
            "unsupported call statement: {name}/{}",
            args.len()
        )))
    }

    fn lower_ty(&mut self, ty: &Ty) -> Result<inkwell::types::BasicTypeEnum<'ctx>> {
        match ty {
            Ty::Bits(width) => {
                let bits = u32::try_from(lit_int(width)?)
                    .map_err(|_| Error::MalformedSemantics(format!("bad bits width in {ty:?}")))?;
                Ok(self.ectx.int_ty(bits).into())
            }
            Ty::Boolean => Ok(self.ectx.int_ty(1).into()),
            Ty::Register(bits) => Ok(self.ectx.int_ty(*bits).into()),
            Ty::Constructor(name) => match name.as_str() {
                "FPRounding" => Ok(self.ectx.int_ty(2).into()),
                "boolean" => Ok(self.ectx.int_ty(1).into()),
                other => Err(Error::MalformedSemantics(format!(
                    "unsupported type constructor: {other}"
                ))),
            },
        }
    }

    // ── Left expressions ──

    fn lexpr(&mut self, lexpr: &LExpr) -> Result<Cell<'ctx>> {
        match lexpr {
            LExpr::Var(name) => self.var_cell(name),
            LExpr::Field(base, field) => {
                if **base == LExpr::Var("PSTATE".to_string()) {
                    return self.flag_cell(field);
                }
                Err(Error::MalformedSemantics(format!(
                    "unsupported lexpr field: {lexpr}"
                )))
            }
            LExpr::Array(base, index) => {
                let index = u32::try_from(lit_int(index)?)
                    .map_err(|_| Error::MalformedSemantics(format!("bad index in {lexpr}")))?;
                match &**base {
                    LExpr::Var(name) if name == "_R" => self.ectx.reg(RegBank::X, index),
                    LExpr::Var(name) if name == "_Z" => self.ectx.reg(RegBank::V, index),
                    _ => Err(Error::MalformedSemantics(format!(
                        "unsupported lexpr array: {lexpr}"
                    ))),
                }
            }
        }
    }

    fn var_cell(&mut self, name: &str) -> Result<Cell<'ctx>> {
        if let Some(cell) = self.locals.get(name) {
            return Ok(*cell);
        }
        match name {
            "_R" => self.ectx.reg(RegBank::X, 0),
            "_Z" => self.ectx.reg(RegBank::V, 0),
            "PSTATE" => self.ectx.reg(RegBank::Pstate, 0),
            "SP_EL0" => self.ectx.reg(RegBank::X, 31),
            // the flags-only machine model sinks FPSR writes
            "FPSR" => self.ectx.alloc_cell(self.ectx.int_ty(64).into(), "FPSR_void"),
            other => Err(Error::MalformedSemantics(format!(
                "unsupported or undefined variable: {other}"
            ))),
        }
    }

    fn flag_cell(&self, field: &str) -> Result<Cell<'ctx>> {
        let flag = match field {
            "N" => Flag::N,
            "Z" => Flag::Z,
            "C" => Flag::C,
            "V" => Flag::V,
            other => {
                return Err(Error::MalformedSemantics(format!(
                    "unknown PSTATE field: {other}"
                )));
            }
        };
        Ok(self.ectx.flag(flag))
    }

    // ── Expressions ──

    fn expr(&mut self, e: &Expr) -> Result<Val<'ctx>> {
        let value = self.expr_inner(e)?;
        if let Some(instr) = as_instruction(value) {
            self.ectx.tag(instr, "aslp.expr", &e.to_string());
        }
        Ok(value)
    }

    fn expr_inner(&mut self, e: &Expr) -> Result<Val<'ctx>> {
        self.trace("expr", e);
        match e {
            Expr::Var(name) => self.expr_var(name),
            Expr::Field(base, field) => {
                if **base == Expr::Var("PSTATE".to_string()) {
                    let cell = self.flag_cell(field)?;
                    return self.ectx.load_cell(cell);
                }
                Err(Error::MalformedSemantics(format!(
                    "unsupported field expression: {e}"
                )))
            }
            Expr::Array(base, index) => {
                let index = u32::try_from(lit_int(index)?)
                    .map_err(|_| Error::MalformedSemantics(format!("bad index in {e}")))?;
                let cell = match &**base {
                    Expr::Var(name) if name == "_R" => self.ectx.reg(RegBank::X, index)?,
                    Expr::Var(name) if name == "_Z" => self.ectx.reg(RegBank::V, index)?,
                    _ => {
                        return Err(Error::MalformedSemantics(format!(
                            "unsupported array expression: {e}"
                        )));
                    }
                };
                self.ectx.load_cell(cell)
            }
            Expr::Slice(base, slice) => {
                let base = self.expr(base)?;
                let lo = u32::try_from(lit_int(&slice.lo)?).map_err(|_| {
                    Error::MalformedSemantics(format!("bad slice low bound in {e}"))
                })?;
                let wd = u32::try_from(lit_int(&slice.wd)?).map_err(|_| {
                    Error::MalformedSemantics(format!("bad slice width in {e}"))
                })?;
                self.slice(base, lo, wd)
            }
            Expr::LitInt(value) => {
                // ASL integers are unbounded; 100 bits covers the subset
                let v = *value;
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let low = v as u64;
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let high = ((v >> 64) as u64) & ((1u64 << 36) - 1);
                Ok(self.ectx.wide_const(&[low, high], ASL_INT_BITS).into())
            }
            Expr::LitBits(bits) => {
                let width = u32::try_from(bits.len()).map_err(|_| {
                    Error::MalformedSemantics(format!("oversized bits literal: {e}"))
                })?;
                let words = bits_to_words(bits)?;
                Ok(self.ectx.wide_const(&words, width).into())
            }
            Expr::TApply { name, targs, args } => self.apply(name, targs, args),
        }
    }

    fn expr_var(&mut self, name: &str) -> Result<Val<'ctx>> {
        match name {
            "TRUE" => return Ok(self.ectx.int_const(1, 1).into()),
            "FALSE" => return Ok(self.ectx.int_const(0, 1).into()),
            // the flags-only machine model reads FPSR as zero
            "FPSR" => return Ok(self.ectx.int_const(0, 64).into()),
            // FPCR-dependent behavior is unsupported
            "FPCR" => return Ok(self.ectx.int_ty(32).get_undef().into()),
            _ => {}
        }
        let cell = self.var_cell(name)?;
        self.ectx.load_cell(cell)
    }

    fn slice(&mut self, base: Val<'ctx>, lo: u32, wd: u32) -> Result<Val<'ctx>> {
        let base = self.coerce_to_int(base)?;
        let total = self.ectx.value_bits(base)?;
        if lo == 0 && wd == total {
            return Ok(base);
        }
        if lo == 0 {
            return self.ectx.trunc(base, self.ectx.int_ty(wd).into());
        }
        if lo % wd == 0 && total % wd == 0 {
            // lane-aligned: read through a vector view
            let vec_ty = self.ectx.vec_ty(wd, total / wd);
            let vector = self.coerce(base, vec_ty.into())?;
            return self.ectx.extract_element_const(vector, u64::from(lo / wd));
        }
        // in-bounds by construction, so a raw shift is fine
        let amount = self.ectx.int_const(u64::from(lo), total).into();
        let shifted = self.ectx.raw_shift(ShiftOp::Lshr, base, amount)?;
        self.ectx.trunc(shifted, self.ectx.int_ty(wd).into())
    }

    // ── Coercions ──

    /// Coerce a value to a type of the same width, exploiting the
    /// value's structure where possible: a load is re-issued at the
    /// target type from the same pointer, a bitcast is unwrapped.
    fn coerce(
        &mut self,
        v: Val<'ctx>,
        ty: inkwell::types::BasicTypeEnum<'ctx>,
    ) -> Result<Val<'ctx>> {
        if v.get_type() == ty {
            return Ok(v);
        }
        if let Some(instr) = as_instruction(v) {
            match instr.get_opcode() {
                InstructionOpcode::Load => {
                    let ptr = self.ectx.pointer(operand_value(instr, 0)?)?;
                    return self.ectx.load(ty, ptr);
                }
                InstructionOpcode::BitCast => {
                    return self.coerce(operand_value(instr, 0)?, ty);
                }
                _ => {}
            }
        }
        self.ectx.bitcast(v, ty)
    }

    fn coerce_to_int(&mut self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.ectx.to_int(v)
    }

    // ── Address recovery ──

    /// Undo the address computation into a `(base, offset)` pair by
    /// inspecting the emitted IR node: an add splits into base and
    /// offset, a plain load is its own base with zero offset. The base
    /// must trace back to a known storage cell.
    fn ptr_expr(&mut self, x: Val<'ctx>) -> Result<(PointerValue<'ctx>, Val<'ctx>)> {
        let instr = as_instruction(x).ok_or_else(|| {
            Error::InvariantViolation(format!("unable to coerce to pointer (not an instruction): {x:?}"))
        })?;

        let (cell, offset) = match instr.get_opcode() {
            InstructionOpcode::Add => {
                let base = operand_value(instr, 0)?;
                let offset = operand_value(instr, 1)?;
                (self.ref_expr(base)?, offset)
            }
            InstructionOpcode::Load => {
                let wd = self.ectx.value_bits(x)?;
                let zero = self.ectx.int_const(0, wd).into();
                (self.ref_expr(x)?, zero)
            }
            other => {
                return Err(Error::InvariantViolation(format!(
                    "unable to coerce to pointer (unexpected {other:?}): {x:?}"
                )));
            }
        };

        // reload the cell as a pointer value
        let ptr = self
            .ectx
            .load(self.ectx.ptr_ty().into(), cell.ptr)?;
        let ptr = self.ectx.pointer(ptr)?;
        Ok((ptr, offset))
    }

    /// Trace a loaded value back to the cell it was loaded from.
    fn ref_expr(&mut self, v: Val<'ctx>) -> Result<Cell<'ctx>> {
        let instr = as_instruction(v)
            .filter(|i| i.get_opcode() == InstructionOpcode::Load)
            .ok_or_else(|| {
                Error::InvariantViolation(format!("attempt to reference a non-load value: {v:?}"))
            })?;
        let ptr = self.ectx.pointer(operand_value(instr, 0)?)?;
        self.ectx.lookup_cell(ptr).ok_or_else(|| {
            Error::InvariantViolation(format!("load does not address a known cell: {v:?}"))
        })
    }

    // ── Application catalog ──

    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, name: &str, targ_exprs: &[Expr], arg_exprs: &[Expr]) -> Result<Val<'ctx>> {
        let targs: Vec<i64> = targ_exprs.iter().map(lit_int).collect::<Result<_>>()?;
        let args: Vec<Val<'ctx>> = arg_exprs
            .iter()
            .map(|a| self.expr(a))
            .collect::<Result<_>>()?;

        let targ = |i: usize| -> Result<u32> {
            targs
                .get(i)
                .copied()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    Error::MalformedSemantics(format!("missing type argument {i} for {name}"))
                })
        };

        match (name, args.len()) {
            ("cvt_bool_bv.0", 1) => {
                if self.ectx.value_bits(args[0])? != 1 {
                    return Err(Error::InvariantViolation(format!(
                        "size mismatch in bool conversion: {:?}",
                        args[0]
                    )));
                }
                Ok(args[0])
            }
            ("cvt_bits_uint.0", 1) => Ok(args[0]),
            ("not_bits.0" | "not_bool.0", 1) => self.ectx.not(args[0]),

            ("SignExtend.0", 2) => {
                let ty = self.ectx.int_ty(targ(1)?);
                self.ectx.sext(args[0], ty.into())
            }
            ("ZeroExtend.0", 2) => {
                let ty = self.ectx.int_ty(targ(1)?);
                self.ectx.zext(args[0], ty.into())
            }
            ("cvt_int_bits.0", 2) => {
                let ty = self.ectx.int_ty(targ(0)?);
                self.ectx.trunc(args[0], ty.into())
            }
            ("eq_bits.0", 2) => self.ectx.icmp(IntPredicate::EQ, args[0], args[1]),
            ("ne_bits.0", 2) => self.ectx.icmp(IntPredicate::NE, args[0], args[1]),
            ("slt_bits.0", 2) => self.ectx.icmp(IntPredicate::SLT, args[0], args[1]),
            ("sle_bits.0", 2) => self.ectx.icmp(IntPredicate::SLE, args[0], args[1]),
            ("add_bits.0", 2) => self.ectx.add(args[0], args[1]),
            ("sub_bits.0", 2) => self.ectx.sub(args[0], args[1]),
            ("mul_bits.0", 2) => self.ectx.mul(args[0], args[1]),
            ("eor_bits.0", 2) => self.ectx.xor(args[0], args[1]),
            ("and_bits.0" | "and_bool.0", 2) => self.ectx.and(args[0], args[1]),
            ("or_bits.0" | "or_bool.0", 2) => self.ectx.or(args[0], args[1]),
            ("sdiv_bits.0", 2) => self.ectx.safe_sdiv(args[0], args[1]),
            ("lsl_bits.0", 2) => {
                let (x, y) = self.unify_sizes(args[0], args[1])?;
                self.ectx.safe_shift(ShiftOp::Shl, x, y)
            }
            ("lsr_bits.0", 2) => {
                let (x, y) = self.unify_sizes(args[0], args[1])?;
                self.ectx.safe_shift(ShiftOp::Lshr, x, y)
            }
            ("asr_bits.0", 2) => {
                let (x, y) = self.unify_sizes(args[0], args[1])?;
                self.ectx.safe_shift(ShiftOp::Ashr, x, y)
            }
            ("append_bits.0", 2) => self.append_bits(args[0], args[1]),
            ("replicate_bits.0", 2) => {
                let count = u32::try_from(lit_int(&arg_exprs[1])?).map_err(|_| {
                    Error::MalformedSemantics("bad replicate count".to_string())
                })?;
                let base_wd = self.ectx.value_bits(args[0])?;
                let mut vec: Val = self.ectx.undef_vec(count, base_wd).into();
                for i in 0..count {
                    vec = self.ectx.insert_element_const(vec, args[0], u64::from(i))?;
                }
                self.coerce(vec, self.ectx.int_ty(base_wd * count).into())
            }
            ("select_vec.0", 2) => {
                // bits(W*N) select_vec(M, N, W)(bits(W*M) x, bits(32*N) sel)
                let (m, n, w) = (targ(0)?, targ(1)?, targ(2)?);
                let x = self.coerce(args[0], self.ectx.vec_ty(w, m).into())?;
                let mask = selector_lanes(&arg_exprs[1], n as usize)?;
                let other = self.ectx.undef_vec(m, w).into();
                let picked = self.ectx.shuffle(x, other, &mask)?;
                self.coerce(picked, self.ectx.int_ty(n * w).into())
            }
            ("reduce_add.0", 2) => {
                let (lanes, w) = (targ(0)?, targ(1)?);
                let x = self.coerce(args[0], self.ectx.vec_ty(w, lanes).into())?;
                let sum = self.ectx.reduce_add(x)?;
                self.ectx.add(sum, args[1])
            }
            ("FPSqrt.0", 2) => {
                let x = self.ectx.to_float(args[0])?;
                self.ectx.sqrt(x)
            }

            ("Mem.read.0", 3) => {
                let size = u32::try_from(lit_int(&arg_exprs[1])?).map_err(|_| {
                    Error::MalformedSemantics("bad memory read size".to_string())
                })?;
                let (base, offset) = self.ptr_expr(args[0])?;
                self.ectx.load_with_offset(base, offset, size)
            }
            ("Elem.read.0", 3) => {
                let elem = u32::try_from(lit_int(&arg_exprs[2])?).map_err(|_| {
                    Error::MalformedSemantics("bad element size".to_string())
                })?;
                let total = self.ectx.value_bits(args[0])?;
                let vec = self.coerce(args[0], self.ectx.vec_ty(elem, total / elem).into())?;
                self.ectx.extract_element(vec, args[1])
            }
            ("add_vec.0" | "sub_vec.0" | "mul_vec.0" | "sdiv_vec.0", 3) => {
                let (lanes, w) = (targ(0)?, targ(1)?);
                let ty = self.ectx.vec_ty(w, lanes);
                let x = self.coerce(args[0], ty.into())?;
                let y = self.coerce(args[1], ty.into())?;
                let result = match name {
                    "add_vec.0" => self.ectx.add(x, y)?,
                    "sub_vec.0" => self.ectx.sub(x, y)?,
                    "mul_vec.0" => self.ectx.mul(x, y)?,
                    _ => self.ectx.safe_sdiv(x, y)?,
                };
                self.coerce(result, args[0].get_type())
            }
            ("scast_vec.0" | "zcast_vec.0" | "trunc_vec.0", 3) => {
                // bits(NW*N) op(N, NW, W)(bits(W*N) x, integer N, integer NW)
                let (lanes, nw, w) = (targ(0)?, targ(1)?, targ(2)?);
                let x = self.coerce(args[0], self.ectx.vec_ty(w, lanes).into())?;
                let to = self.ectx.vec_ty(nw, lanes);
                let result = match name {
                    "scast_vec.0" => self.ectx.sext(x, to.into())?,
                    "zcast_vec.0" => self.ectx.zext(x, to.into())?,
                    _ => self.ectx.trunc(x, to.into())?,
                };
                self.coerce(result, self.ectx.int_ty(nw * lanes).into())
            }
            ("lsl_vec.0" | "lsr_vec.0" | "asr_vec.0", 3) => {
                let (lanes, w) = (targ(0)?, targ(1)?);
                let ty = self.ectx.vec_ty(w, lanes);
                let x = self.coerce(args[0], ty.into())?;
                let y = self.coerce(args[1], ty.into())?;
                let op = match name {
                    "lsl_vec.0" => ShiftOp::Shl,
                    "lsr_vec.0" => ShiftOp::Lshr,
                    _ => ShiftOp::Ashr,
                };
                let result = self.ectx.safe_shift(op, x, y)?;
                self.coerce(result, self.ectx.int_ty(w * lanes).into())
            }
            ("eq_vec.0" | "slt_vec.0" | "sle_vec.0", 3) => {
                let (lanes, w) = (targ(0)?, targ(1)?);
                let ty = self.ectx.vec_ty(w, lanes);
                let x = self.coerce(args[0], ty.into())?;
                let y = self.coerce(args[1], ty.into())?;
                let pred = match name {
                    "eq_vec.0" => IntPredicate::EQ,
                    "slt_vec.0" => IntPredicate::SLT,
                    _ => IntPredicate::SLE,
                };
                let cmp = self.ectx.icmp(pred, x, y)?;
                self.coerce(cmp, self.ectx.int_ty(lanes).into())
            }
            ("shuffle_vec.0", 3) => {
                // bits(W*N) shuffle_vec(M, N, W)(x, y, bits(32*N) sel)
                let (m, n, w) = (targ(0)?, targ(1)?, targ(2)?);
                let ty = self.ectx.vec_ty(w, m);
                let x = self.coerce(args[0], ty.into())?;
                let y = self.coerce(args[1], ty.into())?;
                let mask = selector_lanes(&arg_exprs[2], n as usize)?;
                let picked = self.ectx.shuffle(y, x, &mask)?;
                self.coerce(picked, self.ectx.int_ty(n * w).into())
            }
            ("FPAdd.0" | "FPSub.0" | "FPMul.0" | "FPDiv.0", 3) => {
                let x = self.ectx.to_float(args[0])?;
                let y = self.ectx.to_float(args[1])?;
                match name {
                    "FPAdd.0" => self.ectx.fadd(x, y),
                    "FPSub.0" => self.ectx.fsub(x, y),
                    "FPMul.0" => self.ectx.fmul(x, y),
                    _ => self.ectx.fdiv(x, y),
                }
            }
            ("FPConvert.0", 3) => {
                let dst = targ(0)?;
                let src = self.ectx.value_bits(args[0])?;
                let x = self.ectx.to_float(args[0])?;
                let dst_ty = self.ectx.fp_ty(dst)?;
                if dst < src {
                    self.ectx.fp_trunc(x, dst_ty)
                } else if dst > src {
                    self.ectx.fp_ext(x, dst_ty)
                } else {
                    Ok(x)
                }
            }
            ("ite.0", 3) => self.ectx.select(args[0], args[1], args[2]),

            ("Elem.set.0", 4) => {
                let elem = u32::try_from(lit_int(&arg_exprs[2])?).map_err(|_| {
                    Error::MalformedSemantics("bad element size".to_string())
                })?;
                let total = self.ectx.value_bits(args[0])?;
                let vec = self.coerce(args[0], self.ectx.vec_ty(elem, total / elem).into())?;
                let inserted = self.ectx.insert_element(vec, args[3], args[1])?;
                self.coerce(inserted, self.ectx.int_ty(total).into())
            }
            ("ite_vec.0", 4) => {
                let (lanes, w) = (targ(0)?, targ(1)?);
                let cond = self.coerce(args[0], self.ectx.vec_ty(1, lanes).into())?;
                let x = self.coerce(args[1], self.ectx.vec_ty(w, lanes).into())?;
                let y = self.coerce(args[2], self.ectx.vec_ty(w, lanes).into())?;
                let picked = self.ectx.select(cond, x, y)?;
                self.coerce(picked, self.ectx.int_ty(w * lanes).into())
            }
            ("FPCompare.0", 4) => self.fp_compare(args[0], args[1]),
            ("FPMulAdd.0", 4) => {
                let addend = self.ectx.to_float(args[0])?;
                let x = self.ectx.to_float(args[1])?;
                let y = self.ectx.to_float(args[2])?;
                self.ectx.fma(x, y, addend)
            }
            ("FPRoundInt.0", 4) => {
                // round-to-integral; the exact flag must be FALSE
                let exact = args[3];
                let zero = self.ectx.int_const(0, self.ectx.value_bits(exact)?);
                let is_inexact = self.ectx.icmp(IntPredicate::EQ, exact, zero.into())?;
                self.ectx.assert_true(is_inexact)?;

                let x = self.ectx.to_float(args[0])?;
                let mode = lit_int(&arg_exprs[2]).map_err(|_| {
                    Error::MalformedSemantics(
                        "FPRoundInt: dynamic rounding mode is unsupported".to_string(),
                    )
                })?;
                match mode {
                    1 => self.ectx.ceil(x),
                    2 => self.ectx.floor(x),
                    4 => self.ectx.round(x),
                    other => Err(Error::MalformedSemantics(format!(
                        "FPRoundInt: unsupported rounding mode {other}"
                    ))),
                }
            }

            ("FixedToFP.0", 5) => {
                let out = targ(1)?;
                self.assert_zero_fbits(args[1])?;
                let fp_ty = self.ectx.fp_ty(out)?;
                let unsigned = self.ectx.ui_to_fp(args[0], fp_ty)?;
                let signed = self.ectx.si_to_fp(args[0], fp_ty)?;
                self.ectx.select(args[2], unsigned, signed)
            }
            ("FPToFixed.0", 5) => {
                let (out, src) = (targ(0)?, targ(1)?);
                self.assert_zero_fbits(args[1])?;
                let sized = self.coerce_width(args[0], src)?;
                let x = self.ectx.to_float(sized)?;
                let int_ty = self.ectx.int_ty(out);
                let unsigned = self.ectx.fp_to_ui(x, int_ty)?;
                let signed = self.ectx.fp_to_si(x, int_ty)?;
                self.ectx.select(args[2], unsigned, signed)
            }

            (other, arity) => Err(Error::MalformedSemantics(format!(
                "unsupported application: {other}/{arity}"
            ))),
        }
    }

    fn coerce_width(&mut self, v: Val<'ctx>, bits: u32) -> Result<Val<'ctx>> {
        if self.ectx.value_bits(v)? == bits {
            Ok(v)
        } else {
            Err(Error::InvariantViolation(format!(
                "expected an i{bits} operand: {v:?}"
            )))
        }
    }

    fn assert_zero_fbits(&mut self, fbits: Val<'ctx>) -> Result<()> {
        // only whole-number conversions are expressible without
        // modeling the rounding mode
        let zero = self.ectx.int_const(0, self.ectx.value_bits(fbits)?);
        let ok = self.ectx.icmp(IntPredicate::EQ, fbits, zero.into())?;
        self.ectx.assert_true(ok)
    }

    fn unify_sizes(&mut self, x: Val<'ctx>, y: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        let wx = self.ectx.value_bits(x)?;
        let wy = self.ectx.value_bits(y)?;
        if wx < wy {
            Ok((self.ectx.zext(x, self.ectx.int_ty(wy).into())?, y))
        } else if wy < wx {
            Ok((x, self.ectx.zext(y, self.ectx.int_ty(wx).into())?))
        } else {
            Ok((x, y))
        }
    }

    /// Concatenate as `hi:lo`. Equal widths build a 2-lane vector and
    /// bitcast, which reads better downstream than shift-and-or.
    fn append_bits(&mut self, hi: Val<'ctx>, lo: Val<'ctx>) -> Result<Val<'ctx>> {
        let hw = self.ectx.value_bits(hi)?;
        let lw = self.ectx.value_bits(lo)?;

        if hw == lw {
            let mut vec: Val = self.ectx.undef_vec(2, hw).into();
            vec = self.ectx.insert_element_const(vec, hi, 1)?;
            vec = self.ectx.insert_element_const(vec, lo, 0)?;
            return self.coerce(vec, self.ectx.int_ty(hw * 2).into());
        }

        let ty = self.ectx.int_ty(hw + lw);
        let hi = self.ectx.zext(hi, ty.into())?;
        let shift = self.ectx.int_const(u64::from(lw), hw + lw).into();
        let hi = self.ectx.raw_shift(ShiftOp::Shl, hi, shift)?;
        let lo = self.ectx.zext(lo, ty.into())?;
        self.ectx.or(hi, lo)
    }

    /// Pack the four comparison outcomes into a 4-lane i1 vector:
    /// `{UNO, UGT, OEQ, OLT}` at lanes `{0, 1, 2, 3}`, so N/Z/C/V read
    /// from lanes 3/2/1/0.
    fn fp_compare(&mut self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        use inkwell::FloatPredicate as P;
        let a = self.ectx.to_float(a)?;
        let b = self.ectx.to_float(b)?;

        let mut packed: Val = self.ectx.vec_ty(1, 4).get_undef().into();
        for (lane, pred) in [(3, P::OLT), (2, P::OEQ), (1, P::UGT), (0, P::UNO)] {
            let bit = self.ectx.fcmp(pred, a, b)?;
            packed = self.ectx.insert_element_const(packed, bit, lane)?;
        }
        Ok(packed)
    }
}

fn bits_to_words(bits: &str) -> Result<[u64; 2]> {
    if bits.len() > 128 || bits.chars().any(|c| c != '0' && c != '1') {
        return Err(Error::MalformedSemantics(format!(
            "bad bits literal: {bits}"
        )));
    }
    let mut words = [0u64; 2];
    for (i, c) in bits.chars().rev().enumerate() {
        if c == '1' {
            words[i / 64] |= 1u64 << (i % 64);
        }
    }
    Ok(words)
}

/// Unpack a 32-bit-per-lane selector from a literal.
fn selector_lanes(e: &Expr, count: usize) -> Result<Vec<u32>> {
    let bits = match e {
        Expr::LitBits(bits) => bits.clone(),
        Expr::LitInt(v) if *v >= 0 => format!("{v:b}"),
        other => {
            return Err(Error::MalformedSemantics(format!(
                "vector selector must be a literal, got {other}"
            )));
        }
    };
    let padded = format!("{bits:0>width$}", width = count * 32);
    if padded.len() != count * 32 {
        return Err(Error::MalformedSemantics(format!(
            "selector has {} bits, expected {}",
            bits.len(),
            count * 32
        )));
    }
    let mut lanes = Vec::with_capacity(count);
    for i in 0..count {
        let hi = padded.len() - i * 32;
        let lo = hi - 32;
        let lane = u32::from_str_radix(&padded[lo..hi], 2).map_err(|_| {
            Error::MalformedSemantics(format!("bad selector lane {i}"))
        })?;
        lanes.push(lane);
    }
    Ok(lanes)
}
