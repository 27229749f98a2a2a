//! Emission context: the growing IR function, the block cursor, the
//! machine-state cells, and the well-defined construction helpers.
//!
//! Everything the lifter emits goes through this type. The cursor
//! always points at a block whose last instruction is not yet a
//! terminator; helpers append at the cursor and never reorder.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::intrinsics::Intrinsic;
use inkwell::module::Module;
use inkwell::types::{BasicType, BasicTypeEnum, FloatType, IntType, VectorType};
use inkwell::values::{
    AsValueRef, BasicMetadataValueEnum, BasicValueEnum, FloatValue, FunctionValue,
    InstructionValue, IntValue, PointerValue, VectorValue,
};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};

use crate::{Error, Result};

/// Architectural register banks addressable through [`EmissionContext::reg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegBank {
    /// General-purpose registers; index 31 is SP.
    X,
    /// Vector registers, 128 bits each.
    V,
    /// Condition flags, one bit each (see [`Flag`]).
    Pstate,
}

/// Condition-flag indices within the `Pstate` bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Flag {
    N = 0,
    Z = 1,
    C = 2,
    V = 3,
}

/// Shift operations covered by the raw/masked/safe shift helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Shl,
    Lshr,
    Ashr,
}

/// A storage cell: an alloca pointer plus its element type (pointers
/// are opaque under LLVM 18, so the type is tracked on the side).
#[derive(Debug, Clone, Copy)]
pub struct Cell<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
}

pub type Val<'ctx> = BasicValueEnum<'ctx>;

/// Wrapper key for LLVM values in side tables (inkwell values are not
/// hashable; the raw value pointer is).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ValKey(usize);

fn key_ptr(ptr: PointerValue<'_>) -> ValKey {
    ValKey(ptr.as_value_ref() as usize)
}

pub(crate) fn llvm<T>(result: std::result::Result<T, BuilderError>) -> Result<T> {
    result.map_err(|e| Error::Llvm(format!("{e:?}")))
}

pub struct EmissionContext<'ctx> {
    context: &'ctx Context,
    pub module: Module<'ctx>,
    builder: Builder<'ctx>,
    function: FunctionValue<'ctx>,
    /// Holds every alloca; terminated last, by `seal_prologue`.
    prologue: BasicBlock<'ctx>,
    cursor: BasicBlock<'ctx>,

    x_cells: Vec<Cell<'ctx>>,
    v_cells: Vec<Cell<'ctx>>,
    flag_cells: Vec<Cell<'ctx>>,
    cell_types: HashMap<ValKey, BasicTypeEnum<'ctx>>,

    inst_index: usize,
    name_counter: u64,
}

impl<'ctx> EmissionContext<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, fn_name: &str) -> Result<Self> {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let fn_ty = context.void_type().fn_type(&[], false);
        let function = module.add_function(fn_name, fn_ty, None);
        let prologue = context.append_basic_block(function, "entry");
        builder.position_at_end(prologue);

        let mut ectx = Self {
            context,
            module,
            builder,
            function,
            prologue,
            cursor: prologue,
            x_cells: Vec::with_capacity(32),
            v_cells: Vec::with_capacity(32),
            flag_cells: Vec::with_capacity(4),
            cell_types: HashMap::new(),
            inst_index: 0,
            name_counter: 0,
        };

        let i64t = context.i64_type();
        let i128t = context.i128_type();
        let i1t = context.bool_type();
        for i in 0..32 {
            let name = if i == 31 { "SP".to_string() } else { format!("X{i}") };
            let cell = ectx.alloc_cell(i64t.into(), &name)?;
            ectx.x_cells.push(cell);
        }
        for i in 0..32 {
            let cell = ectx.alloc_cell(i128t.into(), &format!("V{i}"))?;
            ectx.v_cells.push(cell);
        }
        for name in ["N", "Z", "C", "V"] {
            let cell = ectx.alloc_cell(i1t.into(), name)?;
            ectx.flag_cells.push(cell);
        }
        Ok(ectx)
    }

    // ── Names and cursor ──

    pub fn set_inst_index(&mut self, index: usize) {
        self.inst_index = index;
    }

    pub fn next_name(&mut self) -> String {
        let n = self.name_counter;
        self.name_counter += 1;
        format!("a{}_{n}", self.inst_index)
    }

    #[must_use]
    pub fn function(&self) -> FunctionValue<'ctx> {
        self.function
    }

    #[must_use]
    pub fn llvm_context(&self) -> &'ctx Context {
        self.context
    }

    pub fn new_block(&mut self, name: &str) -> BasicBlock<'ctx> {
        self.context.append_basic_block(self.function, name)
    }

    pub fn set_block(&mut self, bb: BasicBlock<'ctx>) {
        self.cursor = bb;
        self.builder.position_at_end(bb);
    }

    #[must_use]
    pub fn cur_block(&self) -> BasicBlock<'ctx> {
        self.cursor
    }

    /// Terminate the prologue with a branch to the first instruction
    /// block. Must run exactly once, after all cells are allocated.
    pub fn seal_prologue(&mut self, first: BasicBlock<'ctx>) -> Result<()> {
        self.builder.position_at_end(self.prologue);
        llvm(self.builder.build_unconditional_branch(first))?;
        self.builder.position_at_end(self.cursor);
        Ok(())
    }

    /// The partially-lifted function, printed; used by diagnostics.
    #[must_use]
    pub fn print_function(&self) -> String {
        self.function.print_to_string().to_string()
    }

    // ── Cells and registers ──

    /// Allocate a fresh storage cell in the prologue block.
    pub fn alloc_cell(&mut self, ty: BasicTypeEnum<'ctx>, name: &str) -> Result<Cell<'ctx>> {
        self.builder.position_at_end(self.prologue);
        let ptr = llvm(self.builder.build_alloca(ty, name))?;
        self.builder.position_at_end(self.cursor);
        self.cell_types.insert(key_ptr(ptr), ty);
        Ok(Cell { ptr, ty })
    }

    /// Look a pointer back up as a known cell (address recovery).
    #[must_use]
    pub fn lookup_cell(&self, ptr: PointerValue<'ctx>) -> Option<Cell<'ctx>> {
        self.cell_types
            .get(&key_ptr(ptr))
            .map(|&ty| Cell { ptr, ty })
    }

    /// The single allocation cell modeling one architectural register.
    pub fn reg(&self, bank: RegBank, index: u32) -> Result<Cell<'ctx>> {
        let (cells, limit) = match bank {
            RegBank::X => (&self.x_cells, 32),
            RegBank::V => (&self.v_cells, 32),
            RegBank::Pstate => (&self.flag_cells, 4),
        };
        if index >= limit {
            return Err(Error::InvariantViolation(format!(
                "register index {index} out of range for {bank:?}"
            )));
        }
        Ok(cells[index as usize])
    }

    pub fn flag(&self, flag: Flag) -> Cell<'ctx> {
        self.flag_cells[flag as usize]
    }

    pub fn read_flag(&mut self, flag: Flag) -> Result<IntValue<'ctx>> {
        let cell = self.flag(flag);
        self.int(self.load_cell(cell)?)
    }

    pub fn write_flag(&mut self, flag: Flag, value: Val<'ctx>) -> Result<()> {
        self.expect_width(value, 1)?;
        self.store(value, self.flag(flag).ptr)
    }

    // ── Value coercions ──

    fn bad_value(&self, wanted: &str, v: Val<'ctx>) -> Error {
        Error::InvariantViolation(format!("expected {wanted}, got {v:?}"))
    }

    pub fn int(&self, v: Val<'ctx>) -> Result<IntValue<'ctx>> {
        match v {
            BasicValueEnum::IntValue(i) => Ok(i),
            other => Err(self.bad_value("integer value", other)),
        }
    }

    pub fn vector(&self, v: Val<'ctx>) -> Result<VectorValue<'ctx>> {
        match v {
            BasicValueEnum::VectorValue(i) => Ok(i),
            other => Err(self.bad_value("vector value", other)),
        }
    }

    pub fn float(&self, v: Val<'ctx>) -> Result<FloatValue<'ctx>> {
        match v {
            BasicValueEnum::FloatValue(f) => Ok(f),
            other => Err(self.bad_value("float value", other)),
        }
    }

    pub fn pointer(&self, v: Val<'ctx>) -> Result<PointerValue<'ctx>> {
        match v {
            BasicValueEnum::PointerValue(p) => Ok(p),
            other => Err(self.bad_value("pointer value", other)),
        }
    }

    /// Total bit width of a first-class type.
    pub fn type_bits(&self, ty: BasicTypeEnum<'ctx>) -> Result<u32> {
        match ty {
            BasicTypeEnum::IntType(t) => Ok(t.get_bit_width()),
            BasicTypeEnum::FloatType(t) => self.float_bits(t),
            BasicTypeEnum::VectorType(t) => {
                Ok(t.get_size() * self.type_bits(t.get_element_type())?)
            }
            BasicTypeEnum::PointerType(_) => Ok(64),
            other => Err(Error::InvariantViolation(format!(
                "type {other:?} has no fixed bit width"
            ))),
        }
    }

    fn float_bits(&self, ty: FloatType<'ctx>) -> Result<u32> {
        if ty == self.context.f16_type() {
            Ok(16)
        } else if ty == self.context.f32_type() {
            Ok(32)
        } else if ty == self.context.f64_type() {
            Ok(64)
        } else if ty == self.context.f128_type() {
            Ok(128)
        } else {
            Err(Error::InvariantViolation(format!(
                "unsupported float type {ty:?}"
            )))
        }
    }

    pub fn value_bits(&self, v: Val<'ctx>) -> Result<u32> {
        self.type_bits(v.get_type())
    }

    fn expect_width(&self, v: Val<'ctx>, bits: u32) -> Result<()> {
        let actual = self.value_bits(v)?;
        if actual == bits {
            Ok(())
        } else {
            Err(Error::InvariantViolation(format!(
                "width mismatch: expected i{bits}, got {v:?}"
            )))
        }
    }

    // ── Constants and types ──

    #[must_use]
    pub fn int_ty(&self, bits: u32) -> IntType<'ctx> {
        self.context.custom_width_int_type(bits)
    }

    pub fn fp_ty(&self, bits: u32) -> Result<FloatType<'ctx>> {
        match bits {
            16 => Ok(self.context.f16_type()),
            32 => Ok(self.context.f32_type()),
            64 => Ok(self.context.f64_type()),
            128 => Ok(self.context.f128_type()),
            other => Err(Error::InvariantViolation(format!(
                "no floating-point type of width {other}"
            ))),
        }
    }

    #[must_use]
    pub fn vec_ty(&self, elem_bits: u32, lanes: u32) -> VectorType<'ctx> {
        self.int_ty(elem_bits).vec_type(lanes)
    }

    pub fn fp_vec_ty(&self, elem_bits: u32, lanes: u32) -> Result<VectorType<'ctx>> {
        Ok(self.fp_ty(elem_bits)?.vec_type(lanes))
    }

    #[must_use]
    pub fn int_const(&self, value: u64, bits: u32) -> IntValue<'ctx> {
        self.int_ty(bits).const_int(value, false)
    }

    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn int_const_signed(&self, value: i64, bits: u32) -> IntValue<'ctx> {
        self.int_ty(bits).const_int(value as u64, true)
    }

    /// Arbitrary-width constant from 64-bit little-endian words.
    #[must_use]
    pub fn wide_const(&self, words: &[u64], bits: u32) -> IntValue<'ctx> {
        self.int_ty(bits).const_int_arbitrary_precision(words)
    }

    #[must_use]
    pub fn undef_vec(&self, lanes: u32, elem_bits: u32) -> VectorValue<'ctx> {
        self.vec_ty(elem_bits, lanes).get_undef()
    }

    /// A vector with `value` in every lane.
    #[must_use]
    pub fn splat_const(&self, value: u64, elem_bits: u32, lanes: u32) -> VectorValue<'ctx> {
        let lane = self.int_const(value, elem_bits);
        let values: Vec<BasicValueEnum> = (0..lanes).map(|_| lane.into()).collect();
        VectorType::const_vector(&values)
    }

    fn zeros_like(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        match v {
            BasicValueEnum::IntValue(i) => Ok(i.get_type().const_zero().into()),
            BasicValueEnum::VectorValue(x) => Ok(x.get_type().const_zero().into()),
            other => Err(self.bad_value("integer or vector value", other)),
        }
    }

    /// Splat `value` across a type shaped like `v` (scalar or vector).
    fn const_like(&self, v: Val<'ctx>, value: u64) -> Result<Val<'ctx>> {
        match v {
            BasicValueEnum::IntValue(i) => {
                Ok(i.get_type().const_int(value, false).into())
            }
            BasicValueEnum::VectorValue(x) => {
                let elem = x.get_type().get_element_type().into_int_type();
                Ok(self
                    .splat_const(value, elem.get_bit_width(), x.get_type().get_size())
                    .into())
            }
            other => Err(self.bad_value("integer or vector value", other)),
        }
    }

    /// Element width for a scalar or vector integer value.
    pub fn elem_bits(&self, v: Val<'ctx>) -> Result<u32> {
        match v {
            BasicValueEnum::IntValue(i) => Ok(i.get_type().get_bit_width()),
            BasicValueEnum::VectorValue(x) => {
                Ok(x.get_type().get_element_type().into_int_type().get_bit_width())
            }
            other => Err(self.bad_value("integer or vector value", other)),
        }
    }

    // ── Memory ──

    pub fn load(&mut self, ty: BasicTypeEnum<'ctx>, ptr: PointerValue<'ctx>) -> Result<Val<'ctx>> {
        llvm(self.builder.build_load(ty, ptr, "ld"))
    }

    pub fn load_cell(&self, cell: Cell<'ctx>) -> Result<Val<'ctx>> {
        llvm(self.builder.build_load(cell.ty, cell.ptr, "ld"))
    }

    pub fn store(&self, value: Val<'ctx>, ptr: PointerValue<'ctx>) -> Result<()> {
        llvm(self.builder.build_store(ptr, value))?;
        Ok(())
    }

    fn effective_address(
        &mut self,
        base: PointerValue<'ctx>,
        offset: Val<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        let i64t = self.context.i64_type();
        let off = self.int(offset)?;
        let off64 = match off.get_type().get_bit_width() {
            64 => off,
            w if w < 64 => llvm(self.builder.build_int_s_extend(off, i64t, "off"))?,
            _ => llvm(self.builder.build_int_truncate(off, i64t, "off"))?,
        };
        let base_int = llvm(self.builder.build_ptr_to_int(base, i64t, "base"))?;
        let addr = llvm(self.builder.build_int_add(base_int, off64, "addr"))?;
        let ptr_ty = self.context.ptr_type(AddressSpace::default());
        llvm(self.builder.build_int_to_ptr(addr, ptr_ty, "addr"))
    }

    /// Load `size` bytes from `(base, offset)` as an integer. No
    /// extension is ever implicit.
    pub fn load_with_offset(
        &mut self,
        base: PointerValue<'ctx>,
        offset: Val<'ctx>,
        size: u32,
    ) -> Result<Val<'ctx>> {
        let addr = self.effective_address(base, offset)?;
        let ty = self.int_ty(size * 8);
        llvm(self.builder.build_load(ty, addr, "mld"))
    }

    /// Store `size` bytes of `value` to `(base, offset)`.
    pub fn store_with_offset(
        &mut self,
        base: PointerValue<'ctx>,
        offset: Val<'ctx>,
        size: u32,
        value: Val<'ctx>,
    ) -> Result<()> {
        let addr = self.effective_address(base, offset)?;
        let bits = size * 8;
        let value = if self.value_bits(value)? == bits && matches!(value, BasicValueEnum::IntValue(_))
        {
            value
        } else {
            self.bitcast(value, self.int_ty(bits).into())?
        };
        llvm(self.builder.build_store(addr, value))?;
        Ok(())
    }

    // ── Casts ──

    pub fn trunc(&mut self, v: Val<'ctx>, ty: BasicTypeEnum<'ctx>) -> Result<Val<'ctx>> {
        match (v, ty) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                self.check_narrowing(i.get_type().get_bit_width(), t.get_bit_width(), v)?;
                Ok(llvm(self.builder.build_int_truncate(i, t, "trunc"))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicTypeEnum::VectorType(t)) => {
                Ok(llvm(self.builder.build_int_truncate(x, t, "trunc"))?.into())
            }
            _ => Err(self.bad_value("truncatable value", v)),
        }
    }

    pub fn zext(&mut self, v: Val<'ctx>, ty: BasicTypeEnum<'ctx>) -> Result<Val<'ctx>> {
        match (v, ty) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                self.check_widening(i.get_type().get_bit_width(), t.get_bit_width(), v)?;
                Ok(llvm(self.builder.build_int_z_extend(i, t, "zext"))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicTypeEnum::VectorType(t)) => {
                Ok(llvm(self.builder.build_int_z_extend(x, t, "zext"))?.into())
            }
            _ => Err(self.bad_value("zero-extensible value", v)),
        }
    }

    pub fn sext(&mut self, v: Val<'ctx>, ty: BasicTypeEnum<'ctx>) -> Result<Val<'ctx>> {
        match (v, ty) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                self.check_widening(i.get_type().get_bit_width(), t.get_bit_width(), v)?;
                Ok(llvm(self.builder.build_int_s_extend(i, t, "sext"))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicTypeEnum::VectorType(t)) => {
                Ok(llvm(self.builder.build_int_s_extend(x, t, "sext"))?.into())
            }
            _ => Err(self.bad_value("sign-extensible value", v)),
        }
    }

    fn check_narrowing(&self, from: u32, to: u32, v: Val<'ctx>) -> Result<()> {
        if to < from {
            Ok(())
        } else {
            Err(Error::InvariantViolation(format!(
                "trunc must narrow (i{from} -> i{to}): {v:?}"
            )))
        }
    }

    fn check_widening(&self, from: u32, to: u32, v: Val<'ctx>) -> Result<()> {
        if to > from {
            Ok(())
        } else {
            Err(Error::InvariantViolation(format!(
                "extension must widen (i{from} -> i{to}): {v:?}"
            )))
        }
    }

    /// Bit-preserving cast; source and destination widths must match.
    pub fn bitcast(&mut self, v: Val<'ctx>, ty: BasicTypeEnum<'ctx>) -> Result<Val<'ctx>> {
        if v.get_type() == ty {
            return Ok(v);
        }
        let from = self.value_bits(v)?;
        let to = self.type_bits(ty)?;
        if from != to {
            return Err(Error::InvariantViolation(format!(
                "bitcast width mismatch (i{from} -> i{to}): {v:?}"
            )));
        }
        llvm(self.builder.build_bitcast(v, ty, "cast"))
    }

    pub fn fp_trunc(&mut self, v: Val<'ctx>, ty: FloatType<'ctx>) -> Result<Val<'ctx>> {
        let f = self.float(v)?;
        Ok(llvm(self.builder.build_float_trunc(f, ty, "fptrunc"))?.into())
    }

    pub fn fp_ext(&mut self, v: Val<'ctx>, ty: FloatType<'ctx>) -> Result<Val<'ctx>> {
        let f = self.float(v)?;
        Ok(llvm(self.builder.build_float_ext(f, ty, "fpext"))?.into())
    }

    pub fn ui_to_fp(&mut self, v: Val<'ctx>, ty: FloatType<'ctx>) -> Result<Val<'ctx>> {
        let i = self.int(v)?;
        Ok(llvm(self.builder.build_unsigned_int_to_float(i, ty, "uitofp"))?.into())
    }

    pub fn si_to_fp(&mut self, v: Val<'ctx>, ty: FloatType<'ctx>) -> Result<Val<'ctx>> {
        let i = self.int(v)?;
        Ok(llvm(self.builder.build_signed_int_to_float(i, ty, "sitofp"))?.into())
    }

    pub fn fp_to_ui(&mut self, v: Val<'ctx>, ty: IntType<'ctx>) -> Result<Val<'ctx>> {
        let f = self.float(v)?;
        Ok(llvm(self.builder.build_float_to_unsigned_int(f, ty, "fptoui"))?.into())
    }

    pub fn fp_to_si(&mut self, v: Val<'ctx>, ty: IntType<'ctx>) -> Result<Val<'ctx>> {
        let f = self.float(v)?;
        Ok(llvm(self.builder.build_float_to_signed_int(f, ty, "fptosi"))?.into())
    }

    /// Reinterpret a bitvector as a float of the same width (identity
    /// when it already is one).
    pub fn to_float(&mut self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        match v {
            BasicValueEnum::FloatValue(_) => Ok(v),
            _ => {
                let bits = self.value_bits(v)?;
                let ty = self.fp_ty(bits)?;
                self.bitcast(v, ty.into())
            }
        }
    }

    /// Reinterpret a float as a bitvector of the same width.
    pub fn to_int(&mut self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        match v {
            BasicValueEnum::IntValue(_) => Ok(v),
            _ => {
                let bits = self.value_bits(v)?;
                self.bitcast(v, self.int_ty(bits).into())
            }
        }
    }

    // ── Integer arithmetic (scalar or lane-wise) ──

    fn int_binop<FS, FV>(&self, a: Val<'ctx>, b: Val<'ctx>, fs: FS, fv: FV) -> Result<Val<'ctx>>
    where
        FS: FnOnce(
            &Builder<'ctx>,
            IntValue<'ctx>,
            IntValue<'ctx>,
        ) -> std::result::Result<IntValue<'ctx>, BuilderError>,
        FV: FnOnce(
            &Builder<'ctx>,
            VectorValue<'ctx>,
            VectorValue<'ctx>,
        ) -> std::result::Result<VectorValue<'ctx>, BuilderError>,
    {
        match (a, b) {
            (BasicValueEnum::IntValue(x), BasicValueEnum::IntValue(y)) => {
                Ok(llvm(fs(&self.builder, x, y))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicValueEnum::VectorValue(y)) => {
                Ok(llvm(fv(&self.builder, x, y))?.into())
            }
            _ => Err(Error::InvariantViolation(format!(
                "operand shape mismatch: {a:?} vs {b:?}"
            ))),
        }
    }

    pub fn add(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_add(x, y, "add"),
            |bl, x, y| bl.build_int_add(x, y, "add"),
        )
    }

    pub fn sub(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_sub(x, y, "sub"),
            |bl, x, y| bl.build_int_sub(x, y, "sub"),
        )
    }

    pub fn mul(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_mul(x, y, "mul"),
            |bl, x, y| bl.build_int_mul(x, y, "mul"),
        )
    }

    /// Raw signed division; callers wanting defined overflow go
    /// through [`Self::safe_sdiv`].
    pub fn sdiv(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_signed_div(x, y, "sdiv"),
            |bl, x, y| bl.build_int_signed_div(x, y, "sdiv"),
        )
    }

    pub fn udiv(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_unsigned_div(x, y, "udiv"),
            |bl, x, y| bl.build_int_unsigned_div(x, y, "udiv"),
        )
    }

    pub fn and(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_and(x, y, "and"),
            |bl, x, y| bl.build_and(x, y, "and"),
        )
    }

    pub fn or(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_or(x, y, "or"),
            |bl, x, y| bl.build_or(x, y, "or"),
        )
    }

    pub fn xor(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_xor(x, y, "xor"),
            |bl, x, y| bl.build_xor(x, y, "xor"),
        )
    }

    pub fn not(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        let ones = self.const_like(v, u64::MAX)?;
        // splat of all-ones: const_int masks to the element width
        self.xor(v, ones)
    }

    pub fn neg(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        let zero = self.zeros_like(v)?;
        self.sub(zero, v)
    }

    // ── Shifts ──

    pub fn raw_shift(&self, op: ShiftOp, v: Val<'ctx>, amount: Val<'ctx>) -> Result<Val<'ctx>> {
        match op {
            ShiftOp::Shl => self.int_binop(
                v,
                amount,
                |bl, x, y| bl.build_left_shift(x, y, "shl"),
                |bl, x, y| bl.build_left_shift(x, y, "shl"),
            ),
            ShiftOp::Lshr => self.int_binop(
                v,
                amount,
                |bl, x, y| bl.build_right_shift(x, y, false, "lshr"),
                |bl, x, y| bl.build_right_shift(x, y, false, "lshr"),
            ),
            ShiftOp::Ashr => self.int_binop(
                v,
                amount,
                |bl, x, y| bl.build_right_shift(x, y, true, "ashr"),
                |bl, x, y| bl.build_right_shift(x, y, true, "ashr"),
            ),
        }
    }

    /// Shift with the count masked to `width - 1` first (the variable
    /// shift instructions' semantics for power-of-two widths).
    pub fn masked_shift(&self, op: ShiftOp, v: Val<'ctx>, amount: Val<'ctx>) -> Result<Val<'ctx>> {
        let elem = self.elem_bits(v)?;
        let mask = self.const_like(v, u64::from(elem - 1))?;
        let masked = self.and(amount, mask)?;
        self.raw_shift(op, v, masked)
    }

    /// Total shift: for power-of-two element widths the count is
    /// masked to `width - 1`; otherwise a select yields zeros whenever
    /// the count is at least the width. Lane-wise on vectors.
    pub fn safe_shift(&mut self, op: ShiftOp, v: Val<'ctx>, amount: Val<'ctx>) -> Result<Val<'ctx>> {
        let elem = self.elem_bits(v)?;
        if elem.is_power_of_two() {
            return self.masked_shift(op, v, amount);
        }
        let max = self.const_like(v, u64::from(elem - 1))?;
        let ok = self.icmp(IntPredicate::ULE, amount, max)?;
        let result = self.raw_shift(op, v, amount)?;
        let zeros = self.zeros_like(v)?;
        self.select(ok, result, zeros)
    }

    /// Signed division with the `INT_MIN / -1` overflow made total:
    /// a test block computes the (lane-wise) overflow condition, the
    /// overflow block substitutes `INT_MIN / 1`, the safe block
    /// divides directly, and a join block reads the result. Division
    /// by zero is deliberately left alone.
    pub fn safe_sdiv(&mut self, n: Val<'ctx>, d: Val<'ctx>) -> Result<Val<'ctx>> {
        let elem = self.elem_bits(n)?;
        let int_min = self.const_like(n, 1u64 << (elem - 1))?;
        let minus_one = self.const_like(n, u64::MAX)?;
        let one = self.const_like(n, 1)?;

        let n_is_min = self.icmp(IntPredicate::EQ, n, int_min)?;
        let d_is_m1 = self.icmp(IntPredicate::EQ, d, minus_one)?;
        let overflowing = self.and(n_is_min, d_is_m1)?;
        let any_overflow = match overflowing {
            BasicValueEnum::VectorValue(v) => self.reduce_or(v.into())?,
            scalar => scalar,
        };

        let slot_name = format!("{}_sdiv_result", self.next_name());
        let slot = self.alloc_cell(n.get_type(), &slot_name)?;
        let overflow_bb = self.new_block("sdiv_is_overflow");
        let safe_bb = self.new_block("sdiv_is_safe");
        let join_bb = self.new_block("sdiv_continuation");

        self.cond_branch(any_overflow, overflow_bb, safe_bb)?;

        self.set_block(overflow_bb);
        let n2 = self.select(overflowing, int_min, n)?;
        let d2 = self.select(overflowing, one, d)?;
        let forced = self.sdiv(n2, d2)?;
        self.store(forced, slot.ptr)?;
        self.branch(join_bb)?;

        self.set_block(safe_bb);
        let plain = self.sdiv(n, d)?;
        self.store(plain, slot.ptr)?;
        self.branch(join_bb)?;

        self.set_block(join_bb);
        self.load_cell(slot)
    }

    // ── Vector operations ──

    pub fn insert_element(
        &mut self,
        vec: Val<'ctx>,
        value: Val<'ctx>,
        index: Val<'ctx>,
    ) -> Result<Val<'ctx>> {
        let v = self.vector(vec)?;
        let idx = self.int(index)?;
        Ok(llvm(self.builder.build_insert_element(v, value, idx, "ins"))?.into())
    }

    pub fn insert_element_const(
        &mut self,
        vec: Val<'ctx>,
        value: Val<'ctx>,
        index: u64,
    ) -> Result<Val<'ctx>> {
        let idx = self.context.i32_type().const_int(index, false);
        self.insert_element(vec, value, idx.into())
    }

    pub fn extract_element(&mut self, vec: Val<'ctx>, index: Val<'ctx>) -> Result<Val<'ctx>> {
        let v = self.vector(vec)?;
        let idx = self.int(index)?;
        llvm(self.builder.build_extract_element(v, idx, "ext"))
    }

    pub fn extract_element_const(&mut self, vec: Val<'ctx>, index: u64) -> Result<Val<'ctx>> {
        let idx = self.context.i32_type().const_int(index, false);
        self.extract_element(vec, idx.into())
    }

    /// Two-source shuffle with a constant lane selector.
    pub fn shuffle(&mut self, a: Val<'ctx>, b: Val<'ctx>, mask: &[u32]) -> Result<Val<'ctx>> {
        let av = self.vector(a)?;
        let bv = self.vector(b)?;
        let i32t = self.context.i32_type();
        let lanes: Vec<BasicValueEnum> = mask
            .iter()
            .map(|&m| i32t.const_int(u64::from(m), false).into())
            .collect();
        let mask_vec = VectorType::const_vector(&lanes);
        Ok(llvm(self.builder.build_shuffle_vector(av, bv, mask_vec, "shuf"))?.into())
    }

    // ── Compare and select ──

    pub fn icmp(&self, pred: IntPredicate, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.int_binop(
            a,
            b,
            |bl, x, y| bl.build_int_compare(pred, x, y, "cmp"),
            |bl, x, y| bl.build_int_compare(pred, x, y, "cmp"),
        )
    }

    pub fn fcmp(&self, pred: FloatPredicate, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        match (a, b) {
            (BasicValueEnum::FloatValue(x), BasicValueEnum::FloatValue(y)) => {
                Ok(llvm(self.builder.build_float_compare(pred, x, y, "fcmp"))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicValueEnum::VectorValue(y)) => {
                Ok(llvm(self.builder.build_float_compare(pred, x, y, "fcmp"))?.into())
            }
            _ => Err(Error::InvariantViolation(format!(
                "fcmp operand shape mismatch: {a:?} vs {b:?}"
            ))),
        }
    }

    pub fn select(&self, cond: Val<'ctx>, then: Val<'ctx>, other: Val<'ctx>) -> Result<Val<'ctx>> {
        match cond {
            BasicValueEnum::IntValue(c) => {
                llvm(self.builder.build_select(c, then, other, "sel"))
            }
            BasicValueEnum::VectorValue(c) => {
                llvm(self.builder.build_select(c, then, other, "sel"))
            }
            other_c => Err(self.bad_value("i1 or i1-vector condition", other_c)),
        }
    }

    // ── Floating point arithmetic ──

    fn float_binop<FS, FV>(&self, a: Val<'ctx>, b: Val<'ctx>, fs: FS, fv: FV) -> Result<Val<'ctx>>
    where
        FS: FnOnce(
            &Builder<'ctx>,
            FloatValue<'ctx>,
            FloatValue<'ctx>,
        ) -> std::result::Result<FloatValue<'ctx>, BuilderError>,
        FV: FnOnce(
            &Builder<'ctx>,
            VectorValue<'ctx>,
            VectorValue<'ctx>,
        ) -> std::result::Result<VectorValue<'ctx>, BuilderError>,
    {
        match (a, b) {
            (BasicValueEnum::FloatValue(x), BasicValueEnum::FloatValue(y)) => {
                Ok(llvm(fs(&self.builder, x, y))?.into())
            }
            (BasicValueEnum::VectorValue(x), BasicValueEnum::VectorValue(y)) => {
                Ok(llvm(fv(&self.builder, x, y))?.into())
            }
            _ => Err(Error::InvariantViolation(format!(
                "float operand shape mismatch: {a:?} vs {b:?}"
            ))),
        }
    }

    pub fn fadd(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.float_binop(
            a,
            b,
            |bl, x, y| bl.build_float_add(x, y, "fadd"),
            |bl, x, y| bl.build_float_add(x, y, "fadd"),
        )
    }

    pub fn fsub(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.float_binop(
            a,
            b,
            |bl, x, y| bl.build_float_sub(x, y, "fsub"),
            |bl, x, y| bl.build_float_sub(x, y, "fsub"),
        )
    }

    pub fn fmul(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.float_binop(
            a,
            b,
            |bl, x, y| bl.build_float_mul(x, y, "fmul"),
            |bl, x, y| bl.build_float_mul(x, y, "fmul"),
        )
    }

    pub fn fdiv(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.float_binop(
            a,
            b,
            |bl, x, y| bl.build_float_div(x, y, "fdiv"),
            |bl, x, y| bl.build_float_div(x, y, "fdiv"),
        )
    }

    pub fn fneg(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        match v {
            BasicValueEnum::FloatValue(f) => {
                Ok(llvm(self.builder.build_float_neg(f, "fneg"))?.into())
            }
            BasicValueEnum::VectorValue(x) => {
                Ok(llvm(self.builder.build_float_neg(x, "fneg"))?.into())
            }
            other => Err(self.bad_value("float value", other)),
        }
    }

    // ── Intrinsics ──

    fn intrinsic_call(
        &self,
        name: &str,
        overloads: &[BasicTypeEnum<'ctx>],
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<Val<'ctx>> {
        let intrinsic = Intrinsic::find(name)
            .ok_or_else(|| Error::Llvm(format!("intrinsic {name} not found")))?;
        let fn_val = intrinsic
            .get_declaration(&self.module, overloads)
            .ok_or_else(|| Error::Llvm(format!("{name} declaration failed")))?;
        let call = llvm(self.builder.build_call(fn_val, args, "intrinsic"))?;
        call.try_as_basic_value()
            .basic()
            .ok_or_else(|| Error::Llvm(format!("{name} returned void")))
    }

    fn intrinsic_void(
        &self,
        name: &str,
        overloads: &[BasicTypeEnum<'ctx>],
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<()> {
        let intrinsic = Intrinsic::find(name)
            .ok_or_else(|| Error::Llvm(format!("intrinsic {name} not found")))?;
        let fn_val = intrinsic
            .get_declaration(&self.module, overloads)
            .ok_or_else(|| Error::Llvm(format!("{name} declaration failed")))?;
        llvm(self.builder.build_call(fn_val, args, ""))?;
        Ok(())
    }

    fn unary_intrinsic(&self, name: &str, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call(name, &[v.get_type()], &[v.into()])
    }

    fn binary_intrinsic(&self, name: &str, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call(name, &[a.get_type()], &[a.into(), b.into()])
    }

    fn unary_intrinsic_with_flag(&self, name: &str, v: Val<'ctx>, flag: bool) -> Result<Val<'ctx>> {
        let flag_val = self.context.bool_type().const_int(u64::from(flag), false);
        self.intrinsic_call(name, &[v.get_type()], &[v.into(), flag_val.into()])
    }

    pub fn fma(&self, a: Val<'ctx>, b: Val<'ctx>, c: Val<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call("llvm.fma", &[a.get_type()], &[a.into(), b.into(), c.into()])
    }

    pub fn sqrt(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.sqrt", v)
    }

    pub fn ceil(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.ceil", v)
    }

    pub fn floor(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.floor", v)
    }

    /// Round to nearest, ties away from zero.
    pub fn round(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.round", v)
    }

    /// Round to nearest, ties to even (the FRINTX rounding under the
    /// default FPCR).
    pub fn round_even(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.rint", v)
    }

    pub fn fabs(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.fabs", v)
    }

    pub fn fminnum(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.minnum", a, b)
    }

    pub fn fmaxnum(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.maxnum", a, b)
    }

    pub fn fminimum(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.minimum", a, b)
    }

    pub fn fmaximum(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.maximum", a, b)
    }

    pub fn ctpop(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.ctpop", v)
    }

    /// Count leading zeros, defined for zero inputs.
    pub fn ctlz(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic_with_flag("llvm.ctlz", v, false)
    }

    pub fn bswap(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.bswap", v)
    }

    pub fn bitreverse(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.bitreverse", v)
    }

    pub fn abs(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic_with_flag("llvm.abs", v, false)
    }

    pub fn smin(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.smin", a, b)
    }

    pub fn smax(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.smax", a, b)
    }

    pub fn umin(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.umin", a, b)
    }

    pub fn umax(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.umax", a, b)
    }

    pub fn uadd_sat(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.uadd.sat", a, b)
    }

    pub fn usub_sat(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.usub.sat", a, b)
    }

    pub fn sadd_sat(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.sadd.sat", a, b)
    }

    pub fn ssub_sat(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<Val<'ctx>> {
        self.binary_intrinsic("llvm.ssub.sat", a, b)
    }

    /// Funnel shift left of `(a, b)` by `c`; `fshl(x, x, n)` rotates.
    pub fn fshl(&self, a: Val<'ctx>, b: Val<'ctx>, c: Val<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call("llvm.fshl", &[a.get_type()], &[a.into(), b.into(), c.into()])
    }

    pub fn fshr(&self, a: Val<'ctx>, b: Val<'ctx>, c: Val<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call("llvm.fshr", &[a.get_type()], &[a.into(), b.into(), c.into()])
    }

    fn overflow_op(&self, name: &str, a: Val<'ctx>, b: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        let pair = self.intrinsic_call(name, &[a.get_type()], &[a.into(), b.into()])?;
        let agg = pair.into_struct_value();
        let result = llvm(self.builder.build_extract_value(agg, 0, "res"))?;
        let flag = llvm(self.builder.build_extract_value(agg, 1, "ovf"))?;
        Ok((result, flag))
    }

    pub fn uadd_overflow(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        self.overflow_op("llvm.uadd.with.overflow", a, b)
    }

    pub fn sadd_overflow(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        self.overflow_op("llvm.sadd.with.overflow", a, b)
    }

    pub fn usub_overflow(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        self.overflow_op("llvm.usub.with.overflow", a, b)
    }

    pub fn ssub_overflow(&self, a: Val<'ctx>, b: Val<'ctx>) -> Result<(Val<'ctx>, Val<'ctx>)> {
        self.overflow_op("llvm.ssub.with.overflow", a, b)
    }

    /// Saturating float-to-integer conversions, matching the AArch64
    /// convert-to-integer overflow behavior.
    pub fn fp_to_si_sat(&self, v: Val<'ctx>, ty: IntType<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call("llvm.fptosi.sat", &[ty.into(), v.get_type()], &[v.into()])
    }

    pub fn fp_to_ui_sat(&self, v: Val<'ctx>, ty: IntType<'ctx>) -> Result<Val<'ctx>> {
        self.intrinsic_call("llvm.fptoui.sat", &[ty.into(), v.get_type()], &[v.into()])
    }

    pub fn reduce_add(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.add", v)
    }

    pub fn reduce_or(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.or", v)
    }

    pub fn reduce_smin(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.smin", v)
    }

    pub fn reduce_smax(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.smax", v)
    }

    pub fn reduce_umin(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.umin", v)
    }

    pub fn reduce_umax(&self, v: Val<'ctx>) -> Result<Val<'ctx>> {
        self.unary_intrinsic("llvm.vector.reduce.umax", v)
    }

    // ── Control flow ──

    pub fn branch(&mut self, dst: BasicBlock<'ctx>) -> Result<InstructionValue<'ctx>> {
        llvm(self.builder.build_unconditional_branch(dst))
    }

    pub fn cond_branch(
        &mut self,
        cond: Val<'ctx>,
        then: BasicBlock<'ctx>,
        other: BasicBlock<'ctx>,
    ) -> Result<InstructionValue<'ctx>> {
        self.expect_width(cond, 1)?;
        let c = self.int(cond)?;
        llvm(self.builder.build_conditional_branch(c, then, other))
    }

    pub fn trap(&mut self) -> Result<()> {
        self.intrinsic_void("llvm.trap", &[], &[])
    }

    pub fn unreachable(&mut self) -> Result<()> {
        llvm(self.builder.build_unreachable())?;
        Ok(())
    }

    /// Observable runtime assertion: branch to a trapping block when
    /// the condition is false, continue otherwise.
    pub fn assert_true(&mut self, cond: Val<'ctx>) -> Result<()> {
        let ok_bb = self.new_block("assert_ok");
        let fail_bb = self.new_block("assert_fail");
        self.cond_branch(cond, ok_bb, fail_bb)?;
        self.set_block(fail_bb);
        self.trap()?;
        self.unreachable()?;
        self.set_block(ok_bb);
        Ok(())
    }

    // ── Metadata ──

    pub fn tag(&self, instr: InstructionValue<'ctx>, kind: &str, text: &str) {
        let kind_id = self.context.get_kind_id(kind);
        let node = self
            .context
            .metadata_node(&[self.context.metadata_string(text).into()]);
        // The only failure mode is tagging a non-instruction, which the
        // signature already rules out.
        let _ = instr.set_metadata(node, kind_id);
    }

    pub fn tag_block_first(&self, bb: BasicBlock<'ctx>, kind: &str, text: &str) {
        if let Some(first) = bb.get_first_instruction() {
            self.tag(first, kind, text);
        }
    }

    /// The opaque pointer type.
    #[must_use]
    pub fn ptr_ty(&self) -> inkwell::types::PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    pub fn ptr_to_int(&self, ptr: PointerValue<'ctx>) -> Result<IntValue<'ctx>> {
        llvm(self
            .builder
            .build_ptr_to_int(ptr, self.context.i64_type(), "p2i"))
    }

    // ── External calls (BL/BLR modeling) ──

    /// Declare (or reuse) an external `void()` function for a call
    /// target symbol and emit a call to it.
    pub fn call_external(&mut self, name: &str) -> Result<()> {
        let callee = self.module.get_function(name).unwrap_or_else(|| {
            let ty = self.context.void_type().fn_type(&[], false);
            self.module.add_function(name, ty, None)
        });
        llvm(self.builder.build_call(callee, &[], ""))?;
        Ok(())
    }

    pub fn ret_void(&mut self) -> Result<()> {
        llvm(self.builder.build_return(None))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ctx(f: impl FnOnce(&mut EmissionContext<'_>)) {
        let context = Context::create();
        let mut ectx = EmissionContext::new(&context, "test", "lifted").unwrap();
        let body = ectx.new_block("body");
        ectx.set_block(body);
        f(&mut ectx);
    }

    #[test]
    fn one_cell_per_register() {
        with_ctx(|ectx| {
            let ir = ectx.print_function();
            for i in 0..31 {
                let needle = format!("%X{i} = alloca i64");
                assert_eq!(ir.matches(&needle).count(), 1, "{needle}");
            }
            assert_eq!(ir.matches("%SP = alloca i64").count(), 1);
            assert_eq!(ir.matches("= alloca i128").count(), 32);
            for f in ["%N", "%Z", "%C", "%V"] {
                assert_eq!(ir.matches(&format!("{f} = alloca i1")).count(), 1);
            }
        });
    }

    #[test]
    fn safe_shift_power_of_two_masks() {
        with_ctx(|ectx| {
            let x = ectx.int_const(5, 64).into();
            let n = ectx.int_const(70, 64).into();
            ectx.safe_shift(ShiftOp::Shl, x, n).unwrap();
            let ir = ectx.print_function();
            assert!(ir.contains("and i64"), "count must be masked:\n{ir}");
            assert!(ir.contains("shl i64"), "raw shift expected:\n{ir}");
            assert!(!ir.contains("select"), "no select for po2 widths:\n{ir}");
        });
    }

    #[test]
    fn safe_sdiv_builds_three_way_cfg() {
        with_ctx(|ectx| {
            let n = ectx.int_const(7, 64).into();
            let d = ectx.int_const(2, 64).into();
            ectx.safe_sdiv(n, d).unwrap();
            let ir = ectx.print_function();
            assert!(ir.contains("sdiv_is_overflow"));
            assert!(ir.contains("sdiv_is_safe"));
            assert!(ir.contains("sdiv_continuation"));
            assert_eq!(ir.matches("sdiv i64").count(), 2);
        });
    }

    #[test]
    fn casts_reject_same_width() {
        with_ctx(|ectx| {
            let v: Val = ectx.int_const(1, 32).into();
            let ty = ectx.int_ty(32).into();
            assert!(ectx.zext(v, ty).is_err());
            assert!(ectx.sext(v, ty).is_err());
            assert!(ectx.trunc(v, ty).is_err());
        });
    }

    #[test]
    fn assert_true_is_observable() {
        with_ctx(|ectx| {
            let c = ectx.int_const(1, 1).into();
            ectx.assert_true(c).unwrap();
            let ir = ectx.print_function();
            assert!(ir.contains("assert_fail"));
            assert!(ir.contains("llvm.trap"));
            assert!(ir.contains("unreachable"));
        });
    }
}
