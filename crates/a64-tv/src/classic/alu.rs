//! Integer arithmetic, logical, move-wide, multiply, divide, and bit
//! manipulation routines.

use inkwell::IntPredicate;

use crate::classic::{
    add_with_carry, add_with_flags, read_gpr, set_nz, sub_with_flags, write_gpr,
};
use crate::emit::{EmissionContext, Flag, ShiftOp, Val};
use crate::inst::{decode_logical_imm, Inst, Opcode, RegWidth, ShiftKind};
use crate::{Error, Result};

pub(super) fn lower<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::AddImm => add_sub_imm(ectx, inst, false, false),
        Op::AddsImm => add_sub_imm(ectx, inst, false, true),
        Op::SubImm => add_sub_imm(ectx, inst, true, false),
        Op::SubsImm => add_sub_imm(ectx, inst, true, true),
        Op::AddShift => add_sub_shift(ectx, inst, false, false),
        Op::AddsShift => add_sub_shift(ectx, inst, false, true),
        Op::SubShift => add_sub_shift(ectx, inst, true, false),
        Op::SubsShift => add_sub_shift(ectx, inst, true, true),
        Op::AddExt => add_sub_ext(ectx, inst, false, false),
        Op::AddsExt => add_sub_ext(ectx, inst, false, true),
        Op::SubExt => add_sub_ext(ectx, inst, true, false),
        Op::SubsExt => add_sub_ext(ectx, inst, true, true),
        Op::Adc => adc_sbc(ectx, inst, false, false),
        Op::Adcs => adc_sbc(ectx, inst, false, true),
        Op::Sbc => adc_sbc(ectx, inst, true, false),
        Op::Sbcs => adc_sbc(ectx, inst, true, true),
        Op::Asrv => shift_variable(ectx, inst, ShiftKind::Asr),
        Op::Lslv => shift_variable(ectx, inst, ShiftKind::Lsl),
        Op::Lsrv => shift_variable(ectx, inst, ShiftKind::Lsr),
        Op::Rorv => shift_variable(ectx, inst, ShiftKind::Ror),
        Op::AndImm => logical_imm(ectx, inst, LogicalOp::And, false),
        Op::AndsImm => logical_imm(ectx, inst, LogicalOp::And, true),
        Op::OrrImm => logical_imm(ectx, inst, LogicalOp::Orr, false),
        Op::EorImm => logical_imm(ectx, inst, LogicalOp::Eor, false),
        Op::AndShift => logical_shift(ectx, inst, LogicalOp::And, false, false),
        Op::AndsShift => logical_shift(ectx, inst, LogicalOp::And, false, true),
        Op::OrrShift => logical_shift(ectx, inst, LogicalOp::Orr, false, false),
        Op::OrnShift => logical_shift(ectx, inst, LogicalOp::Orr, true, false),
        Op::EorShift => logical_shift(ectx, inst, LogicalOp::Eor, false, false),
        Op::EonShift => logical_shift(ectx, inst, LogicalOp::Eor, true, false),
        Op::BicShift => logical_shift(ectx, inst, LogicalOp::And, true, false),
        Op::BicsShift => logical_shift(ectx, inst, LogicalOp::And, true, true),
        Op::Movz => mov_wide(ectx, inst, MovKind::Zero),
        Op::Movn => mov_wide(ectx, inst, MovKind::Not),
        Op::Movk => mov_wide(ectx, inst, MovKind::Keep),
        Op::Madd => mul_add(ectx, inst, false),
        Op::Msub => mul_add(ectx, inst, true),
        Op::Smaddl => mul_add_long(ectx, inst, true, false),
        Op::Umaddl => mul_add_long(ectx, inst, false, false),
        Op::Smsubl => mul_add_long(ectx, inst, true, true),
        Op::Umsubl => mul_add_long(ectx, inst, false, true),
        Op::Smulh => mul_high(ectx, inst, true),
        Op::Umulh => mul_high(ectx, inst, false),
        Op::Sdiv => divide(ectx, inst, true),
        Op::Udiv => divide(ectx, inst, false),
        Op::Rbit => unary(ectx, inst, UnaryOp::Rbit),
        Op::Rev => unary(ectx, inst, UnaryOp::Rev),
        Op::Rev16 => unary(ectx, inst, UnaryOp::Rev16),
        Op::Rev32 => unary(ectx, inst, UnaryOp::Rev32),
        Op::Clz => unary(ectx, inst, UnaryOp::Clz),
        _ => Err(super::unsupported(ectx, inst)),
    }
}

// ── Operand helpers ──

/// Apply an optional shift modifier at `index` to a register value.
fn apply_shift_operand<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    index: usize,
    value: Val<'ctx>,
) -> Result<Val<'ctx>> {
    let Ok((kind, amount)) = inst.shift(index) else {
        return Ok(value);
    };
    if amount == 0 && kind == ShiftKind::Lsl {
        return Ok(value);
    }
    let bits = ectx.value_bits(value)?;
    let amt = ectx.int_const(u64::from(amount), bits).into();
    match kind {
        ShiftKind::Lsl => ectx.raw_shift(ShiftOp::Shl, value, amt),
        ShiftKind::Lsr => ectx.raw_shift(ShiftOp::Lshr, value, amt),
        ShiftKind::Asr => ectx.raw_shift(ShiftOp::Ashr, value, amt),
        ShiftKind::Ror => ectx.fshr(value, value, amt),
    }
}

/// The extended-register operand form: a narrower source extended to
/// the operation width, then shifted left by 0..4.
fn extended_operand<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    width: RegWidth,
    reg_index: usize,
) -> Result<Val<'ctx>> {
    let (src_width, reg) = inst.gpr(reg_index)?;
    let (kind, amount) = inst.extend(reg_index + 1)?;
    let value = read_gpr(ectx, src_width, reg)?;

    let src_bits = kind.source_bits().min(src_width.bits());
    let narrowed = if src_bits < src_width.bits() {
        ectx.trunc(value, ectx.int_ty(src_bits).into())?
    } else {
        value
    };
    let target = ectx.int_ty(width.bits());
    let widened = if src_bits < width.bits() {
        if kind.is_signed() {
            ectx.sext(narrowed, target.into())?
        } else {
            ectx.zext(narrowed, target.into())?
        }
    } else {
        narrowed
    };
    if amount == 0 {
        return Ok(widened);
    }
    let amt = ectx.int_const(u64::from(amount), width.bits()).into();
    ectx.raw_shift(ShiftOp::Shl, widened, amt)
}

fn write_result<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    value: Val<'ctx>,
) -> Result<()> {
    let (width, reg) = inst.gpr(0)?;
    write_gpr(ectx, width, reg, value)
}

// ── Add/subtract family ──

fn add_sub_common<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    rhs: Val<'ctx>,
    negate: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, rn) = inst.gpr(1)?;
    let lhs = read_gpr(ectx, width, rn)?;
    let result = match (negate, set_flags) {
        (false, false) => ectx.add(lhs, rhs)?,
        (true, false) => ectx.sub(lhs, rhs)?,
        (false, true) => add_with_flags(ectx, lhs, rhs)?,
        (true, true) => sub_with_flags(ectx, lhs, rhs)?,
    };
    write_result(ectx, inst, result)
}

fn add_sub_imm<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    negate: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, _) = inst.gpr(0)?;
    #[allow(clippy::cast_sign_loss)]
    let mut imm = inst.imm(2)? as u64;
    if let Ok((ShiftKind::Lsl, amount)) = inst.shift(3) {
        imm <<= amount;
    }
    let rhs = ectx.int_const(imm, width.bits()).into();
    add_sub_common(ectx, inst, rhs, negate, set_flags)
}

fn add_sub_shift<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    negate: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, rm) = inst.gpr(2)?;
    let value = read_gpr(ectx, width, rm)?;
    let rhs = apply_shift_operand(ectx, inst, 3, value)?;
    add_sub_common(ectx, inst, rhs, negate, set_flags)
}

fn add_sub_ext<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    negate: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, _) = inst.gpr(0)?;
    let rhs = extended_operand(ectx, inst, width, 2)?;
    add_sub_common(ectx, inst, rhs, negate, set_flags)
}

fn adc_sbc<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    negate: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let a = read_gpr(ectx, width, rn)?;
    let b = read_gpr(ectx, width, rm)?;
    let b = if negate { ectx.not(b)? } else { b };
    let carry: Val = ectx.read_flag(Flag::C)?.into();
    let result = add_with_carry(ectx, a, b, carry, set_flags)?;
    write_result(ectx, inst, result)
}

// ── Variable shifts ──

fn shift_variable<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    kind: ShiftKind,
) -> Result<()> {
    let (width, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let value = read_gpr(ectx, width, rn)?;
    let amount = read_gpr(ectx, width, rm)?;
    let result = match kind {
        ShiftKind::Lsl => ectx.masked_shift(ShiftOp::Shl, value, amount)?,
        ShiftKind::Lsr => ectx.masked_shift(ShiftOp::Lshr, value, amount)?,
        ShiftKind::Asr => ectx.masked_shift(ShiftOp::Ashr, value, amount)?,
        // funnel-shift amounts are modulo the width
        ShiftKind::Ror => ectx.fshr(value, value, amount)?,
    };
    write_result(ectx, inst, result)
}

// ── Logical family ──

#[derive(Clone, Copy)]
enum LogicalOp {
    And,
    Orr,
    Eor,
}

fn logical_common<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    op: LogicalOp,
    rhs: Val<'ctx>,
    invert: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, rn) = inst.gpr(1)?;
    let lhs = read_gpr(ectx, width, rn)?;
    let rhs = if invert { ectx.not(rhs)? } else { rhs };
    let result = match op {
        LogicalOp::And => ectx.and(lhs, rhs)?,
        LogicalOp::Orr => ectx.or(lhs, rhs)?,
        LogicalOp::Eor => ectx.xor(lhs, rhs)?,
    };
    if set_flags {
        // logical flag-setting forms clear C and V
        set_nz(ectx, result)?;
        let zero = ectx.int_const(0, 1);
        ectx.write_flag(Flag::C, zero.into())?;
        ectx.write_flag(Flag::V, zero.into())?;
    }
    write_result(ectx, inst, result)
}

/// Decode the packed `N:immr:imms` operand of the logical-immediate
/// forms into the architectural bitmask.
fn logical_imm_value(inst: &Inst, index: usize, bits: u32) -> Result<u64> {
    #[allow(clippy::cast_sign_loss)]
    let raw = inst.imm(index)? as u64;
    let n = u32::try_from((raw >> 12) & 1).unwrap_or(0);
    let immr = u32::try_from((raw >> 6) & 0x3f).unwrap_or(0);
    let imms = u32::try_from(raw & 0x3f).unwrap_or(0);
    decode_logical_imm(n, immr, imms, bits).ok_or_else(|| {
        Error::InvariantViolation(format!(
            "reserved logical immediate 0x{raw:x} in {}",
            inst.mnemonic()
        ))
    })
}

fn logical_imm<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    op: LogicalOp,
    set_flags: bool,
) -> Result<()> {
    let (width, _) = inst.gpr(0)?;
    let mask = logical_imm_value(inst, 2, width.bits())?;
    let rhs = ectx.int_const(mask, width.bits()).into();
    logical_common(ectx, inst, op, rhs, false, set_flags)
}

fn logical_shift<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    op: LogicalOp,
    invert: bool,
    set_flags: bool,
) -> Result<()> {
    let (width, rm) = inst.gpr(2)?;
    let value = read_gpr(ectx, width, rm)?;
    let rhs = apply_shift_operand(ectx, inst, 3, value)?;
    logical_common(ectx, inst, op, rhs, invert, set_flags)
}

// ── Wide moves ──

#[derive(Clone, Copy)]
enum MovKind {
    Zero,
    Not,
    Keep,
}

fn mov_wide<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, kind: MovKind) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    #[allow(clippy::cast_sign_loss)]
    let imm16 = (inst.imm(1)? as u64) & 0xffff;
    let hw_shift = match inst.shift(2) {
        Ok((ShiftKind::Lsl, amount)) => u32::from(amount),
        _ => 0,
    };
    let placed = imm16 << hw_shift;

    let result: Val = match kind {
        MovKind::Zero => ectx.int_const(placed, width.bits()).into(),
        MovKind::Not => {
            let mask = if width.bits() == 64 {
                !placed
            } else {
                !placed & 0xffff_ffff
            };
            ectx.int_const(mask, width.bits()).into()
        }
        MovKind::Keep => {
            let old = read_gpr(ectx, width, dst)?;
            let hole = !(0xffffu64 << hw_shift);
            let hole = if width.bits() == 32 {
                hole & 0xffff_ffff
            } else {
                hole
            };
            let kept = ectx.and(old, ectx.int_const(hole, width.bits()).into())?;
            ectx.or(kept, ectx.int_const(placed, width.bits()).into())?
        }
    };
    write_gpr(ectx, width, dst, result)
}

// ── Multiply family ──

fn mul_add<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, negate: bool) -> Result<()> {
    let (width, _) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let (_, ra) = inst.gpr(3)?;
    let a = read_gpr(ectx, width, rn)?;
    let b = read_gpr(ectx, width, rm)?;
    let acc = read_gpr(ectx, width, ra)?;
    let product = ectx.mul(a, b)?;
    let result = if negate {
        ectx.sub(acc, product)?
    } else {
        ectx.add(acc, product)?
    };
    write_result(ectx, inst, result)
}

fn mul_add_long<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    negate: bool,
) -> Result<()> {
    let (_, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let (_, ra) = inst.gpr(3)?;
    let i64t = ectx.int_ty(64);
    let a32 = read_gpr(ectx, RegWidth::W, rn)?;
    let b32 = read_gpr(ectx, RegWidth::W, rm)?;
    let (a, b) = if signed {
        (ectx.sext(a32, i64t.into())?, ectx.sext(b32, i64t.into())?)
    } else {
        (ectx.zext(a32, i64t.into())?, ectx.zext(b32, i64t.into())?)
    };
    let acc = read_gpr(ectx, RegWidth::X, ra)?;
    let product = ectx.mul(a, b)?;
    let result = if negate {
        ectx.sub(acc, product)?
    } else {
        ectx.add(acc, product)?
    };
    write_result(ectx, inst, result)
}

fn mul_high<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (_, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let i128t = ectx.int_ty(128);
    let a64 = read_gpr(ectx, RegWidth::X, rn)?;
    let b64 = read_gpr(ectx, RegWidth::X, rm)?;
    let (a, b) = if signed {
        (ectx.sext(a64, i128t.into())?, ectx.sext(b64, i128t.into())?)
    } else {
        (ectx.zext(a64, i128t.into())?, ectx.zext(b64, i128t.into())?)
    };
    let product = ectx.mul(a, b)?;
    let shift = ectx.int_const(64, 128).into();
    let high = ectx.raw_shift(ShiftOp::Lshr, product, shift)?;
    let result = ectx.trunc(high, ectx.int_ty(64).into())?;
    write_result(ectx, inst, result)
}

/// SDIV/UDIV: division by zero yields zero, and the signed
/// `INT_MIN / -1` overflow wraps to INT_MIN.
fn divide<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (width, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let n = read_gpr(ectx, width, rn)?;
    let d = read_gpr(ectx, width, rm)?;

    let zero = ectx.int_const(0, width.bits()).into();
    let one = ectx.int_const(1, width.bits()).into();
    let div_by_zero = ectx.icmp(IntPredicate::EQ, d, zero)?;
    let d_safe = ectx.select(div_by_zero, one, d)?;
    let quotient = if signed {
        ectx.safe_sdiv(n, d_safe)?
    } else {
        ectx.udiv(n, d_safe)?
    };
    let result = ectx.select(div_by_zero, zero, quotient)?;
    write_result(ectx, inst, result)
}

// ── Unary bit manipulation ──

#[derive(Clone, Copy)]
enum UnaryOp {
    Rbit,
    Rev,
    Rev16,
    Rev32,
    Clz,
}

fn unary<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: UnaryOp) -> Result<()> {
    let (width, _) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    let value = read_gpr(ectx, width, rn)?;
    let result = match op {
        UnaryOp::Rbit => ectx.bitreverse(value)?,
        UnaryOp::Rev => ectx.bswap(value)?,
        UnaryOp::Rev16 => swap_within(ectx, value, 16)?,
        UnaryOp::Rev32 => swap_within(ectx, value, 32)?,
        UnaryOp::Clz => ectx.ctlz(value)?,
    };
    write_result(ectx, inst, result)
}

/// Byte-reverse each `chunk_bits` element of the value.
fn swap_within<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    value: Val<'ctx>,
    chunk_bits: u32,
) -> Result<Val<'ctx>> {
    let total = ectx.value_bits(value)?;
    let lanes = total / chunk_bits;
    let vec = ectx.bitcast(value, ectx.vec_ty(chunk_bits, lanes).into())?;
    let swapped = ectx.bswap(vec)?;
    ectx.bitcast(swapped, ectx.int_ty(total).into())
}
