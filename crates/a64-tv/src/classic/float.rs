//! Floating-point lowering: scalar and vector arithmetic, compares,
//! conversions, rounding, and the FMOV family.

use inkwell::FloatPredicate;

use crate::classic::{
    cond_holds, fp_operand, read_fp, read_gpr, read_vec, write_fp, write_gpr, write_vec,
};
use crate::emit::{EmissionContext, Flag, Val};
use crate::inst::{Inst, Opcode, Operand, VecArr};
use crate::Result;

pub(super) fn lower<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::Fadd => binop(ectx, inst, FpBin::Add),
        Op::Fsub => binop(ectx, inst, FpBin::Sub),
        Op::Fmul => binop(ectx, inst, FpBin::Mul),
        Op::Fdiv => binop(ectx, inst, FpBin::Div),
        Op::Fnmul => binop(ectx, inst, FpBin::NegMul),
        Op::Fmin => binop(ectx, inst, FpBin::Min),
        Op::Fmax => binop(ectx, inst, FpBin::Max),
        Op::Fminnm => binop(ectx, inst, FpBin::MinNum),
        Op::Fmaxnm => binop(ectx, inst, FpBin::MaxNum),
        Op::Fneg => unary(ectx, inst, FpUn::Neg),
        Op::Fabs => unary(ectx, inst, FpUn::Abs),
        Op::Fsqrt => unary(ectx, inst, FpUn::Sqrt),
        Op::Frinta => unary(ectx, inst, FpUn::RoundAway),
        Op::Frintm => unary(ectx, inst, FpUn::Floor),
        Op::Frintp => unary(ectx, inst, FpUn::Ceil),
        Op::Frintx => unary(ectx, inst, FpUn::RoundEven),
        Op::Fmadd => fused(ectx, inst, false, false),
        Op::Fmsub => fused(ectx, inst, true, false),
        Op::Fnmadd => fused(ectx, inst, false, true),
        Op::Fnmsub => fused(ectx, inst, true, true),
        Op::FmulIdx => mul_indexed(ectx, inst, None),
        Op::FmlaIdx => mul_indexed(ectx, inst, Some(false)),
        Op::FmlsIdx => mul_indexed(ectx, inst, Some(true)),
        Op::Fcmp | Op::Fcmpe => fcmp(ectx, inst),
        Op::Fccmp => fccmp(ectx, inst),
        Op::Fcsel => fcsel(ectx, inst),
        Op::Fcvt => fcvt(ectx, inst),
        Op::Fcvtzs => to_int(ectx, inst, true),
        Op::Fcvtzu => to_int(ectx, inst, false),
        Op::Scvtf => from_int(ectx, inst, true),
        Op::Ucvtf => from_int(ectx, inst, false),
        Op::Fmov => fmov(ectx, inst),
        Op::FmovImm => fmov_imm(ectx, inst),
        Op::FmovVecImm => fmov_vec_imm(ectx, inst),
        Op::FaddV => vec_binop(ectx, inst, FpBin::Add),
        Op::FsubV => vec_binop(ectx, inst, FpBin::Sub),
        Op::FmulV => vec_binop(ectx, inst, FpBin::Mul),
        Op::FnegV => vec_neg(ectx, inst),
        Op::FcmeqV => vec_cmp(ectx, inst, FloatPredicate::OEQ, false),
        Op::FcmgtV => vec_cmp(ectx, inst, FloatPredicate::OGT, false),
        Op::FcmgeV => vec_cmp(ectx, inst, FloatPredicate::OGE, false),
        Op::FcmeqVz => vec_cmp(ectx, inst, FloatPredicate::OEQ, true),
        Op::FcmgtVz => vec_cmp(ectx, inst, FloatPredicate::OGT, true),
        Op::FcmgeVz => vec_cmp(ectx, inst, FloatPredicate::OGE, true),
        Op::FcmleVz => vec_cmp(ectx, inst, FloatPredicate::OLE, true),
        Op::FcmltVz => vec_cmp(ectx, inst, FloatPredicate::OLT, true),
        _ => Err(super::unsupported(ectx, inst)),
    }
}

#[derive(Clone, Copy)]
enum FpBin {
    Add,
    Sub,
    Mul,
    Div,
    NegMul,
    Min,
    Max,
    MinNum,
    MaxNum,
}

#[derive(Clone, Copy)]
enum FpUn {
    Neg,
    Abs,
    Sqrt,
    RoundAway,
    Floor,
    Ceil,
    RoundEven,
}

fn apply_binop<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    op: FpBin,
    a: Val<'ctx>,
    b: Val<'ctx>,
) -> Result<Val<'ctx>> {
    match op {
        FpBin::Add => ectx.fadd(a, b),
        FpBin::Sub => ectx.fsub(a, b),
        FpBin::Mul => ectx.fmul(a, b),
        FpBin::Div => ectx.fdiv(a, b),
        FpBin::NegMul => {
            let product = ectx.fmul(a, b)?;
            ectx.fneg(product)
        }
        FpBin::Min => ectx.fminimum(a, b),
        FpBin::Max => ectx.fmaximum(a, b),
        FpBin::MinNum => ectx.fminnum(a, b),
        FpBin::MaxNum => ectx.fmaxnum(a, b),
    }
}

fn binop<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: FpBin) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (wa, ra) = inst.fp(1)?;
    let (wb, rb) = inst.fp(2)?;
    let a = fp_operand(ectx, wa, ra)?;
    let b = fp_operand(ectx, wb, rb)?;
    let result = apply_binop(ectx, op, a, b)?;
    write_fp(ectx, width.bits(), dst, result)
}

fn unary<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: FpUn) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (ws, rs) = inst.fp(1)?;
    let v = fp_operand(ectx, ws, rs)?;
    let result = match op {
        FpUn::Neg => ectx.fneg(v)?,
        FpUn::Abs => ectx.fabs(v)?,
        FpUn::Sqrt => ectx.sqrt(v)?,
        FpUn::RoundAway => ectx.round(v)?,
        FpUn::Floor => ectx.floor(v)?,
        FpUn::Ceil => ectx.ceil(v)?,
        FpUn::RoundEven => ectx.round_even(v)?,
    };
    write_fp(ectx, width.bits(), dst, result)
}

/// FMADD/FMSUB/FNMADD/FNMSUB through the fused multiply-add
/// intrinsic: `negate_product` flips the product term, `negate_all`
/// the final result.
fn fused<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    negate_product: bool,
    negate_all: bool,
) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (wa, ra) = inst.fp(1)?;
    let (wb, rb) = inst.fp(2)?;
    let (wc, rc) = inst.fp(3)?;
    let a = fp_operand(ectx, wa, ra)?;
    let b = fp_operand(ectx, wb, rb)?;
    let c = fp_operand(ectx, wc, rc)?;
    let a = if negate_product { ectx.fneg(a)? } else { a };
    let fma = ectx.fma(a, b, c)?;
    let result = if negate_all { ectx.fneg(fma)? } else { fma };
    write_fp(ectx, width.bits(), dst, result)
}

/// Indexed multiply (and fused accumulate) against one vector element.
fn mul_indexed<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    accumulate: Option<bool>,
) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (wa, ra) = inst.fp(1)?;
    let (reg, elem_bits, lane) = inst.vec_elem(2)?;

    let a = fp_operand(ectx, wa, ra)?;
    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let vec = read_vec(ectx, reg, arr)?;
    let elem = ectx.extract_element_const(vec, u64::from(lane))?;
    let b = ectx.to_float(elem)?;

    let result = match accumulate {
        None => ectx.fmul(a, b)?,
        Some(negate) => {
            let acc = fp_operand(ectx, width, dst)?;
            let a = if negate { ectx.fneg(a)? } else { a };
            ectx.fma(a, b, acc)?
        }
    };
    write_fp(ectx, width.bits(), dst, result)
}

/// FCMP/FCMPE flag packing: N is less, Z equal, C greater-or-
/// unordered-or-equal, V unordered.
fn fcmp<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (wa, ra) = inst.fp(0)?;
    let a = fp_operand(ectx, wa, ra)?;
    let b: Val = match inst.operands.get(1) {
        Some(Operand::Fp { width, reg }) => fp_operand(ectx, *width, *reg)?,
        Some(Operand::Imm(0)) => ectx.fp_ty(wa.bits())?.const_float(0.0).into(),
        _ => return Err(super::unsupported(ectx, inst)),
    };
    write_fcmp_flags(ectx, a, b)
}

fn write_fcmp_flags<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    a: Val<'ctx>,
    b: Val<'ctx>,
) -> Result<()> {
    let n = ectx.fcmp(FloatPredicate::OLT, a, b)?;
    let z = ectx.fcmp(FloatPredicate::OEQ, a, b)?;
    let c = ectx.fcmp(FloatPredicate::UGE, a, b)?;
    let v = ectx.fcmp(FloatPredicate::UNO, a, b)?;
    ectx.write_flag(Flag::N, n)?;
    ectx.write_flag(Flag::Z, z)?;
    ectx.write_flag(Flag::C, c)?;
    ectx.write_flag(Flag::V, v)
}

fn fccmp<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (wa, ra) = inst.fp(0)?;
    let (wb, rb) = inst.fp(1)?;
    #[allow(clippy::cast_sign_loss)]
    let nzcv = inst.imm(2)? as u64;
    let cond = inst.cond(3)?;

    let holds = cond_holds(ectx, cond)?;
    let a = fp_operand(ectx, wa, ra)?;
    let b = fp_operand(ectx, wb, rb)?;
    write_fcmp_flags(ectx, a, b)?;

    for (flag, bit) in [(Flag::N, 3u64), (Flag::Z, 2), (Flag::C, 1), (Flag::V, 0)] {
        let computed: Val = ectx.read_flag(flag)?.into();
        let imm_bit = ectx.int_const((nzcv >> bit) & 1, 1).into();
        let merged = ectx.select(holds, computed, imm_bit)?;
        ectx.write_flag(flag, merged)?;
    }
    Ok(())
}

fn fcsel<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (wa, ra) = inst.fp(1)?;
    let (wb, rb) = inst.fp(2)?;
    let cond = inst.cond(3)?;
    let a = read_fp(ectx, wa.bits(), ra)?;
    let b = read_fp(ectx, wb.bits(), rb)?;
    let holds = cond_holds(ectx, cond)?;
    let result = ectx.select(holds, a, b)?;
    write_fp(ectx, width.bits(), dst, result)
}

/// FCVT: precision conversion between half, single, and double.
fn fcvt<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (wd, dst) = inst.fp(0)?;
    let (ws, src) = inst.fp(1)?;
    let v = fp_operand(ectx, ws, src)?;
    let dst_ty = ectx.fp_ty(wd.bits())?;
    let result = if wd.bits() < ws.bits() {
        ectx.fp_trunc(v, dst_ty)?
    } else {
        ectx.fp_ext(v, dst_ty)?
    };
    write_fp(ectx, wd.bits(), dst, result)
}

/// FCVTZS/FCVTZU toward zero with the architectural saturation, into
/// a general or a SIMD scalar register.
fn to_int<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (ws, src) = inst.fp(1)?;
    let v = fp_operand(ectx, ws, src)?;
    match inst.operands.first() {
        Some(Operand::Gpr { width, reg }) => {
            let ty = ectx.int_ty(width.bits());
            let result = if signed {
                ectx.fp_to_si_sat(v, ty)?
            } else {
                ectx.fp_to_ui_sat(v, ty)?
            };
            write_gpr(ectx, *width, *reg, result)
        }
        Some(Operand::Fp { width, reg }) => {
            let ty = ectx.int_ty(width.bits());
            let result = if signed {
                ectx.fp_to_si_sat(v, ty)?
            } else {
                ectx.fp_to_ui_sat(v, ty)?
            };
            write_fp(ectx, width.bits(), *reg, result)
        }
        _ => Err(super::unsupported(ectx, inst)),
    }
}

/// SCVTF/UCVTF from a general or SIMD scalar source.
fn from_int<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (wd, dst) = inst.fp(0)?;
    let src: Val = match inst.operands.get(1) {
        Some(Operand::Gpr { width, reg }) => read_gpr(ectx, *width, *reg)?,
        Some(Operand::Fp { width, reg }) => read_fp(ectx, width.bits(), *reg)?,
        _ => return Err(super::unsupported(ectx, inst)),
    };
    let ty = ectx.fp_ty(wd.bits())?;
    let result = if signed {
        ectx.si_to_fp(src, ty)?
    } else {
        ectx.ui_to_fp(src, ty)?
    };
    write_fp(ectx, wd.bits(), dst, result)
}

/// FMOV between registers is a raw bit move.
fn fmov<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let value: Val = match inst.operands.get(1) {
        Some(Operand::Gpr { width, reg }) => read_gpr(ectx, *width, *reg)?,
        Some(Operand::Fp { width, reg }) => read_fp(ectx, width.bits(), *reg)?,
        _ => return Err(super::unsupported(ectx, inst)),
    };
    match inst.operands.first() {
        Some(Operand::Gpr { width, reg }) => write_gpr(ectx, *width, *reg, value),
        Some(Operand::Fp { width, reg }) => write_fp(ectx, width.bits(), *reg, value),
        _ => Err(super::unsupported(ectx, inst)),
    }
}

/// Expand the 8-bit FMOV immediate into the IEEE bit pattern.
#[must_use]
pub(crate) fn vfp_expand_imm(imm8: u8, bits: u32) -> u64 {
    let sign = u64::from((imm8 >> 7) & 1);
    let b6 = u64::from((imm8 >> 6) & 1);
    let b54 = u64::from((imm8 >> 4) & 3);
    let frac = u64::from(imm8 & 0xf);
    let rep = |ones: u64| if b6 == 1 { ones } else { 0 };
    match bits {
        32 => {
            let exp = ((b6 ^ 1) << 7) | (rep(0x1f) << 2) | b54;
            (sign << 31) | (exp << 23) | (frac << 19)
        }
        _ => {
            let exp = ((b6 ^ 1) << 10) | (rep(0xff) << 2) | b54;
            (sign << 63) | (exp << 52) | (frac << 48)
        }
    }
}

fn fmov_imm<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    #[allow(clippy::cast_sign_loss)]
    let imm8 = (inst.imm(1)? as u64) & 0xff;
    let pattern = vfp_expand_imm(u8::try_from(imm8).unwrap_or(0), width.bits());
    let value = ectx.int_const(pattern, width.bits()).into();
    write_fp(ectx, width.bits(), dst, value)
}

fn fmov_vec_imm<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    #[allow(clippy::cast_sign_loss)]
    let imm8 = (inst.imm(1)? as u64) & 0xff;
    let pattern = vfp_expand_imm(u8::try_from(imm8).unwrap_or(0), arr.elem_bits);
    let splat = ectx.splat_const(pattern, arr.elem_bits, arr.lanes);
    write_vec(ectx, dst, arr, splat.into())
}

// ── Vector forms ──

fn read_fp_vec<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    reg: u8,
    arr: VecArr,
) -> Result<Val<'ctx>> {
    let ints = read_vec(ectx, reg, arr)?;
    let fp_ty = ectx.fp_vec_ty(arr.elem_bits, arr.lanes)?;
    ectx.bitcast(ints, fp_ty.into())
}

fn write_fp_vec<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    reg: u8,
    arr: VecArr,
    value: Val<'ctx>,
) -> Result<()> {
    let ints = ectx.bitcast(value, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, reg, arr, ints)
}

fn vec_binop<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: FpBin) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_fp_vec(ectx, ra, arra)?;
    let b = read_fp_vec(ectx, rb, arrb)?;
    let result = apply_binop(ectx, op, a, b)?;
    write_fp_vec(ectx, dst, arr, result)
}

fn vec_neg<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    let v = read_fp_vec(ectx, rs, arrs)?;
    let result = ectx.fneg(v)?;
    write_fp_vec(ectx, dst, arr, result)
}

/// Vector FP compares produce all-ones / all-zeros lanes.
fn vec_cmp<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    pred: FloatPredicate,
    against_zero: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let a = read_fp_vec(ectx, ra, arra)?;
    let b: Val = if against_zero {
        let zero = ectx.fp_ty(arr.elem_bits)?.const_float(0.0);
        let lanes: Vec<inkwell::values::BasicValueEnum> =
            (0..arr.lanes).map(|_| zero.into()).collect();
        inkwell::types::VectorType::const_vector(&lanes).into()
    } else {
        let (rb, arrb) = inst.vec(2)?;
        read_fp_vec(ectx, rb, arrb)?
    };
    let bits = ectx.fcmp(pred, a, b)?;
    let result = ectx.sext(bits, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, dst, arr, result)
}

#[cfg(test)]
mod tests {
    use super::vfp_expand_imm;

    #[test]
    fn expands_common_immediates() {
        // 1.0
        assert_eq!(vfp_expand_imm(0x70, 64), 0x3ff0_0000_0000_0000);
        assert_eq!(vfp_expand_imm(0x70, 32), 0x3f80_0000);
        // -1.0 sets only the sign on top of 1.0
        assert_eq!(vfp_expand_imm(0xf0, 64), 0xbff0_0000_0000_0000);
        // 2.0: exponent 0x400
        assert_eq!(vfp_expand_imm(0x00, 64), 0x4000_0000_0000_0000);
        // 0.5: exponent 0x3fe
        assert_eq!(vfp_expand_imm(0x60, 64), 0x3fe0_0000_0000_0000);
    }
}
