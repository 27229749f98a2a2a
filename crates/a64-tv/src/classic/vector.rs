//! SIMD integer lowering: lane-wise arithmetic, compares, shuffles,
//! permutes, widening/narrowing forms, reductions, table lookups, and
//! the vector immediate moves.

use inkwell::IntPredicate;

use crate::classic::{read_fp, read_gpr, read_vec, write_fp, write_gpr, write_vec};
use crate::emit::{EmissionContext, ShiftOp, Val};
use crate::inst::{Inst, Opcode, Operand, ShiftKind, VecArr};
use crate::{Error, Result};

pub(super) fn lower<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::AddV => binop(ectx, inst, BinOp::Add),
        Op::SubV => binop(ectx, inst, BinOp::Sub),
        Op::MulV => binop(ectx, inst, BinOp::Mul),
        Op::AndV => binop(ectx, inst, BinOp::And),
        Op::OrrV => binop(ectx, inst, BinOp::Or),
        Op::OrnV => binop(ectx, inst, BinOp::Orn),
        Op::EorV => binop(ectx, inst, BinOp::Xor),
        Op::BicV => binop(ectx, inst, BinOp::Bic),
        Op::SminV => binop(ectx, inst, BinOp::Smin),
        Op::SmaxV => binop(ectx, inst, BinOp::Smax),
        Op::UminV => binop(ectx, inst, BinOp::Umin),
        Op::UmaxV => binop(ectx, inst, BinOp::Umax),
        Op::Uqadd => binop(ectx, inst, BinOp::UaddSat),
        Op::Sqadd => binop(ectx, inst, BinOp::SaddSat),
        Op::Uqsub => binop(ectx, inst, BinOp::UsubSat),
        Op::Sqsub => binop(ectx, inst, BinOp::SsubSat),
        Op::Sabd => abs_diff(ectx, inst, true, false),
        Op::Uabd => abs_diff(ectx, inst, false, false),
        Op::Saba => abs_diff(ectx, inst, true, true),
        Op::Uaba => abs_diff(ectx, inst, false, true),

        Op::MulVIdx => mul_indexed(ectx, inst, Accumulate::None),
        Op::Mla => mul_acc(ectx, inst, Accumulate::Add),
        Op::Mls => mul_acc(ectx, inst, Accumulate::Sub),
        Op::MlaIdx => mul_indexed(ectx, inst, Accumulate::Add),
        Op::MlsIdx => mul_indexed(ectx, inst, Accumulate::Sub),

        Op::NotV => unary(ectx, inst, UnOp::Not),
        Op::NegV => unary(ectx, inst, UnOp::Neg),
        Op::AbsV => unary(ectx, inst, UnOp::Abs),
        Op::CntV => unary(ectx, inst, UnOp::Cnt),
        Op::ClzV => unary(ectx, inst, UnOp::Clz),
        Op::RbitV => unary(ectx, inst, UnOp::Rbit),
        Op::Rev64V => rev_within(ectx, inst, 64),
        Op::Rev32V => rev_within(ectx, inst, 32),
        Op::Rev16V => rev_within(ectx, inst, 16),

        Op::Addv => reduce(ectx, inst, Reduce::Add),
        Op::Sminv => reduce(ectx, inst, Reduce::Smin),
        Op::Smaxv => reduce(ectx, inst, Reduce::Smax),
        Op::Uminv => reduce(ectx, inst, Reduce::Umin),
        Op::Umaxv => reduce(ectx, inst, Reduce::Umax),
        Op::Saddlv => reduce_long(ectx, inst, true),
        Op::Uaddlv => reduce_long(ectx, inst, false),
        Op::AddpScalar => addp_scalar(ectx, inst),

        Op::AddpV => pairwise(ectx, inst, BinOp::Add),
        Op::Sminp => pairwise(ectx, inst, BinOp::Smin),
        Op::Smaxp => pairwise(ectx, inst, BinOp::Smax),
        Op::Uminp => pairwise(ectx, inst, BinOp::Umin),
        Op::Umaxp => pairwise(ectx, inst, BinOp::Umax),
        Op::Saddlp => pairwise_long(ectx, inst, true, false),
        Op::Uaddlp => pairwise_long(ectx, inst, false, false),
        Op::Sadalp => pairwise_long(ectx, inst, true, true),
        Op::Uadalp => pairwise_long(ectx, inst, false, true),

        Op::Smull => mul_long(ectx, inst, true, Accumulate::None, false),
        Op::Umull => mul_long(ectx, inst, false, Accumulate::None, false),
        Op::Smlal => mul_long(ectx, inst, true, Accumulate::Add, false),
        Op::Umlal => mul_long(ectx, inst, false, Accumulate::Add, false),
        Op::Smlsl => mul_long(ectx, inst, true, Accumulate::Sub, false),
        Op::Umlsl => mul_long(ectx, inst, false, Accumulate::Sub, false),
        Op::SmullIdx => mul_long(ectx, inst, true, Accumulate::None, true),
        Op::UmullIdx => mul_long(ectx, inst, false, Accumulate::None, true),
        Op::SmlalIdx => mul_long(ectx, inst, true, Accumulate::Add, true),
        Op::UmlalIdx => mul_long(ectx, inst, false, Accumulate::Add, true),
        Op::SmlslIdx => mul_long(ectx, inst, true, Accumulate::Sub, true),
        Op::UmlslIdx => mul_long(ectx, inst, false, Accumulate::Sub, true),

        Op::Saddl => wide_arith(ectx, inst, true, BinOp::Add, false),
        Op::Uaddl => wide_arith(ectx, inst, false, BinOp::Add, false),
        Op::Ssubl => wide_arith(ectx, inst, true, BinOp::Sub, false),
        Op::Usubl => wide_arith(ectx, inst, false, BinOp::Sub, false),
        Op::Saddw => wide_arith(ectx, inst, true, BinOp::Add, true),
        Op::Uaddw => wide_arith(ectx, inst, false, BinOp::Add, true),
        Op::Ssubw => wide_arith(ectx, inst, true, BinOp::Sub, true),
        Op::Usubw => wide_arith(ectx, inst, false, BinOp::Sub, true),
        Op::Sabdl => abd_long(ectx, inst, true, false),
        Op::Uabdl => abd_long(ectx, inst, false, false),
        Op::Sabal => abd_long(ectx, inst, true, true),
        Op::Uabal => abd_long(ectx, inst, false, true),

        Op::Shadd => halving(ectx, inst, true, BinOp::Add, false),
        Op::Uhadd => halving(ectx, inst, false, BinOp::Add, false),
        Op::Srhadd => halving(ectx, inst, true, BinOp::Add, true),
        Op::Urhadd => halving(ectx, inst, false, BinOp::Add, true),
        Op::Shsub => halving(ectx, inst, true, BinOp::Sub, false),
        Op::Uhsub => halving(ectx, inst, false, BinOp::Sub, false),

        Op::SshrV => shift_imm(ectx, inst, ShiftOp::Ashr, Accumulate::None),
        Op::UshrV => shift_imm(ectx, inst, ShiftOp::Lshr, Accumulate::None),
        Op::ShlV => shift_imm(ectx, inst, ShiftOp::Shl, Accumulate::None),
        Op::Ssra => shift_imm(ectx, inst, ShiftOp::Ashr, Accumulate::Add),
        Op::Usra => shift_imm(ectx, inst, ShiftOp::Lshr, Accumulate::Add),
        Op::Sshl => shift_register(ectx, inst, true),
        Op::Ushl => shift_register(ectx, inst, false),
        Op::Sli => shift_insert(ectx, inst, true),
        Op::Sri => shift_insert(ectx, inst, false),

        Op::Sshll => shift_long(ectx, inst, true),
        Op::Ushll | Op::Shll => shift_long(ectx, inst, false),
        Op::Shrn => shift_narrow(ectx, inst, false),
        Op::Rshrn => shift_narrow(ectx, inst, true),
        Op::Xtn => narrow(ectx, inst, Narrow::Plain),
        Op::Sqxtn => narrow(ectx, inst, Narrow::SignedSat),
        Op::Uqxtn => narrow(ectx, inst, Narrow::UnsignedSat),

        Op::Cmeq => compare(ectx, inst, IntPredicate::EQ, false),
        Op::Cmge => compare(ectx, inst, IntPredicate::SGE, false),
        Op::Cmgt => compare(ectx, inst, IntPredicate::SGT, false),
        Op::Cmhi => compare(ectx, inst, IntPredicate::UGT, false),
        Op::Cmhs => compare(ectx, inst, IntPredicate::UGE, false),
        Op::CmeqZ => compare(ectx, inst, IntPredicate::EQ, true),
        Op::CmgeZ => compare(ectx, inst, IntPredicate::SGE, true),
        Op::CmgtZ => compare(ectx, inst, IntPredicate::SGT, true),
        Op::CmleZ => compare(ectx, inst, IntPredicate::SLE, true),
        Op::CmltZ => compare(ectx, inst, IntPredicate::SLT, true),
        Op::Cmtst => cmtst(ectx, inst),

        Op::Zip1 | Op::Zip2 | Op::Uzp1 | Op::Uzp2 | Op::Trn1 | Op::Trn2 => permute(ectx, inst),
        Op::ExtV => ext(ectx, inst),
        Op::DupElem => dup_elem(ectx, inst),
        Op::DupGpr => dup_gpr(ectx, inst),
        Op::InsElem => ins_elem(ectx, inst),
        Op::InsGpr => ins_gpr(ectx, inst),
        Op::Smov => mov_to_gpr(ectx, inst, true),
        Op::Umov => mov_to_gpr(ectx, inst, false),
        Op::Tbl => tbl(ectx, inst),
        Op::Bif | Op::Bit | Op::Bsl => bitwise_select(ectx, inst),

        Op::Movi | Op::Mvni | Op::MoviMsl | Op::MvniMsl => vector_imm(ectx, inst),

        _ => Err(super::unsupported(ectx, inst)),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Orn,
    Bic,
    Smin,
    Smax,
    Umin,
    Umax,
    UaddSat,
    SaddSat,
    UsubSat,
    SsubSat,
}

#[derive(Clone, Copy, PartialEq)]
enum Accumulate {
    None,
    Add,
    Sub,
}

fn apply_binop<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    op: BinOp,
    a: Val<'ctx>,
    b: Val<'ctx>,
) -> Result<Val<'ctx>> {
    match op {
        BinOp::Add => ectx.add(a, b),
        BinOp::Sub => ectx.sub(a, b),
        BinOp::Mul => ectx.mul(a, b),
        BinOp::And => ectx.and(a, b),
        BinOp::Or => ectx.or(a, b),
        BinOp::Xor => ectx.xor(a, b),
        BinOp::Orn => {
            let nb = ectx.not(b)?;
            ectx.or(a, nb)
        }
        BinOp::Bic => {
            let nb = ectx.not(b)?;
            ectx.and(a, nb)
        }
        BinOp::Smin => ectx.smin(a, b),
        BinOp::Smax => ectx.smax(a, b),
        BinOp::Umin => ectx.umin(a, b),
        BinOp::Umax => ectx.umax(a, b),
        BinOp::UaddSat => ectx.uadd_sat(a, b),
        BinOp::SaddSat => ectx.sadd_sat(a, b),
        BinOp::UsubSat => ectx.usub_sat(a, b),
        BinOp::SsubSat => ectx.ssub_sat(a, b),
    }
}

fn binop<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: BinOp) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let result = apply_binop(ectx, op, a, b)?;
    write_vec(ectx, dst, arr, result)
}

#[derive(Clone, Copy)]
enum UnOp {
    Not,
    Neg,
    Abs,
    Cnt,
    Clz,
    Rbit,
}

fn unary<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: UnOp) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arrs)?;
    let result = match op {
        UnOp::Not => ectx.not(v)?,
        UnOp::Neg => ectx.neg(v)?,
        UnOp::Abs => ectx.abs(v)?,
        UnOp::Cnt => ectx.ctpop(v)?,
        UnOp::Clz => ectx.ctlz(v)?,
        UnOp::Rbit => ectx.bitreverse(v)?,
    };
    write_vec(ectx, dst, arr, result)
}

/// Reverse elements within each `container_bits` chunk.
fn rev_within<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    container_bits: u32,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arrs)?;
    let group = container_bits / arr.elem_bits;
    let mask: Vec<u32> = (0..arr.lanes)
        .map(|i| (i / group) * group + (group - 1 - i % group))
        .collect();
    let undef = ectx.undef_vec(arrs.lanes, arrs.elem_bits).into();
    let result = ectx.shuffle(v, undef, &mask)?;
    write_vec(ectx, dst, arr, result)
}

// ── Reductions ──

#[derive(Clone, Copy)]
enum Reduce {
    Add,
    Smin,
    Smax,
    Umin,
    Umax,
}

fn reduce<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: Reduce) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (rs, arr) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arr)?;
    let scalar = match op {
        Reduce::Add => ectx.reduce_add(v)?,
        Reduce::Smin => ectx.reduce_smin(v)?,
        Reduce::Smax => ectx.reduce_smax(v)?,
        Reduce::Umin => ectx.reduce_umin(v)?,
        Reduce::Umax => ectx.reduce_umax(v)?,
    };
    write_fp(ectx, width.bits(), dst, scalar)
}

/// SADDLV/UADDLV: widen the lanes then sum.
fn reduce_long<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (rs, arr) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arr)?;
    let wide_ty = ectx.vec_ty(arr.elem_bits * 2, arr.lanes);
    let wide = if signed {
        ectx.sext(v, wide_ty.into())?
    } else {
        ectx.zext(v, wide_ty.into())?
    };
    let sum = ectx.reduce_add(wide)?;
    write_fp(ectx, width.bits(), dst, sum)
}

/// ADDP (scalar): sum the two lanes of a 2d source.
fn addp_scalar<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (width, dst) = inst.fp(0)?;
    let (rs, arr) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arr)?;
    let sum = ectx.reduce_add(v)?;
    write_fp(ectx, width.bits(), dst, sum)
}

/// Pairwise over the concatenation of the two sources.
fn pairwise<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, op: BinOp) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let evens: Vec<u32> = (0..arr.lanes).map(|i| 2 * i).collect();
    let odds: Vec<u32> = (0..arr.lanes).map(|i| 2 * i + 1).collect();
    let left = ectx.shuffle(a, b, &evens)?;
    let right = ectx.shuffle(a, b, &odds)?;
    let result = apply_binop(ectx, op, left, right)?;
    write_vec(ectx, dst, arr, result)
}

/// SADDLP family: widen, then add adjacent lane pairs; the ADALP
/// forms accumulate into the destination.
fn pairwise_long<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    accumulate: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arrs)?;
    let wide_ty = ectx.vec_ty(arrs.elem_bits * 2, arrs.lanes);
    let wide = if signed {
        ectx.sext(v, wide_ty.into())?
    } else {
        ectx.zext(v, wide_ty.into())?
    };
    let evens: Vec<u32> = (0..arr.lanes).map(|i| 2 * i).collect();
    let odds: Vec<u32> = (0..arr.lanes).map(|i| 2 * i + 1).collect();
    let undef = ectx.undef_vec(arrs.lanes, arrs.elem_bits * 2).into();
    let left = ectx.shuffle(wide, undef, &evens)?;
    let right = ectx.shuffle(wide, undef, &odds)?;
    let mut result = ectx.add(left, right)?;
    if accumulate {
        let acc = read_vec(ectx, dst, arr)?;
        result = ectx.add(acc, result)?;
    }
    write_vec(ectx, dst, arr, result)
}

// ── Multiplies ──

fn mul_acc<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, acc: Accumulate) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let product = ectx.mul(a, b)?;
    let result = match acc {
        Accumulate::None => product,
        Accumulate::Add => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.add(old, product)?
        }
        Accumulate::Sub => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.sub(old, product)?
        }
    };
    write_vec(ectx, dst, arr, result)
}

/// Splat one element of a source register across a vector shape.
fn splat_element<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    reg: u8,
    elem_bits: u32,
    lane: u32,
    out: VecArr,
) -> Result<Val<'ctx>> {
    let src_arr = VecArr::new(128 / elem_bits, elem_bits);
    let src = read_vec(ectx, reg, src_arr)?;
    let elem = ectx.extract_element_const(src, u64::from(lane))?;
    let mut vec: Val = ectx.undef_vec(out.lanes, out.elem_bits).into();
    for i in 0..out.lanes {
        vec = ectx.insert_element_const(vec, elem, u64::from(i))?;
    }
    Ok(vec)
}

fn mul_indexed<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    acc: Accumulate,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (reg, elem_bits, lane) = inst.vec_elem(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = splat_element(ectx, reg, elem_bits, lane, arra)?;
    let product = ectx.mul(a, b)?;
    let result = match acc {
        Accumulate::None => product,
        Accumulate::Add => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.add(old, product)?
        }
        Accumulate::Sub => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.sub(old, product)?
        }
    };
    write_vec(ectx, dst, arr, result)
}

/// Take the half of a source used by a long operation: the low lanes
/// normally, the high lanes for the "2" forms (where the source
/// arrangement has twice the destination's lane count).
fn long_source<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    value: Val<'ctx>,
    src: VecArr,
    dst_lanes: u32,
) -> Result<Val<'ctx>> {
    if src.lanes == dst_lanes {
        return Ok(value);
    }
    let offset = src.lanes - dst_lanes;
    let mask: Vec<u32> = (0..dst_lanes).map(|i| offset + i).collect();
    let undef = ectx.undef_vec(src.lanes, src.elem_bits).into();
    ectx.shuffle(value, undef, &mask)
}

fn extend_to<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    v: Val<'ctx>,
    elem_bits: u32,
    lanes: u32,
    signed: bool,
) -> Result<Val<'ctx>> {
    let ty = ectx.vec_ty(elem_bits, lanes);
    if signed {
        ectx.sext(v, ty.into())
    } else {
        ectx.zext(v, ty.into())
    }
}

fn mul_long<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    acc: Accumulate,
    indexed: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let a = read_vec(ectx, ra, arra)?;
    let a = long_source(ectx, a, arra, arr.lanes)?;
    let narrow = VecArr::new(arr.lanes, arr.elem_bits / 2);

    let b = if indexed {
        let (reg, elem_bits, lane) = inst.vec_elem(2)?;
        splat_element(ectx, reg, elem_bits, lane, narrow)?
    } else {
        let (rb, arrb) = inst.vec(2)?;
        let b = read_vec(ectx, rb, arrb)?;
        long_source(ectx, b, arrb, arr.lanes)?
    };

    let aw = extend_to(ectx, a, arr.elem_bits, arr.lanes, signed)?;
    let bw = extend_to(ectx, b, arr.elem_bits, arr.lanes, signed)?;
    let product = ectx.mul(aw, bw)?;
    let result = match acc {
        Accumulate::None => product,
        Accumulate::Add => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.add(old, product)?
        }
        Accumulate::Sub => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.sub(old, product)?
        }
    };
    write_vec(ectx, dst, arr, result)
}

/// UADDL/SADDL/USUBL/SSUBL and the W forms where only the second
/// operand widens.
fn wide_arith<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    op: BinOp,
    wide_first: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;

    let a = read_vec(ectx, ra, arra)?;
    let a = if wide_first {
        // the W forms take the first operand already wide
        a
    } else {
        let half = long_source(ectx, a, arra, arr.lanes)?;
        extend_to(ectx, half, arr.elem_bits, arr.lanes, signed)?
    };

    let b = read_vec(ectx, rb, arrb)?;
    let half = long_source(ectx, b, arrb, arr.lanes)?;
    let b = extend_to(ectx, half, arr.elem_bits, arr.lanes, signed)?;

    let result = apply_binop(ectx, op, a, b)?;
    write_vec(ectx, dst, arr, result)
}

/// Absolute difference: `max(a,b) - min(a,b)` lane-wise.
fn abd_value<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    a: Val<'ctx>,
    b: Val<'ctx>,
    signed: bool,
) -> Result<Val<'ctx>> {
    let (hi, lo) = if signed {
        (ectx.smax(a, b)?, ectx.smin(a, b)?)
    } else {
        (ectx.umax(a, b)?, ectx.umin(a, b)?)
    };
    ectx.sub(hi, lo)
}

fn abs_diff<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    accumulate: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let mut result = abd_value(ectx, a, b, signed)?;
    if accumulate {
        let old = read_vec(ectx, dst, arr)?;
        result = ectx.add(old, result)?;
    }
    write_vec(ectx, dst, arr, result)
}

fn abd_long<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    accumulate: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let a = long_source(ectx, a, arra, arr.lanes)?;
    let aw = extend_to(ectx, a, arr.elem_bits, arr.lanes, signed)?;
    let b = read_vec(ectx, rb, arrb)?;
    let b = long_source(ectx, b, arrb, arr.lanes)?;
    let bw = extend_to(ectx, b, arr.elem_bits, arr.lanes, signed)?;
    let mut result = abd_value(ectx, aw, bw, signed)?;
    if accumulate {
        let old = read_vec(ectx, dst, arr)?;
        result = ectx.add(old, result)?;
    }
    write_vec(ectx, dst, arr, result)
}

/// Halving add/sub: compute one bit wider, shift down, truncate.
fn halving<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    signed: bool,
    op: BinOp,
    rounded: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let wide = arr.elem_bits + 1;
    let aw = extend_to(ectx, a, wide, arr.lanes, signed)?;
    let bw = extend_to(ectx, b, wide, arr.lanes, signed)?;
    let mut sum = apply_binop(ectx, op, aw, bw)?;
    if rounded {
        let one = ectx.splat_const(1, wide, arr.lanes).into();
        sum = ectx.add(sum, one)?;
    }
    let shift = ectx.splat_const(1, wide, arr.lanes).into();
    let halved = if signed {
        ectx.raw_shift(ShiftOp::Ashr, sum, shift)?
    } else {
        ectx.raw_shift(ShiftOp::Lshr, sum, shift)?
    };
    let result = ectx.trunc(halved, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, dst, arr, result)
}

// ── Shifts ──

/// Immediate shifts; SSRA/USRA accumulate into the destination. Shift
/// amounts equal to the element size are legal in the encoding and
/// clamp to a defined all-zeros / all-sign result.
fn shift_imm<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    op: ShiftOp,
    acc: Accumulate,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    #[allow(clippy::cast_sign_loss)]
    let amount = inst.imm(2)? as u64;
    let v = read_vec(ectx, rs, arrs)?;

    let elem = u64::from(arr.elem_bits);
    let shifted = if amount >= elem {
        match op {
            ShiftOp::Shl | ShiftOp::Lshr => {
                let zero = ectx.splat_const(0, arr.elem_bits, arr.lanes);
                zero.into()
            }
            ShiftOp::Ashr => {
                let max = ectx.splat_const(elem - 1, arr.elem_bits, arr.lanes).into();
                ectx.raw_shift(ShiftOp::Ashr, v, max)?
            }
        }
    } else {
        let amt = ectx.splat_const(amount, arr.elem_bits, arr.lanes).into();
        ectx.raw_shift(op, v, amt)?
    };

    let result = match acc {
        Accumulate::None => shifted,
        Accumulate::Add => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.add(old, shifted)?
        }
        Accumulate::Sub => {
            let old = read_vec(ectx, dst, arr)?;
            ectx.sub(old, shifted)?
        }
    };
    write_vec(ectx, dst, arr, result)
}

/// SSHL/USHL: per-lane shift by a signed byte amount; negative
/// amounts shift right.
fn shift_register<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let v = read_vec(ectx, ra, arra)?;
    let amounts = read_vec(ectx, rb, arrb)?;

    // the shift amount is the signed low byte of each lane
    let byte_ty = ectx.vec_ty(8, arr.lanes);
    let low_bytes = if arr.elem_bits == 8 {
        amounts
    } else {
        ectx.trunc(amounts, byte_ty.into())?
    };
    let full_ty = ectx.vec_ty(arr.elem_bits, arr.lanes);
    let amt = if arr.elem_bits == 8 {
        low_bytes
    } else {
        ectx.sext(low_bytes, full_ty.into())?
    };

    let zero = ectx.splat_const(0, arr.elem_bits, arr.lanes).into();
    let is_left = ectx.icmp(IntPredicate::SGE, amt, zero)?;
    let neg = ectx.sub(zero, amt)?;

    let left = ectx.safe_shift(ShiftOp::Shl, v, amt)?;
    let right = if signed {
        // arithmetic right saturates at elem-1 rather than zeroing
        let cap = ectx
            .splat_const(u64::from(arr.elem_bits - 1), arr.elem_bits, arr.lanes)
            .into();
        let clamped = ectx.umin(neg, cap)?;
        ectx.raw_shift(ShiftOp::Ashr, v, clamped)?
    } else {
        ectx.safe_shift(ShiftOp::Lshr, v, neg)?
    };
    let result = ectx.select(is_left, left, right)?;
    write_vec(ectx, dst, arr, result)
}

/// SLI/SRI: shift and insert under a mask of the kept bits.
fn shift_insert<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, left: bool) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    #[allow(clippy::cast_sign_loss)]
    let amount = inst.imm(2)? as u64;
    let v = read_vec(ectx, rs, arrs)?;
    let old = read_vec(ectx, dst, arr)?;

    let elem = u64::from(arr.elem_bits);
    let ones = |n: u64| -> u64 {
        if n >= 64 {
            u64::MAX
        } else {
            (1u64 << n) - 1
        }
    };
    let (shifted, keep_mask) = if left {
        let amt = ectx.splat_const(amount, arr.elem_bits, arr.lanes).into();
        (ectx.raw_shift(ShiftOp::Shl, v, amt)?, ones(amount))
    } else {
        let shifted = if amount >= elem {
            ectx.splat_const(0, arr.elem_bits, arr.lanes).into()
        } else {
            let amt = ectx.splat_const(amount, arr.elem_bits, arr.lanes).into();
            ectx.raw_shift(ShiftOp::Lshr, v, amt)?
        };
        let kept = ones(elem) & !ones(elem - amount.min(elem));
        (shifted, kept)
    };
    let mask = ectx.splat_const(keep_mask, arr.elem_bits, arr.lanes).into();
    let kept = ectx.and(old, mask)?;
    let result = ectx.or(kept, shifted)?;
    write_vec(ectx, dst, arr, result)
}

/// SSHLL/USHLL (and SHLL): widen then shift left.
fn shift_long<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    #[allow(clippy::cast_sign_loss)]
    let amount = inst.imm(2)? as u64;
    let v = read_vec(ectx, rs, arrs)?;
    let half = long_source(ectx, v, arrs, arr.lanes)?;
    let wide = extend_to(ectx, half, arr.elem_bits, arr.lanes, signed)?;
    let result = if amount == 0 {
        wide
    } else {
        let amt = ectx.splat_const(amount, arr.elem_bits, arr.lanes).into();
        ectx.raw_shift(ShiftOp::Shl, wide, amt)?
    };
    write_vec(ectx, dst, arr, result)
}

/// SHRN/RSHRN: shift right (with optional rounding), then truncate.
fn shift_narrow<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, rounded: bool) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    #[allow(clippy::cast_sign_loss)]
    let amount = inst.imm(2)? as u64;
    let v = read_vec(ectx, rs, arrs)?;

    let mut value = v;
    if rounded && amount > 0 {
        let bias = ectx
            .splat_const(1u64 << (amount - 1), arrs.elem_bits, arrs.lanes)
            .into();
        value = ectx.add(value, bias)?;
    }
    let amt = ectx.splat_const(amount, arrs.elem_bits, arrs.lanes).into();
    let shifted = ectx.raw_shift(ShiftOp::Lshr, value, amt)?;
    let narrow_lanes = arrs.lanes;
    let narrowed = ectx.trunc(shifted, ectx.vec_ty(arrs.elem_bits / 2, narrow_lanes).into())?;
    write_narrow_result(ectx, dst, arr, narrowed, narrow_lanes)
}

#[derive(Clone, Copy)]
enum Narrow {
    Plain,
    SignedSat,
    UnsignedSat,
}

/// XTN/SQXTN/UQXTN: clamp (for the saturating forms) and truncate.
fn narrow<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, kind: Narrow) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (rs, arrs) = inst.vec(1)?;
    let v = read_vec(ectx, rs, arrs)?;
    let half_bits = arrs.elem_bits / 2;

    let clamped = match kind {
        Narrow::Plain => v,
        Narrow::SignedSat => {
            let max = (1u64 << (half_bits - 1)) - 1;
            let min = -(1i64 << (half_bits - 1));
            let hi = ectx.splat_const(max, arrs.elem_bits, arrs.lanes).into();
            // the minimum splats sign-extended into the wide lanes
            let lane = ectx.int_const_signed(min, arrs.elem_bits);
            let mut lo: Val = ectx.undef_vec(arrs.lanes, arrs.elem_bits).into();
            for i in 0..arrs.lanes {
                lo = ectx.insert_element_const(lo, lane.into(), u64::from(i))?;
            }
            let capped = ectx.smin(v, hi)?;
            ectx.smax(capped, lo)?
        }
        Narrow::UnsignedSat => {
            let max = if half_bits >= 64 {
                u64::MAX
            } else {
                (1u64 << half_bits) - 1
            };
            let hi = ectx.splat_const(max, arrs.elem_bits, arrs.lanes).into();
            ectx.umin(v, hi)?
        }
    };
    let narrowed = ectx.trunc(clamped, ectx.vec_ty(half_bits, arrs.lanes).into())?;
    write_narrow_result(ectx, dst, arr, narrowed, arrs.lanes)
}

/// Write a narrowing result: the base forms fill the low half (upper
/// half zeroed); the "2" forms (destination has twice the result
/// lanes) keep the low half and insert into the high half.
fn write_narrow_result<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    dst: u8,
    dst_arr: VecArr,
    result: Val<'ctx>,
    result_lanes: u32,
) -> Result<()> {
    if dst_arr.lanes == result_lanes {
        return write_vec(ectx, dst, dst_arr, result);
    }
    // XTN2-style: low half preserved, result becomes the high half
    let old = read_vec(ectx, dst, dst_arr)?;
    let low_mask: Vec<u32> = (0..result_lanes).collect();
    let undef = ectx.undef_vec(dst_arr.lanes, dst_arr.elem_bits).into();
    let low = ectx.shuffle(old, undef, &low_mask)?;
    // first source lanes then second source lanes, in order
    let combined_mask: Vec<u32> = (0..dst_arr.lanes).collect();
    let combined = ectx.shuffle(low, result, &combined_mask)?;
    write_vec(ectx, dst, dst_arr, combined)
}

// ── Compares ──

fn compare<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    pred: IntPredicate,
    against_zero: bool,
) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = if against_zero {
        ectx.splat_const(0, arr.elem_bits, arr.lanes).into()
    } else {
        let (rb, arrb) = inst.vec(2)?;
        read_vec(ectx, rb, arrb)?
    };
    let bits = ectx.icmp(pred, a, b)?;
    let result = ectx.sext(bits, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, dst, arr, result)
}

fn cmtst<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let masked = ectx.and(a, b)?;
    let zero = ectx.splat_const(0, arr.elem_bits, arr.lanes).into();
    let bits = ectx.icmp(IntPredicate::NE, masked, zero)?;
    let result = ectx.sext(bits, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, dst, arr, result)
}

// ── Permutes ──

fn permute<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, arra) = inst.vec(1)?;
    let (rb, arrb) = inst.vec(2)?;
    let a = read_vec(ectx, ra, arra)?;
    let b = read_vec(ectx, rb, arrb)?;
    let l = arr.lanes;
    let half = l / 2;
    let mask: Vec<u32> = match inst.opcode {
        Opcode::Zip1 => (0..l)
            .map(|i| if i % 2 == 0 { i / 2 } else { l + i / 2 })
            .collect(),
        Opcode::Zip2 => (0..l)
            .map(|i| {
                if i % 2 == 0 {
                    half + i / 2
                } else {
                    l + half + i / 2
                }
            })
            .collect(),
        Opcode::Uzp1 => (0..l).map(|i| 2 * i).collect(),
        Opcode::Uzp2 => (0..l).map(|i| 2 * i + 1).collect(),
        Opcode::Trn1 => (0..l)
            .map(|i| if i % 2 == 0 { i } else { l + i - 1 })
            .collect(),
        Opcode::Trn2 => (0..l)
            .map(|i| if i % 2 == 0 { i + 1 } else { l + i })
            .collect(),
        _ => return Err(super::unsupported(ectx, inst)),
    };
    let result = ectx.shuffle(a, b, &mask)?;
    write_vec(ectx, dst, arr, result)
}

/// EXT: byte-granular sliding window over the concatenation `b:a`.
fn ext<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, _) = inst.vec(1)?;
    let (rb, _) = inst.vec(2)?;
    #[allow(clippy::cast_sign_loss)]
    let index = inst.imm(3)? as u32;

    let bytes = arr.total_bits() / 8;
    let byte_arr = VecArr::new(bytes, 8);
    let a = read_vec(ectx, ra, byte_arr)?;
    let b = read_vec(ectx, rb, byte_arr)?;
    let mask: Vec<u32> = (0..bytes).map(|i| index + i).collect();
    let result = ectx.shuffle(a, b, &mask)?;
    let as_elems = ectx.bitcast(result, ectx.vec_ty(arr.elem_bits, arr.lanes).into())?;
    write_vec(ectx, dst, arr, as_elems)
}

fn dup_elem<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    match inst.operands.first() {
        Some(Operand::Vec { reg, arr }) => {
            let (src, elem_bits, lane) = inst.vec_elem(1)?;
            let splat = splat_element(ectx, src, elem_bits, lane, *arr)?;
            write_vec(ectx, *reg, *arr, splat)
        }
        // scalar DUP (DUPi*): one element into a scalar register
        Some(Operand::Fp { width, reg }) => {
            let (src, elem_bits, lane) = inst.vec_elem(1)?;
            let src_arr = VecArr::new(128 / elem_bits, elem_bits);
            let vec = read_vec(ectx, src, src_arr)?;
            let elem = ectx.extract_element_const(vec, u64::from(lane))?;
            write_fp(ectx, width.bits(), *reg, elem)
        }
        _ => Err(super::unsupported(ectx, inst)),
    }
}

fn dup_gpr<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (width, reg) = inst.gpr(1)?;
    let value = read_gpr(ectx, width, reg)?;
    let elem = if width.bits() == arr.elem_bits {
        value
    } else {
        ectx.trunc(value, ectx.int_ty(arr.elem_bits).into())?
    };
    let mut vec: Val = ectx.undef_vec(arr.lanes, arr.elem_bits).into();
    for i in 0..arr.lanes {
        vec = ectx.insert_element_const(vec, elem, u64::from(i))?;
    }
    write_vec(ectx, dst, arr, vec)
}

fn ins_elem<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, elem_bits, dst_lane) = inst.vec_elem(0)?;
    let (src, _, src_lane) = inst.vec_elem(1)?;
    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let src_vec = read_vec(ectx, src, arr)?;
    let elem = ectx.extract_element_const(src_vec, u64::from(src_lane))?;
    let dst_vec = read_vec(ectx, dst, arr)?;
    let updated = ectx.insert_element_const(dst_vec, elem, u64::from(dst_lane))?;
    write_vec(ectx, dst, arr, updated)
}

fn ins_gpr<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, elem_bits, lane) = inst.vec_elem(0)?;
    let (width, reg) = inst.gpr(1)?;
    let value = read_gpr(ectx, width, reg)?;
    let elem = if width.bits() == elem_bits {
        value
    } else {
        ectx.trunc(value, ectx.int_ty(elem_bits).into())?
    };
    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let dst_vec = read_vec(ectx, dst, arr)?;
    let updated = ectx.insert_element_const(dst_vec, elem, u64::from(lane))?;
    write_vec(ectx, dst, arr, updated)
}

fn mov_to_gpr<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, signed: bool) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    let (src, elem_bits, lane) = inst.vec_elem(1)?;
    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let vec = read_vec(ectx, src, arr)?;
    let elem = ectx.extract_element_const(vec, u64::from(lane))?;
    let value = if elem_bits == width.bits() {
        elem
    } else if signed {
        ectx.sext(elem, ectx.int_ty(width.bits()).into())?
    } else {
        ectx.zext(elem, ectx.int_ty(width.bits()).into())?
    };
    write_gpr(ectx, width, dst, value)
}

/// TBL: table lookup over 1-4 concatenated registers; out-of-range
/// indices produce zero.
fn tbl<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let mut tables = Vec::new();
    for i in 1..inst.operands.len() - 1 {
        tables.push(inst.vec(i)?);
    }
    let (idx_reg, idx_arr) = inst.vec(inst.operands.len() - 1)?;
    let n = u32::try_from(tables.len())
        .map_err(|_| Error::InvariantViolation("bad table list".to_string()))?;
    if n == 0 || n > 4 {
        return Err(Error::InvariantViolation(format!(
            "{}: table list of {n} registers",
            inst.mnemonic()
        )));
    }

    // concatenate the table registers into one wide byte vector
    let total_bits = n * 128;
    let wide_ty = ectx.int_ty(total_bits);
    let mut concat: Val = ectx.int_const(0, total_bits).into();
    for (i, &(reg, _)) in tables.iter().enumerate() {
        let part = read_fp(ectx, 128, reg)?;
        let widened = if total_bits == 128 {
            part
        } else {
            ectx.zext(part, wide_ty.into())?
        };
        let placed = if i == 0 {
            widened
        } else {
            let amt = ectx
                .int_const(u64::from(u32::try_from(i).unwrap_or(0) * 128), total_bits)
                .into();
            ectx.raw_shift(ShiftOp::Shl, widened, amt)?
        };
        concat = ectx.or(concat, placed)?;
    }
    let table_vec = ectx.bitcast(concat, ectx.vec_ty(8, n * 16).into())?;

    let indices = read_vec(ectx, idx_reg, idx_arr)?;
    let limit = u64::from(n * 16);
    let mut out: Val = ectx.undef_vec(arr.lanes, 8).into();
    for lane in 0..arr.lanes {
        let idx = ectx.extract_element_const(indices, u64::from(lane))?;
        let idx32 = ectx.zext(idx, ectx.int_ty(32).into())?;
        let in_range = ectx.icmp(
            IntPredicate::ULT,
            idx32,
            ectx.int_const(limit, 32).into(),
        )?;
        let capped = ectx.umin(idx32, ectx.int_const(limit - 1, 32).into())?;
        let value = ectx.extract_element(table_vec, capped)?;
        let zero = ectx.int_const(0, 8).into();
        let picked = ectx.select(in_range, value, zero)?;
        out = ectx.insert_element_const(out, picked, u64::from(lane))?;
    }
    write_vec(ectx, dst, arr, out)
}

/// BSL/BIT/BIF as whole-register bitwise formulas.
fn bitwise_select<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    let (ra, _) = inst.vec(1)?;
    let (rb, _) = inst.vec(2)?;
    let bits = arr.total_bits();
    let d = read_fp(ectx, bits, dst)?;
    let n = read_fp(ectx, bits, ra)?;
    let m = read_fp(ectx, bits, rb)?;

    let result = match inst.opcode {
        Opcode::Bsl => {
            // d' = (d & n) | (~d & m)
            let dn = ectx.and(d, n)?;
            let nd = ectx.not(d)?;
            let ndm = ectx.and(nd, m)?;
            ectx.or(dn, ndm)?
        }
        Opcode::Bit => {
            // d' = (d & ~m) | (n & m)
            let nm = ectx.not(m)?;
            let dm = ectx.and(d, nm)?;
            let sel = ectx.and(n, m)?;
            ectx.or(dm, sel)?
        }
        Opcode::Bif => {
            // d' = (d & m) | (n & ~m)
            let dm = ectx.and(d, m)?;
            let nm = ectx.not(m)?;
            let sel = ectx.and(n, nm)?;
            ectx.or(dm, sel)?
        }
        _ => return Err(super::unsupported(ectx, inst)),
    };
    write_fp(ectx, bits, dst, result)
}

/// Expand a MOVI byte mask: each bit of the immediate selects an
/// all-ones or all-zeros byte.
#[must_use]
pub(crate) fn movi_byte_mask(imm8: u8) -> u64 {
    let mut out = 0u64;
    for bit in 0..8 {
        if imm8 & (1 << bit) != 0 {
            out |= 0xffu64 << (bit * 8);
        }
    }
    out
}

/// MOVI/MVNI and the shifting-ones (MSL) forms.
fn vector_imm<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (dst, arr) = inst.vec(0)?;
    #[allow(clippy::cast_sign_loss)]
    let imm8 = (inst.imm(1)? as u64) & 0xff;
    let shift = match inst.shift(2) {
        Ok((ShiftKind::Lsl, amount)) => u64::from(amount),
        _ => 0,
    };

    let elem = u64::from(arr.elem_bits);
    let value = match inst.opcode {
        Opcode::Movi if arr.elem_bits == 64 => {
            movi_byte_mask(u8::try_from(imm8).unwrap_or(0))
        }
        Opcode::Movi => imm8 << shift,
        Opcode::Mvni => !(imm8 << shift) & mask_bits(elem),
        // MSL: the vacated low bits fill with ones
        Opcode::MoviMsl => (imm8 << shift) | mask_bits(shift),
        Opcode::MvniMsl => !((imm8 << shift) | mask_bits(shift)) & mask_bits(elem),
        _ => return Err(super::unsupported(ectx, inst)),
    };
    let splat = ectx.splat_const(value, arr.elem_bits, arr.lanes);
    write_vec(ectx, dst, arr, splat.into())
}

fn mask_bits(n: u64) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::movi_byte_mask;

    #[test]
    fn byte_mask_expansion() {
        assert_eq!(movi_byte_mask(0), 0);
        assert_eq!(movi_byte_mask(0xff), u64::MAX);
        assert_eq!(movi_byte_mask(0b0000_0101), 0x0000_0000_00ff_00ff);
        assert_eq!(movi_byte_mask(0b1000_0000), 0xff00_0000_0000_0000);
    }
}
