//! Classic lowering catalog: per-opcode routines reproducing the
//! AArch64 semantics directly, used as the fallback path and for
//! instructions never routed to the structured path.
//!
//! Every routine reads sources through the register cells, writes the
//! destination cell exactly once (W writes zero-extended to 64 bits,
//! `XZR`/`WZR` writes discarded), and touches N/Z/C/V only for the
//! set-flags forms.

mod alu;
mod bitfield;
mod branch;
mod float;
mod memory;
mod vector;

use inkwell::basic_block::BasicBlock;
use inkwell::IntPredicate;

use crate::emit::{EmissionContext, Flag, RegBank, Val};
use crate::inst::{Cond, FpWidth, Gpr, Inst, Opcode, RegWidth, VecArr};
use crate::{Error, Result};

pub(crate) use branch::lookup_global;

/// Control-flow context for one instruction: the pre-created entry
/// blocks for every instruction (branch targets), and the fall-through
/// block when there is a following instruction.
pub struct Flow<'a, 'ctx> {
    pub labels: &'a [BasicBlock<'ctx>],
    pub next: Option<BasicBlock<'ctx>>,
}

impl<'ctx> Flow<'_, 'ctx> {
    pub fn label(&self, index: usize) -> Result<BasicBlock<'ctx>> {
        self.labels.get(index).copied().ok_or_else(|| {
            Error::InvariantViolation(format!("branch target {index} out of range"))
        })
    }
}

pub(crate) fn unsupported(ectx: &EmissionContext<'_>, inst: &Inst) -> Error {
    Error::UnsupportedOpcode {
        mnemonic: inst.mnemonic(),
        ir: ectx.print_function(),
    }
}

/// Lower one instruction through the catalog.
pub fn lower<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    flow: &Flow<'_, 'ctx>,
) -> Result<()> {
    use Opcode as Op;
    if crate::lift::PSEUDO_NOPS.contains(&inst.opcode) {
        return Ok(());
    }
    match inst.opcode {
        Op::B | Op::Bl | Op::Br | Op::Blr | Op::Ret | Op::BCond | Op::Cbz | Op::Cbnz
        | Op::Tbz | Op::Tbnz | Op::Brk | Op::Mrs | Op::Msr | Op::Adr | Op::Adrp => {
            branch::lower(ectx, inst, flow)
        }

        Op::AddImm | Op::AddsImm | Op::SubImm | Op::SubsImm | Op::AddShift | Op::AddsShift
        | Op::SubShift | Op::SubsShift | Op::AddExt | Op::AddsExt | Op::SubExt | Op::SubsExt
        | Op::Adc | Op::Adcs | Op::Sbc | Op::Sbcs | Op::Asrv | Op::Lslv | Op::Lsrv | Op::Rorv
        | Op::AndImm | Op::AndsImm | Op::OrrImm | Op::EorImm | Op::AndShift | Op::AndsShift
        | Op::OrrShift | Op::OrnShift | Op::EorShift | Op::EonShift | Op::BicShift
        | Op::BicsShift | Op::Movz | Op::Movn | Op::Movk | Op::Madd | Op::Msub | Op::Smaddl
        | Op::Umaddl | Op::Smsubl | Op::Umsubl | Op::Smulh | Op::Umulh | Op::Sdiv | Op::Udiv
        | Op::Rbit | Op::Rev | Op::Rev16 | Op::Rev32 | Op::Clz => alu::lower(ectx, inst),

        Op::Sbfm | Op::Ubfm | Op::Bfm | Op::Extr | Op::Csel | Op::Csinc | Op::Csinv
        | Op::Csneg | Op::Ccmp | Op::Ccmn => bitfield::lower(ectx, inst),

        Op::LdrUi | Op::LdrUr | Op::LdrPre | Op::LdrPost | Op::LdrRo | Op::LdrbUi
        | Op::LdrbUr | Op::LdrbPre | Op::LdrbPost | Op::LdrbRo | Op::LdrhUi | Op::LdrhUr
        | Op::LdrhPre | Op::LdrhPost | Op::LdrhRo | Op::LdrsbUi | Op::LdrsbUr | Op::LdrsbPre
        | Op::LdrsbPost | Op::LdrsbRo | Op::LdrshUi | Op::LdrshUr | Op::LdrshPre
        | Op::LdrshPost | Op::LdrshRo | Op::LdrswUi | Op::LdrswUr | Op::LdrswPre
        | Op::LdrswPost | Op::LdrswRo | Op::StrUi | Op::StrUr | Op::StrPre | Op::StrPost
        | Op::StrRo | Op::StrbUi | Op::StrbUr | Op::StrbPre | Op::StrbPost | Op::StrbRo
        | Op::StrhUi | Op::StrhUr | Op::StrhPre | Op::StrhPost | Op::StrhRo | Op::Ldp
        | Op::LdpPre | Op::LdpPost | Op::Ldpsw | Op::LdpswPre | Op::LdpswPost | Op::Stp
        | Op::StpPre | Op::StpPost | Op::Ld1Lane | Op::Ld1LanePost | Op::Ld1Rep
        | Op::Ld1RepPost | Op::Ld1Multi | Op::Ld1MultiPost | Op::LdN | Op::LdNPost
        | Op::St1Lane | Op::St1LanePost | Op::St1Multi | Op::St1MultiPost | Op::StN
        | Op::StNPost => memory::lower(ectx, inst),

        Op::Fadd | Op::Fsub | Op::Fmul | Op::Fdiv | Op::Fnmul | Op::Fmin | Op::Fmax
        | Op::Fminnm | Op::Fmaxnm | Op::Fneg | Op::Fabs | Op::Fsqrt | Op::Fmadd | Op::Fmsub
        | Op::Fnmadd | Op::Fnmsub | Op::FmulIdx | Op::FmlaIdx | Op::FmlsIdx | Op::Fcmp
        | Op::Fcmpe | Op::Fccmp | Op::Fcsel | Op::Fcvt | Op::Fcvtzs | Op::Fcvtzu | Op::Scvtf
        | Op::Ucvtf | Op::Frinta | Op::Frintm | Op::Frintp | Op::Frintx | Op::Fmov
        | Op::FmovImm | Op::FaddV | Op::FsubV | Op::FmulV | Op::FnegV | Op::FcmeqV
        | Op::FcmgtV | Op::FcmgeV | Op::FcmeqVz | Op::FcmgtVz | Op::FcmgeVz | Op::FcmleVz
        | Op::FcmltVz | Op::FmovVecImm => float::lower(ectx, inst),

        _ => vector::lower(ectx, inst),
    }
}

// ── Register access helpers shared by the families ──

pub(crate) fn read_gpr<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    width: RegWidth,
    reg: Gpr,
) -> Result<Val<'ctx>> {
    let index = match reg {
        Gpr::Zr => return Ok(ectx.int_const(0, width.bits()).into()),
        Gpr::Sp => 31,
        Gpr::R(i) => u32::from(i),
    };
    let cell = ectx.reg(RegBank::X, index)?;
    let full = ectx.load_cell(cell)?;
    match width {
        RegWidth::X => Ok(full),
        RegWidth::W => ectx.trunc(full, ectx.int_ty(32).into()),
    }
}

/// Write a general register; W writes zero-extend into the 64-bit
/// cell, `Zr` writes are dropped after evaluation.
pub(crate) fn write_gpr<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    width: RegWidth,
    reg: Gpr,
    value: Val<'ctx>,
) -> Result<()> {
    let index = match reg {
        Gpr::Zr => return Ok(()),
        Gpr::Sp => 31,
        Gpr::R(i) => u32::from(i),
    };
    let value = match width {
        RegWidth::X => value,
        RegWidth::W => ectx.zext(value, ectx.int_ty(64).into())?,
    };
    let cell = ectx.reg(RegBank::X, index)?;
    ectx.store(value, cell.ptr)
}

/// Read the low `bits` of a vector register as an integer.
pub(crate) fn read_fp<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    bits: u32,
    reg: u8,
) -> Result<Val<'ctx>> {
    let cell = ectx.reg(RegBank::V, u32::from(reg))?;
    let full = ectx.load_cell(cell)?;
    if bits == 128 {
        Ok(full)
    } else {
        ectx.trunc(full, ectx.int_ty(bits).into())
    }
}

/// Write the low `bits` of a vector register, zeroing the rest.
pub(crate) fn write_fp<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    bits: u32,
    reg: u8,
    value: Val<'ctx>,
) -> Result<()> {
    let cell = ectx.reg(RegBank::V, u32::from(reg))?;
    let value = ectx.to_int(value)?;
    let value = if bits == 128 {
        value
    } else {
        ectx.zext(value, ectx.int_ty(128).into())?
    };
    ectx.store(value, cell.ptr)
}

pub(crate) fn read_vec<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    reg: u8,
    arr: VecArr,
) -> Result<Val<'ctx>> {
    let scalar = read_fp(ectx, arr.total_bits(), reg)?;
    ectx.bitcast(scalar, ectx.vec_ty(arr.elem_bits, arr.lanes).into())
}

pub(crate) fn write_vec<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    reg: u8,
    arr: VecArr,
    value: Val<'ctx>,
) -> Result<()> {
    let scalar = ectx.bitcast(value, ectx.int_ty(arr.total_bits()).into())?;
    write_fp(ectx, arr.total_bits(), reg, scalar)
}

pub(crate) fn fp_operand<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    width: FpWidth,
    reg: u8,
) -> Result<Val<'ctx>> {
    let raw = read_fp(ectx, width.bits(), reg)?;
    ectx.to_float(raw)
}

// ── Condition and flag helpers ──

/// Evaluate an AArch64 condition against the flag cells, as an i1.
pub(crate) fn cond_holds<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    cond: Cond,
) -> Result<Val<'ctx>> {
    let base = (cond as u8) >> 1;
    let result: Val<'ctx> = match base {
        0 => ectx_read(ectx, Flag::Z)?,
        1 => ectx_read(ectx, Flag::C)?,
        2 => ectx_read(ectx, Flag::N)?,
        3 => ectx_read(ectx, Flag::V)?,
        4 => {
            let c = ectx_read(ectx, Flag::C)?;
            let z = ectx_read(ectx, Flag::Z)?;
            let nz = ectx.not(z)?;
            ectx.and(c, nz)?
        }
        5 => {
            let n = ectx_read(ectx, Flag::N)?;
            let v = ectx_read(ectx, Flag::V)?;
            ectx.icmp(IntPredicate::EQ, n, v)?
        }
        6 => {
            let n = ectx_read(ectx, Flag::N)?;
            let v = ectx_read(ectx, Flag::V)?;
            let ge = ectx.icmp(IntPredicate::EQ, n, v)?;
            let z = ectx_read(ectx, Flag::Z)?;
            let nz = ectx.not(z)?;
            ectx.and(ge, nz)?
        }
        _ => return Ok(ectx.int_const(1, 1).into()),
    };
    // the low condition bit inverts, except for the always forms
    if (cond as u8) & 1 == 1 {
        ectx.not(result)
    } else {
        Ok(result)
    }
}

fn ectx_read<'ctx>(ectx: &mut EmissionContext<'ctx>, flag: Flag) -> Result<Val<'ctx>> {
    Ok(ectx.read_flag(flag)?.into())
}

/// Set N and Z from a result value.
pub(crate) fn set_nz<'ctx>(ectx: &mut EmissionContext<'ctx>, result: Val<'ctx>) -> Result<()> {
    let bits = ectx.value_bits(result)?;
    let zero = ectx.int_const(0, bits).into();
    let n = ectx.icmp(IntPredicate::SLT, result, zero)?;
    let z = ectx.icmp(IntPredicate::EQ, result, zero)?;
    ectx.write_flag(Flag::N, n)?;
    ectx.write_flag(Flag::Z, z)
}

/// `a + b`, setting all four flags; returns the sum.
pub(crate) fn add_with_flags<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    a: Val<'ctx>,
    b: Val<'ctx>,
) -> Result<Val<'ctx>> {
    let (result, carry) = ectx.uadd_overflow(a, b)?;
    let (_, overflow) = ectx.sadd_overflow(a, b)?;
    set_nz(ectx, result)?;
    ectx.write_flag(Flag::C, carry)?;
    ectx.write_flag(Flag::V, overflow)?;
    Ok(result)
}

/// `a - b`, setting all four flags (C is the no-borrow flag).
pub(crate) fn sub_with_flags<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    a: Val<'ctx>,
    b: Val<'ctx>,
) -> Result<Val<'ctx>> {
    let result = ectx.sub(a, b)?;
    let (_, overflow) = ectx.ssub_overflow(a, b)?;
    set_nz(ectx, result)?;
    let no_borrow = ectx.icmp(IntPredicate::UGE, a, b)?;
    ectx.write_flag(Flag::C, no_borrow)?;
    ectx.write_flag(Flag::V, overflow)
        .map(|()| result)
}

/// `a + b + carry_in`, optionally setting flags; the add-with-carry
/// core shared by ADC/ADCS/SBC/SBCS.
pub(crate) fn add_with_carry<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    a: Val<'ctx>,
    b: Val<'ctx>,
    carry_in: Val<'ctx>,
    set_flags: bool,
) -> Result<Val<'ctx>> {
    let bits = ectx.value_bits(a)?;
    let carry_wide = ectx.zext(carry_in, ectx.int_ty(bits).into())?;

    if set_flags {
        let (partial, c1) = ectx.uadd_overflow(a, b)?;
        let (result, c2) = ectx.uadd_overflow(partial, carry_wide)?;
        let (_, v1) = ectx.sadd_overflow(a, b)?;
        let (_, v2) = ectx.sadd_overflow(partial, carry_wide)?;
        set_nz(ectx, result)?;
        let carry = ectx.or(c1, c2)?;
        ectx.write_flag(Flag::C, carry)?;
        let overflow = ectx.xor(v1, v2)?;
        ectx.write_flag(Flag::V, overflow)?;
        Ok(result)
    } else {
        let partial = ectx.add(a, b)?;
        ectx.add(partial, carry_wide)
    }
}
