//! Loads and stores: every scalar addressing mode, pair forms, and
//! the vector structure loads/stores.
//!
//! Operand conventions: immediate offsets are byte offsets (the
//! decoder collaborator has already unscaled them); register offsets
//! carry their extend modifier; pre/post forms write the incremented
//! address back to the base register.

use inkwell::values::PointerValue;

use crate::classic::{read_fp, read_gpr, read_vec, write_fp, write_gpr, write_vec};
use crate::emit::{EmissionContext, RegBank, ShiftOp, Val};
use crate::inst::{Gpr, Inst, Opcode, Operand, RegWidth, VecArr};
use crate::{Error, Result};

pub(super) fn lower<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::LdrUi | Op::LdrUr => load_scalar(ectx, inst, Mode::Offset, Ext::None),
        Op::LdrPre => load_scalar(ectx, inst, Mode::Pre, Ext::None),
        Op::LdrPost => load_scalar(ectx, inst, Mode::Post, Ext::None),
        Op::LdrRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::None),
        Op::LdrbUi | Op::LdrbUr => load_scalar(ectx, inst, Mode::Offset, Ext::Zero(1)),
        Op::LdrbPre => load_scalar(ectx, inst, Mode::Pre, Ext::Zero(1)),
        Op::LdrbPost => load_scalar(ectx, inst, Mode::Post, Ext::Zero(1)),
        Op::LdrbRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::Zero(1)),
        Op::LdrhUi | Op::LdrhUr => load_scalar(ectx, inst, Mode::Offset, Ext::Zero(2)),
        Op::LdrhPre => load_scalar(ectx, inst, Mode::Pre, Ext::Zero(2)),
        Op::LdrhPost => load_scalar(ectx, inst, Mode::Post, Ext::Zero(2)),
        Op::LdrhRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::Zero(2)),
        Op::LdrsbUi | Op::LdrsbUr => load_scalar(ectx, inst, Mode::Offset, Ext::Sign(1)),
        Op::LdrsbPre => load_scalar(ectx, inst, Mode::Pre, Ext::Sign(1)),
        Op::LdrsbPost => load_scalar(ectx, inst, Mode::Post, Ext::Sign(1)),
        Op::LdrsbRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::Sign(1)),
        Op::LdrshUi | Op::LdrshUr => load_scalar(ectx, inst, Mode::Offset, Ext::Sign(2)),
        Op::LdrshPre => load_scalar(ectx, inst, Mode::Pre, Ext::Sign(2)),
        Op::LdrshPost => load_scalar(ectx, inst, Mode::Post, Ext::Sign(2)),
        Op::LdrshRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::Sign(2)),
        Op::LdrswUi | Op::LdrswUr => load_scalar(ectx, inst, Mode::Offset, Ext::Sign(4)),
        Op::LdrswPre => load_scalar(ectx, inst, Mode::Pre, Ext::Sign(4)),
        Op::LdrswPost => load_scalar(ectx, inst, Mode::Post, Ext::Sign(4)),
        Op::LdrswRo => load_scalar(ectx, inst, Mode::RegOffset, Ext::Sign(4)),

        Op::StrUi | Op::StrUr => store_scalar(ectx, inst, Mode::Offset, None),
        Op::StrPre => store_scalar(ectx, inst, Mode::Pre, None),
        Op::StrPost => store_scalar(ectx, inst, Mode::Post, None),
        Op::StrRo => store_scalar(ectx, inst, Mode::RegOffset, None),
        Op::StrbUi | Op::StrbUr => store_scalar(ectx, inst, Mode::Offset, Some(1)),
        Op::StrbPre => store_scalar(ectx, inst, Mode::Pre, Some(1)),
        Op::StrbPost => store_scalar(ectx, inst, Mode::Post, Some(1)),
        Op::StrbRo => store_scalar(ectx, inst, Mode::RegOffset, Some(1)),
        Op::StrhUi | Op::StrhUr => store_scalar(ectx, inst, Mode::Offset, Some(2)),
        Op::StrhPre => store_scalar(ectx, inst, Mode::Pre, Some(2)),
        Op::StrhPost => store_scalar(ectx, inst, Mode::Post, Some(2)),
        Op::StrhRo => store_scalar(ectx, inst, Mode::RegOffset, Some(2)),

        Op::Ldp => pair(ectx, inst, Mode::Offset, PairOp::Load, false),
        Op::LdpPre => pair(ectx, inst, Mode::Pre, PairOp::Load, false),
        Op::LdpPost => pair(ectx, inst, Mode::Post, PairOp::Load, false),
        Op::Ldpsw => pair(ectx, inst, Mode::Offset, PairOp::Load, true),
        Op::LdpswPre => pair(ectx, inst, Mode::Pre, PairOp::Load, true),
        Op::LdpswPost => pair(ectx, inst, Mode::Post, PairOp::Load, true),
        Op::Stp => pair(ectx, inst, Mode::Offset, PairOp::Store, false),
        Op::StpPre => pair(ectx, inst, Mode::Pre, PairOp::Store, false),
        Op::StpPost => pair(ectx, inst, Mode::Post, PairOp::Store, false),

        Op::Ld1Lane | Op::Ld1LanePost => ld1_lane(ectx, inst, inst.opcode == Op::Ld1LanePost),
        Op::St1Lane | Op::St1LanePost => st1_lane(ectx, inst, inst.opcode == Op::St1LanePost),
        Op::Ld1Rep | Op::Ld1RepPost => ld1_rep(ectx, inst, inst.opcode == Op::Ld1RepPost),
        Op::Ld1Multi | Op::Ld1MultiPost => {
            structures(ectx, inst, PairOp::Load, false, inst.opcode == Op::Ld1MultiPost)
        }
        Op::St1Multi | Op::St1MultiPost => {
            structures(ectx, inst, PairOp::Store, false, inst.opcode == Op::St1MultiPost)
        }
        Op::LdN | Op::LdNPost => {
            structures(ectx, inst, PairOp::Load, true, inst.opcode == Op::LdNPost)
        }
        Op::StN | Op::StNPost => {
            structures(ectx, inst, PairOp::Store, true, inst.opcode == Op::StNPost)
        }

        _ => Err(super::unsupported(ectx, inst)),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Offset,
    Pre,
    Post,
    RegOffset,
}

/// Widening behavior of the sub-word loads: memory size in bytes plus
/// zero or sign extension to the destination register width.
#[derive(Clone, Copy)]
enum Ext {
    None,
    Zero(u32),
    Sign(u32),
}

/// The base register reloaded as a pointer value.
fn base_ptr<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    base: Gpr,
) -> Result<PointerValue<'ctx>> {
    let index = match base {
        Gpr::Sp => 31,
        Gpr::R(i) => u32::from(i),
        Gpr::Zr => {
            return Err(Error::InvariantViolation(
                "zero register cannot be an address base".to_string(),
            ));
        }
    };
    let cell = ectx.reg(RegBank::X, index)?;
    let loaded = ectx.load(ectx.ptr_ty().into(), cell.ptr)?;
    ectx.pointer(loaded)
}

/// Effective byte offset for the addressing mode, as an i64 value.
/// `operand_index` points at the first operand after the base.
fn offset_value<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    mode: Mode,
    operand_index: usize,
) -> Result<Val<'ctx>> {
    if mode == Mode::RegOffset {
        let (width, reg) = inst.gpr(operand_index)?;
        let value = read_gpr(ectx, width, reg)?;
        let i64t = ectx.int_ty(64);
        let (kind, amount) = inst.extend(operand_index + 1)?;
        let wide = if width == RegWidth::X {
            value
        } else if kind.is_signed() {
            ectx.sext(value, i64t.into())?
        } else {
            ectx.zext(value, i64t.into())?
        };
        if amount == 0 {
            return Ok(wide);
        }
        let amt = ectx.int_const(u64::from(amount), 64).into();
        return ectx.raw_shift(ShiftOp::Shl, wide, amt);
    }
    let imm = inst.imm(operand_index).unwrap_or(0);
    Ok(ectx.int_const_signed(imm, 64).into())
}

/// Apply base-register writeback for pre/post-indexed forms.
fn writeback<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    base: Gpr,
    offset: Val<'ctx>,
) -> Result<()> {
    let old = read_gpr(ectx, RegWidth::X, base)?;
    let updated = ectx.add(old, offset)?;
    write_gpr(ectx, RegWidth::X, base, updated)
}

/// The (access offset, writeback offset) split per mode.
fn mode_offsets<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    mode: Mode,
    offset: Val<'ctx>,
) -> (Val<'ctx>, Option<Val<'ctx>>) {
    match mode {
        Mode::Offset | Mode::RegOffset => (offset, None),
        Mode::Pre => (offset, Some(offset)),
        Mode::Post => (ectx.int_const(0, 64).into(), Some(offset)),
    }
}

fn load_scalar<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    mode: Mode,
    ext: Ext,
) -> Result<()> {
    let (base_width, base) = inst.gpr(1)?;
    debug_assert_eq!(base_width, RegWidth::X);
    let offset = offset_value(ectx, inst, mode, 2)?;
    let (access, wb) = mode_offsets(ectx, mode, offset);
    let ptr = base_ptr(ectx, base)?;

    match inst.operands.first() {
        Some(Operand::Fp { width, reg }) => {
            let size = width.bits() / 8;
            let loaded = ectx.load_with_offset(ptr, access, size)?;
            write_fp(ectx, width.bits(), *reg, loaded)?;
        }
        Some(Operand::Gpr { width, reg }) => {
            let size = match ext {
                Ext::None => width.bits() / 8,
                Ext::Zero(bytes) | Ext::Sign(bytes) => bytes,
            };
            let loaded = ectx.load_with_offset(ptr, access, size)?;
            let dest_ty = ectx.int_ty(width.bits());
            let value = match ext {
                Ext::None => loaded,
                Ext::Zero(_) => ectx.zext(loaded, dest_ty.into())?,
                Ext::Sign(_) => ectx.sext(loaded, dest_ty.into())?,
            };
            write_gpr(ectx, *width, *reg, value)?;
        }
        _ => return Err(super::unsupported(ectx, inst)),
    }

    if let Some(delta) = wb {
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

fn store_scalar<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    mode: Mode,
    truncate_to: Option<u32>,
) -> Result<()> {
    let (_, base) = inst.gpr(1)?;
    let offset = offset_value(ectx, inst, mode, 2)?;
    let (access, wb) = mode_offsets(ectx, mode, offset);
    let ptr = base_ptr(ectx, base)?;

    let (value, size) = match inst.operands.first() {
        Some(Operand::Fp { width, reg }) => {
            (read_fp(ectx, width.bits(), *reg)?, width.bits() / 8)
        }
        Some(Operand::Gpr { width, reg }) => {
            let full = read_gpr(ectx, *width, *reg)?;
            match truncate_to {
                None => (full, width.bits() / 8),
                Some(bytes) => {
                    let narrowed = ectx.trunc(full, ectx.int_ty(bytes * 8).into())?;
                    (narrowed, bytes)
                }
            }
        }
        _ => return Err(super::unsupported(ectx, inst)),
    };
    ectx.store_with_offset(ptr, access, size, value)?;

    if let Some(delta) = wb {
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum PairOp {
    Load,
    Store,
}

fn pair<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    mode: Mode,
    op: PairOp,
    sign_extend_words: bool,
) -> Result<()> {
    let (_, base) = inst.gpr(2)?;
    let offset = offset_value(ectx, inst, mode, 3)?;
    let (access, wb) = mode_offsets(ectx, mode, offset);
    let ptr = base_ptr(ectx, base)?;

    let elem_size = match (inst.operands.first(), sign_extend_words) {
        (_, true) => 4,
        (Some(Operand::Fp { width, .. }), _) => width.bits() / 8,
        (Some(Operand::Gpr { width, .. }), _) => width.bits() / 8,
        _ => return Err(super::unsupported(ectx, inst)),
    };

    for slot in 0..2usize {
        let slot_off = ectx
            .int_const(u64::from(u32::try_from(slot).unwrap_or(0)) * u64::from(elem_size), 64)
            .into();
        let this_off = ectx.add(access, slot_off)?;
        match (op, inst.operands.get(slot)) {
            (PairOp::Load, Some(Operand::Gpr { width, reg })) => {
                let loaded = ectx.load_with_offset(ptr, this_off, elem_size)?;
                let value = if sign_extend_words {
                    ectx.sext(loaded, ectx.int_ty(64).into())?
                } else {
                    loaded
                };
                write_gpr(ectx, *width, *reg, value)?;
            }
            (PairOp::Load, Some(Operand::Fp { width, reg })) => {
                let loaded = ectx.load_with_offset(ptr, this_off, elem_size)?;
                write_fp(ectx, width.bits(), *reg, loaded)?;
            }
            (PairOp::Store, Some(Operand::Gpr { width, reg })) => {
                let value = read_gpr(ectx, *width, *reg)?;
                ectx.store_with_offset(ptr, this_off, elem_size, value)?;
            }
            (PairOp::Store, Some(Operand::Fp { width, reg })) => {
                let value = read_fp(ectx, width.bits(), *reg)?;
                ectx.store_with_offset(ptr, this_off, elem_size, value)?;
            }
            _ => return Err(super::unsupported(ectx, inst)),
        }
    }

    if let Some(delta) = wb {
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

// ── Vector structure forms ──

/// Trailing post-index offset: an immediate or a 64-bit register.
fn post_offset<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<Val<'ctx>> {
    match inst.operands.last() {
        Some(Operand::Imm(v)) => Ok(ectx.int_const_signed(*v, 64).into()),
        Some(Operand::Gpr { width, reg }) => read_gpr(ectx, *width, *reg),
        _ => Err(Error::InvariantViolation(format!(
            "{}: missing post-index operand",
            inst.mnemonic()
        ))),
    }
}

/// LD1 (single lane): load one element into a lane, keeping the rest.
fn ld1_lane<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, post: bool) -> Result<()> {
    let (reg, elem_bits, lane) = inst.vec_elem(0)?;
    let (_, base) = inst.gpr(1)?;
    let ptr = base_ptr(ectx, base)?;

    let zero = ectx.int_const(0, 64).into();
    let loaded = ectx.load_with_offset(ptr, zero, elem_bits / 8)?;
    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let old = read_vec(ectx, reg, arr)?;
    let updated = ectx.insert_element_const(old, loaded, u64::from(lane))?;
    write_vec(ectx, reg, arr, updated)?;

    if post {
        let delta = post_offset(ectx, inst)?;
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

fn st1_lane<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, post: bool) -> Result<()> {
    let (reg, elem_bits, lane) = inst.vec_elem(0)?;
    let (_, base) = inst.gpr(1)?;
    let ptr = base_ptr(ectx, base)?;

    let arr = VecArr::new(128 / elem_bits, elem_bits);
    let vec = read_vec(ectx, reg, arr)?;
    let value = ectx.extract_element_const(vec, u64::from(lane))?;
    let zero = ectx.int_const(0, 64).into();
    ectx.store_with_offset(ptr, zero, elem_bits / 8, value)?;

    if post {
        let delta = post_offset(ectx, inst)?;
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

/// LD1R: load one element and replicate it across all lanes.
fn ld1_rep<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, post: bool) -> Result<()> {
    let (reg, arr) = inst.vec(0)?;
    let (_, base) = inst.gpr(1)?;
    let ptr = base_ptr(ectx, base)?;

    let zero = ectx.int_const(0, 64).into();
    let loaded = ectx.load_with_offset(ptr, zero, arr.elem_bits / 8)?;
    let mut vec: Val = ectx.undef_vec(arr.lanes, arr.elem_bits).into();
    for lane in 0..arr.lanes {
        vec = ectx.insert_element_const(vec, loaded, u64::from(lane))?;
    }
    write_vec(ectx, reg, arr, vec)?;

    if post {
        let delta = post_offset(ectx, inst)?;
        writeback(ectx, base, delta)?;
    }
    Ok(())
}

/// LD1/LD2/LD3/LD4 and ST equivalents over full registers. LD2/3/4
/// de-interleave element-wise (memory element `l*n + r` maps to
/// register `r` lane `l`), while multi-register LD1 is a plain
/// contiguous copy.
fn structures<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    op: PairOp,
    deinterleave: bool,
    post: bool,
) -> Result<()> {
    let mut regs: Vec<(u8, VecArr)> = Vec::new();
    for (i, operand) in inst.operands.iter().enumerate() {
        if matches!(operand, Operand::Vec { .. }) {
            regs.push(inst.vec(i)?);
        }
    }
    let n = u32::try_from(regs.len())
        .map_err(|_| Error::InvariantViolation("bad structure register list".to_string()))?;
    if n == 0 || n > 4 {
        return Err(Error::InvariantViolation(format!(
            "{}: structure list of {n} registers",
            inst.mnemonic()
        )));
    }
    let base_index = regs.len();
    let (_, base) = inst.gpr(base_index)?;
    let ptr = base_ptr(ectx, base)?;
    let elem_bytes = regs[0].1.elem_bits / 8;
    let deinterleave = deinterleave && n > 1;

    match op {
        PairOp::Load => {
            for (r, &(reg, arr)) in regs.iter().enumerate() {
                let mut vec: Val = ectx.undef_vec(arr.lanes, arr.elem_bits).into();
                for lane in 0..arr.lanes {
                    let mem_index = if deinterleave {
                        lane * n + u32::try_from(r).unwrap_or(0)
                    } else {
                        u32::try_from(r).unwrap_or(0) * arr.lanes + lane
                    };
                    let off = ectx
                        .int_const(u64::from(mem_index * elem_bytes), 64)
                        .into();
                    let loaded = ectx.load_with_offset(ptr, off, elem_bytes)?;
                    vec = ectx.insert_element_const(vec, loaded, u64::from(lane))?;
                }
                write_vec(ectx, reg, arr, vec)?;
            }
        }
        PairOp::Store => {
            for (r, &(reg, arr)) in regs.iter().enumerate() {
                let vec = read_vec(ectx, reg, arr)?;
                for lane in 0..arr.lanes {
                    let mem_index = if deinterleave {
                        lane * n + u32::try_from(r).unwrap_or(0)
                    } else {
                        u32::try_from(r).unwrap_or(0) * arr.lanes + lane
                    };
                    let value = ectx.extract_element_const(vec, u64::from(lane))?;
                    let off = ectx
                        .int_const(u64::from(mem_index * elem_bytes), 64)
                        .into();
                    ectx.store_with_offset(ptr, off, elem_bytes, value)?;
                }
            }
        }
    }

    if post {
        let delta = post_offset(ectx, inst)?;
        writeback(ectx, base, delta)?;
    }
    Ok(())
}
