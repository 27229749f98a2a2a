//! Bitfield moves, extract, and the conditional select/compare family.

use crate::classic::{add_with_flags, cond_holds, read_gpr, sub_with_flags, write_gpr};
use crate::emit::{EmissionContext, Flag, ShiftOp, Val};
use crate::inst::{Inst, Opcode};
use crate::Result;

pub(super) fn lower<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::Sbfm => bitfield_move(ectx, inst, Signedness::Signed),
        Op::Ubfm => bitfield_move(ectx, inst, Signedness::Unsigned),
        Op::Bfm => bitfield_insert(ectx, inst),
        Op::Extr => extract(ectx, inst),
        Op::Csel => cond_select(ectx, inst, Alt::Plain),
        Op::Csinc => cond_select(ectx, inst, Alt::Increment),
        Op::Csinv => cond_select(ectx, inst, Alt::Invert),
        Op::Csneg => cond_select(ectx, inst, Alt::Negate),
        Op::Ccmp => cond_compare(ectx, inst, false),
        Op::Ccmn => cond_compare(ectx, inst, true),
        _ => Err(super::unsupported(ectx, inst)),
    }
}

enum Signedness {
    Signed,
    Unsigned,
}

/// SBFM/UBFM: `imms >= immr` extracts the field `[imms:immr]` to bit
/// zero; otherwise the low `imms+1` bits move up to `regsize - immr`.
/// Everything is a pair of constant shifts.
fn bitfield_move<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    sign: Signedness,
) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    #[allow(clippy::cast_sign_loss)]
    let immr = inst.imm(2)? as u64;
    #[allow(clippy::cast_sign_loss)]
    let imms = inst.imm(3)? as u64;
    let bits = u64::from(width.bits());

    let value = read_gpr(ectx, width, rn)?;

    // position the field's top bit at the register's top bit
    let up = ectx.int_const(bits - 1 - imms, width.bits()).into();
    let at_top = ectx.raw_shift(ShiftOp::Shl, value, up)?;

    let down_amount = if imms >= immr {
        (bits - 1 - imms) + immr
    } else {
        // insert at regsize - immr: field msb lands at (regsize-immr) + imms
        bits - 1 - imms - (bits - immr)
    };
    let down = ectx.int_const(down_amount, width.bits()).into();
    let result = match sign {
        Signedness::Signed => ectx.raw_shift(ShiftOp::Ashr, at_top, down)?,
        Signedness::Unsigned => ectx.raw_shift(ShiftOp::Lshr, at_top, down)?,
    };
    write_gpr(ectx, width, dst, result)
}

/// BFM merges the moved field into the destination instead of
/// clearing it.
fn bitfield_insert<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    #[allow(clippy::cast_sign_loss)]
    let immr = inst.imm(2)? as u64;
    #[allow(clippy::cast_sign_loss)]
    let imms = inst.imm(3)? as u64;
    let bits = u64::from(width.bits());

    let (field_width, pos, src_shift) = if imms >= immr {
        (imms - immr + 1, 0, immr)
    } else {
        (imms + 1, bits - immr, 0)
    };
    let ones = if field_width == 64 {
        u64::MAX
    } else {
        (1u64 << field_width) - 1
    };
    let mask = ones << pos;
    let mask = if bits == 32 { mask & 0xffff_ffff } else { mask };

    let src = read_gpr(ectx, width, rn)?;
    let shifted = if src_shift > 0 {
        let amt = ectx.int_const(src_shift, width.bits()).into();
        ectx.raw_shift(ShiftOp::Lshr, src, amt)?
    } else if pos > 0 {
        let amt = ectx.int_const(pos, width.bits()).into();
        ectx.raw_shift(ShiftOp::Shl, src, amt)?
    } else {
        src
    };
    let field = ectx.and(shifted, ectx.int_const(mask, width.bits()).into())?;

    let old = read_gpr(ectx, width, dst)?;
    let kept = ectx.and(old, ectx.int_const(!mask, width.bits()).into())?;
    let result = ectx.or(kept, field)?;
    write_gpr(ectx, width, dst, result)
}

/// EXTR: the concatenation `rn:rm` shifted right by `lsb`, which is
/// exactly a funnel shift.
fn extract<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    #[allow(clippy::cast_sign_loss)]
    let lsb = inst.imm(3)? as u64;

    let hi = read_gpr(ectx, width, rn)?;
    let lo = read_gpr(ectx, width, rm)?;
    let amt = ectx.int_const(lsb, width.bits()).into();
    let result = ectx.fshr(hi, lo, amt)?;
    write_gpr(ectx, width, dst, result)
}

enum Alt {
    Plain,
    Increment,
    Invert,
    Negate,
}

fn cond_select<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, alt: Alt) -> Result<()> {
    let (width, dst) = inst.gpr(0)?;
    let (_, rn) = inst.gpr(1)?;
    let (_, rm) = inst.gpr(2)?;
    let cond = inst.cond(3)?;

    let on_true = read_gpr(ectx, width, rn)?;
    let other = read_gpr(ectx, width, rm)?;
    let on_false = match alt {
        Alt::Plain => other,
        Alt::Increment => {
            let one = ectx.int_const(1, width.bits()).into();
            ectx.add(other, one)?
        }
        Alt::Invert => ectx.not(other)?,
        Alt::Negate => ectx.neg(other)?,
    };

    let holds = cond_holds(ectx, cond)?;
    let result = ectx.select(holds, on_true, on_false)?;
    write_gpr(ectx, width, dst, result)
}

/// CCMP/CCMN: when the condition holds the flags come from the
/// comparison; otherwise they are the immediate NZCV nibble. Each
/// flag cell gets a single select-merged store.
fn cond_compare<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst, negate: bool) -> Result<()> {
    let (width, rn) = inst.gpr(0)?;
    let a = read_gpr(ectx, width, rn)?;

    // second operand is a register or a 5-bit immediate
    let b: Val = if let Ok((_, rm)) = inst.gpr(1) {
        read_gpr(ectx, width, rm)?
    } else {
        #[allow(clippy::cast_sign_loss)]
        let imm = inst.imm(1)? as u64;
        ectx.int_const(imm, width.bits()).into()
    };
    #[allow(clippy::cast_sign_loss)]
    let nzcv = inst.imm(2)? as u64;
    let cond = inst.cond(3)?;

    let holds = cond_holds(ectx, cond)?;

    // compute the comparison flags unconditionally, then merge
    if negate {
        add_with_flags(ectx, a, b)?;
    } else {
        sub_with_flags(ectx, a, b)?;
    }

    for (flag, bit) in [
        (Flag::N, 3u64),
        (Flag::Z, 2),
        (Flag::C, 1),
        (Flag::V, 0),
    ] {
        let computed: Val = ectx.read_flag(flag)?.into();
        let imm_bit = ectx.int_const((nzcv >> bit) & 1, 1).into();
        let merged = ectx.select(holds, computed, imm_bit)?;
        ectx.write_flag(flag, merged)?;
    }
    Ok(())
}
