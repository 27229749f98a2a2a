//! Branches, calls, returns, traps, system-register moves, and
//! address generation.

use inkwell::IntPredicate;

use crate::classic::{cond_holds, read_gpr, write_gpr, Flow};
use crate::emit::{EmissionContext, Flag, ShiftOp, Val};
use crate::inst::{Inst, Opcode, RegWidth};
use crate::{Error, Result};

pub(super) fn lower<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    flow: &Flow<'_, 'ctx>,
) -> Result<()> {
    use Opcode as Op;
    match inst.opcode {
        Op::B => {
            let target = flow.label(inst.label(0)?)?;
            ectx.branch(target)?;
            Ok(())
        }
        Op::Bl => {
            // direct call, modeled as an opaque external call
            let sym = inst.sym(0)?.to_string();
            ectx.call_external(&sym)
        }
        Op::Blr => ectx.call_external("__indirect_call"),
        Op::Br => {
            // indirect branch: an opaque tail transfer
            ectx.call_external("__indirect_call")?;
            ectx.ret_void()
        }
        Op::Ret => ectx.ret_void(),
        Op::BCond => {
            let cond = inst.cond(0)?;
            let target = flow.label(inst.label(1)?)?;
            let next = fallthrough(flow, inst)?;
            let holds = cond_holds(ectx, cond)?;
            ectx.cond_branch(holds, target, next)?;
            Ok(())
        }
        Op::Cbz | Op::Cbnz => {
            let (width, reg) = inst.gpr(0)?;
            let target = flow.label(inst.label(1)?)?;
            let next = fallthrough(flow, inst)?;
            let value = read_gpr(ectx, width, reg)?;
            let zero = ectx.int_const(0, width.bits()).into();
            let pred = if inst.opcode == Op::Cbz {
                IntPredicate::EQ
            } else {
                IntPredicate::NE
            };
            let taken = ectx.icmp(pred, value, zero)?;
            ectx.cond_branch(taken, target, next)?;
            Ok(())
        }
        Op::Tbz | Op::Tbnz => {
            let (width, reg) = inst.gpr(0)?;
            #[allow(clippy::cast_sign_loss)]
            let bit = inst.imm(1)? as u64;
            let target = flow.label(inst.label(2)?)?;
            let next = fallthrough(flow, inst)?;
            let value = read_gpr(ectx, width, reg)?;
            let amt = ectx.int_const(bit, width.bits()).into();
            let shifted = ectx.raw_shift(ShiftOp::Lshr, value, amt)?;
            let low = ectx.trunc(shifted, ectx.int_ty(1).into())?;
            let (t, f) = if inst.opcode == Op::Tbz {
                (next, target)
            } else {
                (target, next)
            };
            ectx.cond_branch(low, t, f)?;
            Ok(())
        }
        Op::Brk => {
            ectx.trap()?;
            ectx.unreachable()?;
            Ok(())
        }
        Op::Mrs => mrs(ectx, inst),
        Op::Msr => msr(ectx, inst),
        Op::Adr | Op::Adrp => adr(ectx, inst),
        _ => Err(super::unsupported(ectx, inst)),
    }
}

fn fallthrough<'ctx>(
    flow: &Flow<'_, 'ctx>,
    inst: &Inst,
) -> Result<inkwell::basic_block::BasicBlock<'ctx>> {
    flow.next.ok_or_else(|| {
        Error::InvariantViolation(format!(
            "{} falls through past the end of the function",
            inst.mnemonic()
        ))
    })
}

/// MRS: only the NZCV register is part of the machine model.
fn mrs<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (_, dst) = inst.gpr(0)?;
    if inst.sym(1)? != "NZCV" {
        return Err(super::unsupported(ectx, inst));
    }
    let i64t = ectx.int_ty(64);
    let mut value: Val = ectx.int_const(0, 64).into();
    for (flag, bit) in [(Flag::N, 31u64), (Flag::Z, 30), (Flag::C, 29), (Flag::V, 28)] {
        let f: Val = ectx.read_flag(flag)?.into();
        let wide = ectx.zext(f, i64t.into())?;
        let amt = ectx.int_const(bit, 64).into();
        let placed = ectx.raw_shift(ShiftOp::Shl, wide, amt)?;
        value = ectx.or(value, placed)?;
    }
    write_gpr(ectx, RegWidth::X, dst, value)
}

fn msr<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    if inst.sym(0)? != "NZCV" {
        return Err(super::unsupported(ectx, inst));
    }
    let (_, src) = inst.gpr(1)?;
    let value = read_gpr(ectx, RegWidth::X, src)?;
    for (flag, bit) in [(Flag::N, 31u64), (Flag::Z, 30), (Flag::C, 29), (Flag::V, 28)] {
        let amt = ectx.int_const(bit, 64).into();
        let shifted = ectx.raw_shift(ShiftOp::Lshr, value, amt)?;
        let low = ectx.trunc(shifted, ectx.int_ty(1).into())?;
        ectx.write_flag(flag, low)?;
    }
    Ok(())
}

/// ADR/ADRP against a symbol: materialize the address of a module
/// global named by the symbol. (The relocation-form GOT emulation
/// lives on the structured path.)
fn adr<'ctx>(ectx: &mut EmissionContext<'ctx>, inst: &Inst) -> Result<()> {
    let (_, dst) = inst.gpr(0)?;
    let sym = inst.sym(1)?.to_string();
    let global = lookup_global(ectx, &sym);
    let addr = ectx.ptr_to_int(global)?;
    write_gpr(ectx, RegWidth::X, dst, addr.into())
}

pub(crate) fn lookup_global<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    sym: &str,
) -> inkwell::values::PointerValue<'ctx> {
    let name = sym.trim_start_matches(':');
    if let Some(global) = ectx.module.get_global(name) {
        return global.as_pointer_value();
    }
    ectx.module
        .add_global(ectx.llvm_context().i64_type(), None, name)
        .as_pointer_value()
}
