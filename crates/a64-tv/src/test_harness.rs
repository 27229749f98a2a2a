//! Helpers shared by the integration tests: instruction construction
//! shorthand, an offline client, and structural assertions over the
//! printed IR.

use inkwell::context::Context;

use crate::aslt::StaticSemanticsClient;
use crate::config::Config;
use crate::inst::{Cond, FpWidth, Gpr, Inst, Opcode, Operand, RegWidth, VecArr};
use crate::lift::{lift_function, Lifted};

#[must_use]
pub fn w(n: u8) -> Operand {
    Operand::Gpr {
        width: RegWidth::W,
        reg: Gpr::R(n),
    }
}

#[must_use]
pub fn x(n: u8) -> Operand {
    Operand::Gpr {
        width: RegWidth::X,
        reg: Gpr::R(n),
    }
}

#[must_use]
pub fn xzr() -> Operand {
    Operand::Gpr {
        width: RegWidth::X,
        reg: Gpr::Zr,
    }
}

#[must_use]
pub fn sp() -> Operand {
    Operand::Gpr {
        width: RegWidth::X,
        reg: Gpr::Sp,
    }
}

#[must_use]
pub fn d(n: u8) -> Operand {
    Operand::Fp {
        width: FpWidth::D,
        reg: n,
    }
}

#[must_use]
pub fn s(n: u8) -> Operand {
    Operand::Fp {
        width: FpWidth::S,
        reg: n,
    }
}

#[must_use]
pub fn v(n: u8, lanes: u32, elem_bits: u32) -> Operand {
    Operand::Vec {
        reg: n,
        arr: VecArr::new(lanes, elem_bits),
    }
}

#[must_use]
pub fn imm(value: i64) -> Operand {
    Operand::Imm(value)
}

#[must_use]
pub fn cond(c: Cond) -> Operand {
    Operand::Cond(c)
}

#[must_use]
pub fn label(index: usize) -> Operand {
    Operand::Label(index)
}

#[must_use]
pub fn inst(opcode: Opcode, operands: Vec<Operand>) -> Inst {
    Inst::new(opcode, operands)
}

/// A config with the structured path disabled: classic-only lifting.
#[must_use]
pub fn classic_config() -> Config {
    Config {
        enable: false,
        ..Config::default()
    }
}

/// Lift a stream classic-only and return the printed IR.
pub fn lift_classic(insts: &[Inst]) -> crate::Result<(String, usize)> {
    let context = Context::create();
    let mut client = StaticSemanticsClient::new();
    let lifted = lift_function(&context, "test", insts, &mut client, &classic_config())?;
    let block_count = block_count(&lifted);
    Ok((lifted.print_ir(), block_count))
}

/// Lift with a pre-seeded offline semantics client.
pub fn lift_with_semantics(
    insts: &[Inst],
    client: &mut StaticSemanticsClient,
) -> crate::Result<String> {
    let context = Context::create();
    let lifted = lift_function(&context, "test", insts, client, &Config::default())?;
    Ok(lifted.print_ir())
}

#[must_use]
pub fn block_count(lifted: &Lifted<'_>) -> usize {
    lifted.ectx.function().count_basic_blocks() as usize
}

/// Assert that every basic block in the printed function body is
/// terminated; relies on LLVM printing each block with a terminator
/// as its last instruction.
pub fn assert_all_blocks_terminated(lifted: &Lifted<'_>) {
    let mut bb = lifted.ectx.function().get_first_basic_block();
    while let Some(block) = bb {
        assert!(
            block.get_terminator().is_some(),
            "unterminated block: {:?}",
            block.get_name()
        );
        bb = block.get_next_basic_block();
    }
}

/// Count occurrences of a needle in the printed IR.
#[must_use]
pub fn count_occurrences(ir: &str, needle: &str) -> usize {
    ir.matches(needle).count()
}
