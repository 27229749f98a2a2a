//! Classic catalog: integer ALU, bitfield, and conditional families.

use a64_tv::inst::{ExtendKind, ShiftKind};
use a64_tv::test_harness::*;
use a64_tv::{Cond, Opcode, Operand};

#[test]
fn movz_places_the_shifted_immediate() {
    let insts = vec![inst(
        Opcode::Movz,
        vec![
            x(0),
            imm(0xbeef),
            Operand::Shift {
                kind: ShiftKind::Lsl,
                amount: 16,
            },
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("store i64 3203334144, ptr %X0"), "{ir}");
}

#[test]
fn movk_keeps_the_other_hole() {
    let insts = vec![inst(
        Opcode::Movk,
        vec![
            x(0),
            imm(0x1234),
            Operand::Shift {
                kind: ShiftKind::Lsl,
                amount: 0,
            },
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("and i64"), "{ir}");
    assert!(ir.contains("or i64"), "{ir}");
}

#[test]
fn logical_immediate_decodes_the_bitmask() {
    // N=0 immr=0 imms=0b111100 encodes 0x5555555555555555
    let insts = vec![inst(Opcode::AndImm, vec![x(0), x(1), imm(0b11_1100)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("6148914691236517205"), "{ir}");
}

#[test]
fn ands_clears_carry_and_overflow() {
    let insts = vec![inst(
        Opcode::AndsShift,
        vec![x(0), x(1), x(2)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("store i1 false, ptr %C"), "{ir}");
    assert!(ir.contains("store i1 false, ptr %V"), "{ir}");
}

#[test]
fn extended_register_operand_truncates_then_extends() {
    let insts = vec![inst(
        Opcode::AddExt,
        vec![
            x(0),
            x(1),
            w(2),
            Operand::Extend {
                kind: ExtendKind::Sxtw,
                amount: 2,
            },
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("sext i32"), "{ir}");
    assert!(ir.contains("shl i64"), "{ir}");
}

#[test]
fn csinc_selects_the_incremented_alternative() {
    let insts = vec![inst(
        Opcode::Csinc,
        vec![x(0), x(1), x(2), cond(Cond::Ne)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("add i64"), "{ir}");
    assert!(ir.contains("select i1"), "{ir}");
    // NE inverts the Z flag
    assert!(ir.contains("load i1, ptr %Z"), "{ir}");
}

#[test]
fn csneg_negates_and_csinv_inverts() {
    let insts = vec![
        inst(Opcode::Csneg, vec![x(0), x(1), x(2), cond(Cond::Ge)]),
        inst(Opcode::Csinv, vec![x(3), x(4), x(5), cond(Cond::Lt)]),
    ];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("sub i64 0"), "{ir}");
    assert!(ir.contains("xor i64"), "{ir}");
}

#[test]
fn ccmp_merges_computed_and_immediate_flags() {
    let insts = vec![inst(
        Opcode::Ccmp,
        vec![x(1), x(2), imm(0b0100), cond(Cond::Eq)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // four select-merged flag writes
    assert!(count_occurrences(&ir, "select i1") >= 4, "{ir}");
}

#[test]
fn ubfm_extract_is_two_shifts() {
    // UBFX X0, X1, #8, #8 == UBFM immr=8 imms=15
    let insts = vec![inst(Opcode::Ubfm, vec![x(0), x(1), imm(8), imm(15)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("shl i64"), "{ir}");
    assert!(ir.contains("lshr i64"), "{ir}");
}

#[test]
fn sbfm_sign_extends_the_field() {
    // SXTB X0, W1 == SBFM X0, X1, #0, #7
    let insts = vec![inst(Opcode::Sbfm, vec![x(0), x(1), imm(0), imm(7)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("ashr i64"), "{ir}");
}

#[test]
fn extr_is_a_funnel_shift() {
    let insts = vec![inst(Opcode::Extr, vec![x(0), x(1), x(2), imm(12)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.fshr.i64"), "{ir}");
}

#[test]
fn rorv_rotates_through_fshr() {
    let insts = vec![inst(Opcode::Rorv, vec![w(0), w(1), w(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.fshr.i32"), "{ir}");
}

#[test]
fn smulh_computes_through_the_double_width() {
    let insts = vec![inst(Opcode::Smulh, vec![x(0), x(1), x(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("sext i64"), "{ir}");
    assert!(ir.contains("mul i128"), "{ir}");
    assert!(ir.contains("lshr i128"), "{ir}");
}

#[test]
fn smaddl_widens_the_word_sources() {
    let insts = vec![inst(Opcode::Smaddl, vec![x(0), w(1), w(2), x(3)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("sext i32"), "{ir}");
    assert!(ir.contains("mul i64"), "{ir}");
    assert!(ir.contains("add i64"), "{ir}");
}

#[test]
fn rev16_swaps_bytes_within_halfwords() {
    let insts = vec![inst(Opcode::Rev16, vec![x(0), x(1)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.bswap.v4i16"), "{ir}");
}

#[test]
fn clz_and_rbit_use_the_intrinsics() {
    let insts = vec![
        inst(Opcode::Clz, vec![w(0), w(1)]),
        inst(Opcode::Rbit, vec![x(2), x(3)]),
    ];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.ctlz.i32"), "{ir}");
    assert!(ir.contains("llvm.bitreverse.i64"), "{ir}");
}

#[test]
fn adc_consumes_the_carry_cell() {
    let insts = vec![inst(Opcode::Adc, vec![x(0), x(1), x(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("load i1, ptr %C"), "{ir}");
    assert!(ir.contains("zext i1"), "{ir}");
}

#[test]
fn udiv_by_zero_yields_zero() {
    let insts = vec![inst(Opcode::Udiv, vec![w(0), w(1), w(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("icmp eq i32"), "{ir}");
    assert!(ir.contains("udiv i32"), "{ir}");
    assert!(count_occurrences(&ir, "select") >= 2, "{ir}");
}
