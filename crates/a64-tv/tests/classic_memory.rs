//! Classic catalog: loads and stores across the addressing modes.

use a64_tv::inst::ExtendKind;
use a64_tv::test_harness::*;
use a64_tv::{Opcode, Operand};

#[test]
fn ldrb_zero_extends_the_byte() {
    let insts = vec![inst(Opcode::LdrbUi, vec![w(0), x(1), imm(3)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("load i8"), "{ir}");
    assert!(ir.contains("zext i8"), "{ir}");
}

#[test]
fn ldrsw_sign_extends_the_word() {
    let insts = vec![inst(Opcode::LdrswUi, vec![x(0), x(1), imm(4)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("load i32"), "{ir}");
    assert!(ir.contains("sext i32"), "{ir}");
}

#[test]
fn pre_index_writes_the_base_back() {
    let insts = vec![inst(Opcode::LdrPre, vec![x(0), x(1), imm(16)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // one load for the data, one updated-base store to X1
    assert!(ir.contains("store i64"), "{ir}");
    assert!(ir.contains("add i64"), "{ir}");
    assert!(count_occurrences(&ir, "store i64") >= 2, "{ir}");
}

#[test]
fn post_index_accesses_at_the_old_base() {
    let insts = vec![inst(Opcode::StrPost, vec![x(0), x(1), imm(8)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // access offset is zero; the add only feeds the writeback
    assert!(ir.contains("add i64"), "{ir}");
}

#[test]
fn register_offset_extends_and_scales() {
    let insts = vec![inst(
        Opcode::LdrRo,
        vec![
            x(0),
            x(1),
            w(2),
            Operand::Extend {
                kind: ExtendKind::Uxtw,
                amount: 3,
            },
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("zext i32"), "{ir}");
    assert!(ir.contains("shl i64"), "{ir}");
}

#[test]
fn ldp_issues_two_adjacent_loads() {
    let insts = vec![inst(Opcode::Ldp, vec![x(0), x(2), sp(), imm(16)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(count_occurrences(&ir, "load i64") >= 2, "{ir}");
    assert!(ir.contains("load ptr, ptr %SP"), "{ir}");
}

#[test]
fn stp_stores_both_registers() {
    let insts = vec![inst(Opcode::Stp, vec![d(0), d(1), sp(), imm(0)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(count_occurrences(&ir, "store i64") >= 2, "{ir}");
    assert!(ir.contains("trunc i128"), "{ir}");
}

#[test]
fn str_w_register_stores_four_bytes() {
    let insts = vec![inst(Opcode::StrUi, vec![w(0), x(1), imm(0)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("store i32"), "{ir}");
}

#[test]
fn strb_truncates_to_the_byte() {
    let insts = vec![inst(Opcode::StrbUi, vec![w(0), x(1), imm(0)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("trunc i32"), "{ir}");
    assert!(ir.contains("store i8"), "{ir}");
}

#[test]
fn fp_load_fills_the_low_bits() {
    let insts = vec![inst(Opcode::LdrUi, vec![s(0), x(1), imm(0)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("load i32"), "{ir}");
    assert!(ir.contains("zext i32"), "{ir}");
    assert!(ir.contains("store i128"), "{ir}");
}

#[test]
fn ld1r_replicates_the_loaded_element() {
    let insts = vec![inst(Opcode::Ld1Rep, vec![v(0, 4, 16), x(1)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("load i16"), "{ir}");
    assert_eq!(count_occurrences(&ir, "insertelement <4 x i16>"), 4, "{ir}");
}

#[test]
fn ld2_deinterleaves_element_wise() {
    let insts = vec![inst(
        Opcode::LdN,
        vec![v(0, 4, 16), v(1, 4, 16), x(2)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // eight element loads across the two registers
    assert_eq!(count_occurrences(&ir, "load i16"), 8, "{ir}");
}

#[test]
fn ld1_lane_preserves_the_other_lanes() {
    let insts = vec![inst(
        Opcode::Ld1Lane,
        vec![
            Operand::VecElem {
                reg: 0,
                elem_bits: 32,
                lane: 2,
            },
            x(1),
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // the old register value is read before inserting
    assert!(ir.contains("load i128, ptr %V0"), "{ir}");
    assert!(ir.contains("insertelement <4 x i32>"), "{ir}");
}

#[test]
fn st1_multi_is_contiguous() {
    let insts = vec![inst(
        Opcode::St1Multi,
        vec![v(0, 2, 64), v(1, 2, 64), x(2)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert_eq!(count_occurrences(&ir, "store i64"), 4, "{ir}");
}
