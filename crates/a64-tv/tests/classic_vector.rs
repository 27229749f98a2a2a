//! Classic catalog: SIMD integer and floating-point families.

use a64_tv::test_harness::*;
use a64_tv::{Opcode, Operand};

fn elem(reg: u8, elem_bits: u32, lane: u32) -> Operand {
    Operand::VecElem {
        reg,
        elem_bits,
        lane,
    }
}

#[test]
fn lane_wise_add_keeps_the_arrangement() {
    let insts = vec![inst(
        Opcode::AddV,
        vec![v(0, 4, 16), v(1, 4, 16), v(2, 4, 16)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("add <4 x i16>"), "{ir}");
    // a 64-bit arrangement write zero-extends into the 128-bit cell
    assert!(ir.contains("zext i64"), "{ir}");
}

#[test]
fn cmeq_produces_all_ones_lanes() {
    let insts = vec![inst(
        Opcode::Cmeq,
        vec![v(0, 8, 8), v(1, 8, 8), v(2, 8, 8)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("icmp eq <8 x i8>"), "{ir}");
    assert!(ir.contains("sext <8 x i1>"), "{ir}");
}

#[test]
fn cmtst_tests_the_intersection() {
    let insts = vec![inst(
        Opcode::Cmtst,
        vec![v(0, 2, 32), v(1, 2, 32), v(2, 2, 32)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("and <2 x i32>"), "{ir}");
    assert!(ir.contains("icmp ne <2 x i32>"), "{ir}");
}

#[test]
fn zip1_interleaves_low_halves() {
    let insts = vec![inst(
        Opcode::Zip1,
        vec![v(0, 4, 32), v(1, 4, 32), v(2, 4, 32)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(
        ir.contains("shufflevector <4 x i32>"),
        "{ir}"
    );
    assert!(ir.contains("<i32 0, i32 4, i32 1, i32 5>"), "{ir}");
}

#[test]
fn uzp2_takes_odd_lanes() {
    let insts = vec![inst(
        Opcode::Uzp2,
        vec![v(0, 4, 16), v(1, 4, 16), v(2, 4, 16)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("<i32 1, i32 3, i32 5, i32 7>"), "{ir}");
}

#[test]
fn ext_slides_bytes_across_the_pair() {
    let insts = vec![inst(
        Opcode::ExtV,
        vec![v(0, 8, 8), v(1, 8, 8), v(2, 8, 8), imm(3)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("shufflevector <8 x i8>"), "{ir}");
    assert!(ir.contains("i32 3, i32 4"), "{ir}");
}

#[test]
fn dup_from_gpr_splats_every_lane() {
    let insts = vec![inst(Opcode::DupGpr, vec![v(0, 8, 16), w(1)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert_eq!(count_occurrences(&ir, "insertelement <8 x i16>"), 8, "{ir}");
}

#[test]
fn smov_sign_extends_the_lane() {
    let insts = vec![inst(Opcode::Smov, vec![x(0), elem(1, 16, 3)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("extractelement <8 x i16>"), "{ir}");
    assert!(ir.contains("sext i16"), "{ir}");
}

#[test]
fn saturating_adds_use_the_intrinsics() {
    let insts = vec![
        inst(Opcode::Uqadd, vec![v(0, 16, 8), v(1, 16, 8), v(2, 16, 8)]),
        inst(Opcode::Sqsub, vec![v(3, 4, 32), v(4, 4, 32), v(5, 4, 32)]),
    ];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.uadd.sat.v16i8"), "{ir}");
    assert!(ir.contains("llvm.ssub.sat.v4i32"), "{ir}");
}

#[test]
fn sminv_reduces_to_a_scalar() {
    let insts = vec![inst(Opcode::Sminv, vec![s(0), v(1, 4, 32)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.vector.reduce.smin.v4i32"), "{ir}");
}

#[test]
fn addv_sums_all_lanes() {
    let insts = vec![inst(Opcode::Addv, vec![s(0), v(1, 4, 32)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.vector.reduce.add.v4i32"), "{ir}");
}

#[test]
fn uaddlp_pairs_and_widens() {
    let insts = vec![inst(Opcode::Uaddlp, vec![v(0, 2, 32), v(1, 4, 16)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("zext <4 x i16>"), "{ir}");
    assert!(ir.contains("add <2 x i32>"), "{ir}");
}

#[test]
fn uabd_is_the_minmax_difference() {
    let insts = vec![inst(
        Opcode::Uabd,
        vec![v(0, 8, 8), v(1, 8, 8), v(2, 8, 8)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.umax.v8i8"), "{ir}");
    assert!(ir.contains("llvm.umin.v8i8"), "{ir}");
    assert!(ir.contains("sub <8 x i8>"), "{ir}");
}

#[test]
fn urhadd_rounds_in_the_widened_domain() {
    let insts = vec![inst(
        Opcode::Urhadd,
        vec![v(0, 8, 8), v(1, 8, 8), v(2, 8, 8)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("zext <8 x i8> "), "{ir}");
    assert!(ir.contains("i9"), "widened by one bit:\n{ir}");
    assert!(ir.contains("lshr <8 x i9>"), "{ir}");
}

#[test]
fn shrn_rounds_then_narrows() {
    let insts = vec![inst(
        Opcode::Rshrn,
        vec![v(0, 4, 16), v(1, 4, 32), imm(5)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("add <4 x i32>"), "rounding bias:\n{ir}");
    assert!(ir.contains("lshr <4 x i32>"), "{ir}");
    assert!(ir.contains("trunc <4 x i32>"), "{ir}");
}

#[test]
fn sshll_widens_then_shifts() {
    let insts = vec![inst(
        Opcode::Sshll,
        vec![v(0, 4, 32), v(1, 4, 16), imm(2)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("sext <4 x i16>"), "{ir}");
    assert!(ir.contains("shl <4 x i32>"), "{ir}");
}

#[test]
fn usra_accumulates_the_shifted_value() {
    let insts = vec![inst(
        Opcode::Usra,
        vec![v(0, 2, 64), v(1, 2, 64), imm(7)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("lshr <2 x i64>"), "{ir}");
    assert!(ir.contains("add <2 x i64>"), "{ir}");
}

#[test]
fn sqxtn_clamps_before_narrowing() {
    let insts = vec![inst(Opcode::Sqxtn, vec![v(0, 4, 16), v(1, 4, 32)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.smin.v4i32"), "{ir}");
    assert!(ir.contains("llvm.smax.v4i32"), "{ir}");
    assert!(ir.contains("trunc <4 x i32>"), "{ir}");
}

#[test]
fn tbl_guards_out_of_range_indices() {
    let insts = vec![inst(
        Opcode::Tbl,
        vec![v(0, 16, 8), v(1, 16, 8), v(2, 16, 8), v(3, 16, 8)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.umin.i32"), "{ir}");
    assert!(count_occurrences(&ir, "icmp ult i32") >= 16, "{ir}");
}

#[test]
fn movi_msl_fills_with_ones() {
    let insts = vec![inst(
        Opcode::MoviMsl,
        vec![
            v(0, 4, 32),
            imm(0x42),
            Operand::Shift {
                kind: a64_tv::inst::ShiftKind::Lsl,
                amount: 8,
            },
        ],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    // 0x42 << 8 | 0xff = 0x42ff
    assert!(ir.contains("17151"), "{ir}");
}

#[test]
fn bsl_uses_the_destination_as_the_mask() {
    let insts = vec![inst(
        Opcode::Bsl,
        vec![v(0, 16, 8), v(1, 16, 8), v(2, 16, 8)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("xor i128"), "{ir}");
    assert!(count_occurrences(&ir, "and i128") >= 2, "{ir}");
}

#[test]
fn fadd_vector_goes_through_float_lanes() {
    let insts = vec![inst(
        Opcode::FaddV,
        vec![v(0, 2, 64), v(1, 2, 64), v(2, 2, 64)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("fadd <2 x double>"), "{ir}");
}

#[test]
fn fcm_zero_forms_compare_against_zero() {
    let insts = vec![inst(
        Opcode::FcmgtVz,
        vec![v(0, 4, 32), v(1, 4, 32)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("fcmp ogt <4 x float>"), "{ir}");
    assert!(ir.contains("zeroinitializer"), "{ir}");
}

#[test]
fn fmadd_uses_the_fused_intrinsic() {
    let insts = vec![inst(Opcode::Fmadd, vec![d(0), d(1), d(2), d(3)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.fma.f64"), "{ir}");
}

#[test]
fn fcvtzs_saturates() {
    let insts = vec![inst(Opcode::Fcvtzs, vec![w(0), s(1)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("llvm.fptosi.sat.i32.f32"), "{ir}");
}

#[test]
fn fmov_immediate_expands_the_pattern() {
    // FMOV D0, #1.0 (imm8 = 0x70)
    let insts = vec![inst(Opcode::FmovImm, vec![d(0), imm(0x70)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    assert!(ir.contains("4607182418800017408"), "1.0 bit pattern:\n{ir}");
}

#[test]
fn fcmp_writes_all_four_flags() {
    let insts = vec![inst(Opcode::Fcmp, vec![d(0), d(1)])];
    let (ir, _) = lift_classic(&insts).expect("lift");
    for pred in ["fcmp olt", "fcmp oeq", "fcmp uge", "fcmp uno"] {
        assert!(ir.contains(pred), "missing {pred}:\n{ir}");
    }
    assert_eq!(count_occurrences(&ir, "store i1"), 4, "{ir}");
}
