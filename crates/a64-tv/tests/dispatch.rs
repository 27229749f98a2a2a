//! End-to-end dispatcher scenarios: block layout, metadata tagging,
//! flag updates, and the well-defined division/trap shapes.

use inkwell::context::Context;

use a64_tv::test_harness::*;
use a64_tv::{lift_function, Cond, Opcode, StaticSemanticsClient};

#[test]
fn add_w_form_zero_extends_into_the_cell() {
    let insts = vec![inst(Opcode::AddShift, vec![w(0), w(1), w(2)])];
    let (ir, blocks) = lift_classic(&insts).expect("lift");

    // reads truncate the 64-bit cells, the result zero-extends back
    assert!(ir.contains("trunc i64"), "{ir}");
    assert!(ir.contains("add i32"), "{ir}");
    assert!(ir.contains("zext i32"), "{ir}");
    // plain ADD leaves the flags alone
    assert_eq!(count_occurrences(&ir, "store i1"), 0, "{ir}");
    assert!(blocks >= 1);
}

#[test]
fn adds_then_conditional_branch() {
    let insts = vec![
        inst(Opcode::AddsShift, vec![x(0), x(1), x(2)]),
        inst(Opcode::BCond, vec![cond(Cond::Eq), label(0)]),
    ];
    let (ir, blocks) = lift_classic(&insts).expect("lift");

    assert!(blocks >= 2);
    assert!(ir.contains("llvm.uadd.with.overflow.i64"), "{ir}");
    assert!(ir.contains("llvm.sadd.with.overflow.i64"), "{ir}");
    // all four flags written by the S form
    assert!(count_occurrences(&ir, "store i1") >= 4, "{ir}");
    // the second instruction reads Z and branches
    assert!(ir.contains("br i1"), "{ir}");
    assert_eq!(count_occurrences(&ir, "asm.classic"), 2, "{ir}");
}

#[test]
fn ldr_unsigned_offset_loads_through_base_and_offset() {
    let insts = vec![inst(Opcode::LdrUi, vec![x(0), x(1), imm(8)])];
    let (ir, _) = lift_classic(&insts).expect("lift");

    assert!(ir.contains("ptrtoint"), "{ir}");
    assert!(ir.contains("add i64"), "{ir}");
    assert!(ir.contains("inttoptr"), "{ir}");
    assert!(ir.contains("load i64"), "{ir}");
    assert!(ir.contains("store i64"), "{ir}");
}

#[test]
fn sdiv_builds_the_total_division_cfg() {
    let insts = vec![inst(Opcode::Sdiv, vec![x(0), x(1), x(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");

    assert!(ir.contains("sdiv_is_overflow"), "{ir}");
    assert!(ir.contains("sdiv_is_safe"), "{ir}");
    assert!(ir.contains("sdiv_continuation"), "{ir}");
    // the zero denominator is replaced and the result forced to zero
    assert!(count_occurrences(&ir, "select") >= 3, "{ir}");
}

#[test]
fn umull_widens_lane_wise() {
    let insts = vec![inst(
        Opcode::Umull,
        vec![v(0, 4, 32), v(1, 4, 16), v(2, 4, 16)],
    )];
    let (ir, _) = lift_classic(&insts).expect("lift");

    assert!(ir.contains("zext <4 x i16>"), "{ir}");
    assert!(ir.contains("mul <4 x i32>"), "{ir}");
}

#[test]
fn brk_traps_without_fall_through() {
    let insts = vec![inst(Opcode::Brk, vec![imm(0)])];
    let (ir, _) = lift_classic(&insts).expect("lift");

    assert!(ir.contains("llvm.trap"), "{ir}");
    assert!(ir.contains("unreachable"), "{ir}");
}

#[test]
fn one_allocation_cell_per_register() {
    let insts = vec![
        inst(Opcode::AddShift, vec![x(0), x(1), x(2)]),
        inst(Opcode::SubShift, vec![x(3), x(0), x(2)]),
        inst(Opcode::AddShift, vec![x(0), x(0), x(0)]),
    ];
    let (ir, _) = lift_classic(&insts).expect("lift");

    for i in 0..31 {
        assert_eq!(
            count_occurrences(&ir, &format!("%X{i} = alloca i64")),
            1,
            "register X{i} must have exactly one cell\n{ir}"
        );
    }
    assert_eq!(count_occurrences(&ir, "%SP = alloca i64"), 1);
}

#[test]
fn every_block_is_terminated_and_blocks_cover_instructions() {
    let insts = vec![
        inst(Opcode::AddShift, vec![x(0), x(1), x(2)]),
        inst(Opcode::Sdiv, vec![x(3), x(0), x(2)]),
        inst(Opcode::Ret, vec![]),
    ];
    let context = Context::create();
    let mut client = StaticSemanticsClient::new();
    let lifted = lift_function(&context, "t", &insts, &mut client, &classic_config())
        .expect("lift");
    assert_all_blocks_terminated(&lifted);
    assert!(block_count(&lifted) >= insts.len());
}

#[test]
fn zr_destination_discards_the_write_but_keeps_flags() {
    // SUBS XZR, X1, X2 is CMP: flags update, no register store
    let insts = vec![inst(Opcode::SubsShift, vec![xzr(), x(1), x(2)])];
    let (ir, _) = lift_classic(&insts).expect("lift");

    assert!(ir.contains("store i1"), "flags must be stored:\n{ir}");
    assert!(ir.contains("icmp uge i64"), "carry as no-borrow:\n{ir}");
}

#[test]
fn structured_path_lowers_via_semantics_and_tags_aslp() {
    let mut client = StaticSemanticsClient::new();
    client.insert(
        0x8b02_0023,
        "ADD_64_addsub_shift",
        "Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(3)),\
         Expr_TApply(\"add_bits.0\",[Expr_LitInt(64)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2))]))",
    );
    let insts = vec![
        inst(Opcode::AddShift, vec![x(3), x(1), x(2)]).with_encoding([0x23, 0x00, 0x02, 0x8b])
    ];
    let ir = lift_with_semantics(&insts, &mut client).expect("lift");

    assert!(ir.contains("asm.aslp"), "{ir}");
    assert!(ir.contains("aslp.stmt"), "{ir}");
    assert!(ir.contains("add i64"), "{ir}");
    assert!(!ir.contains("asm.classic"), "{ir}");
}

#[test]
fn structured_miss_falls_back_to_classic() {
    let mut client = StaticSemanticsClient::new();
    let insts = vec![
        inst(Opcode::AddShift, vec![x(3), x(1), x(2)]).with_encoding([0x23, 0x00, 0x02, 0x8b])
    ];
    let ir = lift_with_semantics(&insts, &mut client).expect("lift");

    assert!(ir.contains("asm.classic"), "{ir}");
    assert!(!ir.contains("asm.aslp"), "{ir}");
}

#[test]
fn banned_opcodes_skip_the_structured_path() {
    let mut client = StaticSemanticsClient::new();
    // even with semantics present, BRK is on the ban table
    client.insert(0xd420_0000, "BRK_EX_exception", "Stmt_Throw()");
    let insts =
        vec![inst(Opcode::Brk, vec![imm(0)]).with_encoding([0x00, 0x00, 0x20, 0xd4])];
    let ir = lift_with_semantics(&insts, &mut client).expect("lift");

    assert!(!ir.contains("asm.aslp"), "{ir}");
    assert!(ir.contains("llvm.trap"), "{ir}");
}

#[test]
fn coverage_histogram_counts_both_paths() {
    let context = Context::create();
    let mut client = StaticSemanticsClient::new();
    client.insert(
        0x8b02_0023,
        "ADD_64_addsub_shift",
        "Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(3)),\
         Expr_TApply(\"add_bits.0\",[Expr_LitInt(64)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2))]))",
    );
    let insts = vec![
        inst(Opcode::AddShift, vec![x(3), x(1), x(2)]).with_encoding([0x23, 0x00, 0x02, 0x8b]),
        inst(Opcode::SubShift, vec![x(0), x(1), x(2)]),
    ];
    let lifted = lift_function(
        &context,
        "t",
        &insts,
        &mut client,
        &a64_tv::Config::default(),
    )
    .expect("lift");

    assert_eq!(
        lifted.encoding_counts.get("aslp_ADD_64_addsub_shift"),
        Some(&1)
    );
    assert_eq!(lifted.encoding_counts.get("classic_SUBX"), Some(&1));
}
