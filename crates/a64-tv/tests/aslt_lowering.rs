//! Structured-path lowering: hand-written semantics listings driven
//! through the offline client, with structural assertions on the IR.

use a64_tv::aslt::lower_semantics_to_ir;
use a64_tv::Error;

fn lower(semantics: &str) -> String {
    lower_semantics_to_ir("test", semantics, false).expect("lowering failed")
}

fn lower_err(semantics: &str) -> Error {
    lower_semantics_to_ir("test", semantics, false).expect_err("lowering should fail")
}

#[test]
fn assign_links_one_block_per_statement() {
    let ir = lower(
        "Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),Expr_LitBits('0000000000000000000000000000000000000000000000000000000000101010'))\n\
         Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(1)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(0)))",
    );
    assert_eq!(ir.matches("!aslp.stmt").count(), 2, "{ir}");
    assert!(ir.contains("store i64 42"), "{ir}");
}

#[test]
fn flag_fields_address_the_flag_cells() {
    let ir = lower(
        "Stmt_Assign(LExpr_Field(LExpr_Var(\"PSTATE\"),\"Z\"),Expr_LitBits('1'))",
    );
    assert!(ir.contains("store i1 true, ptr %Z"), "{ir}");
}

#[test]
fn append_bits_equal_widths_builds_a_two_lane_vector() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"append_bits.0\",[Expr_LitInt(32),Expr_LitInt(32)],\
         [Expr_LitBits('00000000000000000000000000000001'),\
          Expr_LitBits('00000000000000000000000000000010')]))",
    );
    assert!(ir.contains("insertelement <2 x i32>"), "{ir}");
    assert!(!ir.contains("shl"), "no shift/or for equal widths:\n{ir}");
}

#[test]
fn append_bits_unequal_widths_shifts_and_ors() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(24)),\"t\",\
         Expr_TApply(\"append_bits.0\",[Expr_LitInt(8),Expr_LitInt(16)],\
         [Expr_LitBits('00000001'),Expr_LitBits('0000000000000010')]))",
    );
    assert!(ir.contains("zext i8"), "{ir}");
    assert!(ir.contains("shl i24"), "{ir}");
    assert!(ir.contains("or i24"), "{ir}");
}

#[test]
fn replicate_bits_splats_through_a_vector() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(32)),\"t\",\
         Expr_TApply(\"replicate_bits.0\",[Expr_LitInt(8),Expr_LitInt(4)],\
         [Expr_LitBits('10101010'),Expr_LitInt(4)]))",
    );
    assert_eq!(ir.matches("insertelement <4 x i8>").count(), 4, "{ir}");
}

#[test]
fn shifts_unify_widths_and_mask_in_range_counts() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"lsl_bits.0\",[Expr_LitInt(64),Expr_LitInt(8)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_LitBits('00000011')]))",
    );
    // the 8-bit count zero-extends to 64 and is masked to 63
    assert!(ir.contains("zext i8"), "{ir}");
    assert!(ir.contains("and i64"), "{ir}");
    assert!(ir.contains("shl i64"), "{ir}");
}

#[test]
fn sdiv_bits_uses_the_three_way_cfg() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"sdiv_bits.0\",[Expr_LitInt(64)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2))]))",
    );
    assert!(ir.contains("sdiv_is_overflow"), "{ir}");
    assert!(ir.contains("sdiv_is_safe"), "{ir}");
    assert_eq!(ir.matches("sdiv i64").count(), 2, "{ir}");
}

#[test]
fn fp_compare_packs_four_lanes_in_fixed_order() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(4)),\"nzcv\",\
         Expr_TApply(\"FPCompare.0\",[Expr_LitInt(64)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),\
          Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2)),\
          Expr_Var(\"FALSE\"),Expr_Var(\"FPCR\")]))",
    );
    for pred in ["fcmp olt double", "fcmp oeq double", "fcmp ugt double", "fcmp uno double"] {
        assert!(ir.contains(pred), "missing {pred}:\n{ir}");
    }
    assert_eq!(ir.matches("insertelement <4 x i1>").count(), 4, "{ir}");
}

#[test]
fn conditional_statement_joins_both_arms() {
    let ir = lower(
        "Stmt_If(Expr_Var(\"TRUE\"),\
         [Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)))],\
         [],\
         [Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2)))])",
    );
    assert!(ir.contains("conditional_join"), "{ir}");
    assert!(ir.contains("br i1"), "{ir}");
}

#[test]
fn for_loop_uses_the_wide_index() {
    let ir = lower(
        "Stmt_For(\"i\",Expr_LitInt(0),Direction_Up,Expr_LitInt(3),\
         [Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)))])",
    );
    assert!(ir.contains("alloca i100"), "{ir}");
    assert!(ir.contains("add i100"), "{ir}");
    assert!(ir.contains("icmp slt i100"), "{ir}");
    assert!(ir.contains("for_exit"), "{ir}");
}

#[test]
fn down_loops_decrement_and_test_sgt() {
    let ir = lower(
        "Stmt_For(\"i\",Expr_LitInt(3),Direction_Down,Expr_LitInt(0),\
         [Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)))])",
    );
    assert!(ir.contains("sub i100"), "{ir}");
    assert!(ir.contains("icmp sgt i100"), "{ir}");
}

#[test]
fn memory_read_recovers_base_and_offset() {
    let ir = lower(
        "Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(0)),\
         Expr_TApply(\"Mem.read.0\",[],\
         [Expr_TApply(\"add_bits.0\",[Expr_LitInt(64)],\
           [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),\
            Expr_LitBits('0000000000000000000000000000000000000000000000000000000000001000')]),\
          Expr_LitInt(8),Expr_LitInt(0)]))",
    );
    // the base register reloads as a pointer, the offset stays split
    assert!(ir.contains("load ptr, ptr %X1"), "{ir}");
    assert!(ir.contains("ptrtoint"), "{ir}");
    assert!(ir.contains("inttoptr"), "{ir}");
    assert!(ir.contains("load i64"), "{ir}");
}

#[test]
fn memory_write_goes_through_the_call_statement() {
    let ir = lower(
        "Stmt_TCall(\"Mem.set.0\",[],\
         [Expr_TApply(\"add_bits.0\",[Expr_LitInt(64)],\
           [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),\
            Expr_LitBits('0000000000000000000000000000000000000000000000000000000000010000')]),\
          Expr_LitInt(8),Expr_LitInt(0),\
          Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2))]))",
    );
    assert!(ir.contains("load ptr, ptr %X1"), "{ir}");
    assert!(ir.contains("store i64"), "{ir}");
}

#[test]
fn elem_ops_go_through_vector_views() {
    let ir = lower(
        "Stmt_Assign(LExpr_Array(LExpr_Var(\"_Z\"),Expr_LitInt(0)),\
         Expr_TApply(\"Elem.set.0\",[],\
         [Expr_Array(Expr_Var(\"_Z\"),Expr_LitInt(0)),Expr_LitInt(2),Expr_LitInt(32),\
          Expr_TApply(\"cvt_int_bits.0\",[Expr_LitInt(32)],[Expr_LitInt(7)])]))",
    );
    assert!(ir.contains("insertelement <4 x i32>"), "{ir}");
}

#[test]
fn slices_prefer_trunc_then_lane_reads() {
    // low slice is a plain trunc
    let low = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(8)),\"t\",\
         Expr_Slices(Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),[Slice_LoWd(Expr_LitInt(0),Expr_LitInt(8))]))",
    );
    assert!(low.contains("trunc i64"), "{low}");

    // lane-aligned slice reads an element
    let lane = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(16)),\"t\",\
         Expr_Slices(Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),[Slice_LoWd(Expr_LitInt(16),Expr_LitInt(16))]))",
    );
    assert!(lane.contains("extractelement <4 x i16>"), "{lane}");
}

#[test]
fn throw_becomes_an_observable_failure() {
    let ir = lower("Stmt_Throw()");
    assert!(ir.contains("llvm.trap"), "{ir}");
    assert!(ir.contains("unreachable"), "{ir}");
}

#[test]
fn dynamic_rounding_mode_is_rejected() {
    let err = lower_err(
        "Stmt_VarDecl(Type_Constructor(\"FPRounding\"),\"mode\",Expr_LitBits('01'))\n\
         Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"FPRoundInt.0\",[Expr_LitInt(64)],\
         [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_Var(\"FPCR\"),\
          Expr_Var(\"mode\"),Expr_Var(\"FALSE\")]))",
    );
    assert!(
        err.to_string().contains("dynamic rounding"),
        "unexpected error: {err}"
    );
}

#[test]
fn unknown_applications_are_malformed_semantics() {
    let err = lower_err(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"frobnicate.0\",[],[Expr_LitInt(1)]))",
    );
    assert!(matches!(err, Error::MalformedSemantics(_)), "{err}");
    assert!(err.to_string().contains("frobnicate"), "{err}");
}

#[test]
fn fixed_point_conversions_assert_zero_fbits() {
    let ir = lower(
        "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"t\",\
         Expr_TApply(\"FixedToFP.0\",[Expr_LitInt(32),Expr_LitInt(64)],\
         [Expr_Slices(Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),[Slice_LoWd(Expr_LitInt(0),Expr_LitInt(32))]),\
          Expr_TApply(\"cvt_int_bits.0\",[Expr_LitInt(32)],[Expr_LitInt(0)]),\
          Expr_Var(\"TRUE\"),Expr_Var(\"FPCR\"),Expr_LitBits('00')]))",
    );
    assert!(ir.contains("assert_fail"), "{ir}");
    assert!(ir.contains("uitofp"), "{ir}");
    assert!(ir.contains("sitofp"), "{ir}");
}
