//! Property-based tests for the semantics-text parser.
//!
//! Uses `proptest` to generate random trees and verify:
//! - printing then reparsing reproduces the tree exactly
//! - random garbage never panics the parser
//! - the pure decoders (logical immediates) round-trip known shapes

use proptest::prelude::*;

use a64_tv::aslt::ast::{Direction, Expr, LExpr, Slice, Stmt, Ty};
use a64_tv::aslt::parse;
use a64_tv::inst::decode_logical_imm;

fn ident_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,8}(\\.0)?"
}

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        ident_strategy().prop_map(Expr::Var),
        (-1_000_000i128..1_000_000).prop_map(Expr::LitInt),
        "[01]{1,64}".prop_map(Expr::LitBits),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (inner.clone(), ident_strategy())
                .prop_map(|(base, field)| Expr::Field(Box::new(base), field)),
            (inner.clone(), inner.clone())
                .prop_map(|(base, index)| Expr::Array(Box::new(base), Box::new(index))),
            (inner.clone(), 0i128..64, 1i128..64).prop_map(|(base, lo, wd)| {
                Expr::Slice(
                    Box::new(base),
                    Slice {
                        lo: Box::new(Expr::LitInt(lo)),
                        wd: Box::new(Expr::LitInt(wd)),
                    },
                )
            }),
            (
                ident_strategy(),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner, 0..3),
            )
                .prop_map(|(name, targs, args)| Expr::TApply { name, targs, args }),
        ]
    })
}

fn ty_strategy() -> impl Strategy<Value = Ty> {
    prop_oneof![
        (1i128..256).prop_map(|bits| Ty::Bits(Box::new(Expr::LitInt(bits)))),
        Just(Ty::Boolean),
        ident_strategy().prop_map(Ty::Constructor),
    ]
}

fn lexpr_strategy() -> impl Strategy<Value = LExpr> {
    let leaf = ident_strategy().prop_map(LExpr::Var);
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), ident_strategy())
                .prop_map(|(base, field)| LExpr::Field(Box::new(base), field)),
            (inner, expr_strategy())
                .prop_map(|(base, index)| LExpr::Array(Box::new(base), Box::new(index))),
        ]
    })
}

fn stmt_strategy() -> impl Strategy<Value = Stmt> {
    let leaf = prop_oneof![
        (lexpr_strategy(), expr_strategy()).prop_map(|(lhs, rhs)| Stmt::Assign(lhs, rhs)),
        (ty_strategy(), ident_strategy(), expr_strategy())
            .prop_map(|(ty, name, init)| Stmt::ConstDecl { ty, name, init }),
        (ty_strategy(), prop::collection::vec(ident_strategy(), 1..3))
            .prop_map(|(ty, names)| Stmt::VarDeclsNoInit { ty, names }),
        expr_strategy().prop_map(Stmt::Assert),
        Just(Stmt::Throw),
    ];
    leaf.prop_recursive(2, 12, 3, |inner| {
        prop_oneof![
            (
                expr_strategy(),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3),
            )
                .prop_map(|(cond, then, otherwise)| Stmt::If {
                    cond,
                    then,
                    otherwise,
                }),
            (
                ident_strategy(),
                expr_strategy(),
                prop_oneof![Just(Direction::Up), Just(Direction::Down)],
                expr_strategy(),
                prop::collection::vec(inner, 0..3),
            )
                .prop_map(|(var, start, direction, stop, body)| Stmt::For {
                    var,
                    start,
                    direction,
                    stop,
                    body,
                }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Printing a tree and reparsing it reproduces the tree.
    #[test]
    fn print_parse_round_trip(stmts in prop::collection::vec(stmt_strategy(), 1..4)) {
        let text = stmts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        let reparsed = parse(&text);
        prop_assert!(reparsed.is_ok(), "failed to reparse: {text}");
        prop_assert_eq!(reparsed.unwrap(), stmts);
    }

    /// Arbitrary input never panics; it either parses or errors.
    #[test]
    fn parser_never_panics(input in "\\PC{0,200}") {
        let _ = parse(&input);
    }

    /// Valid logical immediates survive the decoder: the decoded mask
    /// replicates with the expected element period.
    #[test]
    fn logical_imm_periodicity(immr in 0u32..64, imms in 0u32..63) {
        if let Some(mask) = decode_logical_imm(1, immr, imms, 64) {
            // N=1 means one 64-bit element: popcount is imms+1
            prop_assert_eq!(mask.count_ones(), imms + 1);
        }
    }
}

#[test]
fn rejects_wrong_arity_slices() {
    let err = parse(
        "Stmt_Assert(Expr_Slices(Expr_Var(\"x\"),[Slice_LoWd(Expr_LitInt(0),Expr_LitInt(8)),Slice_LoWd(Expr_LitInt(8),Expr_LitInt(8))]))",
    )
    .unwrap_err();
    assert!(err.to_string().contains("slice"), "{err}");
}
