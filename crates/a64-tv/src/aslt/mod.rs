//! The structured lowering path: semantics fetched from the
//! architecture-semantics backend, parsed into a small tree, and
//! lowered statement by statement.

pub mod ast;
pub mod client;
pub mod lower;
pub mod parser;

pub use client::{HttpSemanticsClient, SemanticsClient, SemanticsReply, StaticSemanticsClient};
pub use lower::{BlockPair, SemanticsLowerer};
pub use parser::parse;

use crate::emit::EmissionContext;
use crate::Result;

/// Lower one semantics listing into a fresh standalone function and
/// return the printed IR. Inspection entry point used by the CLI.
pub fn lower_semantics_to_ir(name: &str, semantics: &str, debug: bool) -> Result<String> {
    let context = inkwell::context::Context::create();
    let mut ectx = EmissionContext::new(&context, name, &format!("{name}.lifted"))?;
    let stmts = parse(semantics)?;
    let mut lowerer = SemanticsLowerer::new(&mut ectx, debug);
    let pair = lowerer.lower_instruction(&stmts)?;
    ectx.set_block(pair.1);
    ectx.ret_void()?;
    ectx.seal_prologue(pair.0)?;
    Ok(ectx.print_function())
}
