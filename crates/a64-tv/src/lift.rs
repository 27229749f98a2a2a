//! The instruction dispatcher: drives a decoded-instruction stream
//! through the structured path with classic fallback, maintaining the
//! one-instruction-one-block layout and the coverage histogram.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::context::Context;

use crate::aslt::{parse, SemanticsClient, SemanticsLowerer};
use crate::classic::{self, Flow};
use crate::config::Config;
use crate::emit::EmissionContext;
use crate::inst::{Inst, Opcode, RegWidth};
use crate::{Error, Result};

/// Opcodes lowered to nothing by the classic catalog. The structured
/// ban table below is this list plus BRK, kept as one table so the
/// two cannot drift apart.
pub const PSEUDO_NOPS: &[Opcode] = &[
    Opcode::Prfm,
    Opcode::Prfum,
    Opcode::Paciasp,
    Opcode::Pacibsp,
    Opcode::Autiasp,
    Opcode::Autibsp,
    Opcode::Hint,
];

pub(crate) fn banned_structured(opcode: Opcode) -> bool {
    PSEUDO_NOPS.contains(&opcode) || opcode == Opcode::Brk
}

/// A fully lifted function: the emission context owning the module,
/// plus the per-encoding coverage histogram.
pub struct Lifted<'ctx> {
    pub ectx: EmissionContext<'ctx>,
    pub encoding_counts: HashMap<String, u64>,
}

impl Lifted<'_> {
    #[must_use]
    pub fn print_ir(&self) -> String {
        self.ectx.print_function()
    }
}

/// Lift one binary function's instruction stream into a fresh IR
/// function.
pub fn lift_function<'ctx>(
    context: &'ctx Context,
    name: &str,
    insts: &[Inst],
    client: &mut dyn SemanticsClient,
    config: &Config,
) -> Result<Lifted<'ctx>> {
    let mut ectx = EmissionContext::new(context, name, &format!("{name}.lifted"))?;
    let mut counts: HashMap<String, u64> = HashMap::new();

    // one entry block per instruction, so labels resolve up front
    let labels: Vec<BasicBlock<'ctx>> = (0..insts.len())
        .map(|i| ectx.new_block(&format!("inst_{i}")))
        .collect();
    let end_block = ectx.new_block("inst_end");

    for (i, inst) in insts.iter().enumerate() {
        ectx.set_inst_index(i);
        ectx.set_block(labels[i]);
        let next = labels.get(i + 1).copied().unwrap_or(end_block);
        let mnemonic = inst.mnemonic();

        let structured = try_structured(&mut ectx, inst, client, config, &mut counts)?;
        if !structured {
            // fresh block per instruction, to match the structured path
            let body_name = format!("lifter_{}", ectx.next_name());
            let body = ectx.new_block(&body_name);
            let br = ectx.branch(body)?;
            ectx.tag(br, "asm.classic", &mnemonic);
            ectx.set_block(body);

            let flow = Flow {
                labels: &labels,
                next: Some(next),
            };
            classic::lower(&mut ectx, inst, &flow)?;
            *counts.entry(format!("classic_{mnemonic}")).or_insert(0) += 1;
        }

        if ectx.cur_block().get_terminator().is_none() {
            ectx.branch(next)?;
        }
    }

    ectx.set_block(end_block);
    ectx.ret_void()?;

    let first = labels.first().copied().unwrap_or(end_block);
    ectx.seal_prologue(first)?;

    Ok(Lifted {
        ectx,
        encoding_counts: counts,
    })
}

/// Attempt the structured path for one instruction. Returns `false`
/// when the dispatcher should fall through to the classic catalog.
fn try_structured<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
    client: &mut dyn SemanticsClient,
    config: &Config,
    counts: &mut HashMap<String, u64>,
) -> Result<bool> {
    let mnemonic = inst.mnemonic();

    let banned = !config.enable
        || inst.opcode.is_control_flow()
        || banned_structured(inst.opcode)
        || config.banned.contains(&inst.opcode.id());
    if banned {
        tracing::trace!(%mnemonic, "structured path banned, using classic");
        return Ok(false);
    }

    // address generation against a relocation needs the GOT-slot
    // emulation rather than backend semantics
    if let Some(pair) = adrp_special(ectx, inst)? {
        finish_structured(ectx, pair, &mnemonic)?;
        *counts.entry("aslp_special_adrp".to_string()).or_insert(0) += 1;
        return Ok(true);
    }

    let Some(encoding) = inst.encoding_u32() else {
        tracing::debug!(%mnemonic, "no machine encoding available, using classic");
        return Ok(false);
    };

    let Some(reply) = client.fetch(encoding)? else {
        if config.fail_if_missing {
            return Err(Error::UnknownEncoding(encoding));
        }
        tracing::debug!(
            %mnemonic,
            encoding = %format!("0x{encoding:08x}"),
            "semantics missing, using classic"
        );
        return Ok(false);
    };

    let stmts = parse(&reply.semantics)?;
    let mut lowerer = SemanticsLowerer::new(ectx, config.debug);
    let pair = lowerer.lower_instruction(&stmts)?;
    finish_structured(ectx, pair, &mnemonic)?;
    *counts
        .entry(format!("aslp_{}", reply.encoding))
        .or_insert(0) += 1;
    tracing::debug!(%mnemonic, encoding = %reply.encoding, "lifted via semantics");
    Ok(true)
}

/// Wire the instruction's entry block into the structured result and
/// leave the cursor at its exit. The cursor still sits on the
/// instruction's entry block when this runs.
fn finish_structured<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    pair: (BasicBlock<'ctx>, BasicBlock<'ctx>),
    mnemonic: &str,
) -> Result<()> {
    ectx.branch(pair.0)?;
    ectx.tag_block_first(pair.0, "asm.aslp", mnemonic);
    ectx.set_block(pair.1);
    Ok(())
}

/// ADR/ADRP referencing a relocation symbol: allocate a cell holding
/// the global's address, emulating the GOT indirection.
fn adrp_special<'ctx>(
    ectx: &mut EmissionContext<'ctx>,
    inst: &Inst,
) -> Result<Option<(BasicBlock<'ctx>, BasicBlock<'ctx>)>> {
    if !matches!(inst.opcode, Opcode::Adr | Opcode::Adrp) {
        return Ok(None);
    }
    let Ok(sym) = inst.sym(1) else {
        return Ok(None);
    };
    if !sym.starts_with(':') {
        return Ok(None);
    }
    let sym = sym.to_string();
    let (_, dst) = inst.gpr(0)?;

    let entry = ectx.cur_block();
    let block_name = format!("aslp_{}_special", ectx.next_name());
    let bb = ectx.new_block(&block_name);
    // leave the entry block for the caller to wire up
    ectx.set_block(bb);

    let global = classic::lookup_global(ectx, &sym);
    let cell_name = ectx.next_name();
    let cell = ectx.alloc_cell(ectx.ptr_ty().into(), &cell_name)?;
    ectx.store(global.into(), cell.ptr)?;
    let addr = ectx.ptr_to_int(cell.ptr)?;
    classic::write_gpr(ectx, RegWidth::X, dst, addr.into())?;

    let exit = ectx.cur_block();
    ectx.set_block(entry);
    Ok(Some((bb, exit)))
}
