// License below.
//! The module builder: top-level orchestration that turns a loaded ROM
//! image into a fully defined Cranelift module. See `DESIGN.md` for how
//! the phase order here differs from a movable-basic-block reference
//! (coloring now precedes code generation).
#![warn(missing_docs)]

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, AbiParam, InstBuilder, TrapCode};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{DataContext, DataId, FuncId, Linkage, Module, ModuleError};
use log::{debug, info};

use crate::alias::AliasClass;
use crate::arm::instruction::LowerEnv;
use crate::arm::{registry, Register};
use crate::block::{self, Block};
use crate::coloring::{self, Coloring};
use crate::config::RomConfig;
use crate::error::TranslateError;
use crate::machine::MachineState;

fn module_err(e: ModuleError) -> TranslateError {
    TranslateError::ModuleError(e.to_string())
}

/// Translates a loaded ROM image into `module`, following the phase
/// sequence of the module builder design: tagging globals, decode, graph
/// pre-pass, coloring, dispatch-function declaration and code
/// generation, block-address array population, then the dispatch shim
/// (`GetBlockAddress`/`CanRun`/`Run`).
pub struct ModuleBuilder<'a> {
    rom: &'a [u8],
    config: RomConfig,
    verify: bool,
}

impl<'a> ModuleBuilder<'a> {
    /// Builds a translator for `rom`, decoding the region described by
    /// `config`, in verification mode if `verify`.
    pub fn new(rom: &'a [u8], config: RomConfig, verify: bool) -> ModuleBuilder<'a> {
        ModuleBuilder { rom, config, verify }
    }

    /// Runs every phase against `module`. On success, `module` holds a
    /// fully defined set of functions and data objects ready for
    /// `Module::finish`.
    pub fn build(&self, module: &mut dyn Module) -> Result<(), TranslateError> {
        if self.config.rom_code_start == 0 {
            return Err(TranslateError::MissingRomConfig);
        }

        let pointer_type = module.target_config().pointer_type();
        let state = MachineState::declare(module).map_err(module_err)?;

        declare_verify_global(module, self.verify)?;
        let instruction_count = declare_instruction_count_global(module)?;

        info!(
            "decoding ROM code region at {:#010x}, {} bytes",
            self.config.rom_code_start, self.config.rom_code_size
        );
        let (mut blocks, pc_to_index) = self.decode_blocks();
        info!("decoded {} instructions", blocks.len());

        block::compute_edges(&mut blocks, &pc_to_index);

        let coloring = coloring::color_blocks(&blocks);
        info!("painted {} blocks into {} colors", blocks.len(), coloring.colors.len());

        let mut color_funcs = Vec::with_capacity(coloring.colors.len());
        for color in &coloring.colors {
            let name = format!("color_{}", color.index);
            let mut sig = module.make_signature();
            sig.params.push(AbiParam::new(types::I32));
            let id = module.declare_function(&name, Linkage::Local, &sig).map_err(module_err)?;
            color_funcs.push(id);
        }

        let mut get_block_address_sig = module.make_signature();
        get_block_address_sig.params.push(AbiParam::new(types::I32));
        get_block_address_sig.returns.push(AbiParam::new(pointer_type));
        get_block_address_sig.returns.push(AbiParam::new(types::I32));
        let get_block_address_func =
            module.declare_function("GetBlockAddress", Linkage::Local, &get_block_address_sig).map_err(module_err)?;

        let mut can_run_sig = module.make_signature();
        can_run_sig.returns.push(AbiParam::new(types::I8));
        let can_run_func = module.declare_function("CanRun", Linkage::Export, &can_run_sig).map_err(module_err)?;

        let run_sig = module.make_signature();
        let run_func = module.declare_function("Run", Linkage::Export, &run_sig).map_err(module_err)?;

        let slot_size = pointer_type.bytes() * 2;
        let block_address_array = module.declare_data("BlockAddressArray", Linkage::Export, false, false).map_err(module_err)?;

        let mut ctx = module.make_context();
        let mut fb_ctx = FunctionBuilderContext::new();

        for color in &coloring.colors {
            compile_color(
                module,
                &mut ctx,
                &mut fb_ctx,
                color,
                &blocks,
                &state,
                self.rom,
                self.config,
                self.verify,
                run_func,
                color_funcs[color.index],
                pointer_type,
                instruction_count,
            )?;
        }
        debug!("compiled {} dispatch functions", color_funcs.len());

        populate_block_address_array(module, block_address_array, slot_size, &self.config, &blocks, &coloring, &color_funcs)?;

        compile_get_block_address(module, &mut ctx, &mut fb_ctx, get_block_address_func, block_address_array, &self.config, pointer_type, slot_size)?;
        compile_can_run(module, &mut ctx, &mut fb_ctx, can_run_func, get_block_address_func, &state, pointer_type)?;
        compile_run(module, &mut ctx, &mut fb_ctx, run_func, get_block_address_func, &state, pointer_type)?;

        info!("module builder finished: {} colors, {} block-address slots", coloring.colors.len(), self.config.slot_count());
        Ok(())
    }

    /// Phase 2: decodes every nonzero word-aligned word in the code
    /// region, skipping words that don't yield a recognized instruction.
    fn decode_blocks(&self) -> (Vec<Block>, HashMap<u32, usize>) {
        let mut blocks = Vec::new();
        let mut pc_to_index = HashMap::new();

        let start = self.config.rom_code_start;
        let end = start.wrapping_add(self.config.rom_code_size);
        let mut pc = start;
        while pc < end {
            let offset = (pc - start) as usize;
            if offset + 4 > self.rom.len() {
                break;
            }
            let word = LittleEndian::read_u32(&self.rom[offset..offset + 4]);
            if word != 0 {
                match registry::disassemble(word, pc) {
                    Some(instr) => {
                        pc_to_index.insert(pc, blocks.len());
                        blocks.push(Block::new(pc, instr));
                    },
                    None => debug!("no decode at {:#010x}: word {:#010x}", pc, word),
                }
            }
            pc = pc.wrapping_add(4);
        }

        (blocks, pc_to_index)
    }
}

fn declare_verify_global(module: &mut dyn Module, verify: bool) -> Result<DataId, TranslateError> {
    let id = module.declare_data("Verify", Linkage::Export, false, false).map_err(module_err)?;
    let mut dctx = DataContext::new();
    dctx.define(Box::new([verify as u8]));
    module.define_data(id, &dctx).map_err(module_err)?;
    Ok(id)
}

fn declare_instruction_count_global(module: &mut dyn Module) -> Result<DataId, TranslateError> {
    let id = module.declare_data("InstructionCount", Linkage::Export, true, false).map_err(module_err)?;
    let mut dctx = DataContext::new();
    dctx.define_zeroinit(4);
    module.define_data(id, &dctx).map_err(module_err)?;
    Ok(id)
}

/// Phase 5+6: opens one `Function` for `color`, pre-creates one entry IR
/// block per member instruction (so direct branches can target blocks
/// not yet generated), emits the color's dispatch body — a chain of
/// equality checks over `index` rather than a `br_table`, to stay clear
/// of jump-table/block-argument API churn across Cranelift versions; see
/// `DESIGN.md` — and then generates every member block's code in PC
/// order.
#[allow(clippy::too_many_arguments)]
fn compile_color(
    module: &mut dyn Module,
    ctx: &mut Context,
    fb_ctx: &mut FunctionBuilderContext,
    color: &coloring::Color,
    blocks: &[Block],
    state: &MachineState,
    rom: &[u8],
    config: RomConfig,
    verify: bool,
    run_func: FuncId,
    func_id: FuncId,
    pointer_type: types::Type,
    instruction_count: DataId,
) -> Result<(), TranslateError> {
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(types::I32));
    ctx.func.signature = sig;

    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, fb_ctx);

        let dispatch_block = builder.create_block();
        builder.append_block_param(dispatch_block, types::I32);

        let mut pc_to_entry = HashMap::new();
        let mut entries = Vec::with_capacity(color.blocks.len());
        for &bi in &color.blocks {
            let entry = builder.create_block();
            pc_to_entry.insert(blocks[bi].pc, entry);
            entries.push(entry);
        }

        let mut check_blocks = Vec::with_capacity(entries.len());
        for _ in &entries {
            check_blocks.push(builder.create_block());
        }
        let trap_block = builder.create_block();

        builder.switch_to_block(dispatch_block);
        let index_val = builder.block_params(dispatch_block)[0];
        builder.ins().jump(check_blocks[0], &[]);
        builder.seal_block(dispatch_block);

        for (i, &check_block) in check_blocks.iter().enumerate() {
            builder.switch_to_block(check_block);
            let eq = builder.ins().icmp_imm(IntCC::Equal, index_val, i as i64);
            builder.ins().brnz(eq, entries[i], &[]);
            let next = if i + 1 < check_blocks.len() { check_blocks[i + 1] } else { trap_block };
            builder.ins().jump(next, &[]);
            builder.seal_block(check_block);
        }

        builder.switch_to_block(trap_block);
        builder.ins().trap(TrapCode::UnreachableCodeReached);
        builder.seal_block(trap_block);

        let mut member_indices = color.blocks.clone();
        member_indices.sort_by_key(|&bi| blocks[bi].pc);

        let env = LowerEnv { rom, config, verify, pc_to_entry: &pc_to_entry, run_func };

        for &bi in &member_indices {
            let entry = pc_to_entry[&blocks[bi].pc];
            builder.switch_to_block(entry);
            block::generate_code(&blocks[bi], &mut builder, module, state, &env, instruction_count, pointer_type);
            builder.seal_block(entry);
        }

        builder.finalize();
    }

    module.define_function(func_id, ctx).map_err(module_err)?;
    module.clear_context(ctx);
    Ok(())
}

/// Phase 7: zero-initializes every slot, then patches in
/// `(dispatch_function, case_index)` for every decoded block. Function
/// pointers are recorded as relocations via `write_function_addr`
/// against the already-zeroed byte buffer; the `u32` case index is
/// written directly since it needs no relocation.
fn populate_block_address_array(
    module: &mut dyn Module,
    array_id: DataId,
    slot_size: u32,
    config: &RomConfig,
    blocks: &[Block],
    coloring: &Coloring,
    color_funcs: &[FuncId],
) -> Result<(), TranslateError> {
    let slot_size = slot_size as usize;
    let ptr_bytes = slot_size / 2;
    let slot_count = config.slot_count() as usize;
    let mut bytes = vec![0u8; slot_count * slot_size];
    let mut relocs = Vec::new();

    for color in &coloring.colors {
        for (case_index, &bi) in color.blocks.iter().enumerate() {
            let pc = blocks[bi].pc;
            let slot = (pc / 4 - config.base_index()) as usize;
            let base = slot * slot_size;
            LittleEndian::write_u32(&mut bytes[base + ptr_bytes..base + ptr_bytes + 4], case_index as u32);
            relocs.push((base as u32, color_funcs[color.index]));
        }
    }

    let mut dctx = DataContext::new();
    dctx.define(bytes.into_boxed_slice());
    for (offset, func_id) in relocs {
        let func_ref = module.declare_func_in_data(func_id, &mut dctx);
        dctx.write_function_addr(offset, func_ref);
    }
    module.define_data(array_id, &dctx).map_err(module_err)
}

/// `GetBlockAddress(pc)`: sentinel `(null, 0)` unless `pc` is
/// word-aligned and its slot index is in range, in which case the slot's
/// two fields are loaded and returned.
#[allow(clippy::too_many_arguments)]
fn compile_get_block_address(
    module: &mut dyn Module,
    ctx: &mut Context,
    fb_ctx: &mut FunctionBuilderContext,
    func_id: FuncId,
    array_id: DataId,
    config: &RomConfig,
    pointer_type: types::Type,
    slot_size: u32,
) -> Result<(), TranslateError> {
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(types::I32));
    sig.returns.push(AbiParam::new(pointer_type));
    sig.returns.push(AbiParam::new(types::I32));
    ctx.func.signature = sig;

    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, fb_ctx);
        let entry = builder.create_block();
        builder.append_block_param(entry, types::I32);
        builder.switch_to_block(entry);
        let pc = builder.block_params(entry)[0];

        let misalignment = builder.ins().band_imm(pc, 3);
        let is_aligned = builder.ins().icmp_imm(IntCC::Equal, misalignment, 0);

        let word_index = builder.ins().ushr_imm(pc, 2);
        let slot_index = builder.ins().iadd_imm(word_index, -(i64::from(config.base_index())));
        let in_range = builder.ins().icmp_imm(IntCC::UnsignedLessThan, slot_index, i64::from(config.slot_count()));
        let ok = builder.ins().band(is_aligned, in_range);

        let found_block = builder.create_block();
        let missing_block = builder.create_block();
        let done_block = builder.create_block();
        builder.append_block_param(done_block, pointer_type);
        builder.append_block_param(done_block, types::I32);

        builder.ins().brnz(ok, found_block, &[]);
        builder.ins().jump(missing_block, &[]);
        builder.seal_block(entry);

        builder.switch_to_block(found_block);
        let gv = module.declare_data_in_func(array_id, builder.func);
        let array_base = builder.ins().global_value(pointer_type, gv);
        let byte_offset = builder.ins().imul_imm(slot_index, i64::from(slot_size));
        let slot_addr = builder.ins().iadd(array_base, byte_offset);
        let flags = AliasClass::Const.mem_flags();
        let func_ptr = builder.ins().load(pointer_type, flags, slot_addr, 0);
        let block_index = builder.ins().load(types::I32, flags, slot_addr, pointer_type.bytes() as i32);
        builder.ins().jump(done_block, &[func_ptr, block_index]);
        builder.seal_block(found_block);

        builder.switch_to_block(missing_block);
        let null_ptr = builder.ins().iconst(pointer_type, 0);
        let zero = builder.ins().iconst(types::I32, 0);
        builder.ins().jump(done_block, &[null_ptr, zero]);
        builder.seal_block(missing_block);

        builder.switch_to_block(done_block);
        builder.seal_block(done_block);
        let results = builder.block_params(done_block).to_vec();
        builder.ins().return_(&results);

        builder.finalize();
    }

    module.define_function(func_id, ctx).map_err(module_err)?;
    module.clear_context(ctx);
    Ok(())
}

/// `CanRun()`: `GetBlockAddress(ReadRegister(PC)).function != null`.
fn compile_can_run(
    module: &mut dyn Module,
    ctx: &mut Context,
    fb_ctx: &mut FunctionBuilderContext,
    func_id: FuncId,
    get_block_address_func: FuncId,
    state: &MachineState,
    pointer_type: types::Type,
) -> Result<(), TranslateError> {
    let mut sig = module.make_signature();
    sig.returns.push(AbiParam::new(types::I8));
    ctx.func.signature = sig;

    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, fb_ctx);
        let entry = builder.create_block();
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let pc = state.read_register(&mut builder, module, Register::PC);
        let callee = module.declare_func_in_func(get_block_address_func, builder.func);
        let call = builder.ins().call(callee, &[pc]);
        let func_ptr = builder.inst_results(call)[0];

        let null_ptr = builder.ins().iconst(pointer_type, 0);
        let has_block = builder.ins().icmp(IntCC::NotEqual, func_ptr, null_ptr);
        builder.ins().return_(&[has_block]);

        builder.finalize();
    }

    module.define_function(func_id, ctx).map_err(module_err)?;
    module.clear_context(ctx);
    Ok(())
}

/// `Run()`: re-reads `PC`, resolves it through `GetBlockAddress`, and
/// tail-calls the resolved dispatch function with its block index, or
/// returns immediately if no block is translated there.
fn compile_run(
    module: &mut dyn Module,
    ctx: &mut Context,
    fb_ctx: &mut FunctionBuilderContext,
    func_id: FuncId,
    get_block_address_func: FuncId,
    state: &MachineState,
    pointer_type: types::Type,
) -> Result<(), TranslateError> {
    let sig = module.make_signature();
    ctx.func.signature = sig;

    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, fb_ctx);
        let entry = builder.create_block();
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let pc = state.read_register(&mut builder, module, Register::PC);
        let callee = module.declare_func_in_func(get_block_address_func, builder.func);
        let call = builder.ins().call(callee, &[pc]);
        let call_results = builder.inst_results(call);
        let func_ptr = call_results[0];
        let block_index = call_results[1];

        let null_ptr = builder.ins().iconst(pointer_type, 0);
        let is_null = builder.ins().icmp(IntCC::Equal, func_ptr, null_ptr);

        let call_block = builder.create_block();
        let done_block = builder.create_block();
        builder.ins().brnz(is_null, done_block, &[]);
        builder.ins().jump(call_block, &[]);

        builder.switch_to_block(call_block);
        builder.seal_block(call_block);
        let mut dispatch_sig = module.make_signature();
        dispatch_sig.params.push(AbiParam::new(types::I32));
        let sig_ref = builder.import_signature(dispatch_sig);
        builder.ins().call_indirect(sig_ref, func_ptr, &[block_index]);
        builder.ins().jump(done_block, &[]);

        builder.switch_to_block(done_block);
        builder.seal_block(done_block);
        builder.ins().return_(&[]);

        builder.finalize();
    }

    module.define_function(func_id, ctx).map_err(module_err)?;
    module.clear_context(ctx);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_blocks_skips_zero_words_and_stops_at_region_end() {
        // ADD r2,r1,r3 ; zero word (skipped) ; B . ; trailing byte short of a full word.
        let mut rom = Vec::new();
        rom.extend_from_slice(&0xE081_2003u32.to_le_bytes());
        rom.extend_from_slice(&0u32.to_le_bytes());
        rom.extend_from_slice(&0xEAFF_FFFEu32.to_le_bytes());

        let config = RomConfig::from_image_len(0x1000, rom.len());
        let builder = ModuleBuilder::new(&rom, config, false);
        let (blocks, pc_to_index) = builder.decode_blocks();

        assert_eq!(blocks.len(), 2);
        assert_eq!(pc_to_index.get(&0x1000), Some(&0));
        assert_eq!(pc_to_index.get(&0x1008), Some(&1));
        assert!(pc_to_index.get(&0x1004).is_none());
    }

    #[test]
    fn decode_blocks_stops_at_a_truncated_trailing_word() {
        let mut rom = 0xE081_2003u32.to_le_bytes().to_vec();
        rom.push(0xFF); // three stray bytes: not a full word, must not be read.
        rom.push(0xFF);
        rom.push(0xFF);

        let config = RomConfig::from_image_len(0x1000, rom.len());
        let builder = ModuleBuilder::new(&rom, config, false);
        let (blocks, _) = builder.decode_blocks();
        assert_eq!(blocks.len(), 1);
    }
}

/*
Licensed to the Apache Software Foundation (ASF) under one
or more contributor license agreements.  See the NOTICE file
distributed with this work for additional information
regarding copyright ownership.  The ASF licenses this file
to you under the Apache License, Version 2.0 (the
"License"); you may not use this file except in compliance
with the License.  You may obtain a copy of the License at

  http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing,
software distributed under the License is distributed on an
"AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
KIND, either express or implied.  See the License for the
specific language governing permissions and limitations
under the License.
*/
