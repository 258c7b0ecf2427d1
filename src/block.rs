// License below.
//! One decoded instruction's "block": its guest address, its lowered
//! instruction value, and its adjacency to other blocks under the
//! direct-branch/fall-through edge relation.
#![warn(missing_docs)]

use std::collections::HashMap;

use cranelift_codegen::ir;
use cranelift_codegen::ir::types;
use cranelift_codegen::ir::InstBuilder;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{DataId, Module};

use crate::alias::AliasClass;
use crate::arm::instruction::{self, Instruction, LowerEnv};
use crate::machine::MachineState;

/// One decoded instruction, plus its place in the block graph.
///
/// `preds`/`succs` are indices into the module's block vector, not
/// long-lived references — ownership of every block stays with the
/// module (see `DESIGN.md`).
#[derive(Debug, Clone)]
pub struct Block {
    /// Word-aligned guest address.
    pub pc: u32,
    /// The decoded instruction this block lowers.
    pub instruction: Instruction,
    /// A deterministic label derived from `pc`, used to name the IR
    /// block when it's created.
    pub label: String,
    /// Indices of blocks with an edge into this one.
    pub preds: Vec<usize>,
    /// Indices of blocks this one has an edge into.
    pub succs: Vec<usize>,
    /// The connected component this block was painted into, once
    /// `coloring::color_blocks` has run.
    pub color: Option<usize>,
}

impl Block {
    /// Builds a fresh, unlinked, uncolored block for a just-decoded
    /// instruction.
    pub fn new(pc: u32, instruction: Instruction) -> Block {
        Block { pc, instruction, label: format!("blk_{:08x}", pc), preds: Vec::new(), succs: Vec::new(), color: None }
    }
}

/// Computes every block's direct-branch and fall-through successor
/// edges, purely from decoded fields — no IR is touched. This must run
/// before any `FunctionBuilder` is opened: Cranelift's `ir::Block`s are
/// owned by the `Function` they were created in from the start, so the
/// graph (and its coloring) has to be known before blocks are allocated
/// into per-color functions. See the module's top-level docs and
/// `DESIGN.md`.
pub fn compute_edges(blocks: &mut [Block], pc_to_index: &HashMap<u32, usize>) {
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (i, b) in blocks.iter().enumerate() {
        if let Some(target) = b.instruction.direct_target(b.pc) {
            if let Some(&j) = pc_to_index.get(&target) {
                edges.push((i, j));
            }
        }
        if !b.instruction.always_terminates() {
            if let Some(&j) = pc_to_index.get(&b.pc.wrapping_add(4)) {
                edges.push((i, j));
            }
        }
    }
    for (i, j) in edges {
        blocks[i].succs.push(j);
        blocks[j].preds.push(i);
    }
}

/// Generates this block's IR, assuming `builder`'s insertion point is
/// already at `entry`. Emits `InstructionCount += 1`, tagged with its own
/// alias class so the optimizer can't hoist it across unrelated memory
/// operations, then delegates to the instruction; if the instruction's
/// body didn't terminate its block, emits the implicit
/// `PC <- address + 4` fall-through.
pub fn generate_code(
    block: &Block,
    builder: &mut FunctionBuilder,
    module: &mut dyn Module,
    state: &MachineState,
    env: &LowerEnv,
    instruction_count: DataId,
    pointer_type: types::Type,
) {
    let gv = module.declare_data_in_func(instruction_count, builder.func);
    let base = builder.ins().global_value(pointer_type, gv);
    let flags = AliasClass::InstructionCount.mem_flags();
    let count = builder.ins().load(types::I32, flags, base, 0);
    let incremented = builder.ins().iadd_imm(count, 1);
    builder.ins().store(flags, incremented, base, 0);

    let terminated = block.instruction.generate_code(builder, module, state, env, block.pc);
    if !terminated {
        instruction::branch_write_pc_const(builder, module, state, env, block.pc.wrapping_add(4));
    }
}

/// Where in IR this block currently lives.
pub fn entry_block(pc_to_entry: &HashMap<u32, ir::Block>, pc: u32) -> ir::Block {
    *pc_to_entry.get(&pc).expect("every block's own entry is registered before codegen runs")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm::instruction::branch::Branch;
    use crate::arm::instruction::Instruction;

    fn branch_to(pc: u32, target_pc: u32) -> Block {
        // AL B <offset computed to land on target_pc>
        let offset = (target_pc as i64 - (pc as i64 + 8)) as i32;
        let imm24 = ((offset / 4) as u32) & 0x00FF_FFFF;
        let word = 0xEA00_0000u32 | imm24;
        let instr = Branch::decode(word).expect("decodes");
        Block::new(pc, Instruction::Branch(instr))
    }

    #[test]
    fn direct_branch_links_both_directions() {
        let mut blocks = vec![branch_to(0x1000, 0x2000), Block::new(0x2000, {
            // Any non-terminating filler instruction at the target.
            let nop_add = crate::arm::instruction::arithmetic::Arithmetic::decode(0xE1A0_0000 /* placeholder */)
                .or_else(|| crate::arm::instruction::arithmetic::Arithmetic::decode(0xE081_2003))
                .expect("decodes");
            Instruction::Arithmetic(nop_add)
        })];
        let mut pc_to_index = HashMap::new();
        pc_to_index.insert(0x1000, 0);
        pc_to_index.insert(0x2000, 1);
        compute_edges(&mut blocks, &pc_to_index);
        assert_eq!(blocks[0].succs, vec![1]);
        assert_eq!(blocks[1].preds, vec![0]);
    }

    #[test]
    fn unconditional_branch_gets_no_fallthrough_edge() {
        // B . (self-loop): always_terminates() is true, so the only edge
        // is the direct-branch self-loop, never a fall-through to 0x1004.
        let mut blocks = vec![branch_to(0x1000, 0x1000), Block::new(0x1004, {
            let nop_add = crate::arm::instruction::arithmetic::Arithmetic::decode(0xE081_2003).expect("decodes");
            Instruction::Arithmetic(nop_add)
        })];
        let mut pc_to_index = HashMap::new();
        pc_to_index.insert(0x1000, 0);
        pc_to_index.insert(0x1004, 1);
        compute_edges(&mut blocks, &pc_to_index);
        assert!(blocks[0].instruction.always_terminates());
        assert_eq!(blocks[0].succs, vec![0]);
        assert!(blocks[1].preds.is_empty());
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
