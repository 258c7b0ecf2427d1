// License below.
//! The `Instruction` sum type and its decode/lowering contract.
//!
//! Represented as a tagged enum (one variant per kind) rather than trait
//! objects: decode is a try-each-variant, lowering is a match over the
//! variant. No heap indirection, and each kind's data layout stays
//! explicit — see `DESIGN.md`.
#![warn(missing_docs)]

use std::collections::HashMap;

use cranelift_codegen::ir;
use cranelift_codegen::ir::InstBuilder;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{FuncId, Module};

use crate::arm::condition::Condition;
use crate::arm::Register;
use crate::config::RomConfig;
use crate::machine::MachineState;

pub use self::arithmetic::Arithmetic;
pub use self::branch::Branch;
pub use self::load::Load;
pub use self::movshift::MovShift;
pub use self::store::Store;

pub mod arithmetic;
pub mod branch;
pub mod load;
pub mod movshift;
pub mod store;

/// Everything a kind's lowering needs besides the builder/module/machine
/// state: the loaded ROM bytes and region extents (for PC-relative
/// literal inlining), whether this is a verification build, the
/// already-generated entry blocks of every other instruction in the
/// *same* color (for `BranchWritePCConst`), and the declared `Run`
/// function (for `BranchReadPC`).
pub struct LowerEnv<'a> {
    /// The raw bytes of the input ROM image, indexed from `rom_code_start`.
    pub rom: &'a [u8],
    /// The loader-supplied code/rodata extents.
    pub config: RomConfig,
    /// `true` when the module is built in verification mode: every
    /// direct/indirect PC write becomes a plain return to the runtime
    /// shim instead of an in-function jump or a re-entrant `Run` call.
    pub verify: bool,
    /// Maps a decoded instruction's address to its entry IR block, for
    /// every block in the color currently being generated.
    pub pc_to_entry: &'a HashMap<u32, ir::Block>,
    /// The module-level `Run` function, called by `BranchReadPC`.
    pub run_func: FuncId,
}

/// `BranchWritePCConst(target)`: resolves a compile-time-constant branch
/// target either to a direct in-function jump (when `target` names a
/// block in the same color) or to a plain write-and-return (verify mode,
/// or a target outside this color/the decoded ROM).
pub fn branch_write_pc_const(
    builder: &mut FunctionBuilder,
    module: &mut dyn Module,
    state: &MachineState,
    env: &LowerEnv,
    target: u32,
) {
    if !env.verify {
        if let Some(&entry) = env.pc_to_entry.get(&target) {
            builder.ins().jump(entry, &[]);
            return;
        }
    }
    let v = builder.ins().iconst(cranelift_codegen::ir::types::I32, i64::from(target as i32));
    state.write_register(builder, module, Register::PC, v);
    builder.ins().return_(&[]);
}

/// `BranchReadPC`: re-enters the dispatch loop through `Run` (normal
/// mode) or simply returns to the runtime shim (verify mode), which
/// re-reads `PC` itself after every translated opcode.
pub fn branch_read_pc(builder: &mut FunctionBuilder, module: &mut dyn Module, _state: &MachineState, env: &LowerEnv) {
    if env.verify {
        builder.ins().return_(&[]);
        return;
    }
    let callee = module.declare_func_in_func(env.run_func, builder.func);
    builder.ins().call(callee, &[]);
    builder.ins().return_(&[]);
}

/// One decoded ARM instruction, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    /// Data-processing: `AND/EOR/SUB/RSB/ADD/ADC/SBC/RSC/ORR/BIC`.
    Arithmetic(Arithmetic),
    /// `MOV`/shift-alias/`MOVW`.
    MovShift(MovShift),
    /// `B`/`BL`/`BLX` (register).
    Branch(Branch),
    /// `LDR` (literal, offset, multi).
    Load(Load),
    /// `STR`/`STM` (decrement-before only).
    Store(Store),
}

impl Instruction {
    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        match self {
            Instruction::Arithmetic(a) => a.condition(),
            Instruction::MovShift(m) => m.condition(),
            Instruction::Branch(b) => b.condition(),
            Instruction::Load(l) => l.condition(),
            Instruction::Store(s) => s.condition(),
        }
    }

    /// The compile-time-constant branch target this instruction
    /// contributes to the graph pre-pass, if any. Only `Branch`'s
    /// immediate form has one; everything else (including the register
    /// branch and every PC-writing load/move) resolves its target only
    /// at runtime, through `GetBlockAddress`, and so contributes no
    /// direct-branch edge.
    pub fn direct_target(&self, pc: u32) -> Option<u32> {
        match self {
            Instruction::Branch(b) => b.direct_target(pc),
            _ => None,
        }
    }

    /// `true` if, once lowered, this instruction always terminates its
    /// block with no implicit `PC <- address + 4` fall-through — i.e. a
    /// fall-through edge must *not* be created for it in the graph
    /// pre-pass. This mirrors exactly what `generate_code` would return,
    /// computed without touching IR: `false` whenever `cond != AL` (the
    /// condition-predicated join always falls through), and otherwise
    /// `true` only for unconditional branches and instructions that
    /// unconditionally write `PC`.
    pub fn always_terminates(&self) -> bool {
        if !self.condition().is_always() {
            return false;
        }
        match self {
            Instruction::Branch(_) => true,
            Instruction::Load(l) => l.writes_pc(),
            Instruction::MovShift(m) => m.writes_pc(),
            Instruction::Arithmetic(_) | Instruction::Store(_) => false,
        }
    }

    /// Lowers this instruction at `pc`, wrapping the body in a
    /// condition-predicated split when `cond != AL`. Returns `true` if
    /// the IR insertion point is left terminated (no implicit
    /// fall-through is needed); the caller (`Block::generate_code`) uses
    /// this to decide whether to emit one.
    pub fn generate_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
        env: &LowerEnv,
        pc: u32,
    ) -> bool {
        let cond = self.condition();
        if cond.is_always() {
            return self.generate_instruction_code(builder, module, state, env, pc);
        }

        let pred = state.condition_passed(builder, module, cond);
        let passed = builder.create_block();
        let not_passed = builder.create_block();
        builder.ins().brnz(pred, passed, &[]);
        builder.ins().jump(not_passed, &[]);

        builder.switch_to_block(passed);
        builder.seal_block(passed);
        let body_terminated = self.generate_instruction_code(builder, module, state, env, pc);
        if !body_terminated {
            builder.ins().jump(not_passed, &[]);
        }

        builder.switch_to_block(not_passed);
        builder.seal_block(not_passed);
        false
    }

    fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
        env: &LowerEnv,
        pc: u32,
    ) -> bool {
        match self {
            Instruction::Arithmetic(a) => a.generate_instruction_code(builder, module, state),
            Instruction::MovShift(m) => m.generate_instruction_code(builder, module, state, env),
            Instruction::Branch(b) => b.generate_instruction_code(builder, module, state, env, pc),
            Instruction::Load(l) => l.generate_instruction_code(builder, module, state, env),
            Instruction::Store(s) => s.generate_instruction_code(builder, module, state),
        }
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
