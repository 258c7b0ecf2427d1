// License below.
//! `B`/`BL` (PC-relative immediate branch) and `BLX` (register branch,
//! always-linking).
#![warn(missing_docs)]

use cranelift_codegen::ir::InstBuilder;
use cranelift_codegen::ir::types;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use super::LowerEnv;
use crate::arm::condition::Condition;
use crate::arm::fields::{read_fields, Field, FieldValue};
use crate::arm::Register;
use crate::machine::MachineState;

/// The two branch forms this kind decodes.
#[derive(Debug, Clone, Copy)]
pub enum BranchForm {
    /// `B`/`BL target`: `target = pc + 8 + sext(imm24 << 2)`.
    Immediate { link: bool, offset: i32 },
    /// `BLX Rm`: always linking, `Rm != PC`.
    Register { link: bool, rm: Register },
}

/// A decoded branch instruction.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    cond: Condition,
    form: BranchForm,
}

impl Branch {
    /// Attempts to decode `word` as a branch instruction. Tries each
    /// pattern in turn and returns the first match.
    pub fn decode(word: u32) -> Option<Branch> {
        // COND 0001 0010 1111 1111 1111 0011 Rm
        const BLX_PATTERN: [Field; 3] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 24, value: 0x12_FFF3 },
            Field::Bits  { width: 4, slot: 1 },  // Rm
        ];
        let mut blx_out = [FieldValue::default(); 2];
        if read_fields(word, &BLX_PATTERN, &mut blx_out) {
            let cond = Condition::decode(blx_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let rm = Register::from_gpr_index(blx_out[1].0);
            if rm == Register::PC {
                return None;
            }
            return Some(Branch { cond, form: BranchForm::Register { link: true, rm } });
        }

        // COND 101 L imm24
        const IMMEDIATE_PATTERN: [Field; 4] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 3, value: 0b101 },
            Field::Bits  { width: 1, slot: 1 },  // L
            Field::Bits  { width: 24, slot: 2 }, // imm24
        ];
        let mut imm_out = [FieldValue::default(); 3];
        if read_fields(word, &IMMEDIATE_PATTERN, &mut imm_out) {
            let cond = Condition::decode(imm_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let link = imm_out[1].0 != 0;
            let imm24 = imm_out[2].0;
            let signed = ((imm24 << 8) as i32) >> 8;
            let offset = signed * 4;
            return Some(Branch { cond, form: BranchForm::Immediate { link, offset } });
        }

        None
    }

    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        self.cond
    }

    /// The compile-time-constant branch target, if this is the immediate
    /// form; used by the graph pre-pass to link blocks before any IR is
    /// built. Present regardless of `cond`: a conditional branch still
    /// contributes this edge, alongside the implicit fall-through edge
    /// `Instruction::always_terminates` permits when `cond != AL`.
    pub fn direct_target(&self, pc: u32) -> Option<u32> {
        match self.form {
            BranchForm::Immediate { offset, .. } => Some(pc.wrapping_add(8).wrapping_add(offset as u32)),
            BranchForm::Register { .. } => None,
        }
    }

    /// Lowers this instruction's body. Always terminates its block.
    pub fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
        env: &LowerEnv,
        pc: u32,
    ) -> bool {
        match self.form {
            BranchForm::Immediate { link, offset } => {
                if link {
                    let lr = builder.ins().iconst(types::I32, i64::from(pc.wrapping_add(4)));
                    state.write_register(builder, module, Register::LR, lr);
                }
                let target = pc.wrapping_add(8).wrapping_add(offset as u32);
                super::branch_write_pc_const(builder, module, state, env, target);
            },
            BranchForm::Register { link, rm } => {
                if link {
                    let lr = builder.ins().iconst(types::I32, i64::from(pc.wrapping_add(4)));
                    state.write_register(builder, module, Register::LR, lr);
                }
                let rm_val = state.read_register(builder, module, rm);
                state.write_register(builder, module, Register::PC, rm_val);
                super::branch_read_pc(builder, module, state, env);
            },
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_forward_branch() {
        // B #8 (forward) : imm24 encodes offset/4 - 2 in two's complement per assembler convention;
        // here we just pick a raw encoding and check the target math directly.
        let word = 0xEA00_0000u32; // cond=AL, link=0, imm24=0
        let b = Branch::decode(word).expect("decodes");
        assert_eq!(b.direct_target(0x1000), Some(0x1008));
    }

    #[test]
    fn decodes_backward_branch() {
        // imm24 = -2 as 24-bit two's complement == B . (branch to self)
        let word = 0xEAFF_FFFEu32;
        let b = Branch::decode(word).expect("decodes");
        assert_eq!(b.direct_target(0x1000), Some(0x1000));
    }

    #[test]
    fn decodes_bl_as_linking() {
        let word = 0xEB00_0000u32; // L=1
        let b = Branch::decode(word).expect("decodes");
        match b.form {
            BranchForm::Immediate { link, .. } => assert!(link),
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn rejects_blx_to_pc() {
        let word = 0xE12F_FF3Fu32; // BLX pc
        assert!(Branch::decode(word).is_none());
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
