// License below.
//! `LDR` in its three forms: PC-relative literal, register+`imm12`, and
//! `LDM` (load-multiple).
#![warn(missing_docs)]

use cranelift_codegen::ir::{types, InstBuilder};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use super::LowerEnv;
use crate::arm::condition::Condition;
use crate::arm::fields::{read_fields, Field, FieldValue};
use crate::arm::Register;
use crate::machine::MachineState;

/// The three decode forms for loads.
#[derive(Debug, Clone, Copy)]
pub enum LoadForm {
    /// `LDR Rd, [PC, #+/-imm12]`. The address is already a compile-time
    /// constant by the time this is built; whether it gets inlined as a
    /// literal or lowered as a `Memory::Read32` call is decided at codegen
    /// time against the loaded ROM image (see `generate_instruction_code`).
    PcLiteral { rd: Register, address: u32 },
    /// `LDR Rt, [Rn, #+/-imm12]` with the usual pre/post-index and
    /// write-back encoding.
    Offset { rn: Register, rt: Register, imm12: u32, add: bool, index: bool, wback: bool },
    /// `LDM Rn{!}, {reglist}`, honoring all four `P`/`U` addressing modes.
    Multi { rn: Register, registers: [bool; 16], wback: bool, pre_indexed: bool, add: bool },
}

/// A decoded load instruction.
#[derive(Debug, Clone, Copy)]
pub struct Load {
    cond: Condition,
    form: LoadForm,
}

impl Load {
    /// Attempts to decode `word` (at address `pc`) as a load instruction.
    /// Tries each pattern in turn and returns the first match.
    pub fn decode(word: u32, pc: u32) -> Option<Load> {
        // COND 100 P U S W L Rn reglist
        const MULTI_PATTERN: [Field; 9] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 3, value: 0b100 },
            Field::Bits  { width: 1, slot: 1 },  // P: pre_indexed
            Field::Bits  { width: 1, slot: 2 },  // U: add
            Field::Bits  { width: 1, slot: 3 },  // S: user_mode
            Field::Bits  { width: 1, slot: 4 },  // W: wback
            Field::Bits  { width: 1, slot: 5 },  // L: is_load
            Field::Bits  { width: 4, slot: 6 },  // Rn
            Field::Bits  { width: 16, slot: 7 }, // reglist
        ];
        let mut multi_out = [FieldValue::default(); 8];
        if read_fields(word, &MULTI_PATTERN, &mut multi_out) {
            let cond = Condition::decode(multi_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let is_load = multi_out[5].0 != 0;
            if !is_load {
                return None; // STM: store.rs's job.
            }
            let pre_indexed = multi_out[1].0 != 0;
            let add = multi_out[2].0 != 0;
            let user_mode = multi_out[3].0 != 0;
            if user_mode {
                return None; // User-mode register transfer: unsupported.
            }
            let wback = multi_out[4].0 != 0;
            let rn = Register::from_gpr_index(multi_out[6].0);
            if rn == Register::PC {
                return None;
            }
            let list = multi_out[7].0;
            if list == 0 {
                return None;
            }
            if wback && (list >> rn.gpr_index()) & 1 != 0 {
                return None; // Write-back with rn listed: rejected.
            }
            let mut registers = [false; 16];
            for (i, slot) in registers.iter_mut().enumerate() {
                *slot = (list >> i) & 1 != 0;
            }
            return Some(Load { cond, form: LoadForm::Multi { rn, registers, wback, pre_indexed, add } });
        }

        // COND 01 I P U B W L Rn Rt imm12
        const SINGLE_PATTERN: [Field; 11] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 2, value: 0b01 },
            Field::Bits  { width: 1, slot: 1 },  // I: is_reg_offset
            Field::Bits  { width: 1, slot: 2 },  // P: pre_indexed
            Field::Bits  { width: 1, slot: 3 },  // U: add
            Field::Bits  { width: 1, slot: 4 },  // B: is_byte
            Field::Bits  { width: 1, slot: 5 },  // W: w_bit
            Field::Bits  { width: 1, slot: 6 },  // L: is_load
            Field::Bits  { width: 4, slot: 7 },  // Rn
            Field::Bits  { width: 4, slot: 8 },  // Rt
            Field::Bits  { width: 12, slot: 9 }, // imm12
        ];
        let mut single_out = [FieldValue::default(); 10];
        if read_fields(word, &SINGLE_PATTERN, &mut single_out) {
            let cond = Condition::decode(single_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let is_reg_offset = single_out[1].0 != 0;
            if is_reg_offset {
                return None; // Register-offset indexing: out of scope.
            }
            let pre_indexed = single_out[2].0 != 0;
            let add = single_out[3].0 != 0;
            let is_byte = single_out[4].0 != 0;
            if is_byte {
                return None; // Only 32-bit transfers are modeled.
            }
            let w_bit = single_out[5].0 != 0;
            let is_load = single_out[6].0 != 0;
            if !is_load {
                return None; // STR: store.rs's job.
            }
            let rn = Register::from_gpr_index(single_out[7].0);
            let rt = Register::from_gpr_index(single_out[8].0);
            let imm12 = single_out[9].0;

            let index = pre_indexed;
            let wback = !pre_indexed || w_bit;

            if !pre_indexed && w_bit {
                return None; // P==0, W==1: LDRT — unprivileged access, out of scope.
            }

            if rn == Register::PC {
                if index && !wback {
                    let address = if add {
                        pc.wrapping_add(8).wrapping_add(imm12)
                    } else {
                        pc.wrapping_add(8).wrapping_sub(imm12)
                    };
                    return Some(Load { cond, form: LoadForm::PcLiteral { rd: rt, address } });
                }
                return None; // Any other Rn == PC combination is UNPREDICTABLE.
            }

            if wback && rn == rt {
                return None; // UNPREDICTABLE: write-back clobbers the loaded-into register.
            }

            return Some(Load { cond, form: LoadForm::Offset { rn, rt, imm12, add, index, wback } });
        }

        None
    }

    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        self.cond
    }

    /// `true` if this instruction's lowering always writes `PC`, making
    /// its lowering always terminate the block once `cond == AL`.
    pub fn writes_pc(&self) -> bool {
        match self.form {
            LoadForm::PcLiteral { rd, .. } => rd == Register::PC,
            LoadForm::Offset { rt, .. } => rt == Register::PC,
            LoadForm::Multi { registers, .. } => registers[Register::PC.gpr_index()],
        }
    }

    /// Lowers this instruction's body. Returns `true` (terminated) exactly
    /// when `writes_pc()`.
    pub fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
        env: &LowerEnv,
    ) -> bool {
        match self.form {
            LoadForm::PcLiteral { rd, address } => {
                let value = if env.config.is_inlinable_literal(address) {
                    let base = if env.config.in_code(address) {
                        env.config.rom_code_start
                    } else {
                        env.config.rom_rodata_start
                    };
                    let offset = (address - base) as usize;
                    let bytes = [env.rom[offset], env.rom[offset + 1], env.rom[offset + 2], env.rom[offset + 3]];
                    let word = u32::from_le_bytes(bytes);
                    builder.ins().iconst(types::I32, i64::from(word as i32))
                } else {
                    let addr_val = builder.ins().iconst(types::I32, i64::from(address as i32));
                    state.read_memory32(builder, module, addr_val)
                };
                state.write_register(builder, module, rd, value);
                if rd == Register::PC {
                    super::branch_read_pc(builder, module, state, env);
                    true
                } else {
                    false
                }
            },
            LoadForm::Offset { rn, rt, imm12, add, index, wback } => {
                let base = state.read_register(builder, module, rn);
                let offset_addr = if add {
                    builder.ins().iadd_imm(base, i64::from(imm12))
                } else {
                    builder.ins().iadd_imm(base, -i64::from(imm12))
                };
                let address = if index { offset_addr } else { base };
                let value = state.read_memory32(builder, module, address);
                if wback {
                    state.write_register(builder, module, rn, offset_addr);
                }
                state.write_register(builder, module, rt, value);
                if rt == Register::PC {
                    super::branch_read_pc(builder, module, state, env);
                    true
                } else {
                    false
                }
            },
            LoadForm::Multi { rn, registers, wback, pre_indexed, add } => {
                let count = registers.iter().filter(|&&b| b).count() as i64;
                let rn_val = state.read_register(builder, module, rn);
                let start = multi_start_address(builder, rn_val, pre_indexed, add, count);

                let mut k: i64 = 0;
                let mut pc_written = false;
                for (i, &present) in registers.iter().enumerate() {
                    if !present {
                        continue;
                    }
                    let reg = Register::from_gpr_index(i as u32);
                    let addr = builder.ins().iadd_imm(start, k * 4);
                    let value = state.read_memory32(builder, module, addr);
                    state.write_register(builder, module, reg, value);
                    pc_written |= reg == Register::PC;
                    k += 1;
                }

                if wback {
                    let new_rn = if add {
                        builder.ins().iadd_imm(rn_val, count * 4)
                    } else {
                        builder.ins().iadd_imm(rn_val, -count * 4)
                    };
                    state.write_register(builder, module, rn, new_rn);
                }

                if pc_written {
                    super::branch_read_pc(builder, module, state, env);
                    true
                } else {
                    false
                }
            },
        }
    }
}

/// Shared by `Load::Multi` and `store::Store::Multi` (which forces
/// `pre_indexed = true, add = false`, i.e. `STMDB`): the ARM manual's
/// `LDM`/`STM` start-address formula.
pub(super) fn multi_start_address(
    builder: &mut FunctionBuilder,
    rn_val: cranelift_codegen::ir::Value,
    pre_indexed: bool,
    add: bool,
    count: i64,
) -> cranelift_codegen::ir::Value {
    match (add, pre_indexed) {
        (true, true) => builder.ins().iadd_imm(rn_val, 4),
        (true, false) => rn_val,
        (false, true) => builder.ins().iadd_imm(rn_val, -count * 4),
        (false, false) => builder.ins().iadd_imm(rn_val, -count * 4 + 4),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_pc_literal_form() {
        // LDR r0, [pc, #0]
        let word = 0xE59F_0000u32;
        let l = Load::decode(word, 0x2000).expect("decodes");
        match l.form {
            LoadForm::PcLiteral { rd, address } => {
                assert_eq!(rd, Register::R0);
                assert_eq!(address, 0x2008);
            },
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn rejects_write_back_onto_loaded_register() {
        // LDR r1, [r1, #4]!
        let word = 0xE5B1_1004u32;
        assert!(Load::decode(word, 0).is_none());
    }

    #[test]
    fn rejects_ldm_with_rn_in_list() {
        // LDMIA r0!, {r0, r1}
        let word = 0xE8B0_0003u32;
        assert!(Load::decode(word, 0).is_none());
    }

    #[test]
    fn decodes_ldm_register_list() {
        // LDMIA r0, {r1, r2}
        let word = 0xE890_0006u32;
        let l = Load::decode(word, 0).expect("decodes");
        match l.form {
            LoadForm::Multi { registers, wback, .. } => {
                assert!(!wback);
                assert!(registers[Register::R1.gpr_index()]);
                assert!(registers[Register::R2.gpr_index()]);
                assert!(!registers[Register::R0.gpr_index()]);
            },
            other => panic!("unexpected form: {:?}", other),
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
