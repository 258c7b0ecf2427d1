// License below.
//! `STR Rt, [Rn, #+/-imm12]` and `STM` (decrement-before form only; see
//! the open-question resolution in `DESIGN.md`).
#![warn(missing_docs)]

use cranelift_codegen::ir::InstBuilder;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use crate::arm::condition::Condition;
use crate::arm::fields::{read_fields, Field, FieldValue};
use crate::arm::Register;
use crate::machine::MachineState;

use super::load::multi_start_address;

/// The two decode forms for stores.
#[derive(Debug, Clone, Copy)]
pub enum StoreForm {
    /// `STR Rt, [Rn, #+/-imm12]`.
    Offset { rn: Register, rt: Register, imm12: u32, add: bool, index: bool, wback: bool },
    /// `STMDB Rn{!}, {reglist}`. Only the decrement-before addressing
    /// mode is decoded; any other `P`/`U` combination is treated as an
    /// unrecognized encoding.
    Multi { rn: Register, registers: [bool; 16], wback: bool },
}

/// A decoded store instruction.
#[derive(Debug, Clone, Copy)]
pub struct Store {
    cond: Condition,
    form: StoreForm,
}

impl Store {
    /// Attempts to decode `word` as a store instruction. Tries each
    /// pattern in turn and returns the first match.
    pub fn decode(word: u32) -> Option<Store> {
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
            if is_load {
                return None; // LDM: load.rs's job.
            }
            let pre_indexed = multi_out[1].0 != 0;
            let add = multi_out[2].0 != 0;
            if !pre_indexed || add {
                return None; // Only STMDB is implemented; see DESIGN.md.
            }
            let user_mode = multi_out[3].0 != 0;
            if user_mode {
                return None;
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
                return None;
            }
            let mut registers = [false; 16];
            for (i, slot) in registers.iter_mut().enumerate() {
                *slot = (list >> i) & 1 != 0;
            }
            return Some(Store { cond, form: StoreForm::Multi { rn, registers, wback } });
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
                return None;
            }
            let pre_indexed = single_out[2].0 != 0;
            let add = single_out[3].0 != 0;
            let is_byte = single_out[4].0 != 0;
            if is_byte {
                return None;
            }
            let w_bit = single_out[5].0 != 0;
            let is_load = single_out[6].0 != 0;
            if is_load {
                return None; // LDR: load.rs's job.
            }
            let rn = Register::from_gpr_index(single_out[7].0);
            let rt = Register::from_gpr_index(single_out[8].0);
            if rt == Register::PC {
                return None; // Storing PC is rejected at decode.
            }
            let imm12 = single_out[9].0;
            let index = pre_indexed;
            let wback = !pre_indexed || w_bit;

            if !pre_indexed && w_bit {
                return None; // P==0, W==1: STRT — unprivileged access, out of scope.
            }

            if rn == Register::PC {
                return None; // No STR-literal form.
            }
            if wback && rn == rt {
                return None;
            }

            return Some(Store { cond, form: StoreForm::Offset { rn, rt, imm12, add, index, wback } });
        }

        None
    }

    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        self.cond
    }

    /// Lowers this instruction's body. Stores never write `PC`
    /// (rejected at decode), so this never terminates its block.
    pub fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
    ) -> bool {
        match self.form {
            StoreForm::Offset { rn, rt, imm12, add, index, wback } => {
                let base = state.read_register(builder, module, rn);
                let offset_addr = if add {
                    builder.ins().iadd_imm(base, i64::from(imm12))
                } else {
                    builder.ins().iadd_imm(base, -i64::from(imm12))
                };
                let address = if index { offset_addr } else { base };
                let value = state.read_register(builder, module, rt);
                state.write_memory32(builder, module, address, value);
                if wback {
                    state.write_register(builder, module, rn, offset_addr);
                }
            },
            StoreForm::Multi { rn, registers, wback } => {
                let count = registers.iter().filter(|&&b| b).count() as i64;
                let rn_val = state.read_register(builder, module, rn);
                let start = multi_start_address(builder, rn_val, true, false, count);

                let mut k: i64 = 0;
                for (i, &present) in registers.iter().enumerate() {
                    if !present {
                        continue;
                    }
                    let reg = Register::from_gpr_index(i as u32);
                    let addr = builder.ins().iadd_imm(start, k * 4);
                    let value = state.read_register(builder, module, reg);
                    state.write_memory32(builder, module, addr, value);
                    k += 1;
                }

                if wback {
                    let new_rn = builder.ins().iadd_imm(rn_val, -count * 4);
                    state.write_register(builder, module, rn, new_rn);
                }
            },
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_push_as_stmdb() {
        // STMDB sp!, {r4, r5, r6}  (PUSH {r4-r6})
        let word = 0xE92D_0070u32;
        let s = Store::decode(word).expect("decodes");
        match s.form {
            StoreForm::Multi { rn, registers, wback } => {
                assert_eq!(rn, Register::SP);
                assert!(wback);
                assert!(registers[Register::R4.gpr_index()]);
                assert!(registers[Register::R5.gpr_index()]);
                assert!(registers[Register::R6.gpr_index()]);
            },
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn rejects_stm_ia() {
        // STMIA r0!, {r1}  -- P=0,U=1 is not DB, must be rejected.
        let word = 0xE8A0_0002u32;
        assert!(Store::decode(word).is_none());
    }

    #[test]
    fn rejects_storing_pc() {
        // STR pc, [r0]
        let word = 0xE580_F000u32;
        assert!(Store::decode(word).is_none());
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
