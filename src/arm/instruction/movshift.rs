// License below.
//! `MOV`/shift-alias instructions: `MOV Rd, Rm {, shift #imm5}`, the
//! shift mnemonics (`LSL/LSR/ASR/ROR/RRX Rd, Rm, #imm5`, which share the
//! same encoding), `MOV Rd, #imm12` (ARM-expanded), and `MOVW Rd, #imm16`.
#![warn(missing_docs)]

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use super::LowerEnv;
use crate::arm::condition::Condition;
use crate::arm::fields::{read_fields, Field, FieldValue};
use crate::arm::helpers;
use crate::arm::{Register, ShiftType};
use crate::machine::MachineState;

/// The three ways this kind's destination value can be produced.
#[derive(Debug, Clone, Copy)]
pub enum MovForm {
    /// `Rm` shifted by a compile-time-constant amount (the shift mnemonics
    /// and `MOV Rd, Rm` — the latter is simply `LSL #0`).
    Shift { rm: Register, shift_ty: ShiftType, shift_amount: u32 },
    /// `MOV Rd, #imm12`, ARM-expanded.
    ExpandImm { imm12: u32 },
    /// `MOVW Rd, #imm16`: a plain 16-bit literal, never touches the carry
    /// flag and never sets flags.
    MovW { imm16: u32 },
}

/// A decoded move/shift instruction.
#[derive(Debug, Clone, Copy)]
pub struct MovShift {
    cond: Condition,
    set_flags: bool,
    rd: Register,
    form: MovForm,
}

impl MovShift {
    /// Attempts to decode `word` as one of this kind's three forms. Tries
    /// each pattern in turn and returns the first match.
    pub fn decode(word: u32) -> Option<MovShift> {
        // COND 00 0 1101 S Rn Rd imm5 op2 0 Rm
        const REG_PATTERN: [Field; 11] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 2, value: 0b00 },
            Field::Const { width: 1, value: 0 },      // I = 0
            Field::Const { width: 4, value: 0b1101 }, // dpop = MOV
            Field::Bits  { width: 1, slot: 1 },  // S
            Field::Bits  { width: 4, slot: 2 },  // Rn (unused)
            Field::Bits  { width: 4, slot: 3 },  // Rd
            Field::Bits  { width: 5, slot: 4 },  // imm5
            Field::Bits  { width: 2, slot: 5 },  // op2
            Field::Const { width: 1, value: 0 }, // not a register-specified shift
            Field::Bits  { width: 4, slot: 6 },  // Rm
        ];
        let mut reg_out = [FieldValue::default(); 7];
        if read_fields(word, &REG_PATTERN, &mut reg_out) {
            let cond = Condition::decode(reg_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let set_flags = reg_out[1].0 != 0;
            let rd = Register::from_gpr_index(reg_out[3].0);
            let rm = Register::from_gpr_index(reg_out[6].0);
            let imm5 = reg_out[4].0;
            let op2 = reg_out[5].0;
            let (shift_ty, shift_amount) = ShiftType::decode_imm_shift(op2, imm5);
            return Some(MovShift { cond, set_flags, rd, form: MovForm::Shift { rm, shift_ty, shift_amount } });
        }

        // COND 00 1 1101 S Rn Rd imm12
        const IMM_PATTERN: [Field; 8] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 2, value: 0b00 },
            Field::Const { width: 1, value: 1 },      // I = 1
            Field::Const { width: 4, value: 0b1101 }, // dpop = MOV
            Field::Bits  { width: 1, slot: 1 },  // S
            Field::Bits  { width: 4, slot: 2 },  // Rn (unused)
            Field::Bits  { width: 4, slot: 3 },  // Rd
            Field::Bits  { width: 12, slot: 4 }, // imm12
        ];
        let mut imm_out = [FieldValue::default(); 5];
        if read_fields(word, &IMM_PATTERN, &mut imm_out) {
            let cond = Condition::decode(imm_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let set_flags = imm_out[1].0 != 0;
            let rd = Register::from_gpr_index(imm_out[3].0);
            let imm12 = imm_out[4].0;
            return Some(MovShift { cond, set_flags, rd, form: MovForm::ExpandImm { imm12 } });
        }

        // COND 0011 0000 imm4 Rd imm12
        const MOVW_PATTERN: [Field; 5] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 8, value: 0x30 },
            Field::Bits  { width: 4, slot: 1 },  // imm4
            Field::Bits  { width: 4, slot: 2 },  // Rd
            Field::Bits  { width: 12, slot: 3 }, // imm12
        ];
        let mut movw_out = [FieldValue::default(); 4];
        if read_fields(word, &MOVW_PATTERN, &mut movw_out) {
            let cond = Condition::decode(movw_out[0].0);
            if !cond.is_valid() {
                return None;
            }
            let rd = Register::from_gpr_index(movw_out[2].0);
            if rd == Register::PC {
                return None; // UNPREDICTABLE: MOVW has no Rd == PC form.
            }
            let imm16 = (movw_out[1].0 << 12) | movw_out[3].0;
            return Some(MovShift { cond, set_flags: false, rd, form: MovForm::MovW { imm16 } });
        }

        None
    }

    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        self.cond
    }

    /// `true` if this instruction writes `PC`, meaning its lowering always
    /// terminates the block (see `Instruction::always_terminates`).
    pub fn writes_pc(&self) -> bool {
        self.rd == Register::PC
    }

    /// Lowers this instruction's body. Returns `true` (the block
    /// terminated) exactly when `rd == PC`.
    pub fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
        env: &LowerEnv,
    ) -> bool {
        let (value, carry): (Value, Option<Value>) = match self.form {
            MovForm::Shift { rm, shift_ty, shift_amount } => {
                let rm_val = state.read_register(builder, module, rm);
                let carry_in = state.read_flag(builder, module, Register::C);
                let r = helpers::shift_c(builder, rm_val, shift_ty, shift_amount, carry_in);
                (r.value, Some(r.carry))
            },
            MovForm::ExpandImm { imm12 } => {
                let carry_in = state.read_flag(builder, module, Register::C);
                let r = helpers::arm_expand_imm_c(builder, imm12, carry_in);
                (r.value, Some(r.carry))
            },
            MovForm::MovW { imm16 } => {
                (builder.ins().iconst(types::I32, i64::from(imm16)), None)
            },
        };

        state.write_register(builder, module, self.rd, value);

        if self.set_flags {
            let n = builder.ins().icmp_imm(IntCC::SignedLessThan, value, 0);
            let z = builder.ins().icmp_imm(IntCC::Equal, value, 0);
            state.write_flag(builder, module, Register::N, n);
            state.write_flag(builder, module, Register::Z, z);
            if let Some(c) = carry {
                state.write_flag(builder, module, Register::C, c);
            }
        }

        if self.rd == Register::PC {
            super::branch_read_pc(builder, module, state, env);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_plain_mov_as_lsl_zero() {
        // AL MOV r1, r0
        let i = MovShift::decode(0xE1A0_1000).expect("decodes");
        match i.form {
            MovForm::Shift { rm, shift_ty, shift_amount } => {
                assert_eq!(rm, Register::R0);
                assert_eq!(shift_ty, ShiftType::LSL);
                assert_eq!(shift_amount, 0);
            },
            other => panic!("unexpected form: {:?}", other),
        }
        assert_eq!(i.rd, Register::R1);
    }

    #[test]
    fn decodes_movw_literal() {
        // MOVW r0, #0xBEEF : cond=AL, imm4=0xB, Rd=0, imm12=0xEEF
        let word = 0xE30B_0EEFu32;
        let i = MovShift::decode(word).expect("decodes");
        match i.form {
            MovForm::MovW { imm16 } => assert_eq!(imm16, 0xBEEF),
            other => panic!("unexpected form: {:?}", other),
        }
        assert_eq!(i.rd, Register::R0);
        assert!(!i.set_flags);
    }

    #[test]
    fn rejects_movw_to_pc() {
        // MOVW pc, #0xBEEF : same encoding as decodes_movw_literal with Rd = pc.
        let word = 0xE30B_FEEFu32;
        assert!(MovShift::decode(word).is_none());
    }

    #[test]
    fn mov_pc_is_flagged_as_terminating() {
        // AL MOV pc, lr
        let i = MovShift::decode(0xE1A0_F00E).expect("decodes");
        assert!(i.writes_pc());
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
