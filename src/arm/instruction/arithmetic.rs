// License below.
//! Data-processing (arithmetic/bitwise) instructions: `AND, EOR, SUB, RSB,
//! ADD, ADC, SBC, RSC, ORR, BIC`, in both register-shifted and
//! rotated-immediate forms.
//!
//! The test/compare opcodes (`TST, TEQ, CMP, CMN`) and the move opcodes
//! (`MOV, MVN`) are not decoded here — the former don't write a
//! destination register at all (they exist only for `MRS`/`MSR`-adjacent
//! flag updates this translator does not model), and the latter are
//! [`super::movshift::MovShift`]'s job.
#![warn(missing_docs)]

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use crate::arm::condition::Condition;
use crate::arm::fields::{read_fields, Field, FieldValue};
use crate::arm::helpers;
use crate::arm::{Register, ShiftType};
use crate::machine::MachineState;

/// One of the ten data-processing opcodes this kind decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum AluOp {
    AND, EOR, SUB, RSB, ADD, ADC, SBC, RSC, ORR, BIC,
}

impl AluOp {
    fn decode(bits: u32) -> Option<AluOp> {
        match bits & 0xF {
            0b0000 => Some(AluOp::AND), 0b0001 => Some(AluOp::EOR),
            0b0010 => Some(AluOp::SUB), 0b0011 => Some(AluOp::RSB),
            0b0100 => Some(AluOp::ADD), 0b0101 => Some(AluOp::ADC),
            0b0110 => Some(AluOp::SBC), 0b0111 => Some(AluOp::RSC),
            0b1100 => Some(AluOp::ORR), 0b1110 => Some(AluOp::BIC),
            _ => None, // TST/TEQ/CMP/CMN/MOV/MVN: not this kind.
        }
    }

    /// Bitwise ops compute their carry from the shifter; additive ops
    /// compute it from `AddWithCarry`.
    fn is_bitwise(self) -> bool {
        matches!(self, AluOp::AND | AluOp::EOR | AluOp::ORR | AluOp::BIC)
    }
}

/// The second ALU operand: a shifted register or an ARM-expanded immediate.
#[derive(Debug, Clone, Copy)]
pub enum Operand2 {
    /// `Rm` shifted by a compile-time-constant amount.
    Reg { rm: Register, shift_ty: ShiftType, shift_amount: u32 },
    /// A 12-bit rotated immediate.
    Imm { imm12: u32 },
}

/// A decoded data-processing instruction.
#[derive(Debug, Clone, Copy)]
pub struct Arithmetic {
    cond: Condition,
    op: AluOp,
    set_flags: bool,
    rn: Register,
    rd: Register,
    operand: Operand2,
}

impl Arithmetic {
    /// Attempts to decode `word` as a data-processing instruction.
    pub fn decode(word: u32) -> Option<Arithmetic> {
        // COND 00 I opc S Rn Rd shifter
        const PATTERN: [Field; 8] = [
            Field::Bits  { width: 4, slot: 0 },  // cond
            Field::Const { width: 2, value: 0b00 },
            Field::Bits  { width: 1, slot: 1 },  // I
            Field::Bits  { width: 4, slot: 2 },  // opc
            Field::Bits  { width: 1, slot: 3 },  // S
            Field::Bits  { width: 4, slot: 4 },  // Rn
            Field::Bits  { width: 4, slot: 5 },  // Rd
            Field::Bits  { width: 12, slot: 6 }, // shifter
        ];
        let mut out = [FieldValue::default(); 7];
        if !read_fields(word, &PATTERN, &mut out) {
            return None; // Not the data-processing encoding space.
        }

        let cond = Condition::decode(out[0].0);
        if !cond.is_valid() {
            return None;
        }

        let is_imm = out[1].0 != 0;
        let op = AluOp::decode(out[2].0)?;
        let set_flags = out[3].0 != 0;
        let rn = Register::from_gpr_index(out[4].0);
        let rd = Register::from_gpr_index(out[5].0);
        let shifter = out[6].0;

        if rd == Register::PC && set_flags {
            return None; // SUBS PC, LR territory: rejected at decode.
        }

        let operand = if is_imm {
            Operand2::Imm { imm12: shifter }
        } else {
            if (shifter >> 4) & 1 != 0 {
                return None; // Register-specified shift amount: out of scope.
            }
            let rm = Register::from_gpr_index(shifter);
            if rn == Register::PC || rm == Register::PC {
                return None; // Register-form operands forbid PC.
            }
            let imm5 = (shifter >> 7) & 0b1_1111;
            let op2 = (shifter >> 5) & 0b11;
            let (shift_ty, shift_amount) = ShiftType::decode_imm_shift(op2, imm5);
            Operand2::Reg { rm, shift_ty, shift_amount }
        };

        Some(Arithmetic { cond, op, set_flags, rn, rd, operand })
    }

    /// The instruction's condition field.
    pub fn condition(&self) -> Condition {
        self.cond
    }

    /// Lowers this instruction's body. Never terminates its block: a write
    /// to `rd == PC` here is accepted at decode (see module docs) but
    /// lowered as an ordinary register write, not an implicit branch.
    pub fn generate_instruction_code(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        state: &MachineState,
    ) -> bool {
        let op1 = state.read_register(builder, module, self.rn);
        let carry_in = state.read_flag(builder, module, Register::C);

        let (op2, shifter_carry) = match self.operand {
            Operand2::Reg { rm, shift_ty, shift_amount } => {
                let rm_val = state.read_register(builder, module, rm);
                if self.op.is_bitwise() {
                    let r = helpers::shift_c(builder, rm_val, shift_ty, shift_amount, carry_in);
                    (r.value, Some(r.carry))
                } else {
                    (helpers::shift(builder, rm_val, shift_ty, shift_amount, carry_in), None)
                }
            },
            Operand2::Imm { imm12 } => {
                if self.op.is_bitwise() {
                    let r = helpers::arm_expand_imm_c(builder, imm12, carry_in);
                    (r.value, Some(r.carry))
                } else {
                    (helpers::arm_expand_imm(builder, imm12), None)
                }
            },
        };

        let (result, carry, overflow): (Value, Value, Option<Value>) = match self.op {
            AluOp::AND => (builder.ins().band(op1, op2), shifter_carry.unwrap(), None),
            AluOp::EOR => (builder.ins().bxor(op1, op2), shifter_carry.unwrap(), None),
            AluOp::ORR => (builder.ins().bor(op1, op2), shifter_carry.unwrap(), None),
            AluOp::BIC => {
                let not_op2 = builder.ins().bnot(op2);
                (builder.ins().band(op1, not_op2), shifter_carry.unwrap(), None)
            },
            AluOp::ADD => {
                let r = helpers::add_with_carry(builder, op1, op2, const_bool(builder, false));
                (r.result, r.carry, Some(r.overflow))
            },
            AluOp::ADC => {
                let r = helpers::add_with_carry(builder, op1, op2, carry_in);
                (r.result, r.carry, Some(r.overflow))
            },
            AluOp::SUB => {
                let not_op2 = builder.ins().bnot(op2);
                let r = helpers::add_with_carry(builder, op1, not_op2, const_bool(builder, true));
                (r.result, r.carry, Some(r.overflow))
            },
            AluOp::SBC => {
                let not_op2 = builder.ins().bnot(op2);
                let r = helpers::add_with_carry(builder, op1, not_op2, carry_in);
                (r.result, r.carry, Some(r.overflow))
            },
            AluOp::RSB => {
                let not_op1 = builder.ins().bnot(op1);
                let r = helpers::add_with_carry(builder, not_op1, op2, const_bool(builder, true));
                (r.result, r.carry, Some(r.overflow))
            },
            AluOp::RSC => {
                let not_op1 = builder.ins().bnot(op1);
                let r = helpers::add_with_carry(builder, not_op1, op2, carry_in);
                (r.result, r.carry, Some(r.overflow))
            },
        };

        state.write_register(builder, module, self.rd, result);

        if self.set_flags {
            let n = builder.ins().icmp_imm(IntCC::SignedLessThan, result, 0);
            let z = builder.ins().icmp_imm(IntCC::Equal, result, 0);
            state.write_flag(builder, module, Register::N, n);
            state.write_flag(builder, module, Register::Z, z);
            state.write_flag(builder, module, Register::C, carry);
            if let Some(v) = overflow {
                state.write_flag(builder, module, Register::V, v);
            }
        }

        false
    }
}

fn const_bool(builder: &mut FunctionBuilder, v: bool) -> Value {
    builder.ins().iconst(types::I8, v as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_add_register_form() {
        // AL ADD r2, r1, r3 (LSL #0)
        let i = Arithmetic::decode(0xE081_2003).expect("decodes");
        assert_eq!(i.op, AluOp::ADD);
        assert_eq!(i.rn, Register::R1);
        assert_eq!(i.rd, Register::R2);
        assert!(!i.set_flags);
    }

    #[test]
    fn rejects_subs_pc() {
        // SUBS pc, lr, #0 : cond=AL, SUB, S=1, Rn=LR, Rd=PC
        let word = 0xE25F_F000u32; // 1110 0010 0101 1111 1111 0000 0000 0000
        assert!(Arithmetic::decode(word).is_none());
    }

    #[test]
    fn rejects_test_opcodes() {
        // CMP r0, #0 must not decode as Arithmetic (no destination write).
        let word = 0xE350_0000u32;
        assert!(Arithmetic::decode(word).is_none());
    }

    #[test]
    fn rejects_register_form_with_pc_operand() {
        // ADD r0, pc, r1 : rn == PC in register form is rejected.
        let word = 0xE08F_0001u32;
        assert!(Arithmetic::decode(word).is_none());
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
