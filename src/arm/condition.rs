// License below.
//! Implements the 4-bit condition field of an ARM instruction.
#![warn(missing_docs)]

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::types;
use cranelift_codegen::ir::InstBuilder;
use cranelift_codegen::ir::Value;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Module;

use crate::machine::MachineState;

/// Logical NOT of an `i8` 0/1 value. `bnot` is a bitwise complement and
/// would turn `1` into `0xFE`, not `0` -- flags are compared against zero
/// instead.
fn not_bool(builder: &mut FunctionBuilder, v: Value) -> Value {
    builder.ins().icmp_imm(IntCC::Equal, v, 0)
}

/// The condition field of an ARM instruction.
///
/// Pairs are `(EQ/NE, CS/CC, MI/PL, VS/VC, HI/LS, GE/LT, GT/LE)`; the
/// second of each pair is the logical negation of the first. `AL`
/// always executes; `Invalid` (the reserved encoding `0b1111`) fails
/// decode wherever it is encountered.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Condition {
    #[doc = "Z set. Equal."]                              EQ = 0b0000,
    #[doc = "Z clear. Not equal."]                         NE = 0b0001,
    #[doc = "C set. Unsigned higher or same."]             CS = 0b0010,
    #[doc = "C clear. Unsigned lower."]                    CC = 0b0011,
    #[doc = "N set. Negative."]                            MI = 0b0100,
    #[doc = "N clear. Positive or zero."]                  PL = 0b0101,
    #[doc = "V set. Overflow."]                            VS = 0b0110,
    #[doc = "V clear. No overflow."]                       VC = 0b0111,
    #[doc = "C set and Z clear. Unsigned higher."]         HI = 0b1000,
    #[doc = "C clear or Z set. Unsigned lower or same."]   LS = 0b1001,
    #[doc = "N equals V. Signed greater than or equal."]   GE = 0b1010,
    #[doc = "N distinct from V. Signed less than."]        LT = 0b1011,
    #[doc = "Z clear and N equals V. Signed greater than."] GT = 0b1100,
    #[doc = "Z set or N distinct from V. Signed LE."]      LE = 0b1101,
    #[doc = "Always executes."]                            AL = 0b1110,
    #[doc = "Reserved encoding."]                          Invalid = 0b1111,
}

impl Condition {
    /// Decodes the 4-bit condition field found in bits `[31:28]` of
    /// every ARM instruction.
    pub fn decode(bits: u32) -> Condition {
        match bits & 0b1111 {
            0b0000 => Condition::EQ, 0b0001 => Condition::NE,
            0b0010 => Condition::CS, 0b0011 => Condition::CC,
            0b0100 => Condition::MI, 0b0101 => Condition::PL,
            0b0110 => Condition::VS, 0b0111 => Condition::VC,
            0b1000 => Condition::HI, 0b1001 => Condition::LS,
            0b1010 => Condition::GE, 0b1011 => Condition::LT,
            0b1100 => Condition::GT, 0b1101 => Condition::LE,
            0b1110 => Condition::AL, 0b1111 => Condition::Invalid,
            _ => unreachable!("4-bit field"),
        }
    }

    /// `true` for every condition but `Invalid`.
    pub fn is_valid(self) -> bool {
        self != Condition::Invalid
    }

    /// `true` for `AL`, where the condition-predicated split in
    /// `Instruction::generate_code` can be skipped entirely.
    pub fn is_always(self) -> bool {
        self == Condition::AL
    }

    /// Emits the IR computing `ConditionPassed(self)` as an `i8` boolean,
    /// built from the machine state's flag reads.
    ///
    /// Mirrors the ARM manual's canonical table over `{N, Z, C, V}`; the
    /// negated half of each pair is `bnot` of the positive form.
    pub fn generate_passed(
        self,
        builder: &mut FunctionBuilder,
        state: &MachineState,
        module: &mut dyn Module,
    ) -> Value {
        use crate::arm::Register::{C, N, V, Z};

        match self {
            Condition::EQ => state.read_flag(builder, module, Z),
            Condition::NE => {
                let z = state.read_flag(builder, module, Z);
                not_bool(builder, z)
            },
            Condition::CS => state.read_flag(builder, module, C),
            Condition::CC => {
                let c = state.read_flag(builder, module, C);
                not_bool(builder, c)
            },
            Condition::MI => state.read_flag(builder, module, N),
            Condition::PL => {
                let n = state.read_flag(builder, module, N);
                not_bool(builder, n)
            },
            Condition::VS => state.read_flag(builder, module, V),
            Condition::VC => {
                let v = state.read_flag(builder, module, V);
                not_bool(builder, v)
            },
            Condition::HI => {
                let c = state.read_flag(builder, module, C);
                let z = state.read_flag(builder, module, Z);
                let not_z = not_bool(builder, z);
                builder.ins().band(c, not_z)
            },
            Condition::LS => {
                let c = state.read_flag(builder, module, C);
                let z = state.read_flag(builder, module, Z);
                let not_c = not_bool(builder, c);
                builder.ins().bor(not_c, z)
            },
            Condition::GE => {
                let n = state.read_flag(builder, module, N);
                let v = state.read_flag(builder, module, V);
                let ne = builder.ins().bxor(n, v);
                not_bool(builder, ne)
            },
            Condition::LT => {
                let n = state.read_flag(builder, module, N);
                let v = state.read_flag(builder, module, V);
                builder.ins().bxor(n, v)
            },
            Condition::GT => {
                let n = state.read_flag(builder, module, N);
                let v = state.read_flag(builder, module, V);
                let z = state.read_flag(builder, module, Z);
                let ne = builder.ins().bxor(n, v);
                let ge = not_bool(builder, ne);
                let not_z = not_bool(builder, z);
                builder.ins().band(not_z, ge)
            },
            Condition::LE => {
                let n = state.read_flag(builder, module, N);
                let v = state.read_flag(builder, module, V);
                let z = state.read_flag(builder, module, Z);
                let lt = builder.ins().bxor(n, v);
                builder.ins().bor(z, lt)
            },
            Condition::AL => builder.ins().iconst(types::I8, 1),
            Condition::Invalid => unreachable!("decode rejects Condition::Invalid"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_round_trips_all_encodings() {
        for bits in 0u32..16 {
            let cond = Condition::decode(bits);
            assert_eq!(cond as u8, bits as u8);
        }
    }

    #[test]
    fn invalid_is_only_the_reserved_encoding() {
        assert!(!Condition::Invalid.is_valid());
        for bits in 0u32..15 {
            assert!(Condition::decode(bits).is_valid());
        }
    }

    #[test]
    fn pairs_are_complementary_over_every_flag_combination() {
        // Enumerate every (N, Z, C, V) combination and check that each
        // condition pair disagrees on every input, per the ARM manual.
        let pairs = [
            (Condition::EQ, Condition::NE),
            (Condition::CS, Condition::CC),
            (Condition::MI, Condition::PL),
            (Condition::VS, Condition::VC),
            (Condition::HI, Condition::LS),
            (Condition::GE, Condition::LT),
            (Condition::GT, Condition::LE),
        ];
        for &(pos, neg) in &pairs {
            for bits in 0u8..16 {
                let n = bits & 1 != 0;
                let z = bits & 2 != 0;
                let c = bits & 4 != 0;
                let v = bits & 8 != 0;
                assert_ne!(
                    eval(pos, n, z, c, v), eval(neg, n, z, c, v),
                    "{:?}/{:?} agree on N={} Z={} C={} V={}", pos, neg, n, z, c, v
                );
            }
        }
    }

    fn eval(cond: Condition, n: bool, z: bool, c: bool, v: bool) -> bool {
        match cond {
            Condition::EQ => z,
            Condition::NE => !z,
            Condition::CS => c,
            Condition::CC => !c,
            Condition::MI => n,
            Condition::PL => !n,
            Condition::VS => v,
            Condition::VC => !v,
            Condition::HI => c && !z,
            Condition::LS => !c || z,
            Condition::GE => n == v,
            Condition::LT => n != v,
            Condition::GT => !z && (n == v),
            Condition::LE => z || (n != v),
            Condition::AL => true,
            Condition::Invalid => unreachable!(),
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
