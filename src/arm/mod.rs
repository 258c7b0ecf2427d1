// License below.
//! Implements everything related to decoding and lowering ARMv7-A (A32)
//! instructions into Cranelift IR.
//!
//! This module only covers the A32 instruction encoding; Thumb (T32),
//! coprocessor/VFP/NEON and privileged instructions are out of scope
//! (see the translator's top-level documentation).
#![warn(missing_docs)]

use std::fmt;

pub use self::condition::Condition;
pub use self::fields::{Field, FieldValue};
pub use self::helpers::ShiftResult;
pub use self::registry::disassemble;

pub mod condition;
pub mod fields;
pub mod helpers;
pub mod instruction;
pub mod registry;

/// Identifies one architectural register: the 16 general-purpose
/// registers `R0..R12, SP, LR, PC`, and the four condition flags
/// `N, Z, C, V`.
///
/// Ordering is significant: `R0..PC` form the GPR range and are
/// indexed by their position within it; `N..V` form the flag range
/// and are indexed by their position within *that* range, in a
/// separate backing store (see `machine::MachineState`).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[allow(non_camel_case_types)]
pub enum Register {
    #[doc = "General-purpose register 0."]  R0,
    #[doc = "General-purpose register 1."]  R1,
    #[doc = "General-purpose register 2."]  R2,
    #[doc = "General-purpose register 3."]  R3,
    #[doc = "General-purpose register 4."]  R4,
    #[doc = "General-purpose register 5."]  R5,
    #[doc = "General-purpose register 6."]  R6,
    #[doc = "General-purpose register 7."]  R7,
    #[doc = "General-purpose register 8."]  R8,
    #[doc = "General-purpose register 9."]  R9,
    #[doc = "General-purpose register 10."] R10,
    #[doc = "General-purpose register 11."] R11,
    #[doc = "General-purpose register 12."] R12,
    #[doc = "Stack pointer (R13)."]         SP,
    #[doc = "Link register (R14)."]        LR,
    #[doc = "Program counter (R15)."]      PC,
    #[doc = "Negative flag."]               N,
    #[doc = "Zero flag."]                   Z,
    #[doc = "Carry flag."]                  C,
    #[doc = "Overflow flag."]               V,
}

impl Register {
    /// All 16 general-purpose registers, `R0` first.
    pub const GPR_COUNT: usize = 16;

    /// All 4 condition flags.
    pub const FLAG_COUNT: usize = 4;

    /// Decodes a 4-bit field as a general-purpose register.
    pub fn from_gpr_index(i: u32) -> Register {
        match i & 0b1111 {
            0  => Register::R0,  1  => Register::R1,  2  => Register::R2,  3  => Register::R3,
            4  => Register::R4,  5  => Register::R5,  6  => Register::R6,  7  => Register::R7,
            8  => Register::R8,  9  => Register::R9,  10 => Register::R10, 11 => Register::R11,
            12 => Register::R12, 13 => Register::SP,  14 => Register::LR,  15 => Register::PC,
            _  => unreachable!("4-bit field"),
        }
    }

    /// `true` for `R0..PC`.
    pub fn is_gpr(self) -> bool {
        (self as u8) <= (Register::PC as u8)
    }

    /// `true` for `PC`.
    pub fn is_pc(self) -> bool {
        self == Register::PC
    }

    /// Position within the GPR range, used to index the GPR backing store.
    ///
    /// Panics if called on a flag register.
    pub fn gpr_index(self) -> usize {
        assert!(self.is_gpr(), "not a GPR: {:?}", self);
        self as usize
    }

    /// Position within the flag range, used to index the flag backing store.
    ///
    /// Panics if called on a GPR.
    pub fn flag_index(self) -> usize {
        assert!(!self.is_gpr(), "not a flag: {:?}", self);
        (self as usize) - (Register::N as usize)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Register::R0  => write!(f, "r0"),  Register::R1  => write!(f, "r1"),
            Register::R2  => write!(f, "r2"),  Register::R3  => write!(f, "r3"),
            Register::R4  => write!(f, "r4"),  Register::R5  => write!(f, "r5"),
            Register::R6  => write!(f, "r6"),  Register::R7  => write!(f, "r7"),
            Register::R8  => write!(f, "r8"),  Register::R9  => write!(f, "r9"),
            Register::R10 => write!(f, "r10"), Register::R11 => write!(f, "r11"),
            Register::R12 => write!(f, "r12"), Register::SP  => write!(f, "sp"),
            Register::LR  => write!(f, "lr"),  Register::PC  => write!(f, "pc"),
            Register::N   => write!(f, "N"),   Register::Z   => write!(f, "Z"),
            Register::C   => write!(f, "C"),   Register::V   => write!(f, "V"),
        }
    }
}

/// One of the five ARM shift types, plus `RRX` (rotate-right-with-extend,
/// which is encoded as `ROR #0`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShiftType {
    #[doc = "Logical shift left."]         LSL,
    #[doc = "Logical shift right."]        LSR,
    #[doc = "Arithmetic shift right."]     ASR,
    #[doc = "Rotate right."]               ROR,
    #[doc = "Rotate right with extend."]   RRX,
}

impl ShiftType {
    /// Decodes the 2-bit shift-type field together with an `imm5` amount,
    /// per the ARM manual's `DecodeImmShift`.
    ///
    /// `imm5 == 0` means "shift by 32" for `LSR`/`ASR`, and selects `RRX`
    /// (with amount forced to 1) for `ROR`.
    pub fn decode_imm_shift(op2: u32, imm5: u32) -> (ShiftType, u32) {
        match op2 & 0b11 {
            0b00 => (ShiftType::LSL, imm5),
            0b01 => (ShiftType::LSR, if imm5 == 0 { 32 } else { imm5 }),
            0b10 => (ShiftType::ASR, if imm5 == 0 { 32 } else { imm5 }),
            0b11 => if imm5 == 0 { (ShiftType::RRX, 1) } else { (ShiftType::ROR, imm5) },
            _ => unreachable!("2-bit field"),
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
