// License below.
//! Pure lowering of ARM pseudocode primitives: shift/rotate with carry,
//! immediate expansion, and add-with-carry returning `(result, carry,
//! overflow)`.
//!
//! These mirror the ARMv7 manual's `Shift_C`, `ARMExpandImm_C`, and
//! `AddWithCarry` pseudocode functions. Shift *types* and *amounts* are
//! always compile-time constants here — this translator only decodes
//! the `imm5`-shifted register and rotated-immediate shifter forms, never
//! a register-specified shift amount (`Rs`) — so every function below
//! takes `amount: u32` rather than an IR value. Only the operand being
//! shifted and the incoming carry flag are runtime IR values.
#![warn(missing_docs)]

use cranelift_codegen::ir::{types, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;

use crate::arm::ShiftType;

/// A shifted value together with the carry flag it produces.
#[derive(Debug, Clone, Copy)]
pub struct ShiftResult {
    /// The shifted 32-bit value.
    pub value: Value,
    /// The resulting carry-out, as an `i8` 0/1 value.
    pub carry: Value,
}

fn bit_at(builder: &mut FunctionBuilder, value: Value, pos: u32) -> Value {
    let shifted = builder.ins().ushr_imm(value, i64::from(pos));
    let masked = builder.ins().band_imm(shifted, 1);
    builder
        .ins()
        .icmp_imm(cranelift_codegen::ir::condcodes::IntCC::NotEqual, masked, 0)
}

fn lsl_c(builder: &mut FunctionBuilder, value: Value, shift: u32) -> (Value, Value) {
    debug_assert!(shift >= 1 && shift <= 31);
    let result = builder.ins().ishl_imm(value, i64::from(shift));
    let carry = bit_at(builder, value, 32 - shift);
    (result, carry)
}

fn lsr_c(builder: &mut FunctionBuilder, value: Value, shift: u32) -> (Value, Value) {
    debug_assert!(shift >= 1 && shift <= 32);
    let result = if shift == 32 {
        builder.ins().iconst(types::I32, 0)
    } else {
        builder.ins().ushr_imm(value, i64::from(shift))
    };
    let carry = bit_at(builder, value, shift - 1);
    (result, carry)
}

fn asr_c(builder: &mut FunctionBuilder, value: Value, shift: u32) -> (Value, Value) {
    debug_assert!(shift >= 1 && shift <= 32);
    let result = builder.ins().sshr_imm(value, i64::from(if shift == 32 { 31 } else { shift }));
    let carry = bit_at(builder, value, shift - 1);
    (result, carry)
}

fn ror_c(builder: &mut FunctionBuilder, value: Value, shift: u32) -> (Value, Value) {
    let m = shift % 32;
    if m == 0 {
        let carry = bit_at(builder, value, 31);
        (value, carry)
    } else {
        let result = builder.ins().rotr_imm(value, i64::from(m));
        let carry = bit_at(builder, value, m - 1);
        (result, carry)
    }
}

fn rrx_c(builder: &mut FunctionBuilder, value: Value, carry_in: Value) -> (Value, Value) {
    let carry_bit = builder.ins().uextend(types::I32, carry_in);
    let top = builder.ins().ishl_imm(carry_bit, 31);
    let rest = builder.ins().ushr_imm(value, 1);
    let result = builder.ins().bor(top, rest);
    let carry = bit_at(builder, value, 0);
    (result, carry)
}

/// `Shift_C(value, type, amount, carry_in) -> (result, carry_out)`.
///
/// When `amount == 0`, returns `(value, carry_in)` unchanged for every
/// shift type, matching the ARM manual's special case (and incidentally
/// making the `RRX` encoding — which always carries `amount == 1` per
/// `ShiftType::decode_imm_shift` — unreachable through this branch).
pub fn shift_c(
    builder: &mut FunctionBuilder,
    value: Value,
    ty: ShiftType,
    amount: u32,
    carry_in: Value,
) -> ShiftResult {
    if amount == 0 {
        return ShiftResult { value, carry: carry_in };
    }
    let (value, carry) = match ty {
        ShiftType::LSL => lsl_c(builder, value, amount),
        ShiftType::LSR => lsr_c(builder, value, amount),
        ShiftType::ASR => asr_c(builder, value, amount),
        ShiftType::ROR => ror_c(builder, value, amount),
        ShiftType::RRX => rrx_c(builder, value, carry_in),
    };
    ShiftResult { value, carry }
}

/// `Shift(value, type, amount, carry_in) -> result`, discarding the carry.
pub fn shift(
    builder: &mut FunctionBuilder,
    value: Value,
    ty: ShiftType,
    amount: u32,
    carry_in: Value,
) -> Value {
    shift_c(builder, value, ty, amount, carry_in).value
}

/// `ARMExpandImm_C(imm12, carry_in) -> (result, carry_out)`.
///
/// `imm12` is always a compile-time constant (it comes straight from the
/// instruction word), so the rotated value itself is folded in Rust and
/// only materialized as an `iconst`; only the shifter carry can depend on
/// a runtime value, and only when the rotation amount is zero.
pub fn arm_expand_imm_c(builder: &mut FunctionBuilder, imm12: u32, carry_in: Value) -> ShiftResult {
    let unrot = imm12 & 0xFF;
    let rot = 2 * (imm12 >> 8);
    let value = unrot.rotate_right(rot);
    let iconst = builder.ins().iconst(types::I32, i64::from(value as i32));
    let carry = if rot == 0 {
        carry_in
    } else {
        let bit31 = (value >> 31) & 1;
        builder.ins().iconst(types::I8, i64::from(bit31))
    };
    ShiftResult { value: iconst, carry }
}

/// `ARMExpandImm(imm12) -> result`, discarding the carry.
pub fn arm_expand_imm(builder: &mut FunctionBuilder, imm12: u32) -> Value {
    let unrot = imm12 & 0xFF;
    let rot = 2 * (imm12 >> 8);
    let value = unrot.rotate_right(rot);
    builder.ins().iconst(types::I32, i64::from(value as i32))
}

/// The three results of `AddWithCarry(x, y, carry_in)`.
#[derive(Debug, Clone, Copy)]
pub struct AddResult {
    /// `(x + y + carry_in) mod 2^32`.
    pub result: Value,
    /// Unsigned overflow out of bit 31.
    pub carry: Value,
    /// Signed overflow out of bit 31.
    pub overflow: Value,
}

/// `AddWithCarry(x, y, carry_in) -> (result, carry_out, overflow)`.
///
/// Computed by widening both operands (and the carry-in) to 64 bits,
/// once as unsigned and once as signed, and comparing the truncated
/// 32-bit result back against each 64-bit sum — exactly the ARM manual's
/// definition, rather than relying on a target-specific overflow flag.
pub fn add_with_carry(builder: &mut FunctionBuilder, x: Value, y: Value, carry_in: Value) -> AddResult {
    let cin = builder.ins().uextend(types::I64, carry_in);

    let xu = builder.ins().uextend(types::I64, x);
    let yu = builder.ins().uextend(types::I64, y);
    let unsigned_sum = builder.ins().iadd(xu, yu);
    let unsigned_sum = builder.ins().iadd(unsigned_sum, cin);

    let xs = builder.ins().sextend(types::I64, x);
    let ys = builder.ins().sextend(types::I64, y);
    let signed_sum = builder.ins().iadd(xs, ys);
    let signed_sum = builder.ins().iadd(signed_sum, cin);

    let result = builder.ins().ireduce(types::I32, unsigned_sum);

    let result_zext = builder.ins().uextend(types::I64, result);
    let carry = builder.ins().icmp(
        cranelift_codegen::ir::condcodes::IntCC::NotEqual,
        result_zext,
        unsigned_sum,
    );

    let result_sext = builder.ins().sextend(types::I64, result);
    let overflow = builder.ins().icmp(
        cranelift_codegen::ir::condcodes::IntCC::NotEqual,
        result_sext,
        signed_sum,
    );

    AddResult { result, carry, overflow }
}

#[cfg(test)]
mod test {
    // `Shift_C`/`AddWithCarry` build Cranelift IR and therefore can't be
    // unit-tested without a `FunctionBuilder` in scope; the arithmetic
    // they wrap is instead checked directly here in plain Rust, mirroring
    // exactly what the emitted IR computes.

    fn add_with_carry_host(x: i32, y: i32, cin: bool) -> (i32, bool, bool) {
        let cin = cin as u64;
        let unsigned_sum = (x as u32 as u64) + (y as u32 as u64) + cin;
        let signed_sum = (x as i64) + (y as i64) + (cin as i64);
        let result = unsigned_sum as u32 as i32;
        let carry = (result as u32 as u64) != unsigned_sum;
        let overflow = (result as i64) != signed_sum;
        (result, carry, overflow)
    }

    #[test]
    fn add_with_carry_matches_wrapping_semantics() {
        assert_eq!(add_with_carry_host(1, 1, false), (2, false, false));
        assert_eq!(add_with_carry_host(-1, 1, false), (0, true, false));
        assert_eq!(add_with_carry_host(i32::MAX, 1, false), (i32::MIN, false, true));
        assert_eq!(add_with_carry_host(i32::MIN, -1, false), (i32::MAX, true, true));
        assert_eq!(add_with_carry_host(5, 5, true), (11, false, false));
    }

    // Mirrors `arm_expand_imm`/`arm_expand_imm_c`'s constant-folding path
    // in plain Rust, against literal expected values computed by hand from
    // the ARM manual's `ARMExpandImm` definition -- not by re-deriving the
    // same rotate expression under test.
    fn arm_expand_imm_host(imm12: u32) -> (u32, bool) {
        let unrot = imm12 & 0xFF;
        let rot = 2 * (imm12 >> 8);
        let value = unrot.rotate_right(rot);
        let carry = rot != 0 && (value >> 31) & 1 != 0;
        (value, carry)
    }

    #[test]
    fn arm_expand_imm_matches_known_vectors() {
        // imm12 = rot:4 | unrot:8, rotation amount = 2*rot.
        assert_eq!(arm_expand_imm_host(0x0FF), (0x0000_00FF, false)); // rot=0, unrot=0xFF
        assert_eq!(arm_expand_imm_host(0x1FF), (0xC000_003F, true));  // rot=2, unrot=0xFF
        assert_eq!(arm_expand_imm_host(0xFFF), (0x0000_03FC, false)); // rot=30, unrot=0xFF
        assert_eq!(arm_expand_imm_host(0x000), (0x0000_0000, false)); // rot=0, unrot=0x00
        assert_eq!(arm_expand_imm_host(0x80F), (0x000F_0000, false)); // rot=16, unrot=0x0F
        assert_eq!(arm_expand_imm_host(0x480), (0x8000_0000, true));  // rot=8, unrot=0x80
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
