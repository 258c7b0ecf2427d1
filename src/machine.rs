// License below.
//! The machine-state facade: read/write architectural registers, read/write
//! flags, `ConditionPassed(cond)`, and read/write 32-bit guest memory, all
//! emitted against four imported symbols the runtime shim fills in.
#![warn(missing_docs)]

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, AbiParam, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{FuncId, Linkage, Module, ModuleError};

use crate::alias::AliasClass;
use crate::arm::condition::Condition;
use crate::arm::Register;
use cranelift_module::DataId;

/// Handles to the four imported symbols the runtime shim publishes before
/// the first call into `Run`, plus the pointer width to address them with.
#[derive(Debug, Clone, Copy)]
pub struct MachineState {
    registers: DataId,
    flags: DataId,
    read_memory32: FuncId,
    write_memory32: FuncId,
    pointer_type: types::Type,
}

impl MachineState {
    /// Declares the four imported symbols in `module`. Must run once,
    /// before any function referencing the machine state is built.
    pub fn declare(module: &mut dyn Module) -> Result<MachineState, ModuleError> {
        let pointer_type = module.target_config().pointer_type();

        let registers = module.declare_data("Registers", Linkage::Import, false, false)?;
        let flags = module.declare_data("Flags", Linkage::Import, false, false)?;

        let mut read_sig = module.make_signature();
        read_sig.params.push(AbiParam::new(types::I32));
        read_sig.returns.push(AbiParam::new(types::I32));
        let read_memory32 = module.declare_function("Memory::Read32", Linkage::Import, &read_sig)?;

        let mut write_sig = module.make_signature();
        write_sig.params.push(AbiParam::new(types::I32));
        write_sig.params.push(AbiParam::new(types::I32));
        let write_memory32 = module.declare_function("Memory::Write32", Linkage::Import, &write_sig)?;

        Ok(MachineState { registers, flags, read_memory32, write_memory32, pointer_type })
    }

    fn registers_base(&self, builder: &mut FunctionBuilder, module: &mut dyn Module) -> Value {
        let gv = module.declare_data_in_func(self.registers, builder.func);
        builder.ins().global_value(self.pointer_type, gv)
    }

    fn flags_base(&self, builder: &mut FunctionBuilder, module: &mut dyn Module) -> Value {
        let gv = module.declare_data_in_func(self.flags, builder.func);
        builder.ins().global_value(self.pointer_type, gv)
    }

    /// Reads a general-purpose register (or `PC`) as an `i32`.
    pub fn read_register(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, reg: Register) -> Value {
        let base = self.registers_base(builder, module);
        let offset = (reg.gpr_index() * 4) as i32;
        builder.ins().load(types::I32, AliasClass::Register(reg).mem_flags(), base, offset)
    }

    /// Writes a general-purpose register (or `PC`).
    ///
    /// Writing `PC` this way is the escape hatch used immediately before
    /// `generate_branch_read_pc`.
    pub fn write_register(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, reg: Register, value: Value) {
        let base = self.registers_base(builder, module);
        let offset = (reg.gpr_index() * 4) as i32;
        builder.ins().store(AliasClass::Register(reg).mem_flags(), value, base, offset);
    }

    /// Reads a condition flag as an `i8` 0/1 value.
    ///
    /// Flags are indexed at stride 4 inside the emitted IR, matching the
    /// host's `NFlag, ZFlag, CFlag, VFlag` layout; each slot holds a
    /// single 0/1 byte.
    pub fn read_flag(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, flag: Register) -> Value {
        let base = self.flags_base(builder, module);
        let offset = (flag.flag_index() * 4) as i32;
        let byte = builder.ins().load(types::I8, AliasClass::Register(flag).mem_flags(), base, offset);
        builder.ins().icmp_imm(IntCC::NotEqual, byte, 0)
    }

    /// Writes a condition flag from an `i8` 0/1 value.
    pub fn write_flag(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, flag: Register, value: Value) {
        let base = self.flags_base(builder, module);
        let offset = (flag.flag_index() * 4) as i32;
        builder.ins().store(AliasClass::Register(flag).mem_flags(), value, base, offset);
    }

    /// Emits `ConditionPassed(cond)`.
    pub fn condition_passed(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, cond: Condition) -> Value {
        cond.generate_passed(builder, self, module)
    }

    /// Emits a call to the imported `Memory::Read32(addr) -> u32` callback.
    pub fn read_memory32(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, addr: Value) -> Value {
        let callee = module.declare_func_in_func(self.read_memory32, builder.func);
        let call = builder.ins().call(callee, &[addr]);
        builder.inst_results(call)[0]
    }

    /// Emits a call to the imported `Memory::Write32(addr, value)` callback.
    pub fn write_memory32(&self, builder: &mut FunctionBuilder, module: &mut dyn Module, addr: Value, value: Value) {
        let callee = module.declare_func_in_func(self.write_memory32, builder.func);
        builder.ins().call(callee, &[addr, value]);
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
