// License below.
//! Loader metadata describing the guest ROM's code and read-only-data
//! extents, read once at pipeline start.
#![warn(missing_docs)]

/// Describes the ROM regions the translator decodes from and the regions
/// PC-relative literal loads may be inlined from.
///
/// Drives both the decode loop bounds (`[rom_code_start,
/// rom_code_start+rom_code_size)`) and `Load`'s compile-time literal
/// inlining: any 4-byte read whose full range lies inside the code region
/// or the read-only-data region is resolved at translate time against the
/// loaded ROM bytes rather than emitted as a runtime call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomConfig {
    /// First address, inclusive, of the decoded code region.
    pub rom_code_start: u32,
    /// Size in bytes of the decoded code region.
    pub rom_code_size: u32,
    /// First address, inclusive, of the read-only-data region.
    pub rom_rodata_start: u32,
    /// Size in bytes of the read-only-data region.
    pub rom_rodata_size: u32,
}

/// Conventional GBA ROM load address; used only as a realistic default.
/// The translator itself is agnostic to ROM format beyond word alignment.
pub const DEFAULT_ROM_CODE_START: u32 = 0x0800_0000;

impl RomConfig {
    /// Builds a config from an input image's byte length.
    ///
    /// Without real loader-supplied section boundaries, the rodata region
    /// is assumed to cover the same extent as the code region: the input
    /// image isn't a priori segmented into separate code/data sections.
    pub fn from_image_len(rom_code_start: u32, image_len: usize) -> RomConfig {
        let size = image_len as u32;
        RomConfig {
            rom_code_start,
            rom_code_size: size,
            rom_rodata_start: rom_code_start,
            rom_rodata_size: size,
        }
    }

    /// `true` if `[addr, addr+4)` lies entirely inside the code region.
    pub fn in_code(&self, addr: u32) -> bool {
        in_range(addr, self.rom_code_start, self.rom_code_size)
    }

    /// `true` if `[addr, addr+4)` lies entirely inside the rodata region.
    pub fn in_rodata(&self, addr: u32) -> bool {
        in_range(addr, self.rom_rodata_start, self.rom_rodata_size)
    }

    /// `true` if a 4-byte read at `addr` can be inlined as a compile-time
    /// constant: it lies entirely inside the code region or the
    /// read-only-data region.
    pub fn is_inlinable_literal(&self, addr: u32) -> bool {
        self.in_code(addr) || self.in_rodata(addr)
    }

    /// Number of word-aligned slots in `[rom_code_start,
    /// rom_code_start+rom_code_size)`, i.e. the block-address table's length.
    pub fn slot_count(&self) -> u32 {
        self.rom_code_size / 4
    }

    /// `(pc / 4) - base`, the block-address table's index base.
    pub fn base_index(&self) -> u32 {
        self.rom_code_start / 4
    }
}

fn in_range(addr: u32, start: u32, size: u32) -> bool {
    let end = match start.checked_add(size) {
        Some(e) => e,
        None => return false,
    };
    match addr.checked_add(4) {
        Some(addr_end) => addr >= start && addr_end <= end,
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn inlines_literals_fully_inside_either_region() {
        let cfg = RomConfig { rom_code_start: 0x1000, rom_code_size: 0x100, rom_rodata_start: 0x2000, rom_rodata_size: 0x100 };
        assert!(cfg.is_inlinable_literal(0x1000));
        assert!(cfg.is_inlinable_literal(0x10FC));
        assert!(!cfg.is_inlinable_literal(0x1100));
        assert!(cfg.is_inlinable_literal(0x2000));
        assert!(!cfg.is_inlinable_literal(0x1FFC));
    }

    #[test]
    fn rejects_reads_straddling_the_region_end() {
        let cfg = RomConfig { rom_code_start: 0x1000, rom_code_size: 0x10, rom_rodata_start: 0x1000, rom_rodata_size: 0x10 };
        assert!(!cfg.is_inlinable_literal(0x100D));
        assert!(cfg.is_inlinable_literal(0x100C));
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
