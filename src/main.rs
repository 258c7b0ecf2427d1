// License below.

#[macro_use]
extern crate log;
extern crate argparse;
extern crate byteorder;

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use byteorder::ByteOrder;

use argparse::{ArgumentParser, Parse, ParseOption, Print, StoreTrue};
use cranelift_codegen::settings;
use cranelift_codegen::settings::Configurable;
use cranelift_module::Module;
use cranelift_object::{ObjectBuilder, ObjectModule};

mod alias;
mod arm;
mod block;
mod coloring;
mod config;
mod error;
mod logger;
mod machine;
mod module;

use config::RomConfig;
use error::TranslateError;
use module::ModuleBuilder;

struct CmdLineArgs {
    input_rom: Option<PathBuf>,
    output_object: Option<PathBuf>,
    debug_dump: Option<PathBuf>,
    base_address: Option<String>,
    verify: bool,
    verbose: bool,
    log_file_path: PathBuf,
}

impl Default for CmdLineArgs {
    fn default() -> CmdLineArgs {
        CmdLineArgs {
            input_rom: None,
            output_object: None,
            debug_dump: None,
            base_address: None,
            verify: false,
            verbose: false,
            log_file_path: PathBuf::from("./armxlate.log"),
        }
    }
}

fn main() {
    let mut args = CmdLineArgs::default();
    parse_command_line(&mut args);
    configure_logging(&args);

    match run(&args) {
        Ok(()) => process::exit(0),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    }
}

fn parse_command_line(args: &mut CmdLineArgs) {
    let mut parser = ArgumentParser::new();
    parser.set_description("An ahead-of-time binary translator for ARMv7-A (A32) code, targeting Cranelift IR.");
    parser.add_option(
        &["-V", "--version"],
        Print(format!("armxlate v{}", env!("CARGO_PKG_VERSION"))),
        "Show current version.",
    );
    parser
        .refer(&mut args.input_rom)
        .required()
        .add_argument("input-rom", ParseOption, "Path to the input ROM image.");
    parser
        .refer(&mut args.output_object)
        .required()
        .add_argument("output-object", ParseOption, "Path to write the relocatable object file.");
    parser
        .refer(&mut args.debug_dump)
        .add_argument("debug-dump", ParseOption, "Optional path to dump decoded-block/coloring diagnostics as text.");
    parser
        .refer(&mut args.base_address)
        .add_option(&["--base"], ParseOption, "Code region base address, hex, default 0x08000000.")
        .metavar("HEX");
    parser
        .refer(&mut args.verify)
        .add_option(&["--verify"], StoreTrue, "Build the module in verification mode.");
    parser
        .refer(&mut args.verbose)
        .add_option(&["-v", "--verbose"], StoreTrue, "Log extra messages and information.");
    parser
        .refer(&mut args.log_file_path)
        .add_option(&["--log"], Parse, "Custom path for the log file.")
        .metavar("PATH");
    parser.parse_args_or_exit();
}

fn configure_logging(args: &CmdLineArgs) {
    let p = args.log_file_path.as_path();
    logger::init_with(p, args.verbose, true).unwrap();
    info!("logging to file `{}`", p.display());
}

fn run(args: &CmdLineArgs) -> Result<(), TranslateError> {
    let input_rom = args.input_rom.as_ref().expect("required by argparse");
    let output_object = args.output_object.as_ref().expect("required by argparse");

    let rom = fs::read(input_rom)?;
    info!("read {} bytes from `{}`", rom.len(), input_rom.display());

    let base = match &args.base_address {
        Some(hex) => u32::from_str_radix(hex.trim_start_matches("0x"), 16).map_err(|_| TranslateError::InvalidBaseAddress(hex.clone()))?,
        None => config::DEFAULT_ROM_CODE_START,
    };
    let rom_config = RomConfig::from_image_len(base, rom.len());

    let isa_builder = cranelift_native::builder().map_err(|s| TranslateError::ModuleError(s.to_string()))?;
    let mut flag_builder = settings::builder();
    flag_builder.set("opt_level", "speed").map_err(|e| TranslateError::ModuleError(e.to_string()))?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| TranslateError::ModuleError(e.to_string()))?;

    let object_builder = ObjectBuilder::new(isa, "armxlate", cranelift_module::default_libcall_names())
        .map_err(|e| TranslateError::ModuleError(e.to_string()))?;
    let mut object_module = ObjectModule::new(object_builder);

    let builder = ModuleBuilder::new(&rom, rom_config, args.verify);
    builder.build(&mut object_module)?;

    let product = object_module.finish();
    let bytes = product.emit().map_err(|e| TranslateError::ObjectIo(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

    {
        let mut f = File::create(output_object).map_err(TranslateError::ObjectIo)?;
        f.write_all(&bytes).map_err(TranslateError::ObjectIo)?;
        f.flush().map_err(TranslateError::ObjectIo)?;
    }
    info!("wrote {} bytes to `{}`", bytes.len(), output_object.display());

    if let Some(dump_path) = &args.debug_dump {
        write_debug_dump(dump_path, &rom, rom_config, args.verify)?;
    }

    Ok(())
}

/// Re-runs just the decode/graph/coloring stages (cheap relative to full
/// code generation) to produce a human-readable listing of every
/// decoded block's address, instruction, and color — useful for
/// inspecting a translation without a disassembler for the object file.
fn write_debug_dump(path: &std::path::Path, rom: &[u8], config: RomConfig, verify: bool) -> Result<(), TranslateError> {
    use std::collections::HashMap;

    let mut pc_to_index = HashMap::new();
    let mut blocks = Vec::new();
    let start = config.rom_code_start;
    let end = start.wrapping_add(config.rom_code_size);
    let mut pc = start;
    while pc < end {
        let offset = (pc - start) as usize;
        if offset + 4 > rom.len() {
            break;
        }
        let word = byteorder::LittleEndian::read_u32(&rom[offset..offset + 4]);
        if word != 0 {
            if let Some(instr) = arm::registry::disassemble(word, pc) {
                pc_to_index.insert(pc, blocks.len());
                blocks.push(block::Block::new(pc, instr));
            }
        }
        pc = pc.wrapping_add(4);
    }
    block::compute_edges(&mut blocks, &pc_to_index);
    let coloring = coloring::color_blocks(&blocks);

    let mut out = String::new();
    out.push_str(&format!("; verify = {}\n", verify));
    for (bi, b) in blocks.iter().enumerate() {
        out.push_str(&format!("{:#010x}: {:?} color={}\n", b.pc, b.instruction, coloring.block_color[bi]));
    }

    let mut f = File::create(path).map_err(TranslateError::ObjectIo)?;
    f.write_all(out.as_bytes()).map_err(TranslateError::ObjectIo)?;
    f.flush().map_err(TranslateError::ObjectIo)?;
    Ok(())
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
